//! In-memory outbox implementing the cell messaging driver.
//!
//! Messages are queued per destination cell until a transport drains them.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, PoisonError};

use error_stack::Report;
use tracing::{debug, warn};

use crate::cells::traits::CellDriver;
use crate::cells::types::Result;
use crate::cells::{CellMessage, CellState, CellStateError};

/// Maximum number of undelivered messages per cell
pub const MAX_QUEUED_MESSAGES: usize = 1000;

/// Bounded per-cell message queues
pub struct OutboxDriver {
    queues: Mutex<HashMap<String, VecDeque<CellMessage>>>,
    max_queue_size: usize,
}

impl OutboxDriver {
    pub fn new() -> Self {
        Self::with_capacity(MAX_QUEUED_MESSAGES)
    }

    pub fn with_capacity(max_queue_size: usize) -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            max_queue_size,
        }
    }

    /// Take every queued message for `cell_name`, oldest first
    pub fn drain(&self, cell_name: &str) -> Vec<CellMessage> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues
            .remove(cell_name)
            .map(Vec::from)
            .unwrap_or_default()
    }

    /// Number of queued messages for `cell_name`
    pub fn pending(&self, cell_name: &str) -> usize {
        let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues.get(cell_name).map_or(0, VecDeque::len)
    }

    /// Number of queued messages across all cells
    pub fn total_pending(&self) -> usize {
        let queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        queues.values().map(VecDeque::len).sum()
    }
}

impl Default for OutboxDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CellDriver for OutboxDriver {
    fn send_message_to_cell(&self, cell: &CellState, message: &CellMessage) -> Result<()> {
        let mut queues = self.queues.lock().unwrap_or_else(PoisonError::into_inner);
        let queue = queues.entry(cell.name().to_string()).or_default();

        if queue.len() >= self.max_queue_size {
            warn!(
                cell_name = cell.name(),
                method = %message.method,
                "Outbox full, rejecting message"
            );
            return Err(Report::new(CellStateError::Delivery {
                cell_name: cell.name().to_string(),
                message: format!("outbox full ({} messages)", self.max_queue_size),
            }));
        }

        queue.push_back(message.clone());
        debug!(
            cell_name = cell.name(),
            method = %message.method,
            queued = queue.len(),
            "Message queued"
        );
        Ok(())
    }
}
