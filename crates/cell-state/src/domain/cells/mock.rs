//! Test adapters implementing the dependency injection traits
//!
//! This module provides mock/test implementations of the cell state
//! collaborators for use in unit and integration tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use api_types::CellRecord;
use api_types::ComputeNodeRecord;
use api_types::InstanceTypeRecord;
use api_types::ServiceRecord;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use error_stack::Report;

use super::cell_state::CellState;
use super::traits::{CellDriver, CellStateFactory, DirectoryStore, TimeSource};
use super::types::{CellMessage, CellStateError, QueryContext, Result, StoreError, StoreResult};

/// Mock directory store with settable contents and fetch counters
pub struct MockDirectoryStore {
    cells: Mutex<Vec<CellRecord>>,
    compute_nodes: Mutex<Vec<ComputeNodeRecord>>,
    instance_types: Mutex<Vec<InstanceTypeRecord>>,
    error_mode: Mutex<bool>,
    cell_fetches: AtomicUsize,
    compute_node_fetches: AtomicUsize,
    instance_type_fetches: AtomicUsize,
    contexts: Mutex<Vec<QueryContext>>,
}

impl MockDirectoryStore {
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(Vec::new()),
            compute_nodes: Mutex::new(Vec::new()),
            instance_types: Mutex::new(Vec::new()),
            error_mode: Mutex::new(false),
            cell_fetches: AtomicUsize::new(0),
            compute_node_fetches: AtomicUsize::new(0),
            instance_type_fetches: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    pub fn set_cells(&self, cells: Vec<CellRecord>) {
        *self.cells.lock().unwrap() = cells;
    }

    pub fn set_compute_nodes(&self, compute_nodes: Vec<ComputeNodeRecord>) {
        *self.compute_nodes.lock().unwrap() = compute_nodes;
    }

    pub fn set_instance_types(&self, instance_types: Vec<InstanceTypeRecord>) {
        *self.instance_types.lock().unwrap() = instance_types;
    }

    /// Enable or disable error mode for testing error handling
    pub fn set_error_mode(&self, enabled: bool) {
        *self.error_mode.lock().unwrap() = enabled;
    }

    pub fn cell_fetch_count(&self) -> usize {
        self.cell_fetches.load(Ordering::SeqCst)
    }

    pub fn compute_node_fetch_count(&self) -> usize {
        self.compute_node_fetches.load(Ordering::SeqCst)
    }

    pub fn instance_type_fetch_count(&self) -> usize {
        self.instance_type_fetches.load(Ordering::SeqCst)
    }

    /// Contexts passed to the cell fetch, one per synchronization pass
    pub fn seen_contexts(&self) -> Vec<QueryContext> {
        self.contexts.lock().unwrap().clone()
    }

    fn check_error_mode(&self) -> StoreResult<()> {
        if *self.error_mode.lock().unwrap() {
            return Err(Report::new(StoreError::Unavailable {
                message: "Mock error mode enabled".to_string(),
            }));
        }
        Ok(())
    }
}

impl Default for MockDirectoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DirectoryStore for MockDirectoryStore {
    fn cell_get_all(&self, ctxt: &QueryContext) -> StoreResult<Vec<CellRecord>> {
        self.cell_fetches.fetch_add(1, Ordering::SeqCst);
        self.contexts.lock().unwrap().push(ctxt.clone());
        self.check_error_mode()?;
        Ok(self.cells.lock().unwrap().clone())
    }

    fn compute_node_get_all(&self, _ctxt: &QueryContext) -> StoreResult<Vec<ComputeNodeRecord>> {
        self.compute_node_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_error_mode()?;
        Ok(self.compute_nodes.lock().unwrap().clone())
    }

    fn instance_type_get_all(
        &self,
        _ctxt: &QueryContext,
    ) -> StoreResult<Vec<InstanceTypeRecord>> {
        self.instance_type_fetches.fetch_add(1, Ordering::SeqCst);
        self.check_error_mode()?;
        Ok(self.instance_types.lock().unwrap().clone())
    }
}

/// Manually advanced clock
pub struct MockTimeSource {
    now: Mutex<DateTime<Utc>>,
}

impl MockTimeSource {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Utc.timestamp_opt(1_700_000_000, 0).unwrap()),
        }
    }

    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Default for MockTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MockTimeSource {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Driver recording every message instead of delivering it
pub struct RecordingDriver {
    sent: Mutex<Vec<(String, CellMessage)>>,
    error_mode: Mutex<bool>,
}

impl RecordingDriver {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            error_mode: Mutex::new(false),
        }
    }

    pub fn set_error_mode(&self, enabled: bool) {
        *self.error_mode.lock().unwrap() = enabled;
    }

    /// Messages sent so far as `(cell name, message)` pairs
    pub fn sent_messages(&self) -> Vec<(String, CellMessage)> {
        self.sent.lock().unwrap().clone()
    }
}

impl Default for RecordingDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl CellDriver for RecordingDriver {
    fn send_message_to_cell(&self, cell: &CellState, message: &CellMessage) -> Result<()> {
        if *self.error_mode.lock().unwrap() {
            return Err(Report::new(CellStateError::Delivery {
                cell_name: cell.name().to_string(),
                message: "Mock error mode enabled".to_string(),
            }));
        }
        self.sent
            .lock()
            .unwrap()
            .push((cell.name().to_string(), message.clone()));
        Ok(())
    }
}

/// Cell state factory remembering which cells it built
pub struct MockCellStateFactory {
    driver: Arc<RecordingDriver>,
    created: Mutex<Vec<String>>,
}

impl MockCellStateFactory {
    pub fn new() -> Self {
        Self {
            driver: Arc::new(RecordingDriver::new()),
            created: Mutex::new(Vec::new()),
        }
    }

    pub fn driver(&self) -> Arc<RecordingDriver> {
        self.driver.clone()
    }

    /// Names of the non-local cells built so far, in creation order
    pub fn created_names(&self) -> Vec<String> {
        self.created.lock().unwrap().clone()
    }
}

impl Default for MockCellStateFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl CellStateFactory for MockCellStateFactory {
    fn create(&self, cell_name: &str, is_self: bool) -> CellState {
        if !is_self {
            self.created.lock().unwrap().push(cell_name.to_string());
        }
        CellState::new(cell_name, is_self, self.driver.clone())
    }
}

/// Directory record for a cell with test transport settings
pub fn cell_record(name: &str, id: i64, is_parent: bool) -> CellRecord {
    CellRecord {
        name: name.to_string(),
        id,
        is_parent,
        weight_scale: 1.0,
        weight_offset: 0.0,
        username: Some("cells".to_string()),
        password: Some("s3cret".to_string()),
        transport_host: Some(format!("{name}.cells.local")),
        transport_port: Some(5672),
    }
}

/// Compute node owned by an enabled service on `host`
pub fn compute_node(host: &str, free_ram_mb: i64, free_disk_gb: i64) -> ComputeNodeRecord {
    ComputeNodeRecord {
        free_ram_mb,
        free_disk_gb,
        service: Some(ServiceRecord {
            host: host.to_string(),
            disabled: false,
        }),
    }
}

/// Workload-size template named after its shape
pub fn instance_type(memory_mb: i64, root_gb: i64, ephemeral_gb: i64) -> InstanceTypeRecord {
    InstanceTypeRecord {
        name: format!("m{memory_mb}.r{root_gb}.e{ephemeral_gb}"),
        memory_mb,
        root_gb,
        ephemeral_gb,
    }
}
