//! Traits for the collaborators of the cell state manager

use api_types::CellRecord;
use api_types::ComputeNodeRecord;
use api_types::InstanceTypeRecord;
use chrono::DateTime;
use chrono::Utc;

use super::cell_state::CellState;
use super::types::{CellMessage, QueryContext, Result, StoreResult};

/// Read access to the persistent cell directory
pub trait DirectoryStore: Send + Sync {
    /// Fetch every cell known to the directory
    fn cell_get_all(&self, ctxt: &QueryContext) -> StoreResult<Vec<CellRecord>>;

    /// Fetch telemetry for every compute node, with its owning service
    fn compute_node_get_all(&self, ctxt: &QueryContext) -> StoreResult<Vec<ComputeNodeRecord>>;

    /// Fetch every workload-size template
    fn instance_type_get_all(&self, ctxt: &QueryContext)
        -> StoreResult<Vec<InstanceTypeRecord>>;
}

/// Factory for admin-privileged query contexts, used once per synchronization pass
pub trait AdminContextProvider: Send + Sync {
    fn admin_context(&self) -> QueryContext;
}

/// Delivers messages to a remote cell
pub trait CellDriver: Send + Sync {
    fn send_message_to_cell(&self, cell: &CellState, message: &CellMessage) -> Result<()>;
}

/// Builds the [`CellState`] instances tracked by the manager
pub trait CellStateFactory: Send + Sync {
    fn create(&self, cell_name: &str, is_self: bool) -> CellState;
}

/// Trait for getting current time
pub trait TimeSource: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}
