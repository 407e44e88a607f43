use std::sync::Arc;

use crate::cells::CellStateManager;
use crate::infrastructure::outbox_driver::OutboxDriver;

/// Application dependencies
pub struct ApplicationServices {
    pub manager: Arc<CellStateManager>,
    pub outbox: Arc<OutboxDriver>,
}
