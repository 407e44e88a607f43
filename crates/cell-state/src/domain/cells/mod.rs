//! Cell state management: the in-memory model of this cell and its parent and
//! child cells, kept in sync with the cell directory.

pub mod capabilities;
pub mod capacity;
pub mod cell_state;
pub mod manager;
pub mod mock;
pub mod reconciler;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use cell_state::{CellState, DefaultCellStateFactory};
pub use manager::{CellStateManager, CellStateManagerBuilder};
pub use types::{CellMessage, CellStateError, QueryContext, StoreError};
