//! Read-only HTTP API exposing the cell state manager
//!
//! # API Endpoints
//!
//! - `GET /api/v1/cells/self` - This cell
//! - `GET /api/v1/cells/parents` - All parent cells
//! - `GET /api/v1/cells/parents/:name` - One parent cell
//! - `GET /api/v1/cells/children` - All child cells
//! - `GET /api/v1/cells/children/:name` - One child cell
//! - `GET /api/v1/capabilities?include_children=true` - Aggregated capabilities
//! - `GET /api/v1/capacities?include_children=true` - Aggregated capacities
//!
//! Every response is a [`CellsResponse`] envelope. Cell passwords are never
//! exposed.

use core::error::Error;

pub use api_types::CellInfo;
pub use api_types::CellsResponse;

pub mod handlers;
pub mod server;

/// API errors
#[derive(Debug, derive_more::Display)]
pub enum ApiError {
    #[display("Server error: {message}")]
    ServerError { message: String },
}

impl Error for ApiError {}
