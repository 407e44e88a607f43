//! Error types and small value types shared by the cell state components.

use core::error::Error;

use api_types::CellRecord;
use derive_more::Display;
use error_stack::Report;
use serde::Deserialize;
use serde::Serialize;

/// Errors raised by the cell state manager
#[derive(Debug, Display)]
pub enum CellStateError {
    /// A configured capability declaration lacks the `=` separator
    #[display("Invalid capability declaration '{declaration}', expected name=value[;value...]")]
    InvalidCapability { declaration: String },

    /// A synchronization pass against the directory failed
    #[display("Failed to synchronize cell state from the directory")]
    SyncFailed,

    /// A cell name is not tracked as parent or child
    #[display("Unknown cell '{name}'")]
    UnknownCell { name: String },

    /// The messaging driver could not accept a message
    #[display("Failed to deliver message to cell '{cell_name}': {message}")]
    Delivery { cell_name: String, message: String },
}

impl Error for CellStateError {}

/// Result type for cell state operations
pub type Result<T> = std::result::Result<T, Report<CellStateError>>;

/// Errors raised by directory store implementations
#[derive(Debug, Display)]
pub enum StoreError {
    #[display("Directory store unavailable: {message}")]
    Unavailable { message: String },

    #[display("Failed to decode directory data: {message}")]
    Decode { message: String },
}

impl Error for StoreError {}

/// Result type for directory store queries
pub type StoreResult<T> = std::result::Result<T, Report<StoreError>>;

/// Query context handed to the directory store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryContext {
    /// Request identifier used to correlate store queries of one pass
    pub request_id: String,
    /// Whether the context carries admin privileges
    pub is_admin: bool,
}

impl QueryContext {
    /// Create an admin-privileged context
    pub fn admin(request_id: impl Into<String>) -> Self {
        Self {
            request_id: request_id.into(),
            is_admin: true,
        }
    }
}

/// Opaque message delivered to a cell through its driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellMessage {
    /// Method the receiving cell should run
    pub method: String,
    /// Method arguments
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl CellMessage {
    pub fn new(method: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            method: method.into(),
            payload,
        }
    }
}

/// Directory-sourced routing and weighting fields of a cell
#[derive(Debug, Clone, PartialEq)]
pub struct CellDirectoryInfo {
    pub id: i64,
    pub is_parent: bool,
    pub weight_scale: f64,
    pub weight_offset: f64,
    pub username: Option<String>,
    pub password: Option<String>,
    pub transport_host: Option<String>,
    pub transport_port: Option<u16>,
}

impl From<&CellRecord> for CellDirectoryInfo {
    fn from(record: &CellRecord) -> Self {
        Self {
            id: record.id,
            is_parent: record.is_parent,
            weight_scale: record.weight_scale,
            weight_offset: record.weight_offset,
            username: record.username.clone(),
            password: record.password.clone(),
            transport_host: record.transport_host.clone(),
            transport_port: record.transport_port,
        }
    }
}
