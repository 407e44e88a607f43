//! Shared API type definitions
//!
//! This crate contains the types exchanged between the cell state manager and
//! its surroundings: the records read from the cell directory store, the
//! capability and capacity shapes aggregated across the cell tree, and the
//! reduced cell view served by the HTTP API.

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

/// Resource kind for free memory in a cell.
pub const RAM_FREE: &str = "ram_free";
/// Resource kind for free disk in a cell.
pub const DISK_FREE: &str = "disk_free";

/// Advertised capabilities of a cell: capability name to the set of values.
pub type Capabilities = BTreeMap<String, BTreeSet<String>>;

/// Capacities of a cell keyed by resource kind (`ram_free`, `disk_free`).
pub type Capacities = BTreeMap<String, ResourceCapacity>;

/// Free figures for one resource kind
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceCapacity {
    /// Total free amount in MB across all eligible hosts
    pub total_mb: i64,
    /// Number of workloads that fit, keyed by the stringified workload size in MB
    #[serde(default)]
    pub units_by_mb: BTreeMap<String, u64>,
}

impl ResourceCapacity {
    /// Add another capacity into this one.
    ///
    /// Totals are summed and unit counts are summed per size key; keys only
    /// present in `other` start from zero. Sums saturate at the integer bounds.
    pub fn accumulate(&mut self, other: &ResourceCapacity) {
        self.total_mb = self.total_mb.saturating_add(other.total_mb);
        for (size, units) in &other.units_by_mb {
            let entry = self.units_by_mb.entry(size.clone()).or_insert(0);
            *entry = entry.saturating_add(*units);
        }
    }
}

/// Cell record as stored in the cell directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellRecord {
    /// Unique cell name
    pub name: String,
    /// Directory identifier
    pub id: i64,
    /// Whether the cell is a parent of this cell (otherwise a child)
    pub is_parent: bool,
    /// Scheduling weight multiplier
    #[serde(default = "default_weight_scale")]
    pub weight_scale: f64,
    /// Scheduling weight offset
    #[serde(default)]
    pub weight_offset: f64,
    /// Username used by the transport
    pub username: Option<String>,
    /// Password used by the transport
    pub password: Option<String>,
    /// Transport host of the cell
    pub transport_host: Option<String>,
    /// Transport port of the cell
    pub transport_port: Option<u16>,
}

fn default_weight_scale() -> f64 {
    1.0
}

/// Service record owning a compute node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRecord {
    /// Host name of the compute service
    pub host: String,
    /// Whether the service is disabled
    #[serde(default)]
    pub disabled: bool,
}

/// Compute node telemetry as stored in the directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComputeNodeRecord {
    /// Free memory in MB, may be negative when overcommitted
    pub free_ram_mb: i64,
    /// Free disk in GB, may be negative when overcommitted
    pub free_disk_gb: i64,
    /// Owning compute service, if still registered
    pub service: Option<ServiceRecord>,
}

/// Workload-size template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTypeRecord {
    /// Template name
    #[serde(default)]
    pub name: String,
    /// Memory in MB
    pub memory_mb: i64,
    /// Root disk in GB
    pub root_gb: i64,
    /// Ephemeral disk in GB
    #[serde(default)]
    pub ephemeral_gb: i64,
}

/// Cell information for external consumers
///
/// Directory fields are only present once the cell has been synchronized
/// from the directory at least once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellInfo {
    /// Cell name
    pub name: String,
    /// Advertised capabilities
    pub capabilities: Capabilities,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_parent: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_scale: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_offset: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_port: Option<u16>,
}

/// Response envelope for the cell API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CellsResponse<T> {
    /// Whether the request was successful
    pub success: bool,
    /// Response data (present when successful)
    pub data: Option<T>,
    /// Response message
    pub message: String,
}

impl<T> CellsResponse<T> {
    pub fn ok(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: message.into(),
        }
    }
}
