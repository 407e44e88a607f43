//! State held for a single cell: this cell, or one of its parents or children.

use std::fmt;
use std::sync::Arc;

use api_types::Capabilities;
use api_types::Capacities;
use api_types::CellInfo;
use api_types::CellRecord;
use chrono::DateTime;
use chrono::Utc;

use super::traits::{CellDriver, CellStateFactory};
use super::types::{CellDirectoryInfo, CellMessage, Result};

/// Holds information for a particular cell
#[derive(Clone)]
pub struct CellState {
    name: String,
    is_self: bool,
    /// Time of the last capability or capacity update
    last_seen: DateTime<Utc>,
    capabilities: Capabilities,
    capacities: Capacities,
    /// `None` until the cell is synchronized from the directory
    directory_info: Option<CellDirectoryInfo>,
    driver: Arc<dyn CellDriver>,
}

impl CellState {
    pub fn new(name: impl Into<String>, is_self: bool, driver: Arc<dyn CellDriver>) -> Self {
        Self {
            name: name.into(),
            is_self,
            last_seen: DateTime::<Utc>::MIN_UTC,
            capabilities: Capabilities::new(),
            capacities: Capacities::new(),
            directory_info: None,
            driver,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_self(&self) -> bool {
        self.is_self
    }

    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_seen
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    pub fn capacities(&self) -> &Capacities {
        &self.capacities
    }

    pub fn directory_info(&self) -> Option<&CellDirectoryInfo> {
        self.directory_info.as_ref()
    }

    /// Replace the directory fields with those of `record`
    pub fn update_directory_info(&mut self, record: &CellRecord) {
        self.directory_info = Some(CellDirectoryInfo::from(record));
    }

    /// Replace the advertised capabilities
    pub fn update_capabilities(&mut self, capabilities: Capabilities, seen_at: DateTime<Utc>) {
        self.last_seen = seen_at;
        self.capabilities = capabilities;
    }

    /// Replace the capacity figures
    pub fn update_capacities(&mut self, capacities: Capacities, seen_at: DateTime<Utc>) {
        self.last_seen = seen_at;
        self.capacities = capacities;
    }

    /// Reduced view of this cell for API consumers
    ///
    /// Credentials other than the username are never included.
    pub fn describe_for_external_use(&self) -> CellInfo {
        let info = self.directory_info.as_ref();
        CellInfo {
            name: self.name.clone(),
            capabilities: self.capabilities.clone(),
            id: info.map(|i| i.id),
            is_parent: info.map(|i| i.is_parent),
            weight_scale: info.map(|i| i.weight_scale),
            weight_offset: info.map(|i| i.weight_offset),
            username: info.and_then(|i| i.username.clone()),
            transport_host: info.and_then(|i| i.transport_host.clone()),
            transport_port: info.and_then(|i| i.transport_port),
        }
    }

    /// Send a message to this cell through its driver
    pub fn send_message(&self, message: &CellMessage) -> Result<()> {
        self.driver.send_message_to_cell(self, message)
    }
}

impl fmt::Debug for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CellState")
            .field("name", &self.name)
            .field("is_self", &self.is_self)
            .field("last_seen", &self.last_seen)
            .field("capabilities", &self.capabilities)
            .field("capacities", &self.capacities)
            .field("directory_info", &self.directory_info.is_some())
            .finish()
    }
}

impl fmt::Display for CellState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let me = if self.is_self { "me" } else { "not_me" };
        write!(f, "Cell '{}' ({me})", self.name)
    }
}

/// Builds cell states sharing a single driver
pub struct DefaultCellStateFactory {
    driver: Arc<dyn CellDriver>,
}

impl DefaultCellStateFactory {
    pub fn new(driver: Arc<dyn CellDriver>) -> Self {
        Self { driver }
    }
}

impl CellStateFactory for DefaultCellStateFactory {
    fn create(&self, cell_name: &str, is_self: bool) -> CellState {
        CellState::new(cell_name, is_self, self.driver.clone())
    }
}
