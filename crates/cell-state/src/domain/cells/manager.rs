//! Cell state manager: owns this cell's state and the parent/child maps, and
//! keeps them synchronized with the cell directory.
//!
//! Every public operation first checks whether the directory is due for a
//! re-check. The check itself is unlocked; the synchronization pass runs under
//! the manager's mutex and re-checks staleness, so concurrent callers that
//! all observe a stale cache produce a single directory fetch.

use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use api_types::Capabilities;
use api_types::Capacities;
use chrono::{DateTime, TimeDelta, Utc};
use error_stack::ResultExt;
use tracing::{debug, error, info};

use super::capabilities::{coerce_capabilities, merge_capabilities, parse_capability_declarations};
use super::capacity::{compute_capacities, eligible_hosts, merge_capacities};
use super::cell_state::{CellState, DefaultCellStateFactory};
use super::reconciler::CellMaps;
use super::traits::{AdminContextProvider, CellStateFactory, DirectoryStore, TimeSource};
use super::types::{CellStateError, QueryContext, Result};
use crate::config::CellConfig;
use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::context::AdminContextFactory;
use crate::infrastructure::outbox_driver::OutboxDriver;

/// Default time between directory re-checks
pub const DEFAULT_DB_CHECK_INTERVAL: Duration = Duration::from_secs(60);

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory state of this cell and its known parents and children
pub struct CellStateManager {
    my_cell_state: RwLock<CellState>,
    cells: RwLock<CellMaps>,
    /// Start time of the last synchronization pass
    last_directory_check: RwLock<DateTime<Utc>>,
    sync_lock: Mutex<()>,
    db_check_interval: TimeDelta,
    store: Arc<dyn DirectoryStore>,
    context_provider: Arc<dyn AdminContextProvider>,
    cell_state_factory: Arc<dyn CellStateFactory>,
    time_source: Arc<dyn TimeSource>,
}

impl CellStateManager {
    pub fn builder(
        cell_name: impl Into<String>,
        store: Arc<dyn DirectoryStore>,
    ) -> CellStateManagerBuilder {
        CellStateManagerBuilder::new(cell_name, store)
    }

    /// Name of this cell
    pub fn cell_name(&self) -> String {
        read(&self.my_cell_state).name().to_string()
    }

    /// Return information for this cell
    pub fn get_my_state(&self) -> Result<CellState> {
        self.sync_from_db()?;
        Ok(read(&self.my_cell_state).clone())
    }

    /// Return all known child cells
    pub fn get_child_cells(&self) -> Result<Vec<CellState>> {
        self.sync_from_db()?;
        Ok(read(&self.cells).children().values().cloned().collect())
    }

    /// Return all known parent cells
    pub fn get_parent_cells(&self) -> Result<Vec<CellState>> {
        self.sync_from_db()?;
        Ok(read(&self.cells).parents().values().cloned().collect())
    }

    pub fn get_parent_cell(&self, cell_name: &str) -> Result<Option<CellState>> {
        self.sync_from_db()?;
        Ok(read(&self.cells).parents().get(cell_name).cloned())
    }

    pub fn get_child_cell(&self, cell_name: &str) -> Result<Option<CellState>> {
        self.sync_from_db()?;
        Ok(read(&self.cells).children().get(cell_name).cloned())
    }

    /// Replace the capabilities of a parent or child cell.
    ///
    /// Updates for unknown cells are logged and dropped; they usually race
    /// with the cell's removal from the directory.
    pub fn update_cell_capabilities<I, V>(&self, cell_name: &str, capabilities: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, V)>,
        V: IntoIterator<Item = String>,
    {
        self.sync_from_db()?;
        let capabilities = coerce_capabilities(capabilities);
        let now = self.time_source.now();

        let mut cells = write(&self.cells);
        let Some(cell) = cells.find_mut(cell_name) else {
            error!(
                error = %CellStateError::UnknownCell { name: cell_name.to_string() },
                "Dropping capability update"
            );
            return Ok(());
        };
        cell.update_capabilities(capabilities, now);
        debug!(cell_name, "Updated cell capabilities");
        Ok(())
    }

    /// Replace the capacities of a parent or child cell.
    ///
    /// Updates for unknown cells are logged and dropped.
    pub fn update_cell_capacities(&self, cell_name: &str, capacities: Capacities) -> Result<()> {
        self.sync_from_db()?;
        let now = self.time_source.now();

        let mut cells = write(&self.cells);
        let Some(cell) = cells.find_mut(cell_name) else {
            error!(
                error = %CellStateError::UnknownCell { name: cell_name.to_string() },
                "Dropping capacity update"
            );
            return Ok(());
        };
        cell.update_capacities(capacities, now);
        debug!(cell_name, "Updated cell capacities");
        Ok(())
    }

    /// Capabilities of this cell, optionally unioned with those of every child
    pub fn get_our_capabilities(&self, include_children: bool) -> Result<Capabilities> {
        self.sync_from_db()?;
        let mut capabilities = read(&self.my_cell_state).capabilities().clone();
        if include_children {
            for cell in read(&self.cells).children().values() {
                merge_capabilities(&mut capabilities, cell.capabilities());
            }
        }
        Ok(capabilities)
    }

    /// Capacities of this cell, optionally summed with those of every child
    pub fn get_our_capacities(&self, include_children: bool) -> Result<Capacities> {
        self.sync_from_db()?;
        let mut capacities = read(&self.my_cell_state).capacities().clone();
        if include_children {
            for cell in read(&self.cells).children().values() {
                merge_capacities(&mut capacities, cell.capacities());
            }
        }
        Ok(capacities)
    }

    fn time_to_sync(&self) -> bool {
        let last_check = *read(&self.last_directory_check);
        self.time_source.now().signed_duration_since(last_check) >= self.db_check_interval
    }

    fn sync_from_db(&self) -> Result<()> {
        if self.time_to_sync() {
            self.cell_db_sync()?;
        }
        Ok(())
    }

    /// Refresh the cell maps and our capacity if it's time.
    ///
    /// The check timestamp is advanced before fetching, so a failed pass is
    /// not retried until the next interval elapses.
    fn cell_db_sync(&self) -> Result<()> {
        let _guard = self.sync_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if !self.time_to_sync() {
            return Ok(());
        }

        debug!("Updating cell cache from directory");
        *write(&self.last_directory_check) = self.time_source.now();
        let ctxt = self.context_provider.admin_context();
        self.refresh_cells_from_db(&ctxt)?;
        self.update_our_capacity(&ctxt)?;
        Ok(())
    }

    fn refresh_cells_from_db(&self, ctxt: &QueryContext) -> Result<()> {
        let records = self
            .store
            .cell_get_all(ctxt)
            .change_context(CellStateError::SyncFailed)
            .attach_printable("failed to fetch cells from the directory")?;

        let summary = write(&self.cells).reconcile(records, self.cell_state_factory.as_ref());
        debug!(
            request_id = %ctxt.request_id,
            added = summary.added,
            updated = summary.updated,
            removed = summary.removed,
            "Reconciled cells with directory"
        );
        Ok(())
    }

    fn update_our_capacity(&self, ctxt: &QueryContext) -> Result<()> {
        let compute_nodes = self
            .store
            .compute_node_get_all(ctxt)
            .change_context(CellStateError::SyncFailed)
            .attach_printable("failed to fetch compute nodes from the directory")?;

        let hosts = eligible_hosts(&compute_nodes);
        let capacities = if hosts.is_empty() {
            Capacities::new()
        } else {
            let instance_types = self
                .store
                .instance_type_get_all(ctxt)
                .change_context(CellStateError::SyncFailed)
                .attach_printable("failed to fetch instance types from the directory")?;
            compute_capacities(&hosts, &instance_types)
        };

        debug!(
            request_id = %ctxt.request_id,
            eligible_hosts = hosts.len(),
            "Recomputed local cell capacity"
        );
        let now = self.time_source.now();
        write(&self.my_cell_state).update_capacities(capacities, now);
        Ok(())
    }
}

/// Builder wiring a [`CellStateManager`] to its collaborators
pub struct CellStateManagerBuilder {
    cell_name: String,
    capabilities: Vec<String>,
    db_check_interval: Duration,
    store: Arc<dyn DirectoryStore>,
    context_provider: Option<Arc<dyn AdminContextProvider>>,
    cell_state_factory: Option<Arc<dyn CellStateFactory>>,
    time_source: Option<Arc<dyn TimeSource>>,
}

impl CellStateManagerBuilder {
    pub fn new(cell_name: impl Into<String>, store: Arc<dyn DirectoryStore>) -> Self {
        Self {
            cell_name: cell_name.into(),
            capabilities: Vec::new(),
            db_check_interval: DEFAULT_DB_CHECK_INTERVAL,
            store,
            context_provider: None,
            cell_state_factory: None,
            time_source: None,
        }
    }

    /// Start from daemon configuration
    pub fn from_config(config: &CellConfig, store: Arc<dyn DirectoryStore>) -> Self {
        Self::new(config.cell_name.clone(), store)
            .capabilities(config.capabilities.clone())
            .db_check_interval(config.db_check_interval)
    }

    /// Local capability declarations, `name=value[;value...]`
    pub fn capabilities(mut self, declarations: Vec<String>) -> Self {
        self.capabilities = declarations;
        self
    }

    pub fn db_check_interval(mut self, interval: Duration) -> Self {
        self.db_check_interval = interval;
        self
    }

    pub fn context_provider(mut self, provider: Arc<dyn AdminContextProvider>) -> Self {
        self.context_provider = Some(provider);
        self
    }

    pub fn cell_state_factory(mut self, factory: Arc<dyn CellStateFactory>) -> Self {
        self.cell_state_factory = Some(factory);
        self
    }

    pub fn time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    /// Build the manager and run the initial synchronization pass
    ///
    /// # Errors
    ///
    /// - [`CellStateError::InvalidCapability`] if a capability declaration is malformed
    /// - [`CellStateError::SyncFailed`] if the initial directory fetch fails
    pub fn build(self) -> Result<CellStateManager> {
        let capabilities = parse_capability_declarations(&self.capabilities)?;

        let cell_state_factory = self.cell_state_factory.unwrap_or_else(|| {
            Arc::new(DefaultCellStateFactory::new(Arc::new(OutboxDriver::new())))
        });
        let time_source = self
            .time_source
            .unwrap_or_else(|| Arc::new(SystemClock));
        let context_provider = self
            .context_provider
            .unwrap_or_else(|| Arc::new(AdminContextFactory));

        let manager = CellStateManager {
            my_cell_state: RwLock::new(cell_state_factory.create(&self.cell_name, true)),
            cells: RwLock::new(CellMaps::new()),
            last_directory_check: RwLock::new(DateTime::<Utc>::MIN_UTC),
            sync_lock: Mutex::new(()),
            db_check_interval: TimeDelta::from_std(self.db_check_interval)
                .unwrap_or(TimeDelta::MAX),
            store: self.store,
            context_provider,
            cell_state_factory,
            time_source,
        };

        manager.cell_db_sync()?;

        if !self.capabilities.is_empty() {
            let now = manager.time_source.now();
            write(&manager.my_cell_state).update_capabilities(capabilities, now);
        }

        {
            let cells = read(&manager.cells);
            info!(
                cell_name = %self.cell_name,
                parents = cells.parents().len(),
                children = cells.children().len(),
                "Cell state manager initialized"
            );
        }

        Ok(manager)
    }
}
