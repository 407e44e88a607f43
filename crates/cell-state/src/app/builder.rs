use std::sync::Arc;

use anyhow::Result;

use crate::app::core::Application;
use crate::app::services::ApplicationServices;
use crate::cells::{CellStateManager, CellStateManagerBuilder, DefaultCellStateFactory};
use crate::config::{CellConfig, DaemonArgs};
use crate::infrastructure::outbox_driver::OutboxDriver;
use crate::infrastructure::yaml_store::YamlDirectoryStore;

/// Build a manager over the configured YAML directory, delivering messages
/// into `outbox`.
///
/// Runs the initial synchronization pass, so call it off the async runtime.
pub fn build_manager(config: &CellConfig, outbox: Arc<OutboxDriver>) -> Result<CellStateManager> {
    let store = Arc::new(YamlDirectoryStore::new(config.directory_file.clone()));
    CellStateManagerBuilder::from_config(config, store)
        .cell_state_factory(Arc::new(DefaultCellStateFactory::new(outbox)))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to initialize cell state manager: {e:?}"))
}

/// Application builder
pub struct ApplicationBuilder {
    daemon_args: DaemonArgs,
}

impl ApplicationBuilder {
    pub fn new(daemon_args: DaemonArgs) -> Self {
        Self { daemon_args }
    }

    /// Build complete application
    pub async fn build(self) -> Result<Application> {
        tracing::info!("Building application components...");

        let config = CellConfig::from(&self.daemon_args.cell);
        let outbox = Arc::new(OutboxDriver::new());

        let manager = {
            let config = config.clone();
            let outbox = outbox.clone();
            tokio::task::spawn_blocking(move || build_manager(&config, outbox)).await??
        };

        let services = ApplicationServices {
            manager: Arc::new(manager),
            outbox,
        };

        Ok(Application::new(services, self.daemon_args, config))
    }
}
