use anyhow::Result;

use crate::app::services::ApplicationServices;
use crate::app::tasks::Tasks;
use crate::config::{CellConfig, DaemonArgs};

/// Application core structure with explicit dependencies
pub struct Application {
    services: ApplicationServices,
    daemon_args: DaemonArgs,
    config: CellConfig,
}

impl Application {
    pub fn new(services: ApplicationServices, daemon_args: DaemonArgs, config: CellConfig) -> Self {
        Self {
            services,
            daemon_args,
            config,
        }
    }

    pub fn services(&self) -> &ApplicationServices {
        &self.services
    }

    pub fn daemon_args(&self) -> &DaemonArgs {
        &self.daemon_args
    }

    pub fn config(&self) -> &CellConfig {
        &self.config
    }

    /// Run application, start all tasks and wait for completion
    pub async fn run(&self) -> Result<()> {
        tracing::info!("Starting all application tasks...");

        let mut tasks = Tasks::new();
        tasks.spawn_all_tasks(self);

        if let Err(e) = tasks.wait_for_completion().await {
            tracing::error!("Error during task execution: {}", e);
            return Err(e);
        }

        tracing::info!("Application run completed");
        Ok(())
    }

    /// Gracefully shutdown application
    pub async fn shutdown(&self) -> Result<()> {
        tracing::info!("Shutting down application...");

        let undelivered = self.services.outbox.total_pending();
        if undelivered > 0 {
            tracing::warn!(undelivered, "Dropping undelivered cell messages");
        }

        tracing::info!("Application shutdown completed");
        Ok(())
    }
}
