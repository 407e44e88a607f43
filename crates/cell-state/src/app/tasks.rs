use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::server::ApiServer;
use crate::app::core::Application;
use crate::cells::CellStateManager;
use crate::infrastructure::outbox_driver::OutboxDriver;

/// Task manager, responsible for starting and managing all background tasks
pub struct Tasks {
    pub tasks: Vec<JoinHandle<()>>,
    cancellation_token: CancellationToken,
}

impl Default for Tasks {
    fn default() -> Self {
        Self::new()
    }
}

impl Tasks {
    pub fn new() -> Self {
        Self {
            tasks: Vec::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start all background tasks
    pub fn spawn_all_tasks(&mut self, app: &Application) {
        let refresh_task = self.spawn_refresh_task(app);
        self.tasks.push(refresh_task);

        let api_server_task = self.spawn_api_server_task(app);
        self.tasks.push(api_server_task);
    }

    /// Wait for tasks to complete or receive shutdown signal
    pub async fn wait_for_completion(&mut self) -> Result<()> {
        let signal_handler = {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate())?;
                let mut sigint = signal(SignalKind::interrupt())?;

                tokio::spawn(async move {
                    tokio::select! {
                        _ = sigterm.recv() => {
                            tracing::info!("Received SIGTERM, initiating graceful shutdown");
                        }
                        _ = sigint.recv() => {
                            tracing::info!("Received SIGINT, initiating graceful shutdown");
                        }
                    }
                })
            }
            #[cfg(not(unix))]
            {
                tokio::spawn(async {
                    if let Err(e) = tokio::signal::ctrl_c().await {
                        tracing::error!("Failed to listen for Ctrl+C: {e}");
                        return;
                    }
                    tracing::info!("Received Ctrl+C, initiating graceful shutdown");
                })
            }
        };

        tokio::select! {
            _ = signal_handler => {
                tracing::info!("Shutdown signal received, cancelling all tasks");
                self.cancellation_token.cancel();
                self.wait_for_tasks_with_timeout(Duration::from_secs(30)).await;
            }
            result = futures::future::select_all(&mut self.tasks) => {
                let (result, _index, _remaining) = result;
                self.cancellation_token.cancel();
                if let Err(e) = result {
                    tracing::error!("Task completed with error: {e}");
                    return Err(e.into());
                }
                tracing::warn!("Task completed unexpectedly");
            }
        }

        Ok(())
    }

    async fn wait_for_tasks_with_timeout(&mut self, timeout: Duration) {
        tokio::time::timeout(timeout, async {
            for task in &mut self.tasks {
                if let Err(e) = task.await {
                    tracing::error!("Task failed during shutdown: {e}");
                }
            }
        })
        .await
        .unwrap_or_else(|_| {
            tracing::warn!("Task shutdown timed out after {:?}", timeout);
        });
    }

    fn spawn_refresh_task(&self, app: &Application) -> JoinHandle<()> {
        let manager = app.services().manager.clone();
        let outbox = app.services().outbox.clone();
        let interval = app.config().db_check_interval;
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            tracing::info!("Starting cell state refresh task");
            run_refresh(manager, outbox, interval, token).await;
            tracing::info!("Cell state refresh task completed");
        })
    }

    fn spawn_api_server_task(&self, app: &Application) -> JoinHandle<()> {
        let manager = app.services().manager.clone();
        let listen_addr = app.daemon_args().api_listen_addr.clone();
        let token = self.cancellation_token.clone();

        tokio::spawn(async move {
            let api_server = ApiServer::new(manager, listen_addr);
            if let Err(e) = api_server.run(token).await {
                tracing::error!("API server failed: {e:?}");
            } else {
                tracing::info!("API server completed");
            }
        })
    }
}

/// Keep the cache fresh without traffic: every `interval`, ask the manager for
/// our capacities, which re-synchronizes when the directory check is due.
pub async fn run_refresh(
    manager: Arc<CellStateManager>,
    outbox: Arc<OutboxDriver>,
    interval: Duration,
    token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let manager = manager.clone();
        match tokio::task::spawn_blocking(move || manager.get_our_capacities(true)).await {
            Ok(Ok(capacities)) => {
                tracing::debug!(
                    resources = capacities.len(),
                    undelivered = outbox.total_pending(),
                    "Cell state refreshed"
                );
            }
            Ok(Err(report)) => {
                tracing::error!(error = ?report, "Failed to refresh cell state");
            }
            Err(e) => {
                tracing::error!("Cell state refresh task panicked: {e}");
            }
        }
    }
}
