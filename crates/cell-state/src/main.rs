use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use cell_state::app::{build_manager, ApplicationBuilder};
use cell_state::cells::CellStateError;
use cell_state::config::{CellArgs, CellConfig, Cli, Commands, DaemonArgs};
use cell_state::outbox_driver::OutboxDriver;
use clap::Parser;
use error_stack::Report;
use serde_json::json;
use utils::logging;
use utils::version;

/// Sets up global panic hooks.
fn setup_global_hooks() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        default_hook(panic_info);
        tracing::error!("Thread panicked: {}", panic_info);
    }));
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_global_hooks();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon(daemon_args) => run_daemon(*daemon_args).await,
        Commands::Show(cell_args) => run_show(cell_args).await,
    }
}

async fn run_daemon(daemon_args: DaemonArgs) -> Result<()> {
    let _guard = logging::init();

    tracing::info!("Starting cell state daemon {}", &**version::VERSION);

    let app = ApplicationBuilder::new(daemon_args).build().await?;

    app.run().await?;
    app.shutdown().await?;

    Ok(())
}

async fn run_show(cell_args: CellArgs) -> Result<()> {
    let _guard = logging::init();

    let config = CellConfig::from(&cell_args);
    let report = tokio::task::spawn_blocking(move || -> Result<serde_json::Value> {
        let manager = build_manager(&config, Arc::new(OutboxDriver::new()))?;
        let map_err =
            |e: Report<CellStateError>| anyhow::anyhow!("Failed to read cell state: {e:?}");

        let me = manager.get_my_state().map_err(map_err)?;
        let capabilities = manager.get_our_capabilities(true).map_err(map_err)?;
        let capacities = manager.get_our_capacities(true).map_err(map_err)?;
        let parents = manager.get_parent_cells().map_err(map_err)?;
        let children = manager.get_child_cells().map_err(map_err)?;

        let mut parent_names: Vec<String> =
            parents.iter().map(|c| c.name().to_string()).collect();
        parent_names.sort();
        let mut child_names: Vec<String> =
            children.iter().map(|c| c.name().to_string()).collect();
        child_names.sort();

        Ok(json!({
            "cell": me.describe_for_external_use(),
            "parents": parent_names,
            "children": child_names,
            "capabilities": capabilities,
            "capacities": capacities,
        }))
    })
    .await??;

    let output = serde_json::to_string_pretty(&report).context("serialize cell state failed")?;
    println!("{output}");
    Ok(())
}
