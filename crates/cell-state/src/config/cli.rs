use clap::{Parser, Subcommand};
use utils::version;

use crate::config::daemon::{CellArgs, DaemonArgs};

#[derive(Parser)]
#[command(about, long_about, version = &**version::VERSION)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the cell state daemon
    Daemon(Box<DaemonArgs>),
    /// Synchronize once and print the local cell state as JSON
    Show(CellArgs),
}
