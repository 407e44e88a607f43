use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Arguments shared by every command that builds a cell state manager
#[derive(Parser, Debug, Clone)]
pub struct CellArgs {
    #[arg(long, env = "CELL_NAME", help = "Name of this cell")]
    pub cell_name: String,

    #[arg(
        long = "capability",
        env = "CELL_CAPABILITIES",
        help = "Capability of this cell, name=value[;value...]; repeat for several"
    )]
    pub capabilities: Vec<String>,

    #[arg(
        long,
        env = "CELL_DB_CHECK_INTERVAL",
        default_value_t = 60,
        help = "Seconds between directory re-checks"
    )]
    pub db_check_interval: u64,

    #[arg(
        long,
        env = "CELL_DIRECTORY_FILE",
        value_hint = clap::ValueHint::FilePath,
        help = "Path to the YAML directory snapshot, e.g. /etc/cells/directory.yaml"
    )]
    pub directory_file: PathBuf,
}

#[derive(Parser, Debug, Clone)]
pub struct DaemonArgs {
    #[command(flatten)]
    pub cell: CellArgs,

    #[arg(
        long,
        env = "API_LISTEN_ADDR",
        default_value = "0.0.0.0:8000",
        help = "HTTP API server listen address"
    )]
    pub api_listen_addr: String,
}

/// Settings consumed by the cell state manager builder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CellConfig {
    pub cell_name: String,
    pub capabilities: Vec<String>,
    pub db_check_interval: Duration,
    pub directory_file: PathBuf,
}

impl From<&CellArgs> for CellConfig {
    fn from(args: &CellArgs) -> Self {
        Self {
            cell_name: args.cell_name.clone(),
            capabilities: args
                .capabilities
                .iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            db_check_interval: Duration::from_secs(args.db_check_interval),
            directory_file: args.directory_file.clone(),
        }
    }
}
