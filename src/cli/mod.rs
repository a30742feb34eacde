pub mod bootstrap;
pub mod classify;
pub mod init;
pub mod pending;
pub mod report;
pub mod run;
pub mod status;

use clap::{Parser, Subcommand, ValueEnum};
use rusqlite::Connection;

use crate::db::get_connection;
use crate::error::{AbaError, Result};
use crate::reports::MixDimension;
use crate::settings::get_db_path;

/// Open the configured store, refusing to create a fresh file outside `init`
/// or `run`.
pub(crate) fn open_existing_store() -> Result<Connection> {
    let db_path = get_db_path();
    if !db_path.exists() {
        return Err(AbaError::Other(format!(
            "database not found at {}. Run `aba init` first.",
            db_path.display()
        )));
    }
    get_connection(&db_path)
}

#[derive(Parser)]
#[command(
    name = "aba",
    version,
    about = "Ingest, validate and quarantine client financial-position extracts."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Save settings, create the data directory and an empty schema.
    Init {
        /// Path for aba data (default: ~/Documents/aba)
        #[arg(long = "data-dir")]
        data_dir: Option<String>,
        /// Directory holding the CSV extracts (default: <data-dir>/extracts)
        #[arg(long = "extracts-dir")]
        extracts_dir: Option<String>,
    },
    /// Drop and recreate every table.
    Bootstrap,
    /// Run the full pipeline: bootstrap, load, quarantine, correct.
    Run {
        /// Read extracts from this directory for this run only
        #[arg(long = "extracts-dir")]
        extracts_dir: Option<String>,
    },
    /// Show row counts per table and the retention ratio.
    Status,
    /// List rows held in one quarantine table.
    Pending {
        /// client-id, risk-profile, month, asset-code, business-line or amount
        reason: String,
    },
    /// Show how an asset code is aliased and classified.
    Classify {
        code: String,
    },
    /// Generate reports over the clean fact table.
    Report {
        #[command(subcommand)]
        command: ReportCommands,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum MixBy {
    BusinessLine,
    RiskProfile,
    Client,
}

impl From<MixBy> for MixDimension {
    fn from(by: MixBy) -> Self {
        match by {
            MixBy::BusinessLine => MixDimension::BusinessLine,
            MixBy::RiskProfile => MixDimension::RiskProfile,
            MixBy::Client => MixDimension::Client,
        }
    }
}

#[derive(Subcommand)]
pub enum ReportCommands {
    /// Macro-category mix for the latest period.
    Mix {
        #[arg(long, value_enum, default_value = "business-line")]
        by: MixBy,
    },
    /// Clients ranked by total amount.
    TopClients {
        #[arg(long, default_value = "10")]
        limit: usize,
    },
    /// Average amount per period.
    Evolution {
        /// First period: YYYY-MM
        #[arg(long = "from")]
        from: Option<String>,
        /// Last period: YYYY-MM
        #[arg(long = "to")]
        to: Option<String>,
    },
}
