use std::path::Path;

use rusqlite::Connection;

use crate::corrections::{self, CorrectionOutcome, CORRECTIONS};
use crate::db::bootstrap;
use crate::error::Result;
use crate::importer::{load_extract, ExtractKind, LoadStats, LOAD_ORDER};
use crate::quarantine::{run_chain, ChainReport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded(LoadStats),
    /// The extract was rejected and rolled back; the run continued.
    Failed(String),
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractLoad {
    pub kind: ExtractKind,
    pub outcome: LoadOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub loads: Vec<ExtractLoad>,
    pub chain: ChainReport,
    pub corrections: Vec<CorrectionOutcome>,
}

impl RunReport {
    pub fn failed_loads(&self) -> usize {
        self.loads
            .iter()
            .filter(|l| matches!(l.outcome, LoadOutcome::Failed(_)))
            .count()
    }
}

/// Load every extract in `LOAD_ORDER` from `extracts_dir`. A missing file or
/// a rejected extract is recorded and the next extract is attempted.
pub fn load_all(conn: &Connection, extracts_dir: &Path) -> Vec<ExtractLoad> {
    LOAD_ORDER
        .iter()
        .map(|&kind| {
            let path = extracts_dir.join(kind.file_name());
            let outcome = if !path.exists() {
                log::warn!("extract {} not found, skipping {}", path.display(), kind.table());
                LoadOutcome::Missing
            } else {
                match load_extract(conn, kind, &path) {
                    Ok(stats) => {
                        log::info!(
                            "{}: {} read, {} loaded into {}",
                            kind.file_name(),
                            stats.read,
                            stats.loaded,
                            kind.table()
                        );
                        LoadOutcome::Loaded(stats)
                    }
                    Err(e) => {
                        log::error!("{}: load rolled back: {e}", kind.file_name());
                        LoadOutcome::Failed(e.to_string())
                    }
                }
            };
            ExtractLoad { kind, outcome }
        })
        .collect()
}

/// Bootstrap, load, quarantine, correct. Re-running against the same
/// extracts yields the same tables.
pub fn run(conn: &Connection, extracts_dir: &Path) -> Result<RunReport> {
    bootstrap(conn)?;
    let loads = load_all(conn, extracts_dir);
    let chain = run_chain(conn)?;
    let corrections = corrections::apply(conn, CORRECTIONS)?;
    Ok(RunReport {
        loads,
        chain,
        corrections,
    })
}
