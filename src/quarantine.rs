use rusqlite::Connection;

use crate::db::{FACT_COLUMNS, FACT_TABLE};
use crate::error::Result;
use crate::models::{FactRecord, QuarantineReason, INVALID_MONTH};

pub const CLIENT_ID_LEN: usize = 11;

/// Asset code that is never admitted to the fact table.
pub const EXCLUDED_ASSET_CODE: &str = "1022";

pub struct QuarantineRule {
    pub name: &'static str,
    pub reason: QuarantineReason,
    pub predicate: fn(&FactRecord) -> bool,
}

fn malformed_client_id(r: &FactRecord) -> bool {
    r.client_id
        .as_deref()
        .map_or(true, |id| id.chars().count() != CLIENT_ID_LEN)
}

fn missing_risk_profile(r: &FactRecord) -> bool {
    r.risk_profile_code.is_none()
}

fn missing_month(r: &FactRecord) -> bool {
    r.ingestion_month.is_none()
}

fn missing_asset_code(r: &FactRecord) -> bool {
    r.asset_code.is_none()
}

fn missing_business_line(r: &FactRecord) -> bool {
    r.business_line_code.is_none()
}

fn excluded_asset_code(r: &FactRecord) -> bool {
    r.asset_code.as_deref() == Some(EXCLUDED_ASSET_CODE)
}

/// Quarantine rules, run in this order against the staged fact table. A row
/// only meets the rules up to the first one that takes it.
pub static RULES: [QuarantineRule; 6] = [
    QuarantineRule {
        name: "client id missing or not 11 characters",
        reason: QuarantineReason::ClientId,
        predicate: malformed_client_id,
    },
    QuarantineRule {
        name: "risk-profile code missing",
        reason: QuarantineReason::RiskProfile,
        predicate: missing_risk_profile,
    },
    QuarantineRule {
        name: "ingestion month missing",
        reason: QuarantineReason::Month,
        predicate: missing_month,
    },
    QuarantineRule {
        name: "asset code missing",
        reason: QuarantineReason::AssetCode,
        predicate: missing_asset_code,
    },
    QuarantineRule {
        name: "business-line code missing",
        reason: QuarantineReason::BusinessLine,
        predicate: missing_business_line,
    },
    QuarantineRule {
        name: "asset code excluded",
        reason: QuarantineReason::AssetCode,
        predicate: excluded_asset_code,
    },
];

#[derive(Debug, Clone)]
pub struct WorkingRow {
    pub rowid: i64,
    pub record: FactRecord,
}

pub struct RuleMatches<'r> {
    pub rule: &'r QuarantineRule,
    pub rows: Vec<WorkingRow>,
}

/// Run `rules` in order over `working`. Returns what each rule took and the
/// rows no rule matched.
pub fn partition(
    rules: &[QuarantineRule],
    mut working: Vec<WorkingRow>,
) -> (Vec<RuleMatches<'_>>, Vec<WorkingRow>) {
    let mut matches = Vec::with_capacity(rules.len());
    for rule in rules {
        let (taken, rest): (Vec<_>, Vec<_>) = working
            .into_iter()
            .partition(|row| (rule.predicate)(&row.record));
        matches.push(RuleMatches { rule, rows: taken });
        working = rest;
    }
    (matches, working)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleOutcome {
    pub rule: &'static str,
    pub reason: QuarantineReason,
    pub moved: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChainReport {
    pub outcomes: Vec<RuleOutcome>,
    pub retained: usize,
    pub years_backfilled: usize,
    pub months_backfilled: usize,
}

impl ChainReport {
    pub fn total_moved(&self) -> usize {
        self.outcomes.iter().map(|o| o.moved).sum()
    }
}

fn load_working_set(conn: &Connection) -> Result<Vec<WorkingRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT rowid, {} FROM {FACT_TABLE} ORDER BY rowid",
        FACT_COLUMNS.join(", ")
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(WorkingRow {
                rowid: row.get(0)?,
                record: FactRecord::from_row(row, 1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn move_rows(conn: &Connection, destination: &str, rows: &[WorkingRow]) -> Result<()> {
    let columns = FACT_COLUMNS.join(", ");
    let mut copy = conn.prepare_cached(&format!(
        "INSERT INTO {destination} ({columns}) SELECT {columns} FROM {FACT_TABLE} WHERE rowid = ?1"
    ))?;
    let mut delete = conn.prepare_cached(&format!("DELETE FROM {FACT_TABLE} WHERE rowid = ?1"))?;
    for row in rows {
        copy.execute([row.rowid])?;
        delete.execute([row.rowid])?;
    }
    Ok(())
}

fn backfill_year(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(&format!("UPDATE {FACT_TABLE} SET year = ingestion_year"), [])?)
}

fn backfill_month(conn: &Connection) -> Result<usize> {
    Ok(conn.execute(
        &format!(
            "UPDATE {FACT_TABLE} SET ingestion_month = month \
             WHERE ingestion_month = ?1 AND month IS NOT NULL"
        ),
        [INVALID_MONTH],
    )?)
}

/// Load the fact table into a working set, let each rule in `RULES` take the
/// rows it matches, move the taken rows into their quarantine tables, then
/// backfill year and month on what remains. Commits once at the end; nothing
/// persists on error.
pub fn run_chain(conn: &Connection) -> Result<ChainReport> {
    let tx = conn.unchecked_transaction()?;
    let working = load_working_set(&tx)?;
    let (matches, retained) = partition(&RULES, working);

    let mut outcomes = Vec::with_capacity(matches.len());
    for m in &matches {
        move_rows(&tx, m.rule.reason.table(), &m.rows)?;
        if !m.rows.is_empty() {
            log::info!(
                "{} row(s) quarantined to {} ({})",
                m.rows.len(),
                m.rule.reason.table(),
                m.rule.name
            );
        }
        outcomes.push(RuleOutcome {
            rule: m.rule.name,
            reason: m.rule.reason,
            moved: m.rows.len(),
        });
    }

    let years_backfilled = backfill_year(&tx)?;
    let months_backfilled = backfill_month(&tx)?;
    tx.commit()?;

    Ok(ChainReport {
        outcomes,
        retained: retained.len(),
        years_backfilled,
        months_backfilled,
    })
}
