use rusqlite::Connection;

use crate::db::{FACT_COLUMNS, FACT_TABLE};
use crate::error::Result;
use crate::models::{FactRecord, MacroCategory, Month};

/// Fact-table column a correction matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchColumn {
    AssetCode,
    RiskProfileCode,
}

impl MatchColumn {
    fn column(&self) -> &'static str {
        match self {
            Self::AssetCode => "asset_code",
            Self::RiskProfileCode => "risk_profile_code",
        }
    }
}

/// Fully specified row inserted by a correction.
#[derive(Debug, Clone, Copy)]
pub struct Replacement {
    pub client_id: &'static str,
    pub ingestion_year: &'static str,
    pub ingestion_month: u32,
    pub ingestion_day: &'static str,
    pub macro_category: MacroCategory,
    pub asset_code: &'static str,
    pub amount: f64,
    pub risk_profile_code: &'static str,
    pub business_line_code: &'static str,
    pub year: &'static str,
    pub month: u32,
}

impl Replacement {
    pub fn to_record(&self) -> FactRecord {
        FactRecord {
            client_id: Some(self.client_id.to_string()),
            ingestion_year: Some(self.ingestion_year.to_string()),
            ingestion_month: Some(Month::Valid(self.ingestion_month)),
            ingestion_day: Some(self.ingestion_day.to_string()),
            macro_category: Some(self.macro_category),
            asset_code: Some(self.asset_code.to_string()),
            amount: Some(self.amount),
            risk_profile_code: Some(self.risk_profile_code.to_string()),
            business_line_code: Some(self.business_line_code.to_string()),
            year: Some(self.year.to_string()),
            month: Some(Month::Valid(self.month)),
        }
    }
}

/// Delete fact rows whose `column`, trimmed and lowercased, equals `value`,
/// then insert `replacement`.
#[derive(Debug, Clone, Copy)]
pub struct Correction {
    pub name: &'static str,
    pub column: MatchColumn,
    pub value: &'static str,
    pub replacement: Replacement,
}

pub const CORRECTIONS: &[Correction] = &[
    // Category label shifted into the asset-code column.
    Correction {
        name: "category label in asset code",
        column: MatchColumn::AssetCode,
        value: "renta variable",
        replacement: Replacement {
            client_id: "10032184607",
            ingestion_year: "2024",
            ingestion_month: 5,
            ingestion_day: "10",
            macro_category: MacroCategory::VariableIncome,
            asset_code: "1002",
            amount: 12615000.00,
            risk_profile_code: "1468",
            business_line_code: "PN",
            year: "2024",
            month: 5,
        },
    },
    // Business-line code shifted into the risk-profile column.
    Correction {
        name: "business line in risk profile",
        column: MatchColumn::RiskProfileCode,
        value: "pn",
        replacement: Replacement {
            client_id: "10071747544",
            ingestion_year: "2024",
            ingestion_month: 3,
            ingestion_day: "14",
            macro_category: MacroCategory::StructuredFunds,
            asset_code: "1007",
            amount: 369990.35,
            risk_profile_code: "1469",
            business_line_code: "PN",
            year: "2024",
            month: 3,
        },
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionOutcome {
    pub name: &'static str,
    pub deleted: usize,
    pub inserted: usize,
}

fn matching_clause(c: &Correction) -> String {
    format!("lower(trim({})) = ?1", c.column.column())
}

fn log_matches(conn: &Connection, c: &Correction) -> Result<()> {
    if !log::log_enabled!(log::Level::Debug) {
        return Ok(());
    }
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {FACT_TABLE} WHERE {}",
        FACT_COLUMNS.join(", "),
        matching_clause(c)
    ))?;
    let rows = stmt
        .query_map([c.value], |row| FactRecord::from_row(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    if rows.is_empty() {
        log::debug!("correction '{}': no rows match", c.name);
    }
    for row in rows {
        log::debug!("correction '{}': removing {row:?}", c.name);
    }
    Ok(())
}

/// Apply `corrections` in order inside one transaction.
pub fn apply(conn: &Connection, corrections: &[Correction]) -> Result<Vec<CorrectionOutcome>> {
    let tx = conn.unchecked_transaction()?;
    let mut outcomes = Vec::with_capacity(corrections.len());
    for c in corrections {
        log_matches(&tx, c)?;
        let deleted = tx.execute(
            &format!("DELETE FROM {FACT_TABLE} WHERE {}", matching_clause(c)),
            [c.value],
        )?;
        c.replacement.to_record().insert_into(&tx, FACT_TABLE)?;
        log::info!("correction '{}': {deleted} row(s) removed, replacement inserted", c.name);
        outcomes.push(CorrectionOutcome {
            name: c.name,
            deleted,
            inserted: 1,
        });
    }
    tx.commit()?;
    Ok(outcomes)
}
