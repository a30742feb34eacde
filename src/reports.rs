use rusqlite::Connection;

use crate::db::{count_rows, FACT_TABLE, LOOKUP_TABLES};
use crate::error::{AbaError, Result};
use crate::models::QuarantineReason;

// Reporting period: `year` (backfilled from the ingestion year) and the
// position's own `month`. Rows whose month is missing or the invalid-month
// sentinel have no period.
const PERIOD_YEAR: &str = "CAST(p.year AS INTEGER)";
const PERIOD_MONTH: &str = "CAST(p.month AS INTEGER)";
const HAS_PERIOD: &str = "p.year IS NOT NULL AND typeof(p.month) IN ('integer', 'real')";

// ---------------------------------------------------------------------------
// Periods
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    /// Parse `YYYY-MM`.
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = || AbaError::Other(format!("invalid period '{s}', expected YYYY-MM"));
        let (y, m) = s.trim().split_once('-').ok_or_else(invalid)?;
        let year: i32 = y.parse().map_err(|_| invalid())?;
        let month: u32 = m.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(Self { year, month })
    }

    fn key(&self) -> i64 {
        i64::from(self.year) * 100 + i64::from(self.month)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Most recent (year, month) present in the fact table.
pub fn latest_period(conn: &Connection) -> Result<Option<Period>> {
    let sql = format!(
        "SELECT {PERIOD_YEAR}, {PERIOD_MONTH} FROM {FACT_TABLE} p
         WHERE {HAS_PERIOD}
         ORDER BY 1 DESC, 2 DESC LIMIT 1"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query_map([], |r| {
        Ok(Period {
            year: r.get(0)?,
            month: r.get(1)?,
        })
    })?;
    Ok(rows.next().transpose()?)
}

// ---------------------------------------------------------------------------
// Load efficiency
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableCount {
    pub table: &'static str,
    pub rows: i64,
}

pub fn table_counts(conn: &Connection) -> Result<Vec<TableCount>> {
    let mut tables = vec![FACT_TABLE];
    tables.extend(QuarantineReason::ALL.iter().map(|r| r.table()));
    tables.extend(LOOKUP_TABLES);
    tables
        .into_iter()
        .map(|table| {
            Ok(TableCount {
                table,
                rows: count_rows(conn, table)?,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadEfficiency {
    pub kept: i64,
    pub quarantined: i64,
}

impl LoadEfficiency {
    /// Share of staged rows that stayed in the fact table.
    pub fn retention(&self) -> f64 {
        let total = self.kept + self.quarantined;
        if total == 0 {
            0.0
        } else {
            self.kept as f64 / total as f64
        }
    }
}

pub fn load_efficiency(conn: &Connection) -> Result<LoadEfficiency> {
    let kept = count_rows(conn, FACT_TABLE)?;
    let mut quarantined = 0;
    for reason in QuarantineReason::ALL {
        quarantined += count_rows(conn, reason.table())?;
    }
    Ok(LoadEfficiency { kept, quarantined })
}

// ---------------------------------------------------------------------------
// Macro-category mix
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MixDimension {
    BusinessLine,
    RiskProfile,
    Client,
}

impl MixDimension {
    fn code_column(&self) -> &'static str {
        match self {
            Self::BusinessLine => "p.business_line_code",
            Self::RiskProfile => "p.risk_profile_code",
            Self::Client => "p.client_id",
        }
    }

    /// Lookup table joined for the label, and the fact column it joins on.
    /// Clients are broken down per asset, labelled from the asset catalogue.
    fn label_source(&self) -> (&'static str, &'static str) {
        match self {
            Self::BusinessLine => ("business_lines", "p.business_line_code"),
            Self::RiskProfile => ("risk_profiles", "p.risk_profile_code"),
            Self::Client => ("assets", "p.asset_code"),
        }
    }

    pub fn label_title(&self) -> &'static str {
        match self {
            Self::Client => "Asset",
            _ => "Label",
        }
    }

    fn label_expr(&self) -> &'static str {
        match self {
            Self::Client => "COALESCE(l.label, p.asset_code)",
            _ => "l.label",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::BusinessLine => "Business line",
            Self::RiskProfile => "Risk profile",
            Self::Client => "Client",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixRow {
    pub code: Option<String>,
    pub label: Option<String>,
    pub macro_category: Option<String>,
    pub total: f64,
    /// Fraction of the group's total.
    pub share: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MixReport {
    pub period: Option<Period>,
    pub rows: Vec<MixRow>,
}

/// Macro-category share per group for the latest period. For clients each
/// row is one asset of the client's portfolio.
pub fn macro_mix(conn: &Connection, by: MixDimension) -> Result<MixReport> {
    let Some(period) = latest_period(conn)? else {
        return Ok(MixReport {
            period: None,
            rows: Vec::new(),
        });
    };

    let code = by.code_column();
    let (lookup, join_column) = by.label_source();
    let label = by.label_expr();
    let sql = format!(
        "SELECT {code}, {label}, p.macro_category, SUM(p.amount)
         FROM {FACT_TABLE} p LEFT JOIN {lookup} l ON l.code = {join_column}
         WHERE {HAS_PERIOD} AND {PERIOD_YEAR} = ?1 AND {PERIOD_MONTH} = ?2
         GROUP BY {code}, p.macro_category, {label}
         ORDER BY {code}, p.macro_category, {label}"
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt
        .query_map([i64::from(period.year), i64::from(period.month)], |r| {
            Ok(MixRow {
                code: r.get(0)?,
                label: r.get(1)?,
                macro_category: r.get(2)?,
                total: r.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
                share: 0.0,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut group_totals: Vec<(Option<String>, f64)> = Vec::new();
    for row in &rows {
        match group_totals.iter_mut().find(|(c, _)| *c == row.code) {
            Some((_, total)) => *total += row.total,
            None => group_totals.push((row.code.clone(), row.total)),
        }
    }
    for row in &mut rows {
        let group_total = group_totals
            .iter()
            .find(|(c, _)| *c == row.code)
            .map_or(0.0, |(_, t)| *t);
        row.share = if group_total == 0.0 { 0.0 } else { row.total / group_total };
    }

    Ok(MixReport {
        period: Some(period),
        rows,
    })
}

// ---------------------------------------------------------------------------
// Top clients
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct ClientTotal {
    pub client_id: String,
    pub positions: i64,
    pub total: f64,
}

pub fn top_clients(conn: &Connection, limit: usize) -> Result<Vec<ClientTotal>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT client_id, count(*), SUM(amount) AS total
         FROM {FACT_TABLE}
         WHERE client_id IS NOT NULL
         GROUP BY client_id
         ORDER BY total DESC, client_id
         LIMIT ?1"
    ))?;
    let rows = stmt
        .query_map([limit as i64], |r| {
            Ok(ClientTotal {
                client_id: r.get(0)?,
                positions: r.get(1)?,
                total: r.get::<_, Option<f64>>(2)?.unwrap_or(0.0),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Evolution
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodAverage {
    pub period: Period,
    pub positions: i64,
    pub average: f64,
}

/// Average amount per period, oldest first, within `[from, to]`.
pub fn evolution(
    conn: &Connection,
    from: Option<Period>,
    to: Option<Period>,
) -> Result<Vec<PeriodAverage>> {
    if let (Some(f), Some(t)) = (from, to) {
        if f > t {
            return Err(AbaError::Other(format!("--from {f} is after --to {t}")));
        }
    }
    let lower = from.map_or(i64::MIN, |p| p.key());
    let upper = to.map_or(i64::MAX, |p| p.key());
    let mut stmt = conn.prepare(&format!(
        "SELECT {PERIOD_YEAR}, {PERIOD_MONTH}, count(*), AVG(p.amount)
         FROM {FACT_TABLE} p
         WHERE {HAS_PERIOD} AND {PERIOD_YEAR} * 100 + {PERIOD_MONTH} BETWEEN ?1 AND ?2
         GROUP BY 1, 2
         ORDER BY 1, 2"
    ))?;
    let rows = stmt
        .query_map([lower, upper], |r| {
            Ok(PeriodAverage {
                period: Period {
                    year: r.get(0)?,
                    month: r.get(1)?,
                },
                positions: r.get(2)?,
                average: r.get::<_, Option<f64>>(3)?.unwrap_or(0.0),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}
