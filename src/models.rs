use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Deserialize;

use crate::error::{AbaError, Result};

/// Text stored in a month column when the source value was not numeric.
pub const INVALID_MONTH: &str = "NaN";

/// A month field after normalization. Absence is modelled as `Option<Month>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Month {
    Valid(u32),
    Invalid,
}

impl ToSql for Month {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Month::Valid(m) => Ok(ToSqlOutput::from(i64::from(*m))),
            Month::Invalid => Ok(ToSqlOutput::from(INVALID_MONTH)),
        }
    }
}

impl FromSql for Month {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Null => Err(FromSqlError::InvalidType),
            ValueRef::Integer(i) => Ok(u32::try_from(i).map_or(Month::Invalid, Month::Valid)),
            ValueRef::Real(f) if f >= 0.0 && f.fract() == 0.0 && f <= f64::from(u32::MAX) => {
                Ok(Month::Valid(f as u32))
            }
            ValueRef::Text(_) => Ok(crate::normalizer::parse_month(value.as_str()?)
                .unwrap_or(Month::Invalid)),
            _ => Ok(Month::Invalid),
        }
    }
}

/// Macro-category buckets of the asset taxonomy. "Unclassified" is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroCategory {
    FixedIncome,
    VariableIncome,
    StructuredFunds,
}

impl MacroCategory {
    pub const ALL: [MacroCategory; 3] = [
        MacroCategory::FixedIncome,
        MacroCategory::VariableIncome,
        MacroCategory::StructuredFunds,
    ];

    /// Label persisted in the `macro_category` column.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FixedIncome => "Renta Fija",
            Self::VariableIncome => "Renta Variable",
            Self::StructuredFunds => "FICs",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.label() == label)
    }
}

/// One row of the positions extract, all fields as text.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawRecord {
    #[serde(rename = "id_sistema_cliente")]
    pub client_id: Option<String>,
    pub ingestion_year: Option<String>,
    pub ingestion_month: Option<String>,
    pub ingestion_day: Option<String>,
    #[serde(rename = "cod_activo")]
    pub asset_code: Option<String>,
    #[serde(rename = "aba")]
    pub amount: Option<String>,
    #[serde(rename = "cod_perfil_riesgo")]
    pub risk_profile_code: Option<String>,
    #[serde(rename = "cod_banca")]
    pub business_line_code: Option<String>,
    pub year: Option<String>,
    pub month: Option<String>,
}

/// A normalized, classified position. Same shape in `positions` and in every
/// quarantine table.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRecord {
    pub client_id: Option<String>,
    pub ingestion_year: Option<String>,
    pub ingestion_month: Option<Month>,
    pub ingestion_day: Option<String>,
    pub macro_category: Option<MacroCategory>,
    pub asset_code: Option<String>,
    pub amount: Option<f64>,
    pub risk_profile_code: Option<String>,
    pub business_line_code: Option<String>,
    pub year: Option<String>,
    pub month: Option<Month>,
}

impl FactRecord {
    /// Reads a record whose columns are selected in `db::FACT_COLUMNS` order,
    /// starting at `offset`.
    pub fn from_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<Self> {
        let macro_category: Option<String> = row.get(offset + 4)?;
        Ok(Self {
            client_id: row.get(offset)?,
            ingestion_year: row.get(offset + 1)?,
            ingestion_month: row.get(offset + 2)?,
            ingestion_day: row.get(offset + 3)?,
            macro_category: macro_category.as_deref().and_then(MacroCategory::from_label),
            asset_code: row.get(offset + 5)?,
            amount: row.get(offset + 6)?,
            risk_profile_code: row.get(offset + 7)?,
            business_line_code: row.get(offset + 8)?,
            year: row.get(offset + 9)?,
            month: row.get(offset + 10)?,
        })
    }

    pub fn insert_into(&self, conn: &rusqlite::Connection, table: &str) -> Result<()> {
        let sql = format!(
            "INSERT INTO {table} ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            crate::db::FACT_COLUMNS.join(", ")
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        stmt.execute(rusqlite::params![
            self.client_id,
            self.ingestion_year,
            self.ingestion_month,
            self.ingestion_day,
            self.macro_category.map(|c| c.label()),
            self.asset_code,
            self.amount,
            self.risk_profile_code,
            self.business_line_code,
            self.year,
            self.month,
        ])?;
        Ok(())
    }
}

/// Why a record was set aside. Each reason owns one quarantine table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QuarantineReason {
    ClientId,
    RiskProfile,
    Month,
    AssetCode,
    BusinessLine,
    Amount,
}

impl QuarantineReason {
    pub const ALL: [QuarantineReason; 6] = [
        QuarantineReason::ClientId,
        QuarantineReason::RiskProfile,
        QuarantineReason::Month,
        QuarantineReason::AssetCode,
        QuarantineReason::BusinessLine,
        QuarantineReason::Amount,
    ];

    pub fn table(&self) -> &'static str {
        match self {
            Self::ClientId => "quarantine_client_id",
            Self::RiskProfile => "quarantine_risk_profile",
            Self::Month => "quarantine_month",
            Self::AssetCode => "quarantine_asset_code",
            Self::BusinessLine => "quarantine_business_line",
            Self::Amount => "quarantine_amount",
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::ClientId => "client-id",
            Self::RiskProfile => "risk-profile",
            Self::Month => "month",
            Self::AssetCode => "asset-code",
            Self::BusinessLine => "business-line",
            Self::Amount => "amount",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::ClientId => "missing or malformed client identifier",
            Self::RiskProfile => "missing risk-profile code",
            Self::Month => "missing ingestion month",
            Self::AssetCode => "missing or excluded asset code",
            Self::BusinessLine => "missing business-line code",
            Self::Amount => "missing amount",
        }
    }

    pub fn from_key(key: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.key() == key)
            .ok_or_else(|| AbaError::UnknownReason(key.to_string()))
    }
}
