use std::fs::File;
use std::path::Path;

use rusqlite::Connection;

use crate::classifier::{classify_asset, Classification};
use crate::db::FACT_TABLE;
use crate::error::Result;
use crate::models::{FactRecord, QuarantineReason, RawRecord};
use crate::normalizer::{parse_amount, parse_month};

// ---------------------------------------------------------------------------
// Extract kinds: fixed filename -> table mapping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractKind {
    RiskProfiles,
    Assets,
    BusinessLines,
    Positions,
}

/// Lookups first, then the positions extract.
pub const LOAD_ORDER: [ExtractKind; 4] = [
    ExtractKind::RiskProfiles,
    ExtractKind::Assets,
    ExtractKind::BusinessLines,
    ExtractKind::Positions,
];

impl ExtractKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            Self::RiskProfiles => "cat_perfil_riesgo.csv",
            Self::Assets => "catalogo_activos.csv",
            Self::BusinessLines => "catalogo_banca.csv",
            Self::Positions => "historico_aba_macroactivos.csv",
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            Self::RiskProfiles => "risk_profiles",
            Self::Assets => "assets",
            Self::BusinessLines => "business_lines",
            Self::Positions => FACT_TABLE,
        }
    }

    /// Extract header -> table column, for lookup extracts.
    fn lookup_columns(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            Self::RiskProfiles => &[("cod_perfil_riesgo", "code"), ("perfil_riesgo", "label")],
            Self::Assets => &[("cod_activo", "code"), ("activo", "label")],
            Self::BusinessLines => &[("cod_banca", "code"), ("banca", "label")],
            Self::Positions => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub read: usize,
    pub loaded: usize,
    /// Rows sent to the amount quarantine instead of the fact table.
    pub diverted: usize,
}

/// Load one extract inside a single transaction. On error nothing from this
/// extract persists.
pub fn load_extract(conn: &Connection, kind: ExtractKind, path: &Path) -> Result<LoadStats> {
    match kind {
        ExtractKind::Positions => load_positions(conn, path),
        _ => load_lookup(conn, kind, path),
    }
}

fn reader(path: &Path, trim: csv::Trim) -> Result<csv::Reader<File>> {
    let file = File::open(path)?;
    Ok(csv::ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .trim(trim)
        .from_reader(file))
}

/// Decode every field, replacing bytes that are not UTF-8 instead of failing
/// the row.
fn decode_lossy(record: &csv::ByteRecord) -> csv::StringRecord {
    record.iter().map(|f| String::from_utf8_lossy(f)).collect()
}

// ---------------------------------------------------------------------------
// Lookup extracts: verbatim
// ---------------------------------------------------------------------------

fn load_lookup(conn: &Connection, kind: ExtractKind, path: &Path) -> Result<LoadStats> {
    let mut rdr = reader(path, csv::Trim::Headers)?;
    let headers = decode_lossy(rdr.byte_headers()?);
    let known = kind.lookup_columns();

    // (field index, table column) for each recognised header.
    let mut columns: Vec<(usize, &str)> = Vec::new();
    for (i, h) in headers.iter().enumerate() {
        match known.iter().find(|(header, _)| *header == h) {
            Some((_, column)) => columns.push((i, *column)),
            None => log::warn!("{}: ignoring unexpected column '{h}'", kind.file_name()),
        }
    }

    let names: Vec<&str> = columns.iter().map(|(_, c)| *c).collect();
    let placeholders: Vec<String> = (1..=columns.len()).map(|i| format!("?{i}")).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        kind.table(),
        names.join(", "),
        placeholders.join(", ")
    );

    let mut stats = LoadStats::default();
    if columns.is_empty() {
        log::warn!("{}: no recognised columns, nothing loaded", kind.file_name());
        for result in rdr.byte_records() {
            result?;
            stats.read += 1;
        }
        return Ok(stats);
    }

    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(&sql)?;
        for result in rdr.byte_records() {
            let record = decode_lossy(&result?);
            stats.read += 1;
            let values = columns
                .iter()
                .map(|(i, _)| record.get(*i).filter(|v| !v.is_empty()));
            stmt.execute(rusqlite::params_from_iter(values))?;
            stats.loaded += 1;
        }
    }
    tx.commit()?;
    Ok(stats)
}

// ---------------------------------------------------------------------------
// Positions extract: normalize -> classify -> split on amount
// ---------------------------------------------------------------------------

fn field(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

/// Normalize and classify one raw row. Pure; never fails.
pub fn stage_record(raw: &RawRecord) -> FactRecord {
    let asset_code = field(&raw.asset_code);
    let Classification {
        asset_code,
        macro_category,
    } = classify_asset(asset_code.as_deref());
    FactRecord {
        client_id: field(&raw.client_id),
        ingestion_year: field(&raw.ingestion_year),
        ingestion_month: raw.ingestion_month.as_deref().and_then(parse_month),
        ingestion_day: field(&raw.ingestion_day),
        macro_category,
        asset_code,
        amount: parse_amount(raw.amount.as_deref()),
        risk_profile_code: field(&raw.risk_profile_code),
        business_line_code: field(&raw.business_line_code),
        year: field(&raw.year),
        month: raw.month.as_deref().and_then(parse_month),
    }
}

fn load_positions(conn: &Connection, path: &Path) -> Result<LoadStats> {
    let mut rdr = reader(path, csv::Trim::All)?;
    let headers = decode_lossy(rdr.byte_headers()?);
    let mut stats = LoadStats::default();
    let tx = conn.unchecked_transaction()?;
    for result in rdr.byte_records() {
        let raw: RawRecord = decode_lossy(&result?).deserialize(Some(&headers))?;
        stats.read += 1;
        let record = stage_record(&raw);
        if record.amount.is_some() {
            record.insert_into(&tx, FACT_TABLE)?;
            stats.loaded += 1;
        } else {
            record.insert_into(&tx, QuarantineReason::Amount.table())?;
            stats.diverted += 1;
        }
    }
    tx.commit()?;
    if stats.diverted > 0 {
        log::info!(
            "{} row(s) with missing amount diverted to {}",
            stats.diverted,
            QuarantineReason::Amount.table()
        );
    }
    Ok(stats)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::{bootstrap, count_rows, get_connection};
    use crate::models::{MacroCategory, Month};

    pub(crate) const POSITIONS_HEADER: &str = "id_sistema_cliente;ingestion_year;ingestion_month;ingestion_day;cod_activo;aba;cod_perfil_riesgo;cod_banca;year;month";

    pub(crate) fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        bootstrap(&conn).unwrap();
        (dir, conn)
    }

    pub(crate) fn write_extract(dir: &Path, name: &str, header: &str, rows: &[&str]) -> std::path::PathBuf {
        let path = dir.join(name);
        let mut content = format!("{header}\n");
        for row in rows {
            content.push_str(row);
            content.push('\n');
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    fn positions(conn: &Connection) -> Vec<FactRecord> {
        conn.prepare(&format!(
            "SELECT {} FROM positions ORDER BY rowid",
            crate::db::FACT_COLUMNS.join(", ")
        ))
        .unwrap()
        .query_map([], |row| FactRecord::from_row(row, 0))
        .unwrap()
        .collect::<std::result::Result<Vec<_>, _>>()
        .unwrap()
    }

    #[test]
    fn test_stage_record_normalizes_and_classifies() {
        let raw = RawRecord {
            client_id: Some("10032184607".into()),
            ingestion_month: Some("5".into()),
            asset_code: Some("10007".into()),
            amount: Some("1.234,56".into()),
            month: Some("abc".into()),
            risk_profile_code: Some("  ".into()),
            ..Default::default()
        };
        let record = stage_record(&raw);
        assert_eq!(record.amount, Some(1234.56));
        assert_eq!(record.asset_code.as_deref(), Some("1007"));
        assert_eq!(record.macro_category, Some(MacroCategory::StructuredFunds));
        assert_eq!(record.ingestion_month, Some(Month::Valid(5)));
        assert_eq!(record.month, Some(Month::Invalid));
        assert_eq!(record.risk_profile_code, None);
        assert_eq!(record.year, None);
    }

    #[test]
    fn test_load_lookup_verbatim() {
        let (dir, conn) = test_db();
        let path = write_extract(dir.path(), "catalogo_activos.csv", "cod_activo ; activo", &[
            "1000;CDT",
            "1007; Fondo Renta ",
        ]);
        let stats = load_extract(&conn, ExtractKind::Assets, &path).unwrap();
        assert_eq!(stats, LoadStats { read: 2, loaded: 2, diverted: 0 });
        let label: String = conn
            .query_row("SELECT label FROM assets WHERE code = '1007'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(label, " Fondo Renta ");
    }

    #[test]
    fn test_load_lookup_skips_unexpected_column() {
        let (dir, conn) = test_db();
        let path = write_extract(dir.path(), "catalogo_banca.csv", "cod_banca;extra;banca", &["PN;x;Personas"]);
        let stats = load_extract(&conn, ExtractKind::BusinessLines, &path).unwrap();
        assert_eq!(stats, LoadStats { read: 1, loaded: 1, diverted: 0 });
        let (code, label): (String, String) = conn
            .query_row("SELECT code, label FROM business_lines", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!((code.as_str(), label.as_str()), ("PN", "Personas"));
    }

    #[test]
    fn test_load_lookup_without_known_columns_loads_nothing() {
        let (dir, conn) = test_db();
        let path = write_extract(dir.path(), "catalogo_banca.csv", "a;b", &["PN;Personas"]);
        let stats = load_extract(&conn, ExtractKind::BusinessLines, &path).unwrap();
        assert_eq!(stats, LoadStats { read: 1, loaded: 0, diverted: 0 });
        assert_eq!(count_rows(&conn, "business_lines").unwrap(), 0);
    }

    #[test]
    fn test_load_lookup_decodes_invalid_utf8() {
        let (dir, conn) = test_db();
        let path = dir.path().join("catalogo_activos.csv");
        std::fs::write(&path, b"cod_activo;activo\n1000;Cr\xe9dito\n1002;Acciones\n").unwrap();
        let stats = load_extract(&conn, ExtractKind::Assets, &path).unwrap();
        assert_eq!(stats.loaded, 2);
        let label: String = conn
            .query_row("SELECT label FROM assets WHERE code = '1000'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(label, "Cr\u{fffd}dito");
    }

    #[test]
    fn test_load_positions_splits_on_amount() {
        let (dir, conn) = test_db();
        let path = write_extract(dir.path(), "historico_aba_macroactivos.csv", POSITIONS_HEADER, &[
            "10032184607;2024;5;10;1002;1.234,56;1468;PN;2024;5",
            "10032184608;2024;5;10;1002;abc;1468;PN;2024;5",
            "10032184609;2024;5;10;1000;;1468;PN;2024;5",
        ]);
        let stats = load_extract(&conn, ExtractKind::Positions, &path).unwrap();
        assert_eq!(stats, LoadStats { read: 3, loaded: 1, diverted: 2 });

        let rows = positions(&conn);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].amount, Some(1234.56));
        assert_eq!(rows[0].macro_category, Some(MacroCategory::VariableIncome));

        let diverted: Vec<String> = conn
            .prepare("SELECT client_id FROM quarantine_amount WHERE amount IS NULL ORDER BY client_id")
            .unwrap()
            .query_map([], |r| r.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert_eq!(diverted, vec!["10032184608", "10032184609"]);
    }

    #[test]
    fn test_load_positions_survives_invalid_utf8() {
        let (dir, conn) = test_db();
        let path = dir.path().join("historico_aba_macroactivos.csv");
        let mut content = format!("{POSITIONS_HEADER}\n").into_bytes();
        content.extend_from_slice(b"10032184607;2024;5;10;1002;100;1468;PN;2024;5\n");
        content.extend_from_slice(b"10032184608;2024;5;10;1002;1.500,00 \xe9;1468;PN;2024;5\n");
        content.extend_from_slice(b"10032184609;2024;5;10;1000;75,5;1468;PN;2024;5\n");
        std::fs::write(&path, content).unwrap();

        let stats = load_extract(&conn, ExtractKind::Positions, &path).unwrap();
        assert_eq!(stats, LoadStats { read: 3, loaded: 3, diverted: 0 });
        let amounts: Vec<Option<f64>> = positions(&conn).into_iter().map(|r| r.amount).collect();
        assert_eq!(amounts, vec![Some(100.0), Some(1500.0), Some(75.5)]);
    }

    #[test]
    fn test_load_positions_stores_canonical_asset_code() {
        let (dir, conn) = test_db();
        let path = write_extract(dir.path(), "historico_aba_macroactivos.csv", POSITIONS_HEADER, &[
            "10071747544;2024;3;14;10007;369990,35;1469;PN;2024;3",
        ]);
        load_extract(&conn, ExtractKind::Positions, &path).unwrap();
        let rows = positions(&conn);
        assert_eq!(rows[0].asset_code.as_deref(), Some("1007"));
        assert_eq!(rows[0].macro_category, Some(MacroCategory::StructuredFunds));
        assert_eq!(rows[0].amount, Some(369990.35));
    }

    #[test]
    fn test_load_positions_missing_columns_become_null() {
        let (dir, conn) = test_db();
        let path = write_extract(dir.path(), "historico_aba_macroactivos.csv", "id_sistema_cliente;cod_activo;aba", &[
            "10032184607;1000;50",
        ]);
        load_extract(&conn, ExtractKind::Positions, &path).unwrap();
        let rows = positions(&conn);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].risk_profile_code, None);
        assert_eq!(rows[0].ingestion_month, None);
    }

    #[test]
    fn test_load_positions_rolls_back_on_storage_rejection() {
        let (dir, conn) = test_db();
        let too_wide = "7".repeat(crate::db::MAX_TEXT_WIDTH + 1);
        let bad_row = format!("{too_wide};2024;5;10;1002;100;1468;PN;2024;5");
        let path = write_extract(dir.path(), "historico_aba_macroactivos.csv", POSITIONS_HEADER, &[
            "10032184607;2024;5;10;1002;100;1468;PN;2024;5",
            "10032184608;2024;5;10;1002;;1468;PN;2024;5",
            bad_row.as_str(),
        ]);
        assert!(load_extract(&conn, ExtractKind::Positions, &path).is_err());
        assert_eq!(count_rows(&conn, FACT_TABLE).unwrap(), 0);
        assert_eq!(count_rows(&conn, QuarantineReason::Amount.table()).unwrap(), 0);
    }
}
