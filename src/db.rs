use std::path::Path;

use rusqlite::Connection;

use crate::error::{AbaError, Result};
use crate::models::QuarantineReason;

pub const FACT_TABLE: &str = "positions";

/// Column order shared by the fact table and every quarantine table.
pub const FACT_COLUMNS: [&str; 11] = [
    "client_id",
    "ingestion_year",
    "ingestion_month",
    "ingestion_day",
    "macro_category",
    "asset_code",
    "amount",
    "risk_profile_code",
    "business_line_code",
    "year",
    "month",
];

pub const LOOKUP_TABLES: [&str; 3] = ["risk_profiles", "assets", "business_lines"];

/// Widest text value the store accepts in any column.
pub const MAX_TEXT_WIDTH: usize = 255;

fn text(column: &str) -> String {
    format!("{column} TEXT CHECK (length({column}) <= {MAX_TEXT_WIDTH})")
}

fn fact_shape_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE {table} (
    {},
    {},
    ingestion_month NUMERIC,
    {},
    {},
    {},
    amount REAL CHECK (amount IS NULL OR abs(amount) < 1e18),
    {},
    {},
    {},
    month NUMERIC
);\n",
        text("client_id"),
        text("ingestion_year"),
        text("ingestion_day"),
        text("macro_category"),
        text("asset_code"),
        text("risk_profile_code"),
        text("business_line_code"),
        text("year"),
    )
}

fn lookup_ddl(table: &str) -> String {
    format!("CREATE TABLE {table} (\n    {},\n    {}\n);\n", text("code"), text("label"))
}

/// Full drop-and-create script, dependents first.
pub fn schema_script() -> String {
    let mut sql = String::new();
    for reason in QuarantineReason::ALL {
        sql.push_str(&format!("DROP TABLE IF EXISTS {};\n", reason.table()));
    }
    sql.push_str(&format!("DROP TABLE IF EXISTS {FACT_TABLE};\n"));
    for table in LOOKUP_TABLES {
        sql.push_str(&format!("DROP TABLE IF EXISTS {table};\n"));
    }

    for table in LOOKUP_TABLES {
        sql.push_str(&lookup_ddl(table));
    }
    sql.push_str(&fact_shape_ddl(FACT_TABLE));
    for reason in QuarantineReason::ALL {
        sql.push_str(&fact_shape_ddl(reason.table()));
    }
    sql
}

/// Open the store. Any failure here is fatal for a run.
pub fn get_connection(db_path: &Path) -> Result<Connection> {
    let connect_err = |source| AbaError::Connect {
        path: db_path.display().to_string(),
        source,
    };
    let conn = Connection::open(db_path).map_err(connect_err)?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")
        .map_err(connect_err)?;
    Ok(conn)
}

/// Drop and recreate every table, discarding prior contents.
pub fn bootstrap(conn: &Connection) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(&schema_script())?;
    tx.commit()?;
    log::info!(
        "schema bootstrapped: {FACT_TABLE}, {} quarantine tables, {} lookup tables",
        QuarantineReason::ALL.len(),
        LOOKUP_TABLES.len()
    );
    Ok(())
}

pub fn count_rows(conn: &Connection, table: &str) -> Result<i64> {
    let count = conn.query_row(&format!("SELECT count(*) FROM {table}"), [], |r| r.get(0))?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (tempfile::TempDir, Connection) {
        let dir = tempfile::tempdir().unwrap();
        let conn = get_connection(&dir.path().join("test.db")).unwrap();
        bootstrap(&conn).unwrap();
        (dir, conn)
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        conn.prepare(&format!("PRAGMA table_info({table})"))
            .unwrap()
            .query_map([], |row| row.get(1))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap()
    }

    #[test]
    fn test_bootstrap_creates_tables() {
        let (_dir, conn) = test_db();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();
        assert!(tables.contains(&FACT_TABLE.to_string()));
        for reason in QuarantineReason::ALL {
            assert!(tables.contains(&reason.table().to_string()), "missing table: {}", reason.table());
        }
        for expected in LOOKUP_TABLES {
            assert!(tables.contains(&expected.to_string()), "missing table: {expected}");
        }
        assert_eq!(tables.len(), 10);
    }

    #[test]
    fn test_quarantine_tables_share_fact_shape() {
        let (_dir, conn) = test_db();
        let fact = table_columns(&conn, FACT_TABLE);
        assert_eq!(fact, FACT_COLUMNS.iter().map(|c| c.to_string()).collect::<Vec<_>>());
        for reason in QuarantineReason::ALL {
            assert_eq!(table_columns(&conn, reason.table()), fact);
        }
    }

    #[test]
    fn test_bootstrap_discards_prior_contents() {
        let (_dir, conn) = test_db();
        conn.execute("INSERT INTO positions (client_id, amount) VALUES ('12345678901', 10.0)", [])
            .unwrap();
        conn.execute("INSERT INTO assets (code, label) VALUES ('1000', 'CDT')", []).unwrap();
        bootstrap(&conn).unwrap();
        assert_eq!(count_rows(&conn, FACT_TABLE).unwrap(), 0);
        assert_eq!(count_rows(&conn, "assets").unwrap(), 0);
    }

    #[test]
    fn test_width_check_rejects_long_text() {
        let (_dir, conn) = test_db();
        let long = "9".repeat(MAX_TEXT_WIDTH + 1);
        let result = conn.execute("INSERT INTO positions (client_id) VALUES (?1)", [&long]);
        assert!(result.is_err());
        let result = conn.execute("INSERT INTO positions (amount) VALUES (1e19)", []);
        assert!(result.is_err());
    }

    #[test]
    fn test_get_connection_fails_for_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("no").join("such").join("dir").join("test.db");
        let err = get_connection(&path).unwrap_err();
        assert!(matches!(err, AbaError::Connect { .. }));
    }
}
