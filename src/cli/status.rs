use comfy_table::{Cell, Table};

use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::{count, percent};
use crate::reports::{load_efficiency, table_counts};
use crate::settings::load_settings;

pub fn run() -> Result<()> {
    let settings = load_settings();
    let db_path = settings.db_path();

    println!("Data dir:   {}", settings.data_path().display());
    println!("Extracts:   {}", settings.extracts_path().display());
    println!("Database:   {}", db_path.display());

    if !db_path.exists() {
        println!();
        println!("Database not found. Run `aba init` to set up.");
        return Ok(());
    }

    let conn = get_connection(&db_path)?;
    let mut table = Table::new();
    table.set_header(vec!["Table", "Rows"]);
    for tc in table_counts(&conn)? {
        table.add_row(vec![Cell::new(tc.table), Cell::new(count(tc.rows))]);
    }
    println!("{table}");

    let eff = load_efficiency(&conn)?;
    println!(
        "Retention:  {} ({} of {} staged rows kept)",
        percent(eff.kept as f64, (eff.kept + eff.quarantined) as f64),
        count(eff.kept),
        count(eff.kept + eff.quarantined)
    );
    Ok(())
}
