use comfy_table::{Cell, Table};

use crate::cli::open_existing_store;
use crate::db::FACT_COLUMNS;
use crate::error::Result;
use crate::fmt::amount;
use crate::models::{FactRecord, Month, QuarantineReason, INVALID_MONTH};

fn month_cell(m: Option<Month>) -> String {
    match m {
        Some(Month::Valid(m)) => m.to_string(),
        Some(Month::Invalid) => INVALID_MONTH.to_string(),
        None => String::new(),
    }
}

pub fn run(reason: &str) -> Result<()> {
    let reason = QuarantineReason::from_key(reason)?;
    let conn = open_existing_store()?;
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM {} ORDER BY rowid",
        FACT_COLUMNS.join(", "),
        reason.table()
    ))?;
    let rows = stmt
        .query_map([], |row| FactRecord::from_row(row, 0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    if rows.is_empty() {
        println!("No rows held for {}.", reason.describe());
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Client", "Year", "Month", "Day", "Category", "Asset", "Amount", "Risk", "Banca",
    ]);
    for r in &rows {
        let text = |v: &Option<String>| v.clone().unwrap_or_default();
        table.add_row(vec![
            Cell::new(text(&r.client_id)),
            Cell::new(text(&r.ingestion_year)),
            Cell::new(month_cell(r.ingestion_month)),
            Cell::new(text(&r.ingestion_day)),
            Cell::new(r.macro_category.map_or("", |c| c.label())),
            Cell::new(text(&r.asset_code)),
            Cell::new(r.amount.map(amount).unwrap_or_default()),
            Cell::new(text(&r.risk_profile_code)),
            Cell::new(text(&r.business_line_code)),
        ]);
    }
    println!("{} ({} rows)\n{table}", reason.describe(), rows.len());
    Ok(())
}
