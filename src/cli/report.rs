use comfy_table::{Cell, Table};

use crate::cli::open_existing_store;
use crate::error::Result;
use crate::fmt::{amount, count};
use crate::reports::{self, MixDimension, Period};

pub fn mix(by: MixDimension) -> Result<()> {
    let conn = open_existing_store()?;
    let report = reports::macro_mix(&conn, by)?;
    let Some(period) = report.period else {
        println!("No positions with a reporting period.");
        return Ok(());
    };

    let mut table = Table::new();
    table.set_header(vec![by.title(), by.label_title(), "Category", "Amount", "Share"]);

    for row in &report.rows {
        table.add_row(vec![
            Cell::new(row.code.as_deref().unwrap_or("(none)")),
            Cell::new(row.label.as_deref().unwrap_or("")),
            Cell::new(row.macro_category.as_deref().unwrap_or("(unclassified)")),
            Cell::new(amount(row.total)),
            Cell::new(format!("{:.1}%", row.share * 100.0)),
        ]);
    }
    println!("Macro-category mix by {} ({period})\n{table}", by.title().to_lowercase());
    Ok(())
}

pub fn top_clients(limit: usize) -> Result<()> {
    let conn = open_existing_store()?;
    let clients = reports::top_clients(&conn, limit)?;
    if clients.is_empty() {
        println!("No positions.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["#", "Client", "Positions", "Total"]);
    for (i, c) in clients.iter().enumerate() {
        table.add_row(vec![
            Cell::new(i + 1),
            Cell::new(&c.client_id),
            Cell::new(count(c.positions)),
            Cell::new(amount(c.total)),
        ]);
    }
    println!("Top {limit} clients\n{table}");
    Ok(())
}

pub fn evolution(from: Option<String>, to: Option<String>) -> Result<()> {
    let from = from.as_deref().map(Period::parse).transpose()?;
    let to = to.as_deref().map(Period::parse).transpose()?;
    let conn = open_existing_store()?;
    let periods = reports::evolution(&conn, from, to)?;
    if periods.is_empty() {
        println!("No positions in range.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["Period", "Positions", "Average"]);
    for p in &periods {
        table.add_row(vec![
            Cell::new(p.period),
            Cell::new(count(p.positions)),
            Cell::new(amount(p.average)),
        ]);
    }
    println!("Average amount per period\n{table}");
    Ok(())
}
