use std::path::PathBuf;

use colored::Colorize;

use crate::db::get_connection;
use crate::error::Result;
use crate::fmt::count;
use crate::pipeline::{self, LoadOutcome, RunReport};
use crate::reports::load_efficiency;
use crate::settings::{load_settings, shellexpand_path};

pub fn run(extracts_dir: Option<String>) -> Result<()> {
    let settings = load_settings();
    let extracts = match extracts_dir {
        Some(dir) => PathBuf::from(shellexpand_path(&dir)),
        None => settings.extracts_path(),
    };
    if !extracts.is_dir() {
        log::warn!("extracts directory {} does not exist", extracts.display());
    }

    let conn = get_connection(&settings.db_path())?;
    let report = pipeline::run(&conn, &extracts)?;
    print_report(&report);

    let eff = load_efficiency(&conn)?;
    println!();
    println!(
        "{} {} kept, {} quarantined ({:.1}% retained)",
        "Done:".bold(),
        count(eff.kept),
        count(eff.quarantined),
        eff.retention() * 100.0
    );
    if report.failed_loads() > 0 {
        println!(
            "{}",
            format!("{} extract(s) failed to load; see messages above.", report.failed_loads()).red()
        );
    }
    Ok(())
}

fn print_report(report: &RunReport) {
    println!("{} schema bootstrapped", "✓".green());

    println!("{}", "Extracts".bold());
    for load in &report.loads {
        let name = load.kind.file_name();
        match &load.outcome {
            LoadOutcome::Loaded(stats) => {
                let mut line = format!(
                    "  {} {name} -> {}: {} read, {} loaded",
                    "✓".green(),
                    load.kind.table(),
                    count(stats.read as i64),
                    count(stats.loaded as i64)
                );
                if stats.diverted > 0 {
                    line.push_str(&format!(", {} without amount", count(stats.diverted as i64)));
                }
                println!("{line}");
            }
            LoadOutcome::Failed(err) => {
                println!("  {} {name}: {}", "✗".red(), format!("rolled back ({err})").red());
            }
            LoadOutcome::Missing => {
                println!("  {} {name}: {}", "-".yellow(), "not found, skipped".yellow());
            }
        }
    }

    println!("{}", "Quarantine".bold());
    for outcome in &report.chain.outcomes {
        let moved = if outcome.moved > 0 {
            count(outcome.moved as i64).red().to_string()
        } else {
            count(0)
        };
        println!("  {:<26} {moved:>8}  {}", outcome.reason.table(), outcome.rule.dimmed());
    }
    println!("  {:<26} {:>8}", "total", count(report.chain.total_moved() as i64));
    println!(
        "  year backfilled on {} rows, month on {}",
        count(report.chain.years_backfilled as i64),
        count(report.chain.months_backfilled as i64)
    );

    println!("{}", "Corrections".bold());
    for c in &report.corrections {
        println!("  {}: {} removed, {} inserted", c.name, c.deleted, c.inserted);
    }
}
