use colored::Colorize;

use crate::classifier::{canonical_code, classify};
use crate::error::Result;

pub fn run(code: &str) -> Result<()> {
    let trimmed = code.trim();
    let canonical = canonical_code(trimmed);
    if canonical != trimmed {
        println!("Alias:      {trimmed} -> {canonical}");
    }
    match classify(Some(trimmed)) {
        Some(category) => println!("Category:   {}", category.label().green()),
        None => println!("Category:   {}", "unclassified".yellow()),
    }
    Ok(())
}
