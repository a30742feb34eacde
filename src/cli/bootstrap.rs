use crate::db::{bootstrap, get_connection};
use crate::error::Result;
use crate::settings::get_db_path;

pub fn run() -> Result<()> {
    let db_path = get_db_path();
    let conn = get_connection(&db_path)?;
    bootstrap(&conn)?;
    println!("Schema recreated at {}", db_path.display());
    Ok(())
}
