use crate::db::{bootstrap, get_connection};
use crate::error::Result;
use crate::settings::{load_settings, save_settings, shellexpand_path};

pub fn run(data_dir: Option<String>, extracts_dir: Option<String>) -> Result<()> {
    let mut settings = load_settings();
    if let Some(dir) = data_dir {
        settings.data_dir = shellexpand_path(&dir);
    }
    if let Some(dir) = extracts_dir {
        settings.extracts_dir = shellexpand_path(&dir);
    }

    let data_path = settings.data_path();
    let extracts_path = settings.extracts_path();
    std::fs::create_dir_all(&data_path)?;
    std::fs::create_dir_all(&extracts_path)?;
    save_settings(&settings)?;

    let conn = get_connection(&settings.db_path())?;
    bootstrap(&conn)?;

    println!("Data dir:   {}", data_path.display());
    println!("Extracts:   {}", extracts_path.display());
    println!("Database:   {}", settings.db_path().display());
    println!("Initialized. Drop the CSV extracts in the extracts dir and run `aba run`.");
    Ok(())
}
