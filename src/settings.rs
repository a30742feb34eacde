use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{AbaError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub data_dir: String,
    /// Empty means `<data_dir>/extracts`.
    pub extracts_dir: String,
    pub database: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir().to_string_lossy().to_string(),
            extracts_dir: String::new(),
            database: "aba.db".to_string(),
        }
    }
}

impl Settings {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(shellexpand_path(&self.data_dir))
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_path().join(&self.database)
    }

    pub fn extracts_path(&self) -> PathBuf {
        if self.extracts_dir.is_empty() {
            self.data_path().join("extracts")
        } else {
            PathBuf::from(shellexpand_path(&self.extracts_dir))
        }
    }
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn config_dir() -> PathBuf {
    home_dir().join(".config").join("aba")
}

fn settings_path() -> PathBuf {
    config_dir().join("settings.json")
}

fn default_data_dir() -> PathBuf {
    home_dir().join("Documents").join("aba")
}

/// Missing or unreadable settings fall back to defaults.
pub fn load_settings() -> Settings {
    let path = settings_path();
    if path.exists() {
        let content = std::fs::read_to_string(&path).unwrap_or_default();
        serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("ignoring malformed {}: {e}", path.display());
            Settings::default()
        })
    } else {
        Settings::default()
    }
}

pub fn save_settings(settings: &Settings) -> Result<()> {
    std::fs::create_dir_all(config_dir())?;
    let json = serde_json::to_string_pretty(settings)
        .map_err(|e| AbaError::Settings(e.to_string()))?;
    std::fs::write(settings_path(), format!("{json}\n"))?;
    Ok(())
}

pub fn get_db_path() -> PathBuf {
    load_settings().db_path()
}

pub fn shellexpand_path(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.to_string_lossy());
        }
    }
    path.to_string()
}
