use thiserror::Error;

#[derive(Error, Debug)]
pub enum AbaError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Cannot open store at {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("Unknown quarantine reason: {0}")]
    UnknownReason(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, AbaError>;
