use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Catalog error: {0}")]
    Catalog(String),
    #[error("Parse error: {message}")]
    Parse { message: String, line: Option<usize> },
    #[error("No game data directory was found and none was supplied")]
    DataRootMissing,
    #[error("Unknown clothing type: {0}")]
    UnknownClothingType(String),
    #[error("Lock poisoned: {0}")]
    Lock(String),
}

pub type Result<T> = std::result::Result<T, TagError>;

impl TagError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

// Helper conversions
impl From<config::ConfigError> for TagError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
impl From<serde_json::Error> for TagError {
    fn from(e: serde_json::Error) -> Self { Self::Catalog(e.to_string()) }
}
impl<T> From<std::sync::PoisonError<T>> for TagError {
    fn from(e: std::sync::PoisonError<T>) -> Self { Self::Lock(e.to_string()) }
}
