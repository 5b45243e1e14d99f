//! Error type shared by the scraper, warehouse and notifier modules.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Settings file error: {0}")]
    Settings(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Warehouse error {code}: {message}")]
    Warehouse { code: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    pub fn warehouse(code: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Warehouse {
            code: code.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
