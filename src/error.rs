use thiserror::Error;

#[derive(Error, Debug)]
pub enum OceanError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector index error: {0}")]
    Index(String),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Plot error: {0}")]
    Plot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::prelude::PolarsError> for OceanError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        OceanError::Polars(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OceanError>;
