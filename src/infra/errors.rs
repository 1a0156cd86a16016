// src/infra/errors.rs — Error types for redraft

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RedraftError {
    // Provider errors (retriable)
    #[error("Provider '{provider}' error: {message}")]
    Provider {
        provider: String,
        message: String,
        retriable: bool,
    },

    #[error("Rate limited by '{provider}', retry after {retry_after_ms}ms")]
    RateLimited {
        provider: String,
        retry_after_ms: u64,
    },

    // Adapter errors (absorbed or surfaced by the engine)
    #[error("{stage} timed out after {seconds}s")]
    Timeout { stage: String, seconds: u64 },

    #[error("Adapter '{adapter}' failed: {message}")]
    Adapter { adapter: String, message: String },

    #[error("Could not parse response: {0}")]
    Parse(String),

    // User errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("No API key configured. Set {env_var} or add one to config.toml.")]
    NoApiKey { env_var: String },

    // Infra
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl RedraftError {
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            RedraftError::Provider {
                retriable: true,
                ..
            } | RedraftError::RateLimited { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RedraftError::Timeout { .. })
    }
}
