//! Error types for ekklesia

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServiceError {
    /// Referenced entity does not exist or belongs to another tenant
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Tenant is missing configuration a workflow depends on (e.g. a ministry rank)
    #[error("Fatal configuration error: {0}")]
    FatalConfiguration(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn not_found(kind: &str, id: &str) -> Self {
        Self::NotFound(format!("{} {}", kind, id))
    }
}
