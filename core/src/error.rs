use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },

    #[error("Rate limit policy '{name}' is not registered")]
    UnknownPolicy { name: String },

    #[error("Product '{product_id}' not found in catalog")]
    UnknownProduct { product_id: String },

    #[error("Rate limit '{policy}' exceeded, try again in {retry_after_minutes} minute(s)")]
    RateLimited { policy: String, retry_after_minutes: i64 },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CoreError {
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation { field, reason: reason.into() }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
