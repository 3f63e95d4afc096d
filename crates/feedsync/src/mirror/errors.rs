use sea_orm::DbErr;
use thiserror::Error;

/// Errors that can occur reading or writing the local mirror.
#[derive(Debug, Error)]
pub enum MirrorError {
    /// Database error from sea-orm.
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// A stored row cannot be decoded into a mirror record.
    #[error("Corrupt mirror record {channel}/{sku}: {message}")]
    Corrupt {
        channel: String,
        sku: String,
        message: String,
    },
}

impl MirrorError {
    pub fn corrupt(channel: &str, sku: &str, message: impl Into<String>) -> Self {
        Self::Corrupt {
            channel: channel.to_string(),
            sku: sku.to_string(),
            message: message.into(),
        }
    }
}

/// Result type alias for mirror operations.
pub type Result<T> = std::result::Result<T, MirrorError>;
