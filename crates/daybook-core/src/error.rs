//! Error types for daybook-core

use thiserror::Error;

/// Core library error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    #[error("Malformed row: {0}")]
    MalformedRow(String),

    #[error("Quota exceeded: day {day_t0} already has {limit} coffee events")]
    QuotaExceeded { day_t0: i64, limit: i64 },

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(#[from] sqlx::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether the same call could succeed if repeated later.
    ///
    /// Rejections of the input itself are final; only storage and I/O
    /// failures may clear up on their own.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Error::StorageUnavailable(_) | Error::Io(_))
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

/// Result type alias using Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejections_are_final() {
        assert!(!Error::InvalidTimestamp("-1".to_string()).is_retriable());
        assert!(!Error::InvalidInput("mg".to_string()).is_retriable());
        assert!(
            !Error::QuotaExceeded {
                day_t0: 0,
                limit: 3
            }
            .is_retriable()
        );
    }

    #[test]
    fn storage_and_io_failures_are_retriable() {
        assert!(Error::StorageUnavailable(sqlx::Error::PoolTimedOut).is_retriable());
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert!(Error::from(io).is_retriable());
    }
}
