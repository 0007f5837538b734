//! Error types for the fade engine

use thiserror::Error;

/// Result type alias using our custom Error
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the fade engine
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),

    // Event validation errors
    #[error("Invalid swap event for pool {pool_id}: {reason}")]
    InvalidEvent { pool_id: String, reason: String },

    // Sizing errors
    #[error("Insufficient liquidity: computed size {computed} below minimum tradable {minimum}")]
    InsufficientLiquidity { computed: f64, minimum: f64 },

    // Position management errors
    #[error("Position not found: {0}")]
    PositionNotFound(String),

    #[error("Pool {0} already has a live position")]
    PositionAlreadyOpen(String),

    #[error("Invalid position transition: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Position persistence failed: {0}")]
    PositionPersistence(String),

    // Feed errors
    #[error("Event feed closed")]
    FeedClosed,

    #[error("Feed decode error at line {line}: {reason}")]
    FeedDecode { line: usize, reason: String },

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    /// Check if this error is scoped to a single event or position.
    ///
    /// Event-scoped failures are logged and skipped by the orchestrator;
    /// nothing in the core is fatal to the process.
    pub fn is_event_scoped(&self) -> bool {
        matches!(
            self,
            Error::InvalidEvent { .. }
                | Error::InsufficientLiquidity { .. }
                | Error::PositionNotFound(_)
                | Error::PositionAlreadyOpen(_)
                | Error::InvalidTransition { .. }
                | Error::FeedDecode { .. }
        )
    }
}

// Conversion from serde_json errors
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

// Conversion from I/O errors
impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_scoped_classification() {
        let invalid = Error::InvalidEvent {
            pool_id: "pool-1".into(),
            reason: "non-positive reserve".into(),
        };
        assert!(invalid.is_event_scoped());

        let sizing = Error::InsufficientLiquidity {
            computed: 0.001,
            minimum: 0.01,
        };
        assert!(sizing.is_event_scoped());

        assert!(!Error::FeedClosed.is_event_scoped());
        assert!(!Error::Config("bad".into()).is_event_scoped());
    }
}
