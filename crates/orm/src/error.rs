//! Error types for the ORM system
//!
//! Every failure in the crate is a [`ModelError`]. Execution failures coming
//! out of a dialect are wrapped with one layer of context before they reach
//! the caller; nothing here retries.

use thiserror::Error;

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;

/// ORM error type alias
pub type OrmError = ModelError;

/// ORM result type alias
pub type OrmResult<T> = ModelResult<T>;

/// Error types for ORM operations
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Missing or invalid connection settings, unset dialect
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Model description could not be turned into metadata
    #[error("Schema error: {0}")]
    Schema(String),

    /// The entity does not expose its primary key field
    #[error("Primary key field '{0}' is missing or invalid")]
    MissingPrimaryKey(String),

    /// An operation reached the dialect before `connect`
    #[error("Database is not connected")]
    NotConnected,

    /// Raw failure reported by the driver
    #[error("Database error: {0}")]
    Database(String),

    /// Driver failure wrapped with what the ORM was doing at the time
    #[error("{context}: {source}")]
    Execution {
        context: String,
        #[source]
        source: Box<ModelError>,
    },

    /// Query building error
    #[error("Query error: {0}")]
    Query(String),

    /// Model not found in database
    #[error("Record not found in table '{0}'")]
    NotFound(String),

    /// A column value could not be converted into the field type
    #[error("Conversion error: {0}")]
    Conversion(String),

    /// Transaction could not be started or finished
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Commit or rollback on a transaction that already ended
    #[error("Transaction already finalized ({0})")]
    TransactionFinalized(String),

    /// The callback failed and so did the rollback that followed
    #[error("{original} (rollback also failed: {rollback})")]
    RollbackFailed {
        original: Box<ModelError>,
        rollback: Box<ModelError>,
    },

    /// Operation not available for this model or executor
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl ModelError {
    /// Wrap this error with context describing the failed operation
    pub fn context(self, context: impl Into<String>) -> Self {
        ModelError::Execution {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Innermost error, skipping any execution context layers
    pub fn root(&self) -> &ModelError {
        match self {
            ModelError::Execution { source, .. } => source.root(),
            other => other,
        }
    }

    /// True when the error (or its wrapped source) is `NotConnected`
    pub fn is_not_connected(&self) -> bool {
        matches!(self.root(), ModelError::NotConnected)
    }
}

impl From<sqlx::Error> for ModelError {
    fn from(err: sqlx::Error) -> Self {
        ModelError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for ModelError {
    fn from(err: serde_json::Error) -> Self {
        ModelError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_wraps_once() {
        let err = ModelError::Database("connection reset".to_string())
            .context("failed to insert into users");

        assert_eq!(
            err.to_string(),
            "failed to insert into users: Database error: connection reset"
        );
        assert!(matches!(err.root(), ModelError::Database(_)));
    }

    #[test]
    fn test_rollback_failed_message_keeps_original() {
        let err = ModelError::RollbackFailed {
            original: Box::new(ModelError::Query("boom".to_string())),
            rollback: Box::new(ModelError::Database("gone".to_string())),
        };

        let msg = err.to_string();
        assert!(msg.starts_with("Query error: boom"));
        assert!(msg.contains("rollback also failed"));
    }

    #[test]
    fn test_not_connected_detection() {
        assert!(ModelError::NotConnected.is_not_connected());
        assert!(ModelError::NotConnected.context("ping").is_not_connected());
        assert!(!ModelError::Schema("x".to_string()).is_not_connected());
    }
}
