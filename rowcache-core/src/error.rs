//! Error types for rowcache operations

use thiserror::Error;

/// Errors reported by a row store backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RowStoreError {
    #[error("Connection to row store failed: {reason}")]
    Connection { reason: String },

    #[error("Row store query failed: {reason}")]
    Query { reason: String },

    #[error("Malformed row at position {position}: {reason}")]
    MalformedRow { position: usize, reason: String },

    #[error("Connection pool error: {reason}")]
    Pool { reason: String },
}

/// Result type alias for row store operations.
pub type RowStoreResult<T> = Result<T, RowStoreError>;

/// Request validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Lookup request contains no keys")]
    EmptyBatch,

    #[error("Empty key at position {position}")]
    EmptyKey { position: usize },

    #[error("Too many keys: {count} exceeds maximum of {max}")]
    TooManyKeys { count: usize, max: usize },

    #[error("Required parameter missing: {name}")]
    MissingParameter { name: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Refresh protocol errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RefreshError {
    #[error("Incremental refresh requested before the initial full load")]
    NotInitialized,

    #[error("Row store load failed: {0}")]
    Store(#[from] RowStoreError),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_store_error_display_malformed_row() {
        let err = RowStoreError::MalformedRow {
            position: 3,
            reason: "NULL key".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("Malformed row"));
        assert!(msg.contains('3'));
        assert!(msg.contains("NULL key"));
    }

    #[test]
    fn test_validation_error_display_too_many_keys() {
        let err = ValidationError::TooManyKeys {
            count: 1500,
            max: 1000,
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1500"));
        assert!(msg.contains("1000"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "ROWCACHE_BACKEND".to_string(),
            value: "redis".to_string(),
            reason: "expected postgres or fixture".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("ROWCACHE_BACKEND"));
        assert!(msg.contains("redis"));
        assert!(msg.contains("expected postgres or fixture"));
    }

    #[test]
    fn test_refresh_error_wraps_store_error() {
        let err = RefreshError::from(RowStoreError::Query {
            reason: "timeout".to_string(),
        });
        assert!(matches!(err, RefreshError::Store(RowStoreError::Query { .. })));
        assert!(format!("{}", err).contains("timeout"));
    }
}
