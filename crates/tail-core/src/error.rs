//! Error taxonomy for tail consumers.

use thiserror::Error;

/// Errors surfaced by tail consumers and the tracking subsystem.
#[derive(Debug, Error)]
pub enum TailError {
    /// Invalid consumer configuration. Raised synchronously before any
    /// document I/O.
    #[error("invalid consumer configuration: {reason}")]
    Config { reason: String },

    /// A tracking field value incompatible with the configured strategy.
    #[error("unsupported value for tracking field '{field}': expected {expected}, found {found}")]
    UnsupportedFieldType {
        field: String,
        expected: &'static str,
        found: String,
    },

    /// Recoverable cursor failure. Consumers handle this internally through
    /// the backoff cycle; it never reaches the caller.
    #[error("transient cursor failure: {reason}")]
    TransientCursor { reason: String },

    /// Downstream delivery failed. Fatal for the owning session.
    #[error("downstream delivery failed")]
    Delivery(#[source] anyhow::Error),

    /// A tracking record write failed past the tolerated bound.
    #[error("failed to persist tracking position for '{persistent_id}'")]
    PersistenceWrite {
        persistent_id: String,
        #[source]
        source: anyhow::Error,
    },
}

impl TailError {
    pub fn config(reason: impl Into<String>) -> Self {
        TailError::Config {
            reason: reason.into(),
        }
    }

    pub fn transient(reason: impl Into<String>) -> Self {
        TailError::TransientCursor {
            reason: reason.into(),
        }
    }

    /// True for failures the driver loop absorbs by reopening the cursor.
    pub fn is_transient(&self) -> bool {
        matches!(self, TailError::TransientCursor { .. })
    }
}

pub type Result<T> = std::result::Result<T, TailError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(TailError::transient("cursor died").is_transient());
        assert!(!TailError::config("missing option").is_transient());
    }

    #[test]
    fn config_error_names_the_problem() {
        let e = TailError::config("increasingField must be set for tailable consumers");
        assert!(e.to_string().contains("increasingField"));
    }

    #[test]
    fn unsupported_field_type_message() {
        let e = TailError::UnsupportedFieldType {
            field: "seq".to_string(),
            expected: "a BSON timestamp",
            found: "String".to_string(),
        };
        let msg = e.to_string();
        assert!(msg.contains("seq"));
        assert!(msg.contains("BSON timestamp"));
        assert!(msg.contains("String"));
    }
}
