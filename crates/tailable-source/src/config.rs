//! Tailable consumer configuration.

use std::time::Duration;

use mongodb::bson::Document;
use mongodb::options::SelectionCriteria;
use tail_core::TailError;
use tail_tracking::TrackingConfig;

/// Configuration for one tailable-cursor consumer session. Read once at
/// start; changes require a restart.
#[derive(Debug, Clone)]
pub struct TailableSourceConfig {
    /// Source database name.
    pub database: String,
    /// Source (capped) collection name.
    pub collection: String,
    /// Field whose values increase in insertion order, used as the resume
    /// watermark.
    pub increasing_field: String,
    /// Extra filter ANDed with the position predicate.
    pub user_filter: Option<Document>,
    /// Delay before regenerating an exhausted or broken cursor.
    pub cursor_regeneration_delay: Duration,
    /// Read preference for the tailing query.
    pub read_preference: Option<SelectionCriteria>,
    /// Checkpoint policy.
    pub tracking: TrackingConfig,
}

impl TailableSourceConfig {
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
        increasing_field: impl Into<String>,
        tracking: TrackingConfig,
    ) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            increasing_field: increasing_field.into(),
            user_filter: None,
            cursor_regeneration_delay: Duration::from_millis(1000),
            read_preference: None,
            tracking,
        }
    }

    pub fn validate(&self) -> Result<(), TailError> {
        if self.increasing_field.is_empty() {
            return Err(TailError::config(
                "increasingField must be set for a tailable cursor consumer",
            ));
        }
        self.tracking.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tail_tracking::TrackingStrategy;

    #[test]
    fn empty_increasing_field_is_rejected() {
        let config = TailableSourceConfig::new(
            "db",
            "capped",
            "",
            TrackingConfig::ephemeral(TrackingStrategy::Literal),
        );
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("increasingField"));
    }

    #[test]
    fn tracking_policy_is_validated_too() {
        let mut tracking = TrackingConfig::ephemeral(TrackingStrategy::Literal);
        tracking.persistent = true;
        let config = TailableSourceConfig::new("db", "capped", "seq", tracking);
        assert!(config.validate().is_err());
    }

    #[test]
    fn defaults() {
        let config = TailableSourceConfig::new(
            "db",
            "capped",
            "seq",
            TrackingConfig::ephemeral(TrackingStrategy::Literal),
        );
        config.validate().unwrap();
        assert_eq!(config.cursor_regeneration_delay, Duration::from_millis(1000));
        assert!(config.user_filter.is_none());
        assert!(config.read_preference.is_none());
    }
}
