//! Change-stream consumer configuration.

use std::time::Duration;

use mongodb::bson::Document;
use tail_core::TailError;
use tail_tracking::{TrackingConfig, TrackingStrategy};

/// Configuration for one change-stream consumer session. Read once at start;
/// changes require a restart.
#[derive(Debug, Clone)]
pub struct ChangeStreamSourceConfig {
    /// Source database name.
    pub database: String,
    /// Source collection name.
    pub collection: String,
    /// `$match` expression applied to the change events.
    pub stream_filter: Option<Document>,
    /// Delay before resubscribing after the stream closes or fails.
    pub cursor_regeneration_delay: Duration,
    /// Checkpoint policy. Resume tokens are opaque documents, so the
    /// strategy must be `Literal`.
    pub tracking: TrackingConfig,
}

impl ChangeStreamSourceConfig {
    pub fn new(
        database: impl Into<String>,
        collection: impl Into<String>,
        tracking: TrackingConfig,
    ) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            stream_filter: None,
            cursor_regeneration_delay: Duration::from_millis(1000),
            tracking,
        }
    }

    pub fn validate(&self) -> Result<(), TailError> {
        if self.tracking.strategy == TrackingStrategy::Timestamp {
            return Err(TailError::config(
                "timestamp tracking is incompatible with a change stream consumer; \
                 resume tokens are tracked literally",
            ));
        }
        self.tracking.validate()
    }
}
