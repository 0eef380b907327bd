//! Checkpoint policy for one consumer session.

use std::sync::Arc;

use mongodb::Client;
use tail_core::TailError;

use crate::{MemoryTrackingStore, MongoTrackingStore, TrackingStore, TrackingStrategy};

/// Default collection holding persisted tracking records.
pub const DEFAULT_TRACKING_COLLECTION: &str = "tailTracking";

/// Default field storing the last tracking value inside a record.
pub const DEFAULT_TRACKING_FIELD: &str = "lastTrackingValue";

/// Key identifying the owning consumer within a tracking record.
pub const TRACKING_ID_KEY: &str = "persistentId";

/// Where and how the last-seen position is persisted.
///
/// Immutable for the lifetime of a session; consumers read it once at start.
#[derive(Debug, Clone)]
pub struct TrackingConfig {
    /// Persist across restarts. When false the position only survives within
    /// the process, and a restart replays from "now".
    pub persistent: bool,
    /// Consumer identity keying the tracking record. Required when
    /// `persistent` is set.
    pub persistent_id: Option<String>,
    /// Database holding the tracking collection. Defaults to the source
    /// database; overriding it lets operators keep tracking state away from
    /// high-churn capped collections.
    pub db: Option<String>,
    /// Tracking collection name.
    pub collection: String,
    /// Field storing the last tracking value.
    pub field: String,
    /// Position codec mode for the increasing field.
    pub strategy: TrackingStrategy,
    /// Checkpoint after every delivered document instead of only on cursor
    /// regeneration and stop. Tightens crash-resume at higher write cost.
    pub persist_each_document: bool,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            persistent: false,
            persistent_id: None,
            db: None,
            collection: DEFAULT_TRACKING_COLLECTION.to_string(),
            field: DEFAULT_TRACKING_FIELD.to_string(),
            strategy: TrackingStrategy::Literal,
            persist_each_document: false,
        }
    }
}

impl TrackingConfig {
    /// In-memory tracking only; a restart replays from "now".
    pub fn ephemeral(strategy: TrackingStrategy) -> Self {
        Self {
            strategy,
            ..Self::default()
        }
    }

    /// Collection-backed tracking keyed by `persistent_id`.
    pub fn persistent(persistent_id: impl Into<String>, strategy: TrackingStrategy) -> Self {
        Self {
            persistent: true,
            persistent_id: Some(persistent_id.into()),
            strategy,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<(), TailError> {
        if self.persistent && self.persistent_id.as_deref().is_none_or(str::is_empty) {
            return Err(TailError::config(
                "persistentId is required when persistent tail tracking is enabled",
            ));
        }
        Ok(())
    }

    /// Identity keying this session's tracking state. Falls back to the
    /// source namespace so ephemeral sessions still key their in-memory
    /// store consistently.
    pub fn identity(&self, source_db: &str, source_collection: &str) -> String {
        self.persistent_id
            .clone()
            .unwrap_or_else(|| format!("{source_db}.{source_collection}"))
    }

    /// Build the store backing this policy: collection-backed when
    /// persistent, in-process otherwise.
    pub fn build_store(&self, client: &Client, source_db: &str) -> Arc<dyn TrackingStore> {
        if self.persistent {
            Arc::new(MongoTrackingStore::new(client, source_db, self))
        } else {
            Arc::new(MemoryTrackingStore::new())
        }
    }
}
