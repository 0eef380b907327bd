//! Session-scoped position bookkeeping.

use std::sync::Arc;

use mongodb::bson::{doc, Document};
use tail_core::TailError;
use tracing::{info, warn};

use crate::{TrackingConfig, TrackingPosition, TrackingStore};

/// Consecutive checkpoint-write failures tolerated before a session fails.
pub const MAX_CONSECUTIVE_CHECKPOINT_FAILURES: u32 = 8;

/// Owns the in-memory last-seen position for one consumer session and writes
/// it through to the store at checkpoints.
///
/// Single-writer: only the driver task that owns the session touches it. The
/// in-memory position always advances, persistent or not, so a cursor
/// regeneration within the session resumes where it left off; only the
/// persisted record survives a restart.
pub struct TailTracker {
    store: Arc<dyn TrackingStore>,
    config: TrackingConfig,
    identity: String,
    last: Option<TrackingPosition>,
    recovered: bool,
    consecutive_failures: u32,
}

impl TailTracker {
    pub fn new(store: Arc<dyn TrackingStore>, config: TrackingConfig, identity: String) -> Self {
        Self {
            store,
            config,
            identity,
            last: None,
            recovered: false,
            consecutive_failures: 0,
        }
    }

    pub fn last(&self) -> Option<&TrackingPosition> {
        self.last.as_ref()
    }

    /// Record a delivered document's position. Positions observed from the
    /// source are non-decreasing, so this only moves forward.
    pub fn advance(&mut self, position: TrackingPosition) {
        self.last = Some(position);
    }

    /// Seed the in-memory position from the store.
    ///
    /// A position already known in this session (a reopen after backoff) wins
    /// over the persisted one, which can only be older.
    pub async fn recover(&mut self) -> Result<(), TailError> {
        if self.recovered || self.last.is_some() {
            return Ok(());
        }
        self.last = self.store.load(&self.identity).await?;
        self.recovered = true;
        if self.last.is_some() {
            info!(persistent_id = %self.identity, "recovered tracking position");
        }
        Ok(())
    }

    /// Write the current position through to the store.
    ///
    /// Failures are logged and tolerated up to
    /// [`MAX_CONSECUTIVE_CHECKPOINT_FAILURES`] in a row; past that the error
    /// is returned and the session must stop rather than silently degrade to
    /// ephemeral tracking.
    pub async fn checkpoint(&mut self) -> Result<(), TailError> {
        let Some(position) = &self.last else {
            return Ok(());
        };
        match self.store.save(&self.identity, position).await {
            Ok(()) => {
                self.consecutive_failures = 0;
                Ok(())
            }
            Err(e) => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= MAX_CONSECUTIVE_CHECKPOINT_FAILURES {
                    return Err(e);
                }
                warn!(
                    error = %e,
                    failures = self.consecutive_failures,
                    "checkpoint write failed, delivery continues"
                );
                Ok(())
            }
        }
    }

    /// Drop the tracked position, in memory and in the store. The next cycle
    /// starts from "now".
    pub async fn reset(&mut self) -> Result<(), TailError> {
        self.last = None;
        self.recovered = true;
        self.store.clear(&self.identity).await
    }

    /// Filter selecting documents strictly after the current position,
    /// combined with the user filter when one is configured.
    pub fn filter(&self, increasing_field: &str, user_filter: Option<&Document>) -> Document {
        match (&self.last, user_filter) {
            (Some(position), Some(extra)) => {
                doc! { "$and": [ position.gt_filter(increasing_field), extra.clone() ] }
            }
            (Some(position), None) => position.gt_filter(increasing_field),
            (None, Some(extra)) => extra.clone(),
            (None, None) => Document::new(),
        }
    }

    /// Whether checkpoints should also run after every delivered document.
    pub fn persist_each_document(&self) -> bool {
        self.config.persist_each_document
    }
}
