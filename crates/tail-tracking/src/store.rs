//! Storage seam for persisted tracking positions.

use async_trait::async_trait;
use tail_core::TailError;

use crate::TrackingPosition;

/// Persists the last-seen position, keyed by consumer identity.
///
/// One record per identity; writers are single per identity, so
/// implementations only need idempotent upserts, not cross-writer
/// coordination. A durable backend may be shared by many sessions under
/// distinct identities.
#[async_trait]
pub trait TrackingStore: Send + Sync {
    /// Last persisted position for the identity, or `None` on fresh start.
    async fn load(&self, persistent_id: &str) -> Result<Option<TrackingPosition>, TailError>;

    /// Upsert the last-seen position. Safe to call repeatedly with a
    /// non-decreasing position.
    async fn save(&self, persistent_id: &str, position: &TrackingPosition)
        -> Result<(), TailError>;

    /// Drop the identity's record, forcing the next session to start from
    /// "now". Used when a tracked position can no longer be resumed from,
    /// e.g. after a change-stream invalidate.
    async fn clear(&self, persistent_id: &str) -> Result<(), TailError>;
}
