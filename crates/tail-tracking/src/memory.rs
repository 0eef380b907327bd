//! In-process tracking store.

use std::collections::HashMap;

use async_trait::async_trait;
use tail_core::TailError;
use tokio::sync::RwLock;

use crate::{TrackingPosition, TrackingStore};

/// Tracking store backed by a process-local map. Positions are lost on
/// restart; used when persistent tail tracking is disabled, and in tests.
#[derive(Debug, Default)]
pub struct MemoryTrackingStore {
    positions: RwLock<HashMap<String, TrackingPosition>>,
}

impl MemoryTrackingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackingStore for MemoryTrackingStore {
    async fn load(&self, persistent_id: &str) -> Result<Option<TrackingPosition>, TailError> {
        Ok(self.positions.read().await.get(persistent_id).cloned())
    }

    async fn save(
        &self,
        persistent_id: &str,
        position: &TrackingPosition,
    ) -> Result<(), TailError> {
        self.positions
            .write()
            .await
            .insert(persistent_id.to_string(), position.clone());
        Ok(())
    }

    async fn clear(&self, persistent_id: &str) -> Result<(), TailError> {
        self.positions.write().await.remove(persistent_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::Bson;

    #[tokio::test]
    async fn save_load_clear_roundtrip() {
        let store = MemoryTrackingStore::new();
        assert_eq!(store.load("a").await.unwrap(), None);

        let position = TrackingPosition::Literal(Bson::Int64(10));
        store.save("a", &position).await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), Some(position.clone()));

        // Upserts overwrite.
        let later = TrackingPosition::Literal(Bson::Int64(20));
        store.save("a", &later).await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), Some(later));

        store.clear("a").await.unwrap();
        assert_eq!(store.load("a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn identities_are_isolated() {
        let store = MemoryTrackingStore::new();
        store
            .save("a", &TrackingPosition::Literal(Bson::Int32(1)))
            .await
            .unwrap();
        store
            .save("b", &TrackingPosition::Temporal { time: 9, increment: 0 })
            .await
            .unwrap();
        assert_eq!(
            store.load("a").await.unwrap(),
            Some(TrackingPosition::Literal(Bson::Int32(1)))
        );
        assert_eq!(
            store.load("b").await.unwrap(),
            Some(TrackingPosition::Temporal { time: 9, increment: 0 })
        );
        store.clear("a").await.unwrap();
        assert!(store.load("b").await.unwrap().is_some());
    }
}
