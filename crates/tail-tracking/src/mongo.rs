//! Collection-backed tracking store.

use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::{Client, Collection};
use tail_core::TailError;
use tracing::debug;

use crate::{TrackingConfig, TrackingPosition, TrackingStore, TrackingStrategy, TRACKING_ID_KEY};

/// Tracking store persisting one record per consumer identity:
/// `{ "persistentId": <id>, <field>: <position> }`.
///
/// The record is upserted synchronously before a checkpoint is acknowledged.
/// Records are never deleted by a consumer on its own; operators drop them to
/// force a full replay.
pub struct MongoTrackingStore {
    collection: Collection<Document>,
    field: String,
    strategy: TrackingStrategy,
}

impl MongoTrackingStore {
    /// Resolve the tracking collection from the policy, falling back to the
    /// source database when no override is configured.
    pub fn new(client: &Client, source_db: &str, config: &TrackingConfig) -> Self {
        let db = config.db.as_deref().unwrap_or(source_db);
        let collection = client.database(db).collection::<Document>(&config.collection);
        debug!(
            db,
            collection = %config.collection,
            field = %config.field,
            "tracking store location"
        );
        Self {
            collection,
            field: config.field.clone(),
            strategy: config.strategy,
        }
    }
}

#[async_trait]
impl TrackingStore for MongoTrackingStore {
    async fn load(&self, persistent_id: &str) -> Result<Option<TrackingPosition>, TailError> {
        let record = self
            .collection
            .find_one(doc! { TRACKING_ID_KEY: persistent_id })
            .await
            .map_err(|e| TailError::transient(format!("failed to read tracking record: {e}")))?;
        match record.and_then(|mut r| r.remove(&self.field)) {
            Some(value) => Ok(Some(self.strategy.position_from_bson(&self.field, value)?)),
            None => Ok(None),
        }
    }

    async fn save(
        &self,
        persistent_id: &str,
        position: &TrackingPosition,
    ) -> Result<(), TailError> {
        self.collection
            .update_one(
                doc! { TRACKING_ID_KEY: persistent_id },
                doc! { "$set": { &self.field: position.to_bson() } },
            )
            .upsert(true)
            .await
            .map_err(|e| TailError::PersistenceWrite {
                persistent_id: persistent_id.to_string(),
                source: e.into(),
            })?;
        Ok(())
    }

    async fn clear(&self, persistent_id: &str) -> Result<(), TailError> {
        self.collection
            .delete_one(doc! { TRACKING_ID_KEY: persistent_id })
            .await
            .map_err(|e| TailError::PersistenceWrite {
                persistent_id: persistent_id.to_string(),
                source: e.into(),
            })?;
        Ok(())
    }
}
