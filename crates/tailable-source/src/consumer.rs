//! Tailable-cursor consumer lifecycle.

use std::sync::Arc;

use mongodb::Client;
use tail_core::{ConsumerHandle, ConsumerStatus, DocumentSink, StatusPublisher, TailError};
use tail_tracking::TailTracker;
use tokio::sync::watch;
use tracing::info;

use crate::driver::TailingDriver;
use crate::TailableSourceConfig;

/// A running tailable-cursor consumer.
///
/// `start` validates the configuration, seeds the session from the tracking
/// store and launches the driver loop on its own task; it never blocks on
/// cursor availability. `stop` joins the loop, so the final checkpoint is
/// durable once it returns.
#[derive(Debug)]
pub struct TailableCursorConsumer {
    handle: Option<ConsumerHandle>,
    status: watch::Receiver<ConsumerStatus>,
}

impl TailableCursorConsumer {
    /// Start tailing. Configuration problems fail here, synchronously,
    /// before any document I/O; everything after start is handled inside the
    /// loop via backoff.
    pub fn start<S>(
        client: &Client,
        config: TailableSourceConfig,
        sink: S,
    ) -> Result<Self, TailError>
    where
        S: DocumentSink + 'static,
    {
        config.validate()?;

        let store = config.tracking.build_store(client, &config.database);
        let identity = config.tracking.identity(&config.database, &config.collection);
        let tracker = TailTracker::new(store, config.tracking.clone(), identity);
        let (publisher, status) = StatusPublisher::channel();

        info!(
            db = %config.database,
            collection = %config.collection,
            increasing_field = %config.increasing_field,
            persistent = config.tracking.persistent,
            "starting tailable cursor consumer"
        );

        let driver = TailingDriver::new(client, config, tracker, Arc::new(sink), publisher);
        let handle = ConsumerHandle::spawn(|cancel| driver.run(cancel));

        Ok(Self {
            handle: Some(handle),
            status,
        })
    }

    /// Current session status.
    pub fn status(&self) -> ConsumerStatus {
        *self.status.borrow()
    }

    /// Watch status transitions, e.g. to await the first `Tailing`.
    pub fn status_watch(&self) -> watch::Receiver<ConsumerStatus> {
        self.status.clone()
    }

    /// True once the loop exited on its own, e.g. after a delivery failure.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(ConsumerHandle::is_finished)
    }

    /// Stop at the next safe point and wait for the loop to exit. The last
    /// delivered position is checkpointed before this returns. Idempotent.
    pub async fn stop(&mut self) -> anyhow::Result<()> {
        match self.handle.take() {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tail_core::testing::CollectingSink;
    use tail_tracking::{TrackingConfig, TrackingStrategy};

    async fn test_client() -> Client {
        // Lazy client: nothing connects until a consumer actually tails.
        Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn start_rejects_missing_increasing_field() {
        let client = test_client().await;
        let config = TailableSourceConfig::new(
            "db",
            "capped",
            "",
            TrackingConfig::ephemeral(TrackingStrategy::Literal),
        );
        let err = TailableCursorConsumer::start(&client, config, CollectingSink::new()).unwrap_err();
        assert!(matches!(err, TailError::Config { .. }));
    }

    #[tokio::test]
    async fn start_rejects_persistent_tracking_without_identity() {
        let client = test_client().await;
        let mut tracking = TrackingConfig::ephemeral(TrackingStrategy::Literal);
        tracking.persistent = true;
        let config = TailableSourceConfig::new("db", "capped", "seq", tracking);
        let err = TailableCursorConsumer::start(&client, config, CollectingSink::new()).unwrap_err();
        assert!(err.to_string().contains("persistentId"));
    }

    #[tokio::test]
    async fn stop_before_any_io_is_clean() {
        let client = test_client().await;
        let config = TailableSourceConfig::new(
            "db",
            "capped",
            "seq",
            TrackingConfig::ephemeral(TrackingStrategy::Literal),
        );
        let mut consumer =
            TailableCursorConsumer::start(&client, config, CollectingSink::new()).unwrap();
        consumer.stop().await.unwrap();
        assert_eq!(consumer.status(), ConsumerStatus::Stopped);
        // Idempotent.
        consumer.stop().await.unwrap();
    }
}
