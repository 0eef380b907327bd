//! Change-stream consumer lifecycle.

use std::sync::Arc;

use log::info;
use mongodb::Client;
use tail_core::{ConsumerHandle, ConsumerStatus, DocumentSink, StatusPublisher, TailError};
use tail_tracking::TailTracker;
use tokio::sync::watch;

use crate::driver::ChangeStreamDriver;
use crate::ChangeStreamSourceConfig;

/// A running change-stream consumer.
///
/// Same lifecycle contract as the tailable consumer: start validates and
/// returns immediately, stop joins the loop after its final checkpoint.
#[derive(Debug)]
pub struct ChangeStreamConsumer {
    handle: Option<ConsumerHandle>,
    status: watch::Receiver<ConsumerStatus>,
}

impl ChangeStreamConsumer {
    /// Start consuming the change stream. Configuration problems fail here,
    /// synchronously, before any document I/O.
    pub fn start<S>(
        client: &Client,
        config: ChangeStreamSourceConfig,
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
            "starting change stream consumer on {}.{} (persistent: {})",
            config.database, config.collection, config.tracking.persistent
        );

        let driver = ChangeStreamDriver::new(client, config, tracker, Arc::new(sink), publisher);
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

    /// Watch status transitions.
    pub fn status_watch(&self) -> watch::Receiver<ConsumerStatus> {
        self.status.clone()
    }

    /// True once the loop exited on its own.
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().is_none_or(ConsumerHandle::is_finished)
    }

    /// Stop at the next safe point and wait for the loop to exit. Idempotent.
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

    #[tokio::test]
    async fn start_rejects_timestamp_tracking() {
        let client = Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap();
        let config = ChangeStreamSourceConfig::new(
            "db",
            "coll",
            TrackingConfig::ephemeral(TrackingStrategy::Timestamp),
        );
        let err = ChangeStreamConsumer::start(&client, config, CollectingSink::new()).unwrap_err();
        assert!(matches!(err, TailError::Config { .. }));
    }

    #[tokio::test]
    async fn stop_before_any_io_is_clean() {
        let client = Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap();
        let config = ChangeStreamSourceConfig::new(
            "db",
            "coll",
            TrackingConfig::ephemeral(TrackingStrategy::Literal),
        );
        let mut consumer =
            ChangeStreamConsumer::start(&client, config, CollectingSink::new()).unwrap();
        consumer.stop().await.unwrap();
        assert_eq!(consumer.status(), ConsumerStatus::Stopped);
    }
}
