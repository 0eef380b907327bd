//! Tailable-cursor driver loop.

use std::sync::Arc;

use bson::Document;
use futures::StreamExt;
use mongodb::options::{CursorType, FindOptions};
use mongodb::{Client, Collection, Cursor};
use tail_core::{ConsumerStatus, DocumentSink, StatusPublisher, TailError};
use tail_tracking::TailTracker;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::TailableSourceConfig;

/// Outcome of one tailing cycle.
enum Cycle {
    /// Cursor exhausted or failed; back off, then reopen.
    Reopen,
    /// Stop was requested.
    Cancelled,
}

/// Runs the Init -> Open -> Tailing -> Backoff cycle for one session.
///
/// Owned by a single background task; nothing here is shared across threads.
pub(crate) struct TailingDriver<S> {
    collection: Collection<Document>,
    config: TailableSourceConfig,
    tracker: TailTracker,
    sink: Arc<S>,
    status: StatusPublisher,
}

impl<S: DocumentSink> TailingDriver<S> {
    pub(crate) fn new(
        client: &Client,
        config: TailableSourceConfig,
        tracker: TailTracker,
        sink: Arc<S>,
        status: StatusPublisher,
    ) -> Self {
        let collection = client
            .database(&config.database)
            .collection::<Document>(&config.collection);
        Self {
            collection,
            config,
            tracker,
            sink,
            status,
        }
    }

    /// Run until cancelled or a fatal error. The final checkpoint is written
    /// before this future resolves, so a joined stop has durably recorded the
    /// last delivered position.
    pub(crate) async fn run(mut self, cancel: CancellationToken) -> Result<(), TailError> {
        let outcome = self.cycle(&cancel).await;
        self.status.set(ConsumerStatus::Stopping);
        if let Err(e) = self.tracker.checkpoint().await {
            // Keep the loop's own outcome; the failed final write only costs
            // redelivery after the next start.
            warn!(error = %e, "final checkpoint failed");
        }
        self.status.set(ConsumerStatus::Stopped);
        outcome
    }

    async fn cycle(&mut self, cancel: &CancellationToken) -> Result<(), TailError> {
        loop {
            let Some(cursor) = self.open(cancel).await? else {
                return Ok(());
            };
            match self.tail(cursor, cancel).await? {
                Cycle::Cancelled => return Ok(()),
                Cycle::Reopen => {
                    // Checkpoint before regenerating so a crash during the
                    // wait cannot lose this cycle's progress.
                    self.tracker.checkpoint().await?;
                    if self.backoff(cancel).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Resolve the start position and open the tailing cursor. Transient
    /// failures loop through backoff internally; `None` means stop was
    /// requested while waiting.
    async fn open(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<Option<Cursor<Document>>, TailError> {
        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                attempt = self.try_open() => attempt,
            };
            match attempt {
                Ok(cursor) => return Ok(Some(cursor)),
                Err(e) if e.is_transient() => {
                    // Not-yet-created or not-yet-capped collections land here
                    // too; they may appear at any moment.
                    warn!(error = %e, "could not open tailable cursor");
                    if self.backoff(cancel).await {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_open(&mut self) -> Result<Cursor<Document>, TailError> {
        self.tracker.recover().await?;
        let filter = self
            .tracker
            .filter(&self.config.increasing_field, self.config.user_filter.as_ref());
        debug!(filter = %filter, "opening tailable cursor");
        let options = FindOptions::builder()
            .cursor_type(Some(CursorType::TailableAwait))
            .selection_criteria(self.config.read_preference.clone())
            .build();
        self.collection
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| TailError::transient(format!("failed to open tailable cursor: {e}")))
    }

    /// Deliver documents until the cursor gives out or stop is requested.
    async fn tail(
        &mut self,
        mut cursor: Cursor<Document>,
        cancel: &CancellationToken,
    ) -> Result<Cycle, TailError> {
        self.status.set(ConsumerStatus::Tailing);
        info!(
            db = %self.config.database,
            collection = %self.config.collection,
            "tailing"
        );
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(Cycle::Cancelled),
                next = cursor.next() => next,
            };
            match next {
                Some(Ok(document)) => self.dispatch(document).await?,
                Some(Err(e)) => {
                    warn!(error = %e, "tailable cursor failed");
                    return Ok(Cycle::Reopen);
                }
                None => {
                    debug!("tailable cursor exhausted");
                    return Ok(Cycle::Reopen);
                }
            }
        }
    }

    /// Deliver one document, then advance the tracked position. The position
    /// moves only after the sink accepted the document, keeping redelivery
    /// (not loss) as the failure mode.
    async fn dispatch(&mut self, document: Document) -> Result<(), TailError> {
        let position = self
            .config
            .tracking
            .strategy
            .extract(&document, &self.config.increasing_field)?;
        self.sink
            .deliver(document)
            .await
            .map_err(TailError::Delivery)?;
        self.tracker.advance(position);
        if self.tracker.persist_each_document() {
            self.tracker.checkpoint().await?;
        }
        Ok(())
    }

    /// Wait out the regeneration delay. Returns true when stop was requested.
    async fn backoff(&mut self, cancel: &CancellationToken) -> bool {
        self.status.set(ConsumerStatus::Backoff);
        debug!(
            delay_ms = self.config.cursor_regeneration_delay.as_millis() as u64,
            "waiting before regenerating cursor"
        );
        tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(self.config.cursor_regeneration_delay) => false,
        }
    }
}
