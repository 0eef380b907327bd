//! Change-stream driver loop.

use std::sync::Arc;

use futures::StreamExt;
use log::{debug, info, warn};
use bson::{doc, Bson, Document};
use mongodb::change_stream::event::{ChangeStreamEvent, OperationType, ResumeToken};
use mongodb::change_stream::ChangeStream;
use mongodb::options::{ChangeStreamOptions, FullDocumentType};
use mongodb::{Client, Collection};
use tail_core::{ConsumerStatus, DocumentSink, StatusPublisher, TailError};
use tail_tracking::{TailTracker, TrackingPosition};
use tokio_util::sync::CancellationToken;

use crate::ChangeStreamSourceConfig;

type EventStream = ChangeStream<ChangeStreamEvent<Document>>;

/// Outcome of one streaming cycle.
enum Cycle {
    /// Stream closed or failed; back off, then resubscribe.
    Reopen,
    /// Stop was requested.
    Cancelled,
}

/// Runs the subscribe -> stream -> backoff cycle for one session.
pub(crate) struct ChangeStreamDriver<S> {
    collection: Collection<Document>,
    config: ChangeStreamSourceConfig,
    tracker: TailTracker,
    sink: Arc<S>,
    status: StatusPublisher,
}

impl<S: DocumentSink> ChangeStreamDriver<S> {
    pub(crate) fn new(
        client: &Client,
        config: ChangeStreamSourceConfig,
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

    /// Run until cancelled or a fatal error, checkpointing the last resume
    /// token before resolving.
    pub(crate) async fn run(mut self, cancel: CancellationToken) -> Result<(), TailError> {
        let outcome = self.cycle(&cancel).await;
        self.status.set(ConsumerStatus::Stopping);
        if let Err(e) = self.tracker.checkpoint().await {
            warn!("final checkpoint failed: {e}");
        }
        self.status.set(ConsumerStatus::Stopped);
        outcome
    }

    async fn cycle(&mut self, cancel: &CancellationToken) -> Result<(), TailError> {
        loop {
            let Some(stream) = self.open(cancel).await? else {
                return Ok(());
            };
            match self.consume(stream, cancel).await? {
                Cycle::Cancelled => return Ok(()),
                Cycle::Reopen => {
                    self.tracker.checkpoint().await?;
                    if self.backoff(cancel).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    async fn open(&mut self, cancel: &CancellationToken) -> Result<Option<EventStream>, TailError> {
        loop {
            let attempt = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                attempt = self.try_open() => attempt,
            };
            match attempt {
                Ok(stream) => return Ok(Some(stream)),
                Err(e) if e.is_transient() => {
                    warn!("could not open change stream: {e}");
                    if self.backoff(cancel).await {
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn try_open(&mut self) -> Result<EventStream, TailError> {
        self.tracker.recover().await?;
        let resume_after = match self.tracker.last() {
            Some(position) => Some(decode_resume_token(position)?),
            None => None,
        };
        if resume_after.is_some() {
            info!("resuming change stream from tracked token");
        }

        let options = ChangeStreamOptions::builder()
            .full_document(Some(FullDocumentType::UpdateLookup))
            .resume_after(resume_after)
            .build();

        let watch = if let Some(filter) = &self.config.stream_filter {
            self.collection
                .watch()
                .pipeline(vec![doc! { "$match": filter.clone() }])
                .with_options(options)
        } else {
            self.collection.watch().with_options(options)
        };
        watch
            .await
            .map_err(|e| TailError::transient(format!("failed to open change stream: {e}")))
    }

    async fn consume(
        &mut self,
        mut stream: EventStream,
        cancel: &CancellationToken,
    ) -> Result<Cycle, TailError> {
        self.status.set(ConsumerStatus::Tailing);
        info!(
            "watching change stream on {}.{}",
            self.config.database, self.config.collection
        );
        loop {
            let next = tokio::select! {
                _ = cancel.cancelled() => return Ok(Cycle::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(event)) => {
                    if let Some(cycle) = self.dispatch(event).await? {
                        return Ok(cycle);
                    }
                }
                Some(Err(e)) => {
                    warn!("change stream failed: {e}");
                    return Ok(Cycle::Reopen);
                }
                None => {
                    debug!("change stream closed");
                    return Ok(Cycle::Reopen);
                }
            }
        }
    }

    /// Process one event. Returns `Some(Cycle::Reopen)` when the stream can
    /// no longer be consumed from, `None` to keep streaming.
    async fn dispatch(
        &mut self,
        event: ChangeStreamEvent<Document>,
    ) -> Result<Option<Cycle>, TailError> {
        let position = encode_resume_token(&event.id)?;

        let payload = match event.operation_type {
            OperationType::Insert | OperationType::Update | OperationType::Replace => {
                // UpdateLookup can still miss the document when it was
                // deleted before the lookup ran.
                event.full_document
            }
            OperationType::Delete => event.document_key,
            OperationType::Invalidate => {
                // The old token can never resume past an invalidate; drop it
                // and rejoin the stream from "now".
                warn!("change stream invalidated, resetting tracked token");
                self.tracker.reset().await?;
                return Ok(Some(Cycle::Reopen));
            }
            other => {
                debug!("skipping change stream event: {other:?}");
                None
            }
        };

        if let Some(document) = payload {
            self.sink
                .deliver(document)
                .await
                .map_err(TailError::Delivery)?;
        }

        // The token advances even for skipped events; the stream has moved
        // past them.
        self.tracker.advance(position);
        if self.tracker.persist_each_document() {
            self.tracker.checkpoint().await?;
        }
        Ok(None)
    }

    async fn backoff(&mut self, cancel: &CancellationToken) -> bool {
        self.status.set(ConsumerStatus::Backoff);
        debug!(
            "waiting {}ms before resubscribing",
            self.config.cursor_regeneration_delay.as_millis()
        );
        tokio::select! {
            _ = cancel.cancelled() => true,
            _ = tokio::time::sleep(self.config.cursor_regeneration_delay) => false,
        }
    }
}

/// Capture an event's resume token as a tracking position.
fn encode_resume_token(token: &ResumeToken) -> Result<TrackingPosition, TailError> {
    let document = bson::to_document(token)
        .map_err(|e| TailError::transient(format!("failed to encode resume token: {e}")))?;
    Ok(TrackingPosition::Literal(Bson::Document(document)))
}

/// Decode a tracked position back into a resume token.
///
/// Fails fast on corruption: resuming from "now" instead would silently skip
/// every change between the checkpoint and the present.
fn decode_resume_token(position: &TrackingPosition) -> Result<ResumeToken, TailError> {
    let Bson::Document(document) = position.to_bson() else {
        return Err(TailError::config(
            "tracked position is not a resume token; the tracking record was \
             written by a different consumer mode. Drop the tracking record \
             to start from now, or point this consumer at its own persistentId.",
        ));
    };
    let bytes = bson::to_vec(&document)
        .map_err(|e| TailError::config(format!("failed to re-encode stored resume token: {e}")))?;
    bson::from_slice::<ResumeToken>(&bytes).map_err(|e| {
        TailError::config(format!(
            "stored resume token could not be decoded: {e}. The token may be \
             corrupted or from an incompatible server version. Drop the \
             tracking record to start from now.",
        ))
    })
}
