//! mongotail library
//!
//! Resumable MongoDB consumers with persistent tail tracking:
//!
//! - Tailable-cursor mode: tails a capped collection on an increasing field,
//!   resuming from the last tracked position after restarts.
//! - Change-stream mode: consumes a collection change stream, resuming from
//!   the persisted resume token.
//!
//! Both modes deliver at-least-once: a document may be redelivered after a
//! crash, never lost past the last checkpoint.
//!
//! # Library usage
//!
//! ```rust,no_run
//! use mongotail::{connect, JsonLinesSink};
//! use mongotail::{TailableCursorConsumer, TailableSourceConfig};
//! use mongotail::{TrackingConfig, TrackingStrategy};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = connect("mongodb://localhost:27017").await?;
//! let tracking = TrackingConfig::persistent("orders-consumer", TrackingStrategy::Literal);
//! let config = TailableSourceConfig::new("shop", "orders", "seq", tracking);
//! let mut consumer = TailableCursorConsumer::start(&client, config, JsonLinesSink)?;
//! // ... later:
//! consumer.stop().await?;
//! # Ok(())
//! # }
//! ```
//!
//! # CLI usage
//!
//! ```bash
//! # Tail a capped collection, persisting the position across restarts
//! mongotail tail --database shop --collection orders \
//!   --increasing-field seq --persistent --persistent-id orders-consumer
//!
//! # Watch a change stream with a filter
//! mongotail watch --database shop --collection orders \
//!   --stream-filter '{"fullDocument.status": "paid"}'
//! ```

mod config;
mod connect;
mod sink;

pub use config::{changestream_config, tailable_config, SourceOpts, TrackingOpts};
pub use connect::connect;
pub use sink::JsonLinesSink;

// Re-export the consumer crates under one roof.
pub use mongotail_changestream_source::{ChangeStreamConsumer, ChangeStreamSourceConfig};
pub use mongotail_tailable_source::{TailableCursorConsumer, TailableSourceConfig};
pub use tail_core::{
    testing, ConsumerHandle, ConsumerStatus, DocumentSink, StatusPublisher, TailError,
};
pub use tail_tracking::{
    MemoryTrackingStore, MongoTrackingStore, TailTracker, TrackingConfig, TrackingPosition,
    TrackingStore, TrackingStrategy, DEFAULT_TRACKING_COLLECTION, DEFAULT_TRACKING_FIELD,
    TRACKING_ID_KEY,
};
