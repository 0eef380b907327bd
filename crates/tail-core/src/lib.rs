//! Shared traits and types for mongotail consumers.
//!
//! This crate holds the seams the consumer crates are built around:
//! - the [`TailError`] taxonomy,
//! - the [`DocumentSink`] downstream delivery trait,
//! - [`ConsumerStatus`] reporting,
//! - the [`ConsumerHandle`] background-task lifecycle,
//! - test doubles under [`testing`].

mod error;
mod lifecycle;
mod sink;
mod status;
pub mod testing;

pub use error::{Result, TailError};
pub use lifecycle::ConsumerHandle;
pub use sink::DocumentSink;
pub use status::{ConsumerStatus, StatusPublisher};
