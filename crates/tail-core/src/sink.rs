//! Downstream delivery seam.

use async_trait::async_trait;
use bson::Document;

/// Receives the documents a consumer produces, in source order.
///
/// `deliver` blocks until the document has been accepted. An error stops the
/// owning consumer session; documents are never dropped silently. No deadline
/// is applied, so a sink that hangs stalls its session.
#[async_trait]
pub trait DocumentSink: Send + Sync {
    async fn deliver(&self, document: Document) -> anyhow::Result<()>;
}
