//! Test doubles shared by the consumer crates.

use std::sync::Arc;

use async_trait::async_trait;
use bson::Document;
use tokio::sync::Mutex;

use crate::DocumentSink;

/// Sink that appends everything it receives to a shared vector.
#[derive(Clone, Default)]
pub struct CollectingSink {
    received: Arc<Mutex<Vec<Document>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn received(&self) -> Vec<Document> {
        self.received.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.received.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.received.lock().await.is_empty()
    }
}

#[async_trait]
impl DocumentSink for CollectingSink {
    async fn deliver(&self, document: Document) -> anyhow::Result<()> {
        self.received.lock().await.push(document);
        Ok(())
    }
}

/// Sink that rejects every delivery.
#[derive(Clone, Copy, Default)]
pub struct FailingSink;

#[async_trait]
impl DocumentSink for FailingSink {
    async fn deliver(&self, _document: Document) -> anyhow::Result<()> {
        anyhow::bail!("sink rejected document")
    }
}
