//! Stdout sink for the CLI.

use async_trait::async_trait;
use bson::{Bson, Document};
use tail_core::DocumentSink;

/// Writes each delivered document as one line of relaxed extended JSON.
pub struct JsonLinesSink;

#[async_trait]
impl DocumentSink for JsonLinesSink {
    async fn deliver(&self, document: Document) -> anyhow::Result<()> {
        let value = Bson::Document(document).into_relaxed_extjson();
        println!("{value}");
        Ok(())
    }
}
