//! CLI-facing configuration surface.
//!
//! The clap option structs here lower into the typed per-crate configs. All
//! mode/option compatibility checks happen in the lowering, synchronously,
//! before a consumer session is created.

use std::time::Duration;

use anyhow::{anyhow, Context};
use clap::Parser;
use mongodb::bson::{Bson, Document};
use mongotail_changestream_source::ChangeStreamSourceConfig;
use mongotail_tailable_source::TailableSourceConfig;
use tail_tracking::{TrackingConfig, TrackingStrategy};

/// Source connection options shared by the subcommands.
#[derive(Parser, Clone, Debug)]
pub struct SourceOpts {
    /// MongoDB connection string
    #[arg(long, env = "MONGOTAIL_URI", default_value = "mongodb://localhost:27017")]
    pub uri: String,

    /// Source database name
    #[arg(long)]
    pub database: String,

    /// Source collection name
    #[arg(long)]
    pub collection: String,
}

/// Tail tracking options shared by the subcommands.
#[derive(Parser, Clone, Debug)]
pub struct TrackingOpts {
    /// Persist the tracking position across restarts
    #[arg(long)]
    pub persistent: bool,

    /// Consumer identity keying the tracking record (required with --persistent)
    #[arg(long)]
    pub persistent_id: Option<String>,

    /// Database holding the tracking collection (default: the source database)
    #[arg(long)]
    pub tail_track_db: Option<String>,

    /// Tracking collection name
    #[arg(long, default_value = tail_tracking::DEFAULT_TRACKING_COLLECTION)]
    pub tail_track_collection: String,

    /// Field storing the last tracking value
    #[arg(long, default_value = tail_tracking::DEFAULT_TRACKING_FIELD)]
    pub tail_track_field: String,

    /// Checkpoint after every delivered document
    #[arg(long)]
    pub persist_each_document: bool,
}

impl TrackingOpts {
    pub fn to_config(&self, strategy: TrackingStrategy) -> TrackingConfig {
        TrackingConfig {
            persistent: self.persistent,
            persistent_id: self.persistent_id.clone(),
            db: self.tail_track_db.clone(),
            collection: self.tail_track_collection.clone(),
            field: self.tail_track_field.clone(),
            strategy,
            persist_each_document: self.persist_each_document,
        }
    }
}

/// Build a tailable consumer config from CLI options.
pub fn tailable_config(
    source: &SourceOpts,
    increasing_field: &str,
    timestamp: bool,
    filter: Option<&str>,
    cursor_regeneration_delay_ms: u64,
    tracking: &TrackingOpts,
) -> anyhow::Result<TailableSourceConfig> {
    let strategy = if timestamp {
        TrackingStrategy::Timestamp
    } else {
        TrackingStrategy::Literal
    };
    let mut config = TailableSourceConfig::new(
        &source.database,
        &source.collection,
        increasing_field,
        tracking.to_config(strategy),
    );
    config.user_filter = filter.map(parse_filter).transpose()?;
    config.cursor_regeneration_delay = Duration::from_millis(cursor_regeneration_delay_ms);
    config.validate()?;
    Ok(config)
}

/// Build a change-stream consumer config from CLI options.
pub fn changestream_config(
    source: &SourceOpts,
    stream_filter: Option<&str>,
    cursor_regeneration_delay_ms: u64,
    tracking: &TrackingOpts,
) -> anyhow::Result<ChangeStreamSourceConfig> {
    let mut config = ChangeStreamSourceConfig::new(
        &source.database,
        &source.collection,
        tracking.to_config(TrackingStrategy::Literal),
    );
    config.stream_filter = stream_filter.map(parse_filter).transpose()?;
    config.cursor_regeneration_delay = Duration::from_millis(cursor_regeneration_delay_ms);
    config.validate()?;
    Ok(config)
}

/// Parse a `--filter`/`--stream-filter` value given as relaxed extended JSON.
fn parse_filter(raw: &str) -> anyhow::Result<Document> {
    let value: serde_json::Value =
        serde_json::from_str(raw).with_context(|| format!("filter is not valid JSON: {raw}"))?;
    match Bson::try_from(value)? {
        Bson::Document(document) => Ok(document),
        other => Err(anyhow!(
            "filter must be a JSON object, got {:?}",
            other.element_type()
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;

    fn source() -> SourceOpts {
        SourceOpts {
            uri: "mongodb://localhost:27017".to_string(),
            database: "db".to_string(),
            collection: "capped".to_string(),
        }
    }

    fn tracking() -> TrackingOpts {
        TrackingOpts {
            persistent: false,
            persistent_id: None,
            tail_track_db: None,
            tail_track_collection: tail_tracking::DEFAULT_TRACKING_COLLECTION.to_string(),
            tail_track_field: tail_tracking::DEFAULT_TRACKING_FIELD.to_string(),
            persist_each_document: false,
        }
    }

    #[test]
    fn filter_parses_json_objects() {
        let document = parse_filter(r#"{"string": "value2"}"#).unwrap();
        assert_eq!(document, doc! { "string": "value2" });

        assert!(parse_filter("not json").is_err());
        assert!(parse_filter("[1, 2]").is_err());
    }

    #[test]
    fn tailable_lowering_applies_every_knob() {
        let config = tailable_config(
            &source(),
            "ts",
            true,
            Some(r#"{"string": "value2"}"#),
            250,
            &tracking(),
        )
        .unwrap();
        assert_eq!(config.increasing_field, "ts");
        assert_eq!(config.tracking.strategy, TrackingStrategy::Timestamp);
        assert_eq!(config.user_filter, Some(doc! { "string": "value2" }));
        assert_eq!(config.cursor_regeneration_delay, Duration::from_millis(250));
    }

    #[test]
    fn persistent_without_id_fails_at_build_time() {
        let mut opts = tracking();
        opts.persistent = true;
        let err = tailable_config(&source(), "seq", false, None, 1000, &opts).unwrap_err();
        assert!(err.to_string().contains("persistentId"));
    }

    #[test]
    fn tracking_location_overrides_are_carried() {
        let mut opts = tracking();
        opts.persistent = true;
        opts.persistent_id = Some("c1".to_string());
        opts.tail_track_db = Some("trackers".to_string());
        opts.tail_track_collection = "positions".to_string();
        opts.tail_track_field = "lastSeen".to_string();

        let config = tailable_config(&source(), "seq", false, None, 1000, &opts).unwrap();
        assert_eq!(config.tracking.db.as_deref(), Some("trackers"));
        assert_eq!(config.tracking.collection, "positions");
        assert_eq!(config.tracking.field, "lastSeen");
    }

    #[test]
    fn changestream_lowering_parses_the_stream_filter() {
        let config = changestream_config(
            &source(),
            Some(r#"{"operationType": "insert"}"#),
            1000,
            &tracking(),
        )
        .unwrap();
        assert_eq!(
            config.stream_filter,
            Some(doc! { "operationType": "insert" })
        );
        assert_eq!(config.tracking.strategy, TrackingStrategy::Literal);
    }
}
