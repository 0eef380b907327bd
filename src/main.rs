//! Command-line interface for mongotail
//!
//! # Usage Examples
//!
//! ```bash
//! # Tail a capped collection on an increasing sequence field
//! mongotail tail \
//!   --uri mongodb://localhost:27017 \
//!   --database shop --collection orders \
//!   --increasing-field seq
//!
//! # Same, resuming across restarts from a persisted position
//! mongotail tail \
//!   --database shop --collection orders \
//!   --increasing-field seq \
//!   --persistent --persistent-id orders-consumer
//!
//! # Tail on a BSON timestamp field, tracking state in a separate database
//! mongotail tail \
//!   --database shop --collection oplog_like \
//!   --increasing-field ts --timestamp \
//!   --persistent --persistent-id oplog-consumer \
//!   --tail-track-db trackers
//!
//! # Consume a change stream, filtered to paid orders
//! mongotail watch \
//!   --database shop --collection orders \
//!   --stream-filter '{"fullDocument.status": "paid"}' \
//!   --persistent --persistent-id paid-orders
//! ```
//!
//! Documents are written to stdout as relaxed extended JSON, one per line.
//! Ctrl-c stops the consumer after a final checkpoint.

use clap::{Parser, Subcommand};
use mongotail::{
    changestream_config, connect, tailable_config, ChangeStreamConsumer, JsonLinesSink,
    SourceOpts, TailableCursorConsumer, TrackingOpts,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mongotail")]
#[command(about = "Resumable MongoDB tailable-cursor and change-stream consumer")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tail a capped collection on an increasing field
    Tail {
        #[command(flatten)]
        source: SourceOpts,

        /// Field whose values increase in insertion order, used as the
        /// resume watermark
        #[arg(long)]
        increasing_field: String,

        /// Interpret the increasing field as a BSON timestamp
        #[arg(long)]
        timestamp: bool,

        /// Extra filter as a JSON object, ANDed with the position predicate
        #[arg(long)]
        filter: Option<String>,

        /// Delay before regenerating an exhausted cursor, in milliseconds
        #[arg(long, default_value_t = 1000)]
        cursor_regeneration_delay_ms: u64,

        #[command(flatten)]
        tracking: TrackingOpts,
    },
    /// Consume a collection change stream
    Watch {
        #[command(flatten)]
        source: SourceOpts,

        /// `$match` expression applied to change events, as a JSON object
        #[arg(long)]
        stream_filter: Option<String>,

        /// Delay before resubscribing after the stream closes, in milliseconds
        #[arg(long, default_value_t = 1000)]
        cursor_regeneration_delay_ms: u64,

        #[command(flatten)]
        tracking: TrackingOpts,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tail {
            source,
            increasing_field,
            timestamp,
            filter,
            cursor_regeneration_delay_ms,
            tracking,
        } => {
            let config = tailable_config(
                &source,
                &increasing_field,
                timestamp,
                filter.as_deref(),
                cursor_regeneration_delay_ms,
                &tracking,
            )?;
            let client = connect(&source.uri).await?;
            let mut consumer = TailableCursorConsumer::start(&client, config, JsonLinesSink)?;
            tokio::signal::ctrl_c().await?;
            tracing::info!("stopping");
            consumer.stop().await?;
        }
        Commands::Watch {
            source,
            stream_filter,
            cursor_regeneration_delay_ms,
            tracking,
        } => {
            let config = changestream_config(
                &source,
                stream_filter.as_deref(),
                cursor_regeneration_delay_ms,
                &tracking,
            )?;
            let client = connect(&source.uri).await?;
            let mut consumer = ChangeStreamConsumer::start(&client, config, JsonLinesSink)?;
            tokio::signal::ctrl_c().await?;
            tracing::info!("stopping");
            consumer.stop().await?;
        }
    }

    Ok(())
}
