//! Replay source events through the unread-rooms derivation.
//!
//! Reads newline-delimited `SourceEvent` JSON (from a file or stdin),
//! publishes each event through an in-memory derivation, and prints the
//! materialized unread-room counts as a JSON object keyed by user id.
//!
//! ```text
//! $ unread-replay events.jsonl --emit-deltas
//! {"roomId":"r1","userId":"u1","numUnreadRoomsDelta":0}
//! {"roomId":"r1","userId":"u1","numUnreadRoomsDelta":1}
//! {
//!   "u1": 1
//! }
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Serialize;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use unread_rooms::{
    async_trait, DeltaSink, Derivation, DerivationBuilder, DerivationConfig, InMemoryStore, RoomId,
    SourceEvent, UnreadCounts, UnreadDelta,
};

#[derive(Parser)]
#[command(name = "unread-replay")]
#[command(about = "Replay room message/subscription events and print unread-room counts")]
struct Cli {
    /// Newline-delimited JSON events. Reads stdin when omitted.
    input: Option<PathBuf>,

    /// Print every delta as a JSON line as it is published
    #[arg(long)]
    emit_deltas: bool,

    /// Override UNREAD_MAX_CONFLICT_RETRIES
    #[arg(long)]
    max_conflict_retries: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct DeltaLine<'a> {
    room_id: &'a RoomId,
    #[serde(flatten)]
    delta: &'a UnreadDelta,
}

/// Writes each delta to stdout as one JSON line.
struct JsonLinesSink;

#[async_trait]
impl DeltaSink for JsonLinesSink {
    async fn publish(&self, room_id: &RoomId, deltas: &[UnreadDelta]) -> Result<()> {
        for delta in deltas {
            let line = serde_json::to_string(&DeltaLine { room_id, delta })?;
            println!("{line}");
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = DerivationConfig::from_env().context("Failed to load configuration")?;
    if let Some(attempts) = cli.max_conflict_retries {
        config.max_conflict_retries = attempts;
    }

    // Initialize logging (stderr, so stdout stays machine-readable)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.log_filter.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let counts = Arc::new(UnreadCounts::new());
    let mut builder = DerivationBuilder::new(InMemoryStore::new())
        .with_config(&config)
        .with_sink(counts.clone());
    if cli.emit_deltas {
        builder = builder.with_sink(JsonLinesSink);
    }
    let derivation = builder.build();

    let published = match &cli.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("Failed to open {}", path.display()))?;
            replay(BufReader::new(file), &derivation).await?
        }
        None => replay(BufReader::new(tokio::io::stdin()), &derivation).await?,
    };

    tracing::info!(
        events = published,
        rooms = derivation.store().len(),
        users = counts.len(),
        "replay complete"
    );

    println!("{}", serde_json::to_string_pretty(&counts.snapshot())?);
    Ok(())
}

/// Parse and publish every non-blank line. Returns the number of events.
async fn replay<R>(reader: R, derivation: &Derivation<InMemoryStore>) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0usize;
    let mut published = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read input")? {
        line_no += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: SourceEvent = serde_json::from_str(line)
            .with_context(|| format!("Invalid source event on line {line_no}"))?;
        derivation
            .publish(&event)
            .await
            .with_context(|| format!("Failed to publish event on line {line_no}"))?;
        published += 1;
    }

    Ok(published)
}
