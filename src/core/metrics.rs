//! Per-turn latency records.

use std::path::PathBuf;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Milliseconds since the Unix epoch
pub fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

/// Timing of one turn, written once synthesis starts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LatencyRecord {
    /// ISO-8601 time the record was produced
    pub ts: String,
    pub session_id: String,
    pub query: String,
    pub final_received_at: i64,
    pub llm_start_at: i64,
    pub llm_end_at: i64,
    pub tts_start_at: i64,
    pub query_to_tts_start_ms: i64,
    pub llm_duration_ms: i64,
}

/// Timestamps collected by the turn processor, all epoch milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TurnTimings {
    pub final_received_at: i64,
    pub llm_start_at: i64,
    pub llm_end_at: i64,
}

impl LatencyRecord {
    pub fn new(
        session_id: impl Into<String>,
        query: impl Into<String>,
        timings: TurnTimings,
        tts_start_at: i64,
    ) -> Self {
        Self {
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            session_id: session_id.into(),
            query: query.into(),
            final_received_at: timings.final_received_at,
            llm_start_at: timings.llm_start_at,
            llm_end_at: timings.llm_end_at,
            tts_start_at,
            query_to_tts_start_ms: (tts_start_at - timings.final_received_at).max(0),
            llm_duration_ms: (timings.llm_end_at - timings.llm_start_at).max(0),
        }
    }
}

/// Destination for latency records. Recording never blocks and never fails.
pub trait LatencySink: Send + Sync {
    fn record(&self, record: LatencyRecord);
}

/// Appends one JSON line per record to a file
pub struct JsonlLatencySink {
    path: PathBuf,
}

impl JsonlLatencySink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn append(path: PathBuf, line: String) -> std::io::Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await
    }
}

impl LatencySink for JsonlLatencySink {
    fn record(&self, record: LatencyRecord) {
        info!(
            session_id = %record.session_id,
            query_to_tts_start_ms = record.query_to_tts_start_ms,
            llm_duration_ms = record.llm_duration_ms,
            "Turn latency"
        );

        let mut line = match serde_json::to_string(&record) {
            Ok(line) => line,
            Err(e) => {
                debug!("Failed to encode latency record: {}", e);
                return;
            }
        };
        line.push('\n');

        let path = self.path.clone();
        tokio::spawn(async move {
            if let Err(e) = Self::append(path, line).await {
                debug!("Failed to write latency record: {}", e);
            }
        });
    }
}
