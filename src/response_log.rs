//! Hand-off point for completed exchanges
//!
//! Durable storage is someone else's job; the driver only needs somewhere to
//! send each answer/prompt pair. A JSON-lines file adapter is included.

use crate::emotion::Emotion;
use crate::protocol::ProbeDepth;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// One answer and the prompt that followed it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRecord {
    pub timestamp: DateTime<Utc>,
    pub session_id: Uuid,
    pub emotion: Emotion,
    pub answer_text: String,
    pub prompt_text: String,
    pub probe_depth: ProbeDepth,
}

#[derive(Debug, Error)]
pub enum ResponseLogError {
    #[error("Response log I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Response log encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

#[async_trait]
pub trait ResponseLog: Send + Sync {
    async fn record(&self, record: &ExchangeRecord) -> Result<(), ResponseLogError>;
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResponseLog;

#[async_trait]
impl ResponseLog for NoopResponseLog {
    async fn record(&self, _record: &ExchangeRecord) -> Result<(), ResponseLogError> {
        Ok(())
    }
}

/// Appends one JSON object per line
pub struct JsonlResponseLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlResponseLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResponseLog for JsonlResponseLog {
    async fn record(&self, record: &ExchangeRecord) -> Result<(), ResponseLogError> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(depth: u8, answer: &str) -> ExchangeRecord {
        ExchangeRecord {
            timestamp: Utc::now(),
            session_id: Uuid::new_v4(),
            emotion: Emotion::Excitement,
            answer_text: answer.to_string(),
            prompt_text: format!("prompt after {answer}"),
            probe_depth: ProbeDepth::new(depth).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_jsonl_appends_lines() {
        let dir = tempfile::tempdir().unwrap();
        let log = JsonlResponseLog::new(dir.path().join("results").join("responses.jsonl"));

        let first = record(1, "A");
        let second = record(3, "went hiking");
        log.record(&first).await.unwrap();
        log.record(&second).await.unwrap();

        let contents = tokio::fs::read_to_string(log.path()).await.unwrap();
        let rows: Vec<ExchangeRecord> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(rows, vec![first, second]);
    }

    #[tokio::test]
    async fn test_record_shape() {
        let value = serde_json::to_value(record(5, "x")).unwrap();
        for key in [
            "timestamp",
            "sessionId",
            "emotion",
            "answerText",
            "promptText",
            "probeDepth",
        ] {
            assert!(value.get(key).is_some(), "missing {key}");
        }
    }

    #[tokio::test]
    async fn test_noop_accepts_anything() {
        assert!(NoopResponseLog.record(&record(1, "A")).await.is_ok());
    }
}
