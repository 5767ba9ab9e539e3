pub mod slack_export;
pub mod styled_words;

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};

pub use slack_export::SlackExportParser;
pub use styled_words::StyledWordsParser;

/// One row of a chat export.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawMessageRecord {
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "UserID")]
    pub user_id: String,
    #[serde(rename = "Username")]
    pub username: String,
    #[serde(rename = "Message")]
    pub message: String,
    #[serde(rename = "ThreadTS", default)]
    pub thread_ts: Option<String>,
}

impl RawMessageRecord {
    /// Slack timestamps are epoch seconds with a microsecond fraction
    /// (`1700000000.123456`); RFC 3339 is accepted as well.
    pub fn sent_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.timestamp)
    }

    pub fn is_thread_reply(&self) -> bool {
        self.thread_ts
            .as_deref()
            .is_some_and(|ts| !ts.is_empty() && ts != self.timestamp)
    }
}

/// One entry of a pre-scored word list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyledWordRecord {
    pub text: String,
    pub count: u64,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum UploadData {
    Messages(Vec<RawMessageRecord>),
    StyledWords(Vec<StyledWordRecord>),
}

impl UploadData {
    pub fn len(&self) -> usize {
        match self {
            Self::Messages(records) => records.len(),
            Self::StyledWords(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Messages(_) => "csv",
            Self::StyledWords(_) => "json",
        }
    }
}

#[async_trait]
pub trait SourceParser: Send + Sync {
    fn path(&self) -> &Path;

    async fn parse(&self) -> Result<UploadData>;
}

/// Picks the decoder for `path` from its extension.
pub fn parser_for(path: &Path) -> Result<Box<dyn SourceParser>> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("csv") => Ok(Box::new(SlackExportParser::new(path.to_path_buf()))),
        Some("json") => Ok(Box::new(StyledWordsParser::new(path.to_path_buf()))),
        _ => Err(IngestError::UnsupportedFormat {
            path: path.to_path_buf(),
        }),
    }
}

pub(crate) async fn read_upload(path: &Path) -> Result<Vec<u8>> {
    tokio::fs::read(path)
        .await
        .map_err(|source| IngestError::read(path, source))
}

pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(seconds) = raw.parse::<f64>() {
        if !seconds.is_finite() {
            return None;
        }
        let whole = seconds.trunc() as i64;
        let nanos = ((seconds - seconds.trunc()) * 1_000_000_000.0).round() as u32;
        return DateTime::from_timestamp(whole, nanos.min(999_999_999));
    }

    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
