use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::aggregate::WordCountMap;
use crate::cloud::{CountRange, DisplayItem};

/// The document handed to a renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCloudData {
    pub items: Vec<DisplayItem>,
    pub metadata: WordCloudMetadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordCloudMetadata {
    pub max_count: u64,
    pub min_count: u64,
    /// Distinct words in the session, before filtering.
    pub total_words: usize,
    pub generated_at: DateTime<Utc>,
}

impl WordCloudData {
    pub fn new(items: Vec<DisplayItem>, counts: &WordCountMap) -> Self {
        Self::at(items, counts, Utc::now())
    }

    pub fn at(items: Vec<DisplayItem>, counts: &WordCountMap, generated_at: DateTime<Utc>) -> Self {
        let range = CountRange::of(counts).unwrap_or(CountRange { min: 0, max: 0 });
        Self {
            items,
            metadata: WordCloudMetadata {
                max_count: range.max,
                min_count: range.min,
                total_words: counts.len(),
                generated_at,
            },
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("failed to serialize word cloud data")
    }
}

/// Pretty-printed JSON, creating parent directories as needed.
pub async fn write_json<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("failed to create output directory {}", parent.display()))?;
    }

    let mut json = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    json.push('\n');
    tokio::fs::write(path, json)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(path = %path.display(), "wrote output");
    Ok(())
}
