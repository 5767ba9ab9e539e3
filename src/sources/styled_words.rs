use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use super::{read_upload, SourceParser, StyledWordRecord, UploadData};
use crate::error::{IngestError, Result};

/// Decodes a pre-scored word list: `[{"text", "count", "color"}, ...]`.
pub struct StyledWordsParser {
    path: PathBuf,
}

impl StyledWordsParser {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SourceParser for StyledWordsParser {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn parse(&self) -> Result<UploadData> {
        let bytes = read_upload(&self.path).await?;
        let records =
            parse_styled_words(&bytes).map_err(|reason| IngestError::parse(&self.path, reason))?;

        debug!(
            path = %self.path.display(),
            words = records.len(),
            "decoded styled word list"
        );
        Ok(UploadData::StyledWords(records))
    }
}

/// Every element is checked against the record shape here, so a bad
/// element rejects the file instead of surfacing later as a missing field.
pub fn parse_styled_words(bytes: &[u8]) -> std::result::Result<Vec<StyledWordRecord>, String> {
    let parsed: Value = serde_json::from_slice(bytes).map_err(|e| format!("invalid JSON: {e}"))?;
    let elements = match parsed {
        Value::Array(elements) => elements,
        other => {
            return Err(format!(
                "expected a JSON array of words, found {}",
                json_type_name(&other)
            ))
        }
    };

    elements
        .into_iter()
        .enumerate()
        .map(|(index, element)| {
            let record: StyledWordRecord =
                serde_json::from_value(element).map_err(|e| format!("element {index}: {e}"))?;
            if record.color.trim().is_empty() {
                return Err(format!("element {index}: empty color for {:?}", record.text));
            }
            Ok(record)
        })
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
