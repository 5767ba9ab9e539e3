use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{read_upload, RawMessageRecord, SourceParser, UploadData};
use crate::error::{IngestError, Result};

const REQUIRED_COLUMNS: [&str; 4] = ["Timestamp", "UserID", "Username", "Message"];

/// Decodes a channel export: `Timestamp,UserID,Username,Message[,ThreadTS]`.
pub struct SlackExportParser {
    path: PathBuf,
}

impl SlackExportParser {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl SourceParser for SlackExportParser {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn parse(&self) -> Result<UploadData> {
        let bytes = read_upload(&self.path).await?;
        let records =
            parse_messages(&bytes).map_err(|reason| IngestError::parse(&self.path, reason))?;

        debug!(
            path = %self.path.display(),
            rows = records.len(),
            "decoded chat export"
        );
        Ok(UploadData::Messages(records))
    }
}

/// Parse a whole export. Rows are validated together: if any row is
/// malformed the file is rejected with one message that counts the bad
/// rows and quotes the first.
pub fn parse_messages(bytes: &[u8]) -> std::result::Result<Vec<RawMessageRecord>, String> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| format!("invalid header row: {e}"))?
        .clone();

    // Nothing at all, not even a header
    if headers.is_empty() {
        return Ok(Vec::new());
    }

    let missing: Vec<&str> = REQUIRED_COLUMNS
        .iter()
        .copied()
        .filter(|column| !headers.iter().any(|h| h == *column))
        .collect();
    if !missing.is_empty() {
        return Err(format!("missing column(s): {}", missing.join(", ")));
    }

    let mut records = Vec::new();
    let mut failed = 0usize;
    let mut first_failure: Option<String> = None;

    for row in reader.deserialize::<RawMessageRecord>() {
        match row {
            Ok(record) => records.push(record),
            Err(e) => {
                failed += 1;
                if first_failure.is_none() {
                    first_failure = Some(e.to_string());
                }
            }
        }
    }

    match first_failure {
        Some(first) => Err(format!(
            "{failed} malformed row(s) out of {}; first: {first}",
            failed + records.len()
        )),
        None => Ok(records),
    }
}
