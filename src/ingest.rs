use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::aggregate::{MergeStats, Session};
use crate::config::UploadConfig;
use crate::error::{IngestError, Result};
use crate::sources::parser_for;

/// What happened to one file of a batch.
#[derive(Debug)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub result: Result<MergeStats>,
}

impl FileOutcome {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// The upload surface: validates, decodes and merges files one at a time.
pub struct Uploader {
    config: UploadConfig,
}

impl Uploader {
    pub fn new(config: UploadConfig) -> Self {
        Self { config }
    }

    /// Decodes `path` and merges it into `session`. On error the session
    /// is left exactly as it was.
    pub async fn upload(&self, session: &mut Session, path: &Path) -> Result<MergeStats> {
        let parser = parser_for(path)?;

        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| IngestError::read(path, source))?;
        if metadata.len() > self.config.max_file_size {
            return Err(IngestError::FileTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: self.config.max_file_size,
            });
        }

        let upload = parser.parse().await?;
        Ok(session.apply(&upload))
    }

    /// Processes `paths` strictly in order. A failing file is reported and
    /// skipped; files merged before it stay merged.
    pub async fn upload_all(&self, session: &mut Session, paths: &[PathBuf]) -> Vec<FileOutcome> {
        let mut outcomes = Vec::with_capacity(paths.len());

        for path in paths {
            let result = self.upload(session, path).await;
            match &result {
                Ok(stats) => info!(
                    path = %path.display(),
                    records = stats.records,
                    new_words = stats.new_words,
                    "processed upload"
                ),
                Err(e) => warn!(path = %path.display(), "{e}"),
            }
            outcomes.push(FileOutcome {
                path: path.clone(),
                result,
            });
        }

        outcomes
    }
}
