use std::path::PathBuf;

use thiserror::Error;

/// Why a single uploaded file could not be folded into the session.
///
/// Every variant is recoverable: the file is skipped, earlier files of the
/// same batch stay applied, and the user can upload again.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("unsupported file format: {} (expected .csv or .json)", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("{} is {size} bytes, over the {limit} byte upload limit", .path.display())]
    FileTooLarge {
        path: PathBuf,
        size: u64,
        limit: u64,
    },

    #[error("failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    pub fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn path(&self) -> &PathBuf {
        match self {
            Self::UnsupportedFormat { path }
            | Self::FileTooLarge { path, .. }
            | Self::Parse { path, .. }
            | Self::Read { path, .. } => path,
        }
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;

/// Failures talking to the Slack Web API.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("invalid Slack token")]
    InvalidToken,

    #[error("channel not found")]
    ChannelNotFound,

    #[error("the bot is not a member of this channel (try --join)")]
    NotInChannel,

    #[error("Slack rate limit exceeded on {method}")]
    RateLimited { method: String },

    #[error("Slack API {method} failed: {code}")]
    Api { method: String, code: String },

    #[error("Slack API {method} returned HTTP {status}")]
    Status {
        method: String,
        status: reqwest::StatusCode,
    },

    #[error("request to {method} failed: {source}")]
    Http {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected response from {method}: {source}")]
    Decode {
        method: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    /// Maps the `error` field of an `ok: false` response.
    pub fn from_code(method: &str, code: &str) -> Self {
        match code {
            "invalid_auth" | "not_authed" | "account_inactive" | "token_revoked"
            | "token_expired" => Self::InvalidToken,
            "channel_not_found" => Self::ChannelNotFound,
            "not_in_channel" => Self::NotInChannel,
            "ratelimited" => Self::RateLimited {
                method: method.to_string(),
            },
            _ => Self::Api {
                method: method.to_string(),
                code: code.to_string(),
            },
        }
    }
}
