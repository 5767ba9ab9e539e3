pub mod slack;

use std::io;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tracing::info;

use crate::config::SlackConfig;
use crate::error::FetchError;
use crate::sources::RawMessageRecord;

pub use slack::SlackClient;

/// Column order of a chat export; ThreadTS is optional.
pub const EXPORT_HEADERS: [&str; 5] = ["Timestamp", "UserID", "Username", "Message", "ThreadTS"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: String,
    pub is_private: bool,
    pub member_count: u32,
}

/// Source of a channel's full history.
#[async_trait]
pub trait ChannelFetcher: Send + Sync {
    async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo, FetchError>;

    /// Every message of the channel. Thread replies follow their parent.
    async fn messages(&self, channel_id: &str) -> Result<Vec<RawMessageRecord>, FetchError>;
}

/// `messages_<channel>_<YYYYMMDD_HHMMSS>.csv`, stamped in the export zone.
pub fn export_file_name(channel_name: &str, now: DateTime<Tz>) -> String {
    let channel: String = channel_name
        .chars()
        .map(|c| if matches!(c, '/' | '\\') { '_' } else { c })
        .collect();
    format!("messages_{}_{}.csv", channel, now.format("%Y%m%d_%H%M%S"))
}

/// Writes `messages` as a chat export the CSV upload parser reads back.
pub fn write_messages<W: io::Write>(
    writer: W,
    messages: &[RawMessageRecord],
    include_thread: bool,
) -> Result<(), csv::Error> {
    let columns = if include_thread { 5 } else { 4 };
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&EXPORT_HEADERS[..columns])?;

    for (i, message) in messages.iter().enumerate() {
        if i > 0 && i % 1000 == 0 {
            info!(written = i, total = messages.len(), "writing export");
        }
        let row = [
            message.timestamp.as_str(),
            message.user_id.as_str(),
            message.username.as_str(),
            message.message.as_str(),
            message.thread_ts.as_deref().unwrap_or(""),
        ];
        csv.write_record(&row[..columns])?;
    }

    csv.flush()?;
    Ok(())
}

/// Fetches one channel and writes it under `config.output_dir`. Returns the
/// path of the new file.
pub async fn export_channel(
    fetcher: &dyn ChannelFetcher,
    channel_id: &str,
    config: &SlackConfig,
) -> Result<PathBuf> {
    let tz = config.tz()?;

    let channel = fetcher
        .channel_info(channel_id)
        .await
        .with_context(|| format!("failed to look up channel {channel_id}"))?;
    info!(
        channel = %channel.name,
        private = channel.is_private,
        members = channel.member_count,
        "exporting channel"
    );

    let messages = fetcher
        .messages(channel_id)
        .await
        .with_context(|| format!("failed to fetch messages of #{}", channel.name))?;

    let mut buffer = Vec::new();
    write_messages(&mut buffer, &messages, config.include_thread)
        .context("failed to encode CSV export")?;

    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .with_context(|| format!("failed to create {}", config.output_dir.display()))?;
    let path = config
        .output_dir
        .join(export_file_name(&channel.name, Utc::now().with_timezone(&tz)));
    tokio::fs::write(&path, buffer)
        .await
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!(path = %path.display(), messages = messages.len(), "export complete");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::slack_export::parse_messages;
    use chrono::TimeZone;

    fn message(ts: &str, user: &str, text: &str, thread_ts: Option<&str>) -> RawMessageRecord {
        RawMessageRecord {
            timestamp: ts.to_string(),
            user_id: user.to_string(),
            username: format!("{user}-name"),
            message: text.to_string(),
            thread_ts: thread_ts.map(str::to_string),
        }
    }

    struct StaticChannel {
        messages: Vec<RawMessageRecord>,
    }

    #[async_trait]
    impl ChannelFetcher for StaticChannel {
        async fn channel_info(&self, channel_id: &str) -> Result<ChannelInfo, FetchError> {
            Ok(ChannelInfo {
                id: channel_id.to_string(),
                name: "general".to_string(),
                is_private: false,
                member_count: 3,
            })
        }

        async fn messages(&self, _channel_id: &str) -> Result<Vec<RawMessageRecord>, FetchError> {
            Ok(self.messages.clone())
        }
    }

    struct MissingChannel;

    #[async_trait]
    impl ChannelFetcher for MissingChannel {
        async fn channel_info(&self, _channel_id: &str) -> Result<ChannelInfo, FetchError> {
            Err(FetchError::ChannelNotFound)
        }

        async fn messages(&self, _channel_id: &str) -> Result<Vec<RawMessageRecord>, FetchError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_export_file_name_uses_zone_time() {
        let at = Utc
            .with_ymd_and_hms(2024, 3, 1, 15, 4, 5)
            .unwrap()
            .with_timezone(&chrono_tz::Asia::Tokyo);
        assert_eq!(
            export_file_name("general", at),
            "messages_general_20240302_000405.csv"
        );
        assert_eq!(
            export_file_name("a/b", at),
            "messages_a_b_20240302_000405.csv"
        );
    }

    #[test]
    fn test_written_export_parses_back() {
        let messages = vec![
            message("1700000000.000100", "U1", "定例 始めます！", Some("1700000000.000100")),
            message("1700000001.000200", "U2", "了解, \"よろしく\"", Some("1700000000.000100")),
            message("1700000002.000300", "U1", "deploy\ntoday", None),
        ];

        let mut buffer = Vec::new();
        write_messages(&mut buffer, &messages, true).unwrap();
        assert!(buffer.starts_with(b"Timestamp,UserID,Username,Message,ThreadTS\n"));

        let parsed = parse_messages(&buffer).unwrap();
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed[1].message, "了解, \"よろしく\"");
        assert!(parsed[1].is_thread_reply());
        assert_eq!(parsed[2].message, "deploy\ntoday");
    }

    #[test]
    fn test_without_thread_drops_column() {
        let messages = vec![message("1.0", "U1", "hello", Some("1.0"))];
        let mut buffer = Vec::new();
        write_messages(&mut buffer, &messages, false).unwrap();

        let text = String::from_utf8(buffer).unwrap();
        assert_eq!(text, "Timestamp,UserID,Username,Message\n1.0,U1,U1-name,hello\n");
    }

    #[tokio::test]
    async fn test_export_channel_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = SlackConfig {
            output_dir: dir.path().join("exports"),
            ..SlackConfig::default()
        };
        let fetcher = StaticChannel {
            messages: vec![message("1700000000.000100", "U1", "会議 会議", None)],
        };

        let path = export_channel(&fetcher, "C123", &config).await.unwrap();
        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("messages_general_"));
        assert!(name.ends_with(".csv"));

        let written = tokio::fs::read(&path).await.unwrap();
        let parsed = parse_messages(&written).unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].username, "U1-name");
    }

    #[tokio::test]
    async fn test_export_channel_reports_missing_channel() {
        let dir = tempfile::tempdir().unwrap();
        let config = SlackConfig {
            output_dir: dir.path().to_path_buf(),
            ..SlackConfig::default()
        };

        let err = export_channel(&MissingChannel, "C404", &config)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("C404"));
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }
}
