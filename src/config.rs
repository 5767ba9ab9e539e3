use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

/// Upload size limit applied per file.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cloud: CloudConfig,
    pub layout: LayoutConfig,
    pub policy: PolicyConfig,
    pub analysis: AnalysisConfig,
    pub filter: FilterOptions,
    pub upload: UploadConfig,
    pub slack: SlackConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub min_font_size: u32,
    pub max_font_size: u32,
    pub color_scheme: ColorScheme,
    /// Color for words without a style override under the `fixed` scheme.
    pub default_color: String,
    pub colors: CloudColors,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            min_font_size: 14,
            max_font_size: 80,
            color_scheme: ColorScheme::Fixed,
            default_color: "#2563eb".to_string(),
            colors: CloudColors::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudColors {
    pub background: String,
    pub word_colors: Vec<String>,
    pub highlight_color: String,
}

impl Default for CloudColors {
    fn default() -> Self {
        Self {
            background: "#ffffff".to_string(),
            word_colors: [
                "#2563eb", "#3b82f6", "#60a5fa", "#93c5fd", "#bfdbfe", "#1d4ed8",
            ]
            .iter()
            .map(|c| c.to_string())
            .collect(),
            highlight_color: "#1e40af".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    #[default]
    Fixed,
    Blue,
    Rainbow,
    Tiered,
    Palette,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    pub spiral: Spiral,
    pub rotation: RotationConfig,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            padding: 3,
            spiral: Spiral::Archimedean,
            rotation: RotationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Spiral {
    #[default]
    Archimedean,
    Rectangular,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub angles: Vec<i32>,
    pub random: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        // Mostly horizontal
        Self {
            angles: vec![0, 0, 0, 90],
            random: true,
        }
    }
}

/// Heuristic tables for noise removal and emphasis. Tuned for a Japanese
/// team channel; replace per deployment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub stop_words: Vec<String>,
    pub bot_patterns: Vec<String>,
    pub emphasis: BTreeMap<String, f64>,
    pub short_word_boost: ShortWordBoost,
    pub max_items: usize,
    pub min_count: u64,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            stop_words: to_strings(&[
                "cc", "CC", "様", "さん", "こと", "ため", "http", "https", "の", "に", "は",
                "を", "が", "と", "で", "た", "です", "ます", "した", "する", "ある", "いる",
                "なる", "できる", "思う", "これ", "それ", "この", "その", "あの", "リマインダー",
                "議事録", "Figma", "google", "doc",
            ]),
            bot_patterns: to_strings(&[
                "リマインダー",
                "さんがチャンネルに参加しました",
                "http",
                "https",
                "議事録はこちら",
                "google",
                "doc",
                "Figma",
                "file",
            ]),
            emphasis: [
                ("始めます！", 2.0),
                ("アジェンダ", 1.8),
                ("定例", 1.6),
                ("議題", 1.6),
                ("スキップ", 1.4),
                ("確認", 1.3),
                ("よろしく", 1.3),
                ("お願い", 1.3),
            ]
            .iter()
            .map(|(word, factor)| (word.to_string(), *factor))
            .collect(),
            short_word_boost: ShortWordBoost::default(),
            max_items: 100,
            min_count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShortWordBoost {
    pub min_len: usize,
    pub max_len: usize,
    pub factor: f64,
}

impl Default for ShortWordBoost {
    fn default() -> Self {
        Self {
            min_len: 3,
            max_len: 4,
            factor: 1.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub include_numbers: bool,
    pub case_sensitive: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            include_numbers: true,
            case_sensitive: true,
        }
    }
}

/// Which chat rows are counted at all.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterOptions {
    /// Matched against both user id and username.
    pub exclude_users: Vec<String>,
    pub date_range: Option<DateRange>,
    pub include_thread_replies: bool,
}

impl Default for FilterOptions {
    fn default() -> Self {
        Self {
            exclude_users: Vec::new(),
            date_range: None,
            include_thread_replies: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, at: &DateTime<Utc>) -> bool {
        &self.start <= at && at <= &self.end
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Settings for exporting a Slack channel to CSV.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    pub output_dir: PathBuf,
    /// Write the ThreadTS column.
    pub include_thread: bool,
    /// IANA zone used for the timestamp in export file names.
    pub time_zone: String,
    /// Minimum gap between two API calls.
    pub rate_limit_ms: u64,
    pub page_size: u32,
    /// Retries after an HTTP 429 before giving up.
    pub max_retries: u32,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("data"),
            include_thread: true,
            time_zone: "Asia/Tokyo".to_string(),
            rate_limit_ms: 1000,
            page_size: 100,
            max_retries: 3,
        }
    }
}

impl SlackConfig {
    pub fn tz(&self) -> Result<Tz> {
        self.time_zone
            .parse::<Tz>()
            .map_err(|_| anyhow!("unknown time zone {:?}", self.time_zone))
    }
}

impl Config {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chatcloud").join("config.toml"))
    }

    /// Load from an explicit path, or from the default location when it
    /// exists, or fall back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(default_path) => Self::from_file(&default_path)?,
                None => Self::default(),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.cloud.min_font_size > self.cloud.max_font_size {
            bail!(
                "min_font_size ({}) is larger than max_font_size ({})",
                self.cloud.min_font_size,
                self.cloud.max_font_size
            );
        }
        if self.layout.rotation.angles.is_empty() {
            bail!("layout.rotation.angles must contain at least one angle");
        }
        if self.policy.max_items == 0 {
            bail!("policy.max_items must be at least 1");
        }
        if self.cloud.color_scheme == ColorScheme::Palette && self.cloud.colors.word_colors.is_empty()
        {
            bail!("the palette color scheme needs cloud.colors.word_colors");
        }
        if let Some(range) = &self.filter.date_range {
            if range.start > range.end {
                bail!("filter.date_range starts after it ends");
            }
        }
        for (word, factor) in &self.policy.emphasis {
            if !is_positive_factor(*factor) {
                bail!("policy.emphasis factor for {word:?} must be a positive number, got {factor}");
            }
        }
        if !is_positive_factor(self.policy.short_word_boost.factor) {
            bail!(
                "policy.short_word_boost.factor must be a positive number, got {}",
                self.policy.short_word_boost.factor
            );
        }
        if !(1..=1000).contains(&self.slack.page_size) {
            bail!("slack.page_size must be between 1 and 1000");
        }
        self.slack.tz()?;
        Ok(())
    }
}

fn is_positive_factor(factor: f64) -> bool {
    factor.is_finite() && factor > 0.0
}

fn to_strings(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_string()).collect()
}
