use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::{AnalysisConfig, FilterOptions};
use crate::sources::{RawMessageRecord, StyledWordRecord, UploadData};

/// Word text -> cumulative occurrences.
pub type WordCountMap = HashMap<String, u64>;
/// Word text -> color override.
pub type WordStyleMap = HashMap<String, String>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    pub records: usize,
    pub skipped_records: usize,
    pub tokens: u64,
    pub new_words: usize,
}

/// Decides which chat rows are counted.
#[derive(Debug, Clone, Default)]
pub struct MessageFilter {
    options: FilterOptions,
}

impl MessageFilter {
    pub fn new(options: FilterOptions) -> Self {
        Self { options }
    }

    pub fn accepts(&self, record: &RawMessageRecord) -> bool {
        if self
            .options
            .exclude_users
            .iter()
            .any(|user| user == &record.user_id || user == &record.username)
        {
            return false;
        }

        if !self.options.include_thread_replies && record.is_thread_reply() {
            return false;
        }

        match &self.options.date_range {
            // Rows without a usable timestamp cannot be placed in a range
            Some(range) => record.sent_at().is_some_and(|at| range.contains(&at)),
            None => true,
        }
    }
}

/// Splits a message on whitespace runs. Repeats are kept.
pub fn tokenize(message: &str) -> impl Iterator<Item = &str> {
    message.split_whitespace()
}

fn word_key<'a>(word: &'a str, analysis: &AnalysisConfig) -> Cow<'a, str> {
    let word = word.trim();
    if analysis.case_sensitive {
        Cow::Borrowed(word)
    } else {
        Cow::Owned(word.to_lowercase())
    }
}

fn is_number(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || ('０'..='９').contains(&c))
}

/// Folds chat rows into a copy of `counts`; the input snapshot is untouched.
pub fn merge_messages(
    counts: &WordCountMap,
    records: &[RawMessageRecord],
    filter: &MessageFilter,
    analysis: &AnalysisConfig,
) -> (WordCountMap, MergeStats) {
    let mut merged = counts.clone();
    let mut stats = MergeStats {
        records: records.len(),
        ..MergeStats::default()
    };

    for record in records {
        if !filter.accepts(record) {
            stats.skipped_records += 1;
            continue;
        }

        for token in tokenize(&record.message) {
            if !analysis.include_numbers && is_number(token) {
                continue;
            }

            let key = word_key(token, analysis);
            match merged.get_mut(key.as_ref()) {
                Some(count) => *count = count.saturating_add(1),
                None => {
                    merged.insert(key.into_owned(), 1);
                    stats.new_words += 1;
                }
            }
            stats.tokens = stats.tokens.saturating_add(1);
        }
    }

    (merged, stats)
}

/// Adds styled counts (additive, saturating at `u64::MAX`) and records their
/// colors (last write wins).
pub fn merge_styled(
    counts: &WordCountMap,
    styles: &WordStyleMap,
    records: &[StyledWordRecord],
    analysis: &AnalysisConfig,
) -> (WordCountMap, WordStyleMap, MergeStats) {
    let mut merged_counts = counts.clone();
    let mut merged_styles = styles.clone();
    let mut stats = MergeStats {
        records: records.len(),
        ..MergeStats::default()
    };

    for record in records {
        let key = word_key(&record.text, analysis);
        if key.is_empty() {
            stats.skipped_records += 1;
            continue;
        }

        merged_styles.insert(key.to_string(), record.color.clone());
        match merged_counts.get_mut(key.as_ref()) {
            Some(count) => *count = count.saturating_add(record.count),
            None => {
                merged_counts.insert(key.into_owned(), record.count);
                stats.new_words += 1;
            }
        }
        stats.tokens = stats.tokens.saturating_add(record.count);
    }

    (merged_counts, merged_styles, stats)
}

/// Session-scoped aggregate. Owns the only writable handle to the maps;
/// readers get immutable snapshots that later uploads never modify.
#[derive(Debug, Clone, Default)]
pub struct Session {
    counts: Arc<WordCountMap>,
    styles: Arc<WordStyleMap>,
    revision: u64,
    analysis: AnalysisConfig,
    filter: MessageFilter,
}

impl Session {
    pub fn new(analysis: AnalysisConfig, filter: MessageFilter) -> Self {
        Self {
            analysis,
            filter,
            ..Self::default()
        }
    }

    pub fn apply(&mut self, upload: &UploadData) -> MergeStats {
        let stats = match upload {
            UploadData::Messages(records) => {
                let (counts, stats) =
                    merge_messages(&self.counts, records, &self.filter, &self.analysis);
                self.counts = Arc::new(counts);
                stats
            }
            UploadData::StyledWords(records) => {
                let (counts, styles, stats) =
                    merge_styled(&self.counts, &self.styles, records, &self.analysis);
                self.counts = Arc::new(counts);
                self.styles = Arc::new(styles);
                stats
            }
        };
        self.revision += 1;

        debug!(
            kind = upload.kind(),
            records = stats.records,
            skipped = stats.skipped_records,
            tokens = stats.tokens,
            new_words = stats.new_words,
            distinct_words = self.counts.len(),
            revision = self.revision,
            "merged upload into session"
        );
        stats
    }

    pub fn clear(&mut self) {
        self.counts = Arc::default();
        self.styles = Arc::default();
        self.revision += 1;
    }

    pub fn counts(&self) -> Arc<WordCountMap> {
        Arc::clone(&self.counts)
    }

    pub fn styles(&self) -> Arc<WordStyleMap> {
        Arc::clone(&self.styles)
    }

    /// Bumped on every change; equal revisions mean equal maps.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn total_occurrences(&self) -> u64 {
        self.counts
            .values()
            .fold(0u64, |total, &count| total.saturating_add(count))
    }
}
