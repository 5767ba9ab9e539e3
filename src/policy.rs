use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use regex::Regex;

use crate::aggregate::{WordCountMap, WordStyleMap};
use crate::cloud::{CloudBuilder, CountRange, DisplayItem};
use crate::config::{PolicyConfig, ShortWordBoost};
use crate::util::char_len;

/// ASCII and full-width punctuation, CJK marks, quotes and the middle dot.
const PUNCTUATION_CLASS: &str = r#"[!-/:-@\[-`{-~！-／：-＠［-｀｛-～、-〜"'・]"#;

/// Ranking signal: longer and more frequent words rank first. Never
/// feeds back into stored counts.
pub fn importance(word: &str, count: f64) -> f64 {
    let length_weight = match char_len(word) {
        0..=1 => 0.5,
        2 => 0.8,
        _ => 1.0,
    };
    length_weight * (count.max(0.0) + 1.0).log10()
}

/// Noise removal, emphasis and truncation, driven entirely by
/// [`PolicyConfig`] tables.
#[derive(Debug, Clone)]
pub struct ScoringPolicy {
    stop_words: HashSet<String>,
    bot_patterns: Vec<String>,
    emphasis: HashMap<String, f64>,
    short_word_boost: ShortWordBoost,
    max_items: usize,
    min_count: u64,
    punctuation_only: Regex,
}

impl ScoringPolicy {
    pub fn new(config: &PolicyConfig) -> Result<Self, regex::Error> {
        Ok(Self {
            stop_words: config.stop_words.iter().cloned().collect(),
            bot_patterns: config
                .bot_patterns
                .iter()
                .filter(|p| !p.is_empty())
                .cloned()
                .collect(),
            emphasis: config
                .emphasis
                .iter()
                .map(|(word, factor)| (word.clone(), *factor))
                .collect(),
            short_word_boost: config.short_word_boost.clone(),
            max_items: config.max_items,
            min_count: config.min_count,
            punctuation_only: Regex::new(&format!("^{PUNCTUATION_CLASS}+$"))?,
        })
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn should_include(&self, word: &str) -> bool {
        let text = word.trim();
        let len = char_len(text);

        if len < 2 || self.stop_words.contains(text) {
            return false;
        }

        if self
            .bot_patterns
            .iter()
            .any(|pattern| text.contains(pattern.as_str()))
        {
            return false;
        }

        !self.punctuation_only.is_match(text)
    }

    /// Multiplier applied to a word's count before it is sized.
    pub fn boost(&self, word: &str) -> f64 {
        let len = char_len(word);
        let boost = &self.short_word_boost;
        let length_factor = if (boost.min_len..=boost.max_len).contains(&len) {
            boost.factor
        } else {
            1.0
        };

        length_factor * self.emphasis.get(word).copied().unwrap_or(1.0)
    }

    /// Filtered, boosted, sized and ranked items, at most `max_items`.
    pub fn rank(
        &self,
        counts: &WordCountMap,
        styles: &WordStyleMap,
        builder: &CloudBuilder,
    ) -> Vec<DisplayItem> {
        let Some(range) = CountRange::of(counts) else {
            return Vec::new();
        };

        let mut scored = counts
            .iter()
            .filter(|&(_, &count)| count >= self.min_count)
            .filter(|(text, _)| self.should_include(text))
            .map(|(text, &count)| {
                let weight = (count as f64 * self.boost(text)).floor();
                (weight, builder.item(text, count, weight, range, styles))
            })
            .collect::<Vec<_>>();

        scored.sort_by(|(wa, a), (wb, b)| {
            b.importance
                .partial_cmp(&a.importance)
                .unwrap_or(Ordering::Equal)
                .then_with(|| wb.partial_cmp(wa).unwrap_or(Ordering::Equal))
                .then_with(|| a.text.cmp(&b.text))
        });
        scored.truncate(self.max_items);

        scored.into_iter().map(|(_, item)| item).collect()
    }
}
