use serde::{Deserialize, Serialize};

use crate::aggregate::{WordCountMap, WordStyleMap};
use crate::config::{CloudConfig, ColorScheme};
use crate::policy::importance;
use crate::util::{char_len, stable_index};

/// A word prepared for drawing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayItem {
    pub text: String,
    /// Aggregated occurrences, never altered by weighting.
    pub count: u64,
    pub font_size: u32,
    pub color: String,
    pub importance: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotate: Option<i32>,
}

/// Smallest and largest count currently in a count map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountRange {
    pub min: u64,
    pub max: u64,
}

impl CountRange {
    pub fn of(counts: &WordCountMap) -> Option<Self> {
        let min = counts.values().copied().min()?;
        let max = counts.values().copied().max()?;
        Some(Self { min, max })
    }

    pub fn is_flat(&self) -> bool {
        self.min == self.max
    }
}

/// Linear interpolation of `count` within `range` onto `min_size..=max_size`.
/// A flat range yields `min_size`.
pub fn font_size(count: f64, range: CountRange, min_size: u32, max_size: u32) -> u32 {
    if range.is_flat() {
        return min_size;
    }

    let span = (range.max - range.min) as f64;
    let size = min_size as f64
        + (count - range.min as f64) * max_size.saturating_sub(min_size) as f64 / span;
    (size.round().max(min_size as f64) as u32).min(max_size)
}

pub struct CloudBuilder {
    config: CloudConfig,
}

impl CloudBuilder {
    pub fn new(config: CloudConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CloudConfig {
        &self.config
    }

    pub fn font_size(&self, count: f64, range: CountRange) -> u32 {
        font_size(
            count,
            range,
            self.config.min_font_size,
            self.config.max_font_size,
        )
    }

    /// Style override first, then the configured scheme.
    pub fn color(&self, word: &str, count: u64, range: CountRange, styles: &WordStyleMap) -> String {
        if let Some(color) = styles.get(word) {
            return color.clone();
        }

        match self.config.color_scheme {
            ColorScheme::Fixed => self.config.default_color.clone(),
            ColorScheme::Blue => {
                let ratio = count as f64 / range.max.max(1) as f64;
                let intensity = (150 + (105.0 * ratio) as u32).min(255);
                format!("#0000{intensity:02x}")
            }
            ColorScheme::Rainbow => {
                let ratio = count as f64 / range.max.max(1) as f64;
                format!("hsl({}, 70%, 50%)", (240.0 * ratio) as u32)
            }
            ColorScheme::Tiered => {
                let ratio = if range.is_flat() {
                    0.0
                } else {
                    count.saturating_sub(range.min) as f64 / (range.max - range.min) as f64
                };
                tier_color(ratio).to_string()
            }
            ColorScheme::Palette => {
                let palette = &self.config.colors.word_colors;
                palette
                    .get(stable_index(word, palette.len()))
                    .cloned()
                    .unwrap_or_else(|| self.config.default_color.clone())
            }
        }
    }

    /// `weight` drives the font size only; importance follows the true count.
    pub fn item(
        &self,
        text: &str,
        count: u64,
        weight: f64,
        range: CountRange,
        styles: &WordStyleMap,
    ) -> DisplayItem {
        DisplayItem {
            text: text.to_string(),
            count,
            font_size: self.font_size(weight, range),
            color: self.color(text, count, range, styles),
            importance: importance(text, count as f64),
            rotate: None,
        }
    }

    /// One item per word of length two or more, largest count first.
    pub fn build(&self, counts: &WordCountMap, styles: &WordStyleMap) -> Vec<DisplayItem> {
        let Some(range) = CountRange::of(counts) else {
            return Vec::new();
        };

        let mut items = counts
            .iter()
            .filter(|(text, _)| char_len(text.trim()) > 1)
            .map(|(text, &count)| self.item(text, count, count as f64, range, styles))
            .collect::<Vec<_>>();

        items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.text.cmp(&b.text)));
        items
    }
}

/// Five frequency bands, hottest first.
fn tier_color(ratio: f64) -> &'static str {
    match ratio {
        r if r >= 0.8 => "#FF0000",
        r if r >= 0.6 => "#FF6600",
        r if r >= 0.4 => "#0066FF",
        r if r >= 0.2 => "#3399FF",
        _ => "#66CCFF",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(&str, u64)]) -> WordCountMap {
        pairs.iter().map(|(w, c)| (w.to_string(), *c)).collect()
    }

    fn builder(scheme: ColorScheme) -> CloudBuilder {
        CloudBuilder::new(CloudConfig {
            color_scheme: scheme,
            ..CloudConfig::default()
        })
    }

    #[test]
    fn test_font_size_endpoints_and_rounding() {
        let range = CountRange { min: 1, max: 11 };
        assert_eq!(font_size(1.0, range, 14, 80), 14);
        assert_eq!(font_size(11.0, range, 14, 80), 80);
        // 14 + 5 * 66 / 10 = 47
        assert_eq!(font_size(6.0, range, 14, 80), 47);
        // 14 + 2 * 6.6 = 27.2
        assert_eq!(font_size(3.0, range, 14, 80), 27);
    }

    #[test]
    fn test_font_size_flat_range_is_min() {
        let range = CountRange { min: 4, max: 4 };
        assert_eq!(font_size(4.0, range, 14, 80), 14);
        assert_eq!(font_size(400.0, range, 14, 80), 14);
    }

    #[test]
    fn test_font_size_is_clamped() {
        let range = CountRange { min: 2, max: 10 };
        assert_eq!(font_size(0.0, range, 14, 80), 14);
        assert_eq!(font_size(25.0, range, 14, 80), 80);
    }

    #[test]
    fn test_font_size_monotonic_in_count() {
        let range = CountRange { min: 1, max: 97 };
        let mut last = 0;
        for count in 0..=120 {
            let size = font_size(count as f64, range, 12, 64);
            assert!(size >= last, "size dropped at count {count}");
            assert!((12..=64).contains(&size));
            last = size;
        }
    }

    #[test]
    fn test_font_size_inverted_bounds_do_not_underflow() {
        let range = CountRange { min: 1, max: 10 };
        assert_eq!(font_size(5.0, range, 40, 20), 20);
        assert_eq!(font_size(1.0, range, 40, 20), 20);
    }

    #[test]
    fn test_item_sizes_by_weight_and_ranks_by_count() {
        let range = CountRange { min: 1, max: 11 };
        let item = builder(ColorScheme::Fixed).item("会議", 1, 11.0, range, &WordStyleMap::new());

        assert_eq!(item.count, 1);
        assert_eq!(item.font_size, 80);
        assert!((item.importance - 0.8 * 2f64.log10()).abs() < 1e-9);
    }

    #[test]
    fn test_build_excludes_single_characters() {
        let map = counts(&[("a", 50), ("の", 40), (" x ", 30), ("会議", 3), ("定例", 9)]);
        let items = builder(ColorScheme::Fixed).build(&map, &WordStyleMap::new());

        let texts: Vec<&str> = items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["定例", "会議"]);
    }

    #[test]
    fn test_build_styled_word() {
        let map = counts(&[("会議", 3)]);
        let mut styles = WordStyleMap::new();
        styles.insert("会議".to_string(), "#111111".to_string());

        let items = builder(ColorScheme::Fixed).build(&map, &styles);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].text, "会議");
        assert_eq!(items[0].count, 3);
        assert_eq!(items[0].color, "#111111");
        // Single word: flat range
        assert_eq!(items[0].font_size, 14);
        assert_eq!(items[0].rotate, None);
    }

    #[test]
    fn test_build_default_color_and_sizes() {
        let map = counts(&[("deploy", 1), ("release", 11)]);
        let items = builder(ColorScheme::Fixed).build(&map, &WordStyleMap::new());

        assert_eq!(items[0].text, "release");
        assert_eq!(items[0].font_size, 80);
        assert_eq!(items[1].font_size, 14);
        assert!(items.iter().all(|i| i.color == "#2563eb"));
    }

    #[test]
    fn test_build_empty_map() {
        let items = builder(ColorScheme::Fixed).build(&WordCountMap::new(), &WordStyleMap::new());
        assert!(items.is_empty());
    }

    #[test]
    fn test_color_schemes() {
        let range = CountRange { min: 1, max: 10 };
        let styles = WordStyleMap::new();

        assert_eq!(builder(ColorScheme::Blue).color("w", 10, range, &styles), "#0000ff");
        assert_eq!(builder(ColorScheme::Blue).color("w", 0, range, &styles), "#000096");
        assert_eq!(
            builder(ColorScheme::Rainbow).color("w", 5, range, &styles),
            "hsl(120, 70%, 50%)"
        );
        assert_eq!(builder(ColorScheme::Tiered).color("w", 10, range, &styles), "#FF0000");
        assert_eq!(builder(ColorScheme::Tiered).color("w", 1, range, &styles), "#66CCFF");
    }

    #[test]
    fn test_palette_pick_is_stable() {
        let range = CountRange { min: 1, max: 10 };
        let styles = WordStyleMap::new();
        let palette = builder(ColorScheme::Palette);

        let first = palette.color("会議", 3, range, &styles);
        assert!(palette.config().colors.word_colors.contains(&first));
        assert_eq!(first, palette.color("会議", 7, range, &styles));
    }

    #[test]
    fn test_display_item_json_shape() {
        let item = DisplayItem {
            text: "会議".to_string(),
            count: 3,
            font_size: 14,
            color: "#111111".to_string(),
            importance: 0.5,
            rotate: None,
        };
        let json = serde_json::to_value(&item).unwrap();
        assert_eq!(json["fontSize"], 14);
        assert!(json.get("rotate").is_none());
    }
}
