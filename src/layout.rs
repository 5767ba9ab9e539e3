use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cloud::DisplayItem;
use crate::config::{LayoutConfig, RotationConfig, Spiral};
use crate::util::stable_index;

/// Layout area relative to the larger canvas side.
const LAYOUT_SCALE: f64 = 1.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutWord {
    pub text: String,
    pub font_size: u32,
    pub rotate: i32,
}

/// Everything a spiral placer needs; serializable so an external layout
/// engine can be fed from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRequest {
    pub width: u32,
    pub height: u32,
    pub padding: u32,
    pub spiral: Spiral,
    pub words: Vec<LayoutWord>,
}

impl LayoutRequest {
    pub fn new(items: &[DisplayItem], config: &LayoutConfig) -> Self {
        let side = (config.width.max(config.height) as f64 * LAYOUT_SCALE).round() as u32;

        Self {
            width: side,
            height: side,
            padding: config.padding,
            spiral: config.spiral,
            words: items
                .iter()
                .map(|item| LayoutWord {
                    text: item.text.clone(),
                    font_size: item.font_size,
                    rotate: item
                        .rotate
                        .unwrap_or_else(|| pick_rotation(&item.text, &config.rotation)),
                })
                .collect(),
        }
    }
}

/// Final position of one word, centered on the layout origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedWord {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub rotate: i32,
    pub font_size: u32,
}

/// A display item together with where the layout put it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlacedItem {
    #[serde(flatten)]
    pub item: DisplayItem,
    pub x: f64,
    pub y: f64,
}

/// Collision-free placement of sized words. Words that do not fit may be
/// left out of the result; that is not an error.
#[async_trait]
pub trait LayoutAdapter: Send + Sync {
    async fn place(&self, request: &LayoutRequest) -> Result<Vec<PlacedWord>>;
}

/// Random mode picks per word but stays stable for the same text.
pub fn pick_rotation(word: &str, rotation: &RotationConfig) -> i32 {
    let index = if rotation.random {
        stable_index(word, rotation.angles.len())
    } else {
        0
    };
    rotation.angles.get(index).copied().unwrap_or(0)
}

/// Fixes a rotation on every item that does not have one yet.
pub fn assign_rotations(items: &mut [DisplayItem], rotation: &RotationConfig) {
    for item in items.iter_mut().filter(|item| item.rotate.is_none()) {
        item.rotate = Some(pick_rotation(&item.text, rotation));
    }
}

/// Joins placements back onto the items that were supplied. Placements for
/// unknown words are ignored, items without a placement are dropped.
pub fn reconcile(items: &[DisplayItem], placed: &[PlacedWord]) -> Vec<PlacedItem> {
    let by_text: HashMap<&str, &DisplayItem> =
        items.iter().map(|item| (item.text.as_str(), item)).collect();

    let result: Vec<PlacedItem> = placed
        .iter()
        .filter_map(|word| {
            let item = by_text.get(word.text.as_str())?;
            Some(PlacedItem {
                item: DisplayItem {
                    rotate: Some(word.rotate),
                    ..(*item).clone()
                },
                x: word.x,
                y: word.y,
            })
        })
        .collect();

    let unknown = placed.len().saturating_sub(result.len());
    if unknown > 0 {
        warn!(unknown, "layout returned words that were not requested");
    }
    if result.len() < items.len() {
        debug!(
            requested = items.len(),
            placed = result.len(),
            "layout dropped words that did not fit"
        );
    }

    result
}

pub async fn lay_out(
    adapter: &dyn LayoutAdapter,
    items: &[DisplayItem],
    config: &LayoutConfig,
) -> Result<Vec<PlacedItem>> {
    let request = LayoutRequest::new(items, config);
    let placed = adapter.place(&request).await?;
    Ok(reconcile(items, &placed))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(text: &str, font_size: u32) -> DisplayItem {
        DisplayItem {
            text: text.to_string(),
            count: 1,
            font_size,
            color: "#000000".to_string(),
            importance: 1.0,
            rotate: None,
        }
    }

    /// Lines words up on the x axis and gives up after `capacity` words.
    struct RowLayout {
        capacity: usize,
    }

    #[async_trait]
    impl LayoutAdapter for RowLayout {
        async fn place(&self, request: &LayoutRequest) -> Result<Vec<PlacedWord>> {
            Ok(request
                .words
                .iter()
                .take(self.capacity)
                .enumerate()
                .map(|(i, word)| PlacedWord {
                    text: word.text.clone(),
                    x: i as f64 * 100.0,
                    y: 0.0,
                    rotate: word.rotate,
                    font_size: word.font_size,
                })
                .collect())
        }
    }

    struct FailingLayout;

    #[async_trait]
    impl LayoutAdapter for FailingLayout {
        async fn place(&self, _request: &LayoutRequest) -> Result<Vec<PlacedWord>> {
            Err(anyhow::anyhow!("layout engine unavailable"))
        }
    }

    #[test]
    fn test_request_uses_enlarged_square_area() {
        let config = LayoutConfig::default();
        let request = LayoutRequest::new(&[item("会議", 20)], &config);

        assert_eq!(request.width, 1200);
        assert_eq!(request.height, 1200);
        assert_eq!(request.padding, 3);
        assert_eq!(request.words[0].font_size, 20);
    }

    #[test]
    fn test_fixed_rotation_uses_first_angle() {
        let rotation = RotationConfig {
            angles: vec![45, 90],
            random: false,
        };
        assert_eq!(pick_rotation("会議", &rotation), 45);
        assert_eq!(pick_rotation("定例", &rotation), 45);
    }

    #[test]
    fn test_random_rotation_is_from_set_and_stable() {
        let rotation = RotationConfig {
            angles: vec![-90, -45, 0, 45, 90],
            random: true,
        };
        for word in ["会議", "定例", "deploy", "release"] {
            let angle = pick_rotation(word, &rotation);
            assert!(rotation.angles.contains(&angle));
            assert_eq!(angle, pick_rotation(word, &rotation));
        }
    }

    #[test]
    fn test_existing_rotation_is_kept() {
        let mut rotated = item("会議", 20);
        rotated.rotate = Some(90);
        let config = LayoutConfig {
            rotation: RotationConfig {
                angles: vec![0],
                random: false,
            },
            ..LayoutConfig::default()
        };

        let request = LayoutRequest::new(&[rotated], &config);
        assert_eq!(request.words[0].rotate, 90);
    }

    #[test]
    fn test_assign_rotations_fills_only_missing() {
        let rotation = RotationConfig {
            angles: vec![0],
            random: false,
        };
        let mut items = vec![item("会議", 30), item("定例", 20)];
        items[1].rotate = Some(90);

        assign_rotations(&mut items, &rotation);
        assert_eq!(items[0].rotate, Some(0));
        assert_eq!(items[1].rotate, Some(90));
    }

    #[test]
    fn test_reconcile_drops_unplaced_and_unknown() {
        let items = vec![item("会議", 30), item("定例", 20), item("確認", 10)];
        let placed = vec![
            PlacedWord {
                text: "定例".to_string(),
                x: 1.0,
                y: 2.0,
                rotate: 90,
                font_size: 20,
            },
            PlacedWord {
                text: "ghost".to_string(),
                x: 0.0,
                y: 0.0,
                rotate: 0,
                font_size: 10,
            },
        ];

        let result = reconcile(&items, &placed);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].item.text, "定例");
        assert_eq!(result[0].item.rotate, Some(90));
        assert_eq!((result[0].x, result[0].y), (1.0, 2.0));
    }

    #[tokio::test]
    async fn test_lay_out_accepts_fewer_words() {
        let items = vec![item("会議", 30), item("定例", 20), item("確認", 10)];
        let placed = lay_out(&RowLayout { capacity: 2 }, &items, &LayoutConfig::default())
            .await
            .unwrap();

        assert_eq!(placed.len(), 2);
        assert_eq!(placed[0].item.text, "会議");
        assert_eq!(placed[1].x, 100.0);
    }

    #[tokio::test]
    async fn test_lay_out_propagates_adapter_errors() {
        let items = vec![item("会議", 30)];
        let result = lay_out(&FailingLayout, &items, &LayoutConfig::default()).await;
        assert!(result.is_err());
    }

    #[test]
    fn test_placed_item_json_is_flat() {
        let placed = PlacedItem {
            item: item("会議", 30),
            x: 1.5,
            y: -2.0,
        };
        let json = serde_json::to_value(&placed).unwrap();
        assert_eq!(json["text"], "会議");
        assert_eq!(json["fontSize"], 30);
        assert_eq!(json["x"], 1.5);
    }
}
