//! Optional checkbox glyph detection.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::page::PageImage;

/// Pixel-space box, top-left to bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

/// One detected checkbox mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedCheckbox {
    pub bounding_box: BoundingBox,

    /// Detector label or class name
    pub label: String,

    pub is_selected: bool,
    pub confidence: f32,
}

/// Finds checkbox glyphs on a page image.
///
/// Detections are hints for the checkbox prompt; the model still decides
/// which labels are selected.
#[async_trait]
pub trait CheckboxDetector: Send + Sync {
    async fn detect(&self, image: &PageImage) -> Result<Vec<DetectedCheckbox>>;
}

/// Sort detections left-to-right, then top-to-bottom.
pub fn sort_detections(detections: &mut [DetectedCheckbox]) {
    detections.sort_by(|a, b| {
        a.bounding_box
            .x1
            .total_cmp(&b.bounding_box.x1)
            .then(a.bounding_box.y1.total_cmp(&b.bounding_box.y1))
    });
}
