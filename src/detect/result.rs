use serde::{Deserialize, Serialize};

use crate::camera::CameraPoint;
use crate::geometry::BoundingBox;

/// One detector hit before post-processing.
///
/// `label` indexes the query list the detector was called with.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawDetection {
    #[serde(rename = "box")]
    pub bbox: [f32; 4],
    pub score: f32,
    pub label: usize,
}

/// A post-processed light fixture detection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub label: String,
}

/// Coarse vertical placement of a detection in the frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionHint {
    Upper,
    Middle,
    Lower,
}

impl PositionHint {
    /// Classify a vertical position ratio (0 = top of frame, 1 = bottom).
    pub fn from_relative_y(rel_y: f32) -> Self {
        if rel_y < 0.4 {
            PositionHint::Upper
        } else if rel_y < 0.6 {
            PositionHint::Middle
        } else {
            PositionHint::Lower
        }
    }
}

/// A detection enriched with a distance estimate.
///
/// When the box has no usable depth region only `distance` is emitted (as null);
/// the remaining measurement fields stay absent.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionWithDistance {
    #[serde(flatten)]
    pub detection: Detection,
    pub distance: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depth_value: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_range: Option<(f32, f32)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position_hint: Option<PositionHint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<CameraPoint>,
}

impl DetectionWithDistance {
    /// Copy of `detection` carrying no measurement.
    pub fn unmeasured(detection: &Detection) -> Self {
        Self {
            detection: detection.clone(),
            distance: None,
            depth_value: None,
            distance_range: None,
            position_hint: None,
            position: None,
        }
    }
}
