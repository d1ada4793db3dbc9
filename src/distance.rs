//! Depth-to-distance conversion with fixture-type calibration.
//!
//! Relative depth inside each detection box is reduced to a single value
//! (`0.7 × median + 0.3 × mean`), then remapped onto a distance range chosen
//! from the fixture label and vertical position. The remap is linear over the
//! first 30% of depth and log-compressed over the rest, which keeps resolution
//! near the camera. Box size nudges the result before it is clamped.

use crate::camera::CameraParams;
use crate::depth::{median_and_mean, DepthMap};
use crate::detect::{Detection, DetectionWithDistance, PositionHint};

const MEDIAN_WEIGHT: f32 = 0.7;
const MEAN_WEIGHT: f32 = 0.3;

/// Depth below which the mapping is linear.
const LINEAR_DEPTH_SPLIT: f32 = 0.3;

const LARGE_BOX_RATIO: f32 = 0.15;
const LARGE_BOX_FACTOR: f32 = 0.85;
const SMALL_BOX_RATIO: f32 = 0.02;
const SMALL_BOX_FACTOR: f32 = 1.15;

/// Calibrated distance bounds in meters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DistanceRange {
    pub min: f32,
    pub max: f32,
}

impl DistanceRange {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    pub fn span(&self) -> f32 {
        self.max - self.min
    }

    pub fn clamp(&self, value: f32) -> f32 {
        value.max(self.min).min(self.max)
    }

    pub fn contains(&self, value: f32) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Fixture families, in keyword-matching priority order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FixtureCategory {
    /// Ceiling-mounted or hanging.
    Overhead,
    Wall,
    /// Table, desk and floor lamps.
    Freestanding,
    /// Spot, track and can lights.
    Spot,
    Generic,
}

const CATEGORY_KEYWORDS: &[(FixtureCategory, &[&str])] = &[
    (
        FixtureCategory::Overhead,
        &[
            "ceiling",
            "chandelier",
            "pendant",
            "hanging",
            "recessed",
            "downlight",
        ],
    ),
    (FixtureCategory::Wall, &["wall", "sconce"]),
    (
        FixtureCategory::Freestanding,
        &["table", "desk", "floor", "standing"],
    ),
    (FixtureCategory::Spot, &["spotlight", "track", "can", "pot"]),
];

impl FixtureCategory {
    /// Case-insensitive substring match; the first matching family wins.
    pub fn from_label(label: &str) -> Self {
        let label = label.to_lowercase();
        CATEGORY_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|kw| label.contains(kw)))
            .map(|(category, _)| *category)
            .unwrap_or(FixtureCategory::Generic)
    }

    /// Typical distance range given the box center's vertical ratio.
    pub fn range(self, rel_y: f32) -> DistanceRange {
        match self {
            FixtureCategory::Overhead if rel_y < 0.4 => DistanceRange::new(2.0, 4.5),
            FixtureCategory::Overhead => DistanceRange::new(1.5, 4.0),
            FixtureCategory::Wall => DistanceRange::new(1.0, 3.5),
            FixtureCategory::Freestanding if rel_y > 0.6 => DistanceRange::new(0.5, 2.5),
            FixtureCategory::Freestanding => DistanceRange::new(1.0, 3.0),
            FixtureCategory::Spot => DistanceRange::new(1.5, 4.0),
            FixtureCategory::Generic => DistanceRange::new(0.8, 4.5),
        }
    }
}

/// Range for `label` at `rel_y`, with caller overrides applied per bound.
///
/// A single override lying beyond the category's opposite bound collapses the
/// range onto the override, so `min <= max` always holds.
pub fn select_range(label: &str, rel_y: f32, params: &CameraParams) -> DistanceRange {
    let range = FixtureCategory::from_label(label).range(rel_y);
    let mut min = params.min_distance.unwrap_or(range.min);
    let mut max = params.max_distance.unwrap_or(range.max);
    if min > max {
        if params.min_distance.is_some() {
            max = min;
        } else {
            min = max;
        }
    }
    DistanceRange::new(min, max)
}

/// Reduce ROI depth to one value; `None` when empty or any value is non-finite.
pub fn combined_depth(roi: &[f32]) -> Option<f32> {
    if roi.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let (median, mean) = median_and_mean(roi)?;
    Some(MEDIAN_WEIGHT * median + MEAN_WEIGHT * mean)
}

/// Map normalized depth onto `range` without box-size adjustment or clamping.
pub fn map_depth(depth: f32, range: DistanceRange) -> f32 {
    let span = range.span();
    if depth < LINEAR_DEPTH_SPLIT {
        range.min + depth * span / LINEAR_DEPTH_SPLIT
    } else {
        let t = (depth - LINEAR_DEPTH_SPLIT) / (1.0 - LINEAR_DEPTH_SPLIT);
        range.min
            + LINEAR_DEPTH_SPLIT * span
            + (1.0 - LINEAR_DEPTH_SPLIT) * span * ((2.0 * t).ln_1p() / 2.0f32.ln_1p())
    }
}

/// Large boxes are likely close, small ones far.
pub fn box_size_factor(area_ratio: f32) -> f32 {
    if area_ratio > LARGE_BOX_RATIO {
        LARGE_BOX_FACTOR
    } else if area_ratio < SMALL_BOX_RATIO {
        SMALL_BOX_FACTOR
    } else {
        1.0
    }
}

/// Attach distance estimates to `detections`.
///
/// Returns `None` when there is no usable depth (absent, or no finite value),
/// in which case callers keep the detections as they are. `image_size` is
/// `(width, height)` of the source image; the depth map height is used when
/// it is absent.
pub fn attach_distances(
    depth_map: Option<&DepthMap>,
    detections: &[Detection],
    image_size: Option<(u32, u32)>,
    params: &CameraParams,
) -> Option<Vec<DetectionWithDistance>> {
    let depth_map = depth_map?;
    if detections.is_empty() {
        return Some(Vec::new());
    }
    if !depth_map.has_finite_values() {
        log::warn!("depth map has no finite values; skipping distance estimation");
        return None;
    }

    let image_height = image_size
        .map(|(_, h)| h)
        .unwrap_or_else(|| depth_map.height()) as f32;
    let depth_area = depth_map.width() as f32 * depth_map.height() as f32;

    Some(
        detections
            .iter()
            .map(|det| estimate_one(depth_map, det, image_height, depth_area, params))
            .collect(),
    )
}

fn estimate_one(
    depth_map: &DepthMap,
    det: &Detection,
    image_height: f32,
    depth_area: f32,
    params: &CameraParams,
) -> DetectionWithDistance {
    // Pixel-grid coordinates, truncated like an integer cast.
    let x1 = det.bbox.x1() as i64;
    let y1 = det.bbox.y1() as i64;
    let x2 = det.bbox.x2() as i64;
    let y2 = det.bbox.y2() as i64;

    let roi = depth_map.roi(x1, y1, x2, y2);
    let Some(depth) = combined_depth(&roi) else {
        log::debug!(
            "no usable depth for '{}' at {:?}",
            det.label,
            det.bbox.as_array()
        );
        return DetectionWithDistance::unmeasured(det);
    };

    // Sums and products in f64; truncated coordinates may be near i64 limits.
    let center_y = ((y1 as f64 + y2 as f64) / 2.0) as f32;
    let rel_y = center_y / image_height;
    let range = select_range(&det.label, rel_y, params);

    let box_area = (x2 as f64 - x1 as f64) * (y2 as f64 - y1 as f64);
    let area_ratio = (box_area / depth_area as f64) as f32;
    let distance = range.clamp(map_depth(depth, range) * box_size_factor(area_ratio));

    let position = params.intrinsics.map(|k| {
        let center_x = ((x1 as f64 + x2 as f64) / 2.0) as f32;
        k.back_project(center_x, center_y, distance)
    });

    log::debug!(
        "'{}' depth={:.3} rel_y={:.3} range=[{}, {}] -> {:.2} m",
        det.label,
        depth,
        rel_y,
        range.min,
        range.max,
        distance
    );

    DetectionWithDistance {
        detection: det.clone(),
        distance: Some(distance),
        depth_value: Some(depth),
        distance_range: Some((range.min, range.max)),
        position_hint: Some(PositionHint::from_relative_y(rel_y)),
        position,
    }
}
