//! Raw detector output to a clean, confidence-sorted detection list.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::cmp::Ordering;

use crate::detect::result::{Detection, RawDetection};
use crate::geometry::{compute_iou, BoundingBox};
use crate::vocabulary::resolve_label;

pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.15;
pub const DEFAULT_NMS_THRESHOLD: f32 = 0.5;
pub const DEFAULT_MIN_AREA_RATIO: f32 = 0.001;

/// Order in which candidates enter greedy duplicate suppression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NmsOrder {
    /// Highest confidence first; the most confident of a duplicate group survives.
    #[default]
    Confidence,
    /// Detector emission order; the first-listed of a duplicate group survives.
    Emission,
}

impl NmsOrder {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "confidence" => Ok(NmsOrder::Confidence),
            "emission" => Ok(NmsOrder::Emission),
            other => Err(anyhow!("unknown NMS order '{}'", other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PostProcessOptions {
    /// Threshold forwarded to the detector. Raw input is assumed filtered at it.
    pub confidence_threshold: f32,
    pub use_nms: bool,
    pub nms_threshold: f32,
    pub nms_order: NmsOrder,
    pub min_area_ratio: f32,
    /// Absolute area floor in pixels.
    pub min_box_area: Option<f32>,
    /// Drop boxes covering more than this fraction of the image.
    pub max_box_ratio: Option<f32>,
    /// Drop boxes within this many pixels of the image border.
    pub edge_margin: Option<f32>,
}

impl Default for PostProcessOptions {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            use_nms: true,
            nms_threshold: DEFAULT_NMS_THRESHOLD,
            nms_order: NmsOrder::default(),
            min_area_ratio: DEFAULT_MIN_AREA_RATIO,
            min_box_area: None,
            max_box_ratio: None,
            edge_margin: None,
        }
    }
}

/// Filter, deduplicate and sort raw detections.
///
/// Fails only on malformed raw boxes; an empty result is a normal outcome.
pub fn post_process<S: AsRef<str>>(
    raw: &[RawDetection],
    labels: &[S],
    image_width: u32,
    image_height: u32,
    options: &PostProcessOptions,
) -> Result<Vec<Detection>> {
    let image_area = image_width as f32 * image_height as f32;
    let min_area = options.min_area_ratio * image_area;

    let mut candidates = Vec::with_capacity(raw.len());
    for (idx, hit) in raw.iter().enumerate() {
        let bbox = BoundingBox::try_from(hit.bbox)
            .with_context(|| format!("raw detection #{} has an invalid box", idx))?;
        if !keep_box(&bbox, image_width, image_height, min_area, options) {
            log::debug!(
                "dropping {:?} (area {:.1} px) by size/edge filters",
                bbox.as_array(),
                bbox.area()
            );
            continue;
        }
        candidates.push(Detection {
            bbox,
            confidence: hit.score,
            label: resolve_label(labels, hit.label).to_string(),
        });
    }

    if options.nms_order == NmsOrder::Confidence {
        sort_by_confidence(&mut candidates);
    }

    let mut detections = if options.use_nms {
        suppress_duplicates(candidates, options.nms_threshold)
    } else {
        candidates
    };

    sort_by_confidence(&mut detections);
    log::debug!(
        "post-processing kept {} of {} raw detections",
        detections.len(),
        raw.len()
    );
    Ok(detections)
}

fn keep_box(
    bbox: &BoundingBox,
    image_width: u32,
    image_height: u32,
    min_area: f32,
    options: &PostProcessOptions,
) -> bool {
    let area = bbox.area();
    if area < min_area {
        return false;
    }
    if options.min_box_area.is_some_and(|floor| area < floor) {
        return false;
    }
    if options
        .max_box_ratio
        .is_some_and(|ratio| bbox.area_ratio(image_width, image_height) > ratio)
    {
        return false;
    }
    if options
        .edge_margin
        .is_some_and(|margin| bbox.near_edge(image_width, image_height, margin))
    {
        return false;
    }
    true
}

/// Greedy O(n²) suppression in input order: a candidate overlapping any
/// already accepted box by more than `iou_threshold` is dropped.
fn suppress_duplicates(candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    let mut kept: Vec<Detection> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let duplicate = kept
            .iter()
            .any(|seen| compute_iou(&candidate.bbox, &seen.bbox) > iou_threshold);
        if duplicate {
            log::debug!(
                "suppressing duplicate '{}' at {:?} (conf {:.3})",
                candidate.label,
                candidate.bbox.as_array(),
                candidate.confidence
            );
            continue;
        }
        kept.push(candidate);
    }
    kept
}

fn sort_by_confidence(detections: &mut [Detection]) {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });
}
