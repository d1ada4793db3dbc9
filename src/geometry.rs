//! Axis-aligned box geometry shared by post-processing and distance estimation.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// A box in pixel coordinates, `(x1, y1)` top-left and `(x2, y2)` bottom-right.
///
/// Serializes as `[x1, y1, x2, y2]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    x1: f32,
    y1: f32,
    x2: f32,
    y2: f32,
}

impl BoundingBox {
    /// Build a box, rejecting inverted or non-finite coordinates.
    ///
    /// Zero width or height is accepted; such boxes have zero area and IoU 0.
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self> {
        if ![x1, y1, x2, y2].iter().all(|v| v.is_finite()) {
            return Err(anyhow!(
                "box coordinates must be finite: ({}, {}, {}, {})",
                x1,
                y1,
                x2,
                y2
            ));
        }
        if x2 < x1 || y2 < y1 {
            return Err(anyhow!(
                "malformed box ({}, {}, {}, {}): expected x1 <= x2 and y1 <= y2",
                x1,
                y1,
                x2,
                y2
            ));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn x1(&self) -> f32 {
        self.x1
    }

    pub fn y1(&self) -> f32 {
        self.y1
    }

    pub fn x2(&self) -> f32 {
        self.x2
    }

    pub fn y2(&self) -> f32 {
        self.y2
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    pub fn center(&self) -> (f32, f32) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    /// Box area relative to an image of `width × height` pixels.
    pub fn area_ratio(&self, width: u32, height: u32) -> f32 {
        let image_area = width as f32 * height as f32;
        if image_area <= 0.0 {
            return 0.0;
        }
        self.area() / image_area
    }

    /// True when any side lies within `margin` pixels of the image border.
    pub fn near_edge(&self, width: u32, height: u32, margin: f32) -> bool {
        self.x1 < margin
            || self.y1 < margin
            || self.x2 > width as f32 - margin
            || self.y2 > height as f32 - margin
    }

    pub fn as_array(&self) -> [f32; 4] {
        [self.x1, self.y1, self.x2, self.y2]
    }
}

impl TryFrom<[f32; 4]> for BoundingBox {
    type Error = anyhow::Error;

    fn try_from(value: [f32; 4]) -> Result<Self> {
        Self::new(value[0], value[1], value[2], value[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(value: BoundingBox) -> Self {
        value.as_array()
    }
}

/// Intersection-over-union of two boxes.
///
/// Returns 0.0 for disjoint or touching boxes and whenever the union is empty.
pub fn compute_iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = a.x2.min(b.x2) - a.x1.max(b.x1);
    let inter_h = a.y2.min(b.y2) - a.y1.max(b.y1);
    if inter_w <= 0.0 || inter_h <= 0.0 {
        return 0.0;
    }

    let inter = inter_w * inter_h;
    let union = a.area() + b.area() - inter;
    if union <= 0.0 {
        return 0.0;
    }
    inter / union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bx(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let a = bx(10.0, 20.0, 110.0, 70.0);
        assert_eq!(compute_iou(&a, &a), 1.0);
    }

    #[test]
    fn iou_is_symmetric() {
        let pairs = [
            (bx(0.0, 0.0, 100.0, 100.0), bx(5.0, 5.0, 105.0, 105.0)),
            (bx(0.0, 0.0, 40.0, 10.0), bx(30.0, 0.0, 60.0, 25.0)),
            (bx(3.0, 4.0, 9.0, 9.0), bx(0.0, 0.0, 100.0, 100.0)),
        ];
        for (a, b) in pairs {
            assert_eq!(compute_iou(&a, &b), compute_iou(&b, &a));
        }
    }

    #[test]
    fn disjoint_boxes_have_zero_iou() {
        let a = bx(0.0, 0.0, 10.0, 10.0);
        let b = bx(20.0, 20.0, 30.0, 30.0);
        assert_eq!(compute_iou(&a, &b), 0.0);

        // Sharing only an edge is not an overlap.
        let c = bx(10.0, 0.0, 20.0, 10.0);
        assert_eq!(compute_iou(&a, &c), 0.0);
    }

    #[test]
    fn partial_overlap_matches_hand_computation() {
        let a = bx(0.0, 0.0, 100.0, 100.0);
        let b = bx(5.0, 5.0, 105.0, 105.0);
        let expected = 9025.0 / (20000.0 - 9025.0);
        assert!((compute_iou(&a, &b) - expected).abs() < 1e-6);
    }

    #[test]
    fn zero_area_boxes_yield_zero() {
        let line = bx(5.0, 5.0, 5.0, 50.0);
        let point = bx(5.0, 5.0, 5.0, 5.0);
        assert_eq!(compute_iou(&line, &line), 0.0);
        assert_eq!(compute_iou(&point, &bx(0.0, 0.0, 10.0, 10.0)), 0.0);
    }

    #[test]
    fn inverted_and_non_finite_boxes_are_rejected() {
        assert!(BoundingBox::new(10.0, 0.0, 5.0, 10.0).is_err());
        assert!(BoundingBox::new(0.0, 10.0, 5.0, 2.0).is_err());
        assert!(BoundingBox::new(f32::NAN, 0.0, 5.0, 10.0).is_err());
        assert!(BoundingBox::new(0.0, 0.0, f32::INFINITY, 10.0).is_err());
    }

    #[test]
    fn area_ratio_and_edge_checks() {
        let b = bx(100.0, 100.0, 200.0, 200.0);
        assert!((b.area_ratio(1000, 1000) - 0.01).abs() < 1e-7);
        assert_eq!(b.area_ratio(0, 0), 0.0);
        assert!(!b.near_edge(640, 480, 10.0));
        assert!(bx(2.0, 100.0, 50.0, 200.0).near_edge(640, 480, 10.0));
        assert!(bx(100.0, 100.0, 635.0, 200.0).near_edge(640, 480, 10.0));
    }

    #[test]
    fn serializes_as_coordinate_array() {
        let b = bx(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");
        let parsed: BoundingBox = serde_json::from_str("[1,2,3,4]").unwrap();
        assert_eq!(parsed, b);
        assert!(serde_json::from_str::<BoundingBox>("[4,2,3,4]").is_err());
    }
}
