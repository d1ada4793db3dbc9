//! Pinhole camera model and distance overrides.

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Intrinsics {
    pub fx: f32,
    pub fy: f32,
    pub cx: f32,
    pub cy: f32,
}

/// A point in the camera frame, meters; z points away from the camera.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraPoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Intrinsics {
    pub fn new(fx: f32, fy: f32, cx: f32, cy: f32) -> Result<Self> {
        let intrinsics = Self { fx, fy, cx, cy };
        intrinsics.validate()?;
        Ok(intrinsics)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.fx.is_finite() && self.fx > 0.0 && self.fy.is_finite() && self.fy > 0.0) {
            return Err(anyhow!(
                "focal lengths must be positive, got fx={} fy={}",
                self.fx,
                self.fy
            ));
        }
        if !(self.cx.is_finite() && self.cy.is_finite()) {
            return Err(anyhow!("principal point must be finite"));
        }
        Ok(())
    }

    /// Lift pixel `(u, v)` to the camera frame at depth `z`.
    pub fn back_project(&self, u: f32, v: f32, z: f32) -> CameraPoint {
        CameraPoint {
            x: (u - self.cx) * z / self.fx,
            y: (v - self.cy) * z / self.fy,
            z,
        }
    }

    /// Project a camera-frame point to pixel coordinates.
    pub fn project(&self, point: &CameraPoint) -> Option<(f32, f32)> {
        if point.z <= 0.0 {
            return None;
        }
        Some((
            self.fx * point.x / point.z + self.cx,
            self.fy * point.y / point.z + self.cy,
        ))
    }
}

/// Caller overrides for distance conversion.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CameraParams {
    /// Replaces the lower bound of every fixture range.
    pub min_distance: Option<f32>,
    /// Replaces the upper bound of every fixture range.
    pub max_distance: Option<f32>,
    /// When set, detections also receive a 3D position.
    pub intrinsics: Option<Intrinsics>,
}

impl CameraParams {
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_distance", self.min_distance),
            ("max_distance", self.max_distance),
        ] {
            if let Some(v) = value {
                if !(v.is_finite() && v > 0.0) {
                    return Err(anyhow!("{} must be a positive number of meters", name));
                }
            }
        }
        if let (Some(min), Some(max)) = (self.min_distance, self.max_distance) {
            if min >= max {
                return Err(anyhow!(
                    "min_distance ({}) must be below max_distance ({})",
                    min,
                    max
                ));
            }
        }
        if let Some(intrinsics) = &self.intrinsics {
            intrinsics.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn back_projection_round_trips_through_projection() {
        let k = Intrinsics::new(525.0, 525.0, 320.0, 240.0).unwrap();
        let p = k.back_project(420.0, 190.0, 2.0);
        assert!((p.x - 100.0 * 2.0 / 525.0).abs() < 1e-6);
        assert!((p.y + 50.0 * 2.0 / 525.0).abs() < 1e-6);
        let (u, v) = k.project(&p).unwrap();
        assert!((u - 420.0).abs() < 1e-3);
        assert!((v - 190.0).abs() < 1e-3);
    }

    #[test]
    fn principal_point_maps_to_optical_axis() {
        let k = Intrinsics::new(500.0, 500.0, 320.0, 240.0).unwrap();
        let p = k.back_project(320.0, 240.0, 3.0);
        assert_eq!(p, CameraPoint { x: 0.0, y: 0.0, z: 3.0 });
        assert!(k.project(&CameraPoint { x: 1.0, y: 0.0, z: 0.0 }).is_none());
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(Intrinsics::new(0.0, 500.0, 1.0, 1.0).is_err());
        assert!(Intrinsics::new(500.0, 500.0, f32::NAN, 1.0).is_err());

        let inverted = CameraParams {
            min_distance: Some(3.0),
            max_distance: Some(2.0),
            intrinsics: None,
        };
        assert!(inverted.validate().is_err());

        let negative = CameraParams {
            min_distance: Some(-1.0),
            ..CameraParams::default()
        };
        assert!(negative.validate().is_err());
        assert!(CameraParams::default().validate().is_ok());
    }
}
