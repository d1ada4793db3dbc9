use anyhow::{anyhow, Result};
use image::RgbImage;

use crate::depth::DepthPrediction;
use crate::detect::backend::{DepthEstimator, FeatureExtractor, FeatureMap, ZeroShotDetector};
use crate::detect::result::RawDetection;

/// Stub detector for testing. Replays a fixed hit list on every call.
#[derive(Clone, Debug, Default)]
pub struct StubDetector {
    hits: Vec<RawDetection>,
    fail: bool,
}

impl StubDetector {
    pub fn new(hits: Vec<RawDetection>) -> Self {
        Self { hits, fail: false }
    }

    /// A detector whose every call errors.
    pub fn failing() -> Self {
        Self {
            hits: Vec::new(),
            fail: true,
        }
    }
}

impl ZeroShotDetector for StubDetector {
    fn name(&self) -> &str {
        "stub"
    }

    fn detect(
        &mut self,
        _image: &RgbImage,
        _queries: &[String],
        threshold: f32,
    ) -> Result<Vec<RawDetection>> {
        if self.fail {
            return Err(anyhow!("stub detector configured to fail"));
        }
        Ok(self
            .hits
            .iter()
            .filter(|hit| hit.score >= threshold)
            .cloned()
            .collect())
    }
}

/// Stub depth estimator returning a horizontal ramp or a constant.
#[derive(Clone, Debug)]
pub struct StubDepthEstimator {
    width: u32,
    height: u32,
    value: Option<f32>,
    fail: bool,
}

impl StubDepthEstimator {
    /// Constant depth at `width × height`.
    pub fn constant(width: u32, height: u32, value: f32) -> Self {
        Self {
            width,
            height,
            value: Some(value),
            fail: false,
        }
    }

    /// Depth increasing from left to right.
    pub fn ramp(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            value: None,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            width: 1,
            height: 1,
            value: None,
            fail: true,
        }
    }
}

impl DepthEstimator for StubDepthEstimator {
    fn name(&self) -> &str {
        "stub"
    }

    fn estimate(&mut self, _image: &RgbImage) -> Result<DepthPrediction> {
        if self.fail {
            return Err(anyhow!("stub depth estimator configured to fail"));
        }
        let len = self.width as usize * self.height as usize;
        let values = match self.value {
            Some(v) => vec![v; len],
            None => (0..len)
                .map(|i| (i % self.width as usize) as f32)
                .collect(),
        };
        DepthPrediction::new(self.width, self.height, values)
    }
}

/// Stub feature extractor producing zeroed embeddings.
#[derive(Clone, Debug)]
pub struct StubFeatureExtractor {
    dim: usize,
}

impl StubFeatureExtractor {
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }
}

impl FeatureExtractor for StubFeatureExtractor {
    fn name(&self) -> &str {
        "stub"
    }

    fn extract(&mut self, _image: &RgbImage) -> Result<FeatureMap> {
        Ok(FeatureMap {
            cls: vec![0.0; self.dim],
            patches: Vec::new(),
            num_patches: 0,
            dim: self.dim,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_detector_applies_threshold() {
        let mut detector = StubDetector::new(vec![
            RawDetection {
                bbox: [0.0, 0.0, 10.0, 10.0],
                score: 0.1,
                label: 0,
            },
            RawDetection {
                bbox: [0.0, 0.0, 10.0, 10.0],
                score: 0.4,
                label: 1,
            },
        ]);
        let image = RgbImage::new(16, 16);
        let hits = detector.detect(&image, &[], 0.15).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, 1);
        assert!(StubDetector::failing().detect(&image, &[], 0.1).is_err());
    }

    #[test]
    fn stub_depth_shapes() {
        let image = RgbImage::new(4, 4);
        let ramp = StubDepthEstimator::ramp(3, 2).estimate(&image).unwrap();
        assert_eq!(ramp.values, vec![0.0, 1.0, 2.0, 0.0, 1.0, 2.0]);
        let flat = StubDepthEstimator::constant(2, 2, 0.5)
            .estimate(&image)
            .unwrap();
        assert_eq!(flat.values, vec![0.5; 4]);
    }
}
