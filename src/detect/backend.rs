use anyhow::Result;
use image::RgbImage;

use crate::depth::DepthPrediction;
use crate::detect::result::RawDetection;

/// Open-vocabulary detector backend.
///
/// Implementations run inference only. They return boxes in source-image pixel
/// coordinates and must already drop hits scoring below `threshold`.
pub trait ZeroShotDetector: Send {
    /// Backend identifier.
    fn name(&self) -> &str;

    /// Detect `queries` in `image`.
    fn detect(
        &mut self,
        image: &RgbImage,
        queries: &[String],
        threshold: f32,
    ) -> Result<Vec<RawDetection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Monocular depth backend.
///
/// Returns depth at the model's native resolution; resizing and normalization
/// are the caller's job.
pub trait DepthEstimator: Send {
    fn name(&self) -> &str;

    fn estimate(&mut self, image: &RgbImage) -> Result<DepthPrediction>;

    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Dense image features (CLS embedding plus patch tokens).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FeatureMap {
    pub cls: Vec<f32>,
    /// Row-major `num_patches × dim` patch embeddings.
    pub patches: Vec<f32>,
    pub num_patches: usize,
    pub dim: usize,
}

/// Self-supervised feature backend.
pub trait FeatureExtractor: Send {
    fn name(&self) -> &str;

    fn extract(&mut self, image: &RgbImage) -> Result<FeatureMap>;

    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
