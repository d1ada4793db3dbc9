//! Backends that replay model output recorded to local files.
//!
//! These let the post-processing and distance core run without an inference
//! runtime: detector hits come from a JSON array, depth from a grayscale image
//! or a JSON grid of rows.

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};

use crate::depth::DepthPrediction;
use crate::detect::backend::{DepthEstimator, ZeroShotDetector};
use crate::detect::result::RawDetection;

/// Detector reading `[{"box": [..], "score": .., "label": ..}, ...]`.
#[derive(Clone, Debug)]
pub struct ReplayDetector {
    name: String,
    hits: Vec<RawDetection>,
}

impl ReplayDetector {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detections from {}", path.display()))?;
        let hits: Vec<RawDetection> = serde_json::from_str(&raw)
            .with_context(|| format!("invalid detections file {}", path.display()))?;
        log::info!("replaying {} raw detections from {}", hits.len(), path.display());
        Ok(Self {
            name: format!("replay:{}", path.display()),
            hits,
        })
    }

    pub fn hits(&self) -> &[RawDetection] {
        &self.hits
    }
}

impl ZeroShotDetector for ReplayDetector {
    fn name(&self) -> &str {
        &self.name
    }

    fn detect(
        &mut self,
        _image: &RgbImage,
        _queries: &[String],
        threshold: f32,
    ) -> Result<Vec<RawDetection>> {
        Ok(self
            .hits
            .iter()
            .filter(|hit| hit.score >= threshold)
            .cloned()
            .collect())
    }
}

/// Depth estimator serving a depth map stored on disk.
///
/// `.json` files hold a list of rows; anything else is decoded as an image and
/// read as single-channel intensity (16-bit PNGs keep their precision).
#[derive(Clone, Debug)]
pub struct DepthFileEstimator {
    name: String,
    path: PathBuf,
    prediction: DepthPrediction,
}

impl DepthFileEstimator {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let prediction = if is_json {
            read_json_grid(path)?
        } else {
            read_depth_image(path)?
        };
        log::info!(
            "loaded {}x{} depth from {}",
            prediction.width,
            prediction.height,
            path.display()
        );
        Ok(Self {
            name: format!("depth-file:{}", path.display()),
            path: path.to_path_buf(),
            prediction,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DepthEstimator for DepthFileEstimator {
    fn name(&self) -> &str {
        &self.name
    }

    fn estimate(&mut self, _image: &RgbImage) -> Result<DepthPrediction> {
        Ok(self.prediction.clone())
    }
}

fn read_json_grid(path: &Path) -> Result<DepthPrediction> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read depth grid {}", path.display()))?;
    let rows: Vec<Vec<f32>> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid depth grid {}", path.display()))?;
    let height = rows.len();
    let width = rows.first().map(Vec::len).unwrap_or(0);
    if rows.iter().any(|row| row.len() != width) {
        return Err(anyhow!(
            "depth grid {} is not rectangular",
            path.display()
        ));
    }
    DepthPrediction::new(
        width as u32,
        height as u32,
        rows.into_iter().flatten().collect(),
    )
}

fn read_depth_image(path: &Path) -> Result<DepthPrediction> {
    let img = image::open(path)
        .with_context(|| format!("failed to decode depth image {}", path.display()))?;
    let luma = img.to_luma32f();
    let (width, height) = luma.dimensions();
    DepthPrediction::new(width, height, luma.into_raw())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Luma};
    use tempfile::tempdir;

    #[test]
    fn replays_detections_above_threshold() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("hits.json");
        std::fs::write(
            &path,
            r#"[{"box": [0, 0, 40, 40], "score": 0.9, "label": 4},
                {"box": [50, 50, 60, 60], "score": 0.05, "label": 0}]"#,
        )?;
        let mut detector = ReplayDetector::open(&path)?;
        assert_eq!(detector.hits().len(), 2);
        let hits = detector.detect(&RgbImage::new(8, 8), &[], 0.15)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].label, 4);
        Ok(())
    }

    #[test]
    fn reads_json_depth_grid() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("depth.json");
        std::fs::write(&path, "[[0.0, 1.0, 2.0], [3.0, 4.0, 5.0]]")?;
        let mut estimator = DepthFileEstimator::open(&path)?;
        let prediction = estimator.estimate(&RgbImage::new(1, 1))?;
        assert_eq!((prediction.width, prediction.height), (3, 2));
        assert_eq!(prediction.values[4], 4.0);

        std::fs::write(&path, "[[0.0, 1.0], [3.0]]")?;
        assert!(DepthFileEstimator::open(&path).is_err());
        Ok(())
    }

    #[test]
    fn reads_sixteen_bit_png() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("depth.png");
        let img: ImageBuffer<Luma<u16>, Vec<u16>> =
            ImageBuffer::from_fn(4, 2, |x, _| Luma([(x as u16) * 20000]));
        img.save(&path)?;

        let mut estimator = DepthFileEstimator::open(&path)?;
        let prediction = estimator.estimate(&RgbImage::new(1, 1))?;
        assert_eq!((prediction.width, prediction.height), (4, 2));
        assert_eq!(prediction.values[0], 0.0);
        assert!(prediction.values[3] > prediction.values[2]);
        Ok(())
    }

    #[test]
    fn missing_files_fail_to_open() {
        assert!(ReplayDetector::open("/nonexistent/hits.json").is_err());
        assert!(DepthFileEstimator::open("/nonexistent/depth.png").is_err());
    }
}
