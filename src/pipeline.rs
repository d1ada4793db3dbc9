//! Detection → depth → distance orchestration.

use anyhow::Result;
use image::RgbImage;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::camera::CameraParams;
use crate::config::{LocalizerConfig, PipelineSettings};
use crate::depth::DepthMap;
use crate::detect::{
    post_process, DepthEstimator, Detection, DetectionWithDistance, FeatureExtractor, FeatureMap,
    PostProcessOptions, ZeroShotDetector,
};
use crate::distance::attach_distances;

/// Per-call stage switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineRequest {
    pub compute_depth: bool,
    /// Ignored when no depth map is available.
    pub compute_distance: bool,
    /// Keep the depth map in serialized output.
    pub include_depth_map: bool,
}

impl Default for PipelineRequest {
    fn default() -> Self {
        Self {
            compute_depth: true,
            compute_distance: true,
            include_depth_map: false,
        }
    }
}

impl From<&PipelineSettings> for PipelineRequest {
    fn from(settings: &PipelineSettings) -> Self {
        Self {
            compute_depth: settings.compute_depth,
            compute_distance: settings.compute_distance,
            include_depth_map: false,
        }
    }
}

/// Final detection list: measured when distances were computed.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum PipelineDetections {
    Plain(Vec<Detection>),
    Measured(Vec<DetectionWithDistance>),
}

impl PipelineDetections {
    pub fn len(&self) -> usize {
        match self {
            PipelineDetections::Plain(d) => d.len(),
            PipelineDetections::Measured(d) => d.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn measured(&self) -> Option<&[DetectionWithDistance]> {
        match self {
            PipelineDetections::Measured(d) => Some(d),
            PipelineDetections::Plain(_) => None,
        }
    }

    /// The underlying detections, in output order.
    pub fn detections(&self) -> Vec<&Detection> {
        match self {
            PipelineDetections::Plain(d) => d.iter().collect(),
            PipelineDetections::Measured(d) => d.iter().map(|m| &m.detection).collect(),
        }
    }
}

/// Stage names reported in every [`StageTimings`].
pub const STAGES: [&str; 5] = ["detection", "features", "depth", "distance", "total"];

/// Elapsed seconds per stage. Every name in [`STAGES`] is present; stages that
/// did not run stay at `0.0`.
#[derive(Clone, Debug, PartialEq, serde::Serialize)]
#[serde(transparent)]
pub struct StageTimings(BTreeMap<String, f64>);

impl Default for StageTimings {
    fn default() -> Self {
        Self(STAGES.iter().map(|stage| (stage.to_string(), 0.0)).collect())
    }
}

impl StageTimings {
    pub fn record(&mut self, stage: &str, elapsed: Duration) {
        self.0.insert(stage.to_string(), elapsed.as_secs_f64());
    }

    pub fn get(&self, stage: &str) -> Option<f64> {
        self.0.get(stage).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

#[derive(Clone, Debug)]
pub struct PipelineResult {
    pub detections: PipelineDetections,
    pub depth_map: Option<DepthMap>,
    /// Not serialized.
    pub features: Option<FeatureMap>,
    pub timing: StageTimings,
    pub include_depth_map: bool,
}

impl Serialize for PipelineResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let depth_map = self.depth_map.as_ref().filter(|_| self.include_depth_map);
        let fields = if depth_map.is_some() { 3 } else { 2 };
        let mut state = serializer.serialize_struct("PipelineResult", fields)?;
        state.serialize_field("detections", &self.detections)?;
        match depth_map {
            Some(map) => state.serialize_field("depth_map", map)?,
            None => state.skip_field("depth_map")?,
        }
        state.serialize_field("timing", &self.timing)?;
        state.end()
    }
}

/// Owns the model backends for one localization session.
pub struct LightLocalizer {
    detector: Box<dyn ZeroShotDetector>,
    depth: Option<Box<dyn DepthEstimator>>,
    features: Option<Box<dyn FeatureExtractor>>,
    queries: Vec<String>,
    options: PostProcessOptions,
    camera: CameraParams,
}

impl LightLocalizer {
    pub fn new(detector: Box<dyn ZeroShotDetector>, config: &LocalizerConfig) -> Self {
        Self {
            detector,
            depth: None,
            features: None,
            queries: config.queries(),
            options: config.detection.clone(),
            camera: config.camera,
        }
    }

    pub fn with_depth(mut self, depth: Box<dyn DepthEstimator>) -> Self {
        self.depth = Some(depth);
        self
    }

    pub fn with_features(mut self, features: Box<dyn FeatureExtractor>) -> Self {
        self.features = Some(features);
        self
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn has_depth(&self) -> bool {
        self.depth.is_some()
    }

    /// Warm every backend up once.
    pub fn warm_up(&mut self) -> Result<()> {
        self.detector.warm_up()?;
        if let Some(depth) = self.depth.as_mut() {
            depth.warm_up()?;
        }
        if let Some(features) = self.features.as_mut() {
            features.warm_up()?;
        }
        Ok(())
    }

    /// Run every requested stage on `image`.
    ///
    /// Stage failures are logged and degrade the result; they never abort.
    pub fn process_image(&mut self, image: &RgbImage, request: &PipelineRequest) -> PipelineResult {
        let total = Instant::now();
        let mut timing = StageTimings::default();

        let started = Instant::now();
        let detections = match self.detect(image) {
            Ok(detections) => detections,
            Err(err) => {
                log::warn!("detection failed ({}): {:#}", self.detector.name(), err);
                Vec::new()
            }
        };
        timing.record("detection", started.elapsed());
        log::info!("{} light(s) detected", detections.len());

        let mut features = None;
        if let Some(extractor) = self.features.as_mut() {
            let started = Instant::now();
            match extractor.extract(image) {
                Ok(map) => features = Some(map),
                Err(err) => log::warn!("feature extraction failed ({}): {:#}", extractor.name(), err),
            }
            timing.record("features", started.elapsed());
        }

        let mut depth_map = None;
        if request.compute_depth {
            if let Some(estimator) = self.depth.as_mut() {
                let started = Instant::now();
                let (width, height) = image.dimensions();
                match estimator
                    .estimate(image)
                    .and_then(|prediction| DepthMap::from_prediction(&prediction, width, height))
                {
                    Ok(map) => depth_map = Some(map),
                    Err(err) => log::warn!("depth estimation failed ({}): {:#}", estimator.name(), err),
                }
                timing.record("depth", started.elapsed());
            } else {
                log::debug!("depth requested but no depth estimator is loaded");
            }
        }

        let mut measured = None;
        if request.compute_distance {
            if let Some(map) = depth_map.as_ref() {
                let started = Instant::now();
                measured =
                    attach_distances(Some(map), &detections, Some(image.dimensions()), &self.camera);
                timing.record("distance", started.elapsed());
            }
        }
        let output = match measured {
            Some(measured) => PipelineDetections::Measured(measured),
            None => PipelineDetections::Plain(detections),
        };

        timing.record("total", total.elapsed());
        PipelineResult {
            detections: output,
            depth_map,
            features,
            timing,
            include_depth_map: request.include_depth_map,
        }
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        let raw = self
            .detector
            .detect(image, &self.queries, self.options.confidence_threshold)?;
        log::debug!("{} raw hit(s) from {}", raw.len(), self.detector.name());
        post_process(&raw, &self.queries, width, height, &self.options)
    }
}
