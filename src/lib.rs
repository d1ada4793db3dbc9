//! lumidist
//!
//! Light fixture localization from a single photo: an open-vocabulary detector
//! proposes fixtures, a monocular depth model supplies relative depth, and a
//! fixture-aware heuristic turns both into an approximate distance in meters.
//!
//! # Module Structure
//!
//! - `geometry`: Bounding boxes and IoU
//! - `detect`: Backend traits, post-processing (filtering, NMS), model chains
//! - `depth`: Normalized depth maps and ROI statistics
//! - `distance`: Depth-to-distance conversion by fixture category
//! - `camera`: Pinhole intrinsics and distance overrides
//! - `vocabulary`: Fixture phrases and prompt strategies
//! - `config`: TOML/env configuration with scenario presets
//! - `pipeline`: The `LightLocalizer` orchestrator
//!
//! Inference runtimes stay behind the backend traits; the core is synchronous
//! and owns no global state.

pub mod camera;
pub mod config;
pub mod depth;
pub mod detect;
pub mod distance;
pub mod geometry;
pub mod pipeline;
pub mod vocabulary;

pub use camera::{CameraParams, CameraPoint, Intrinsics};
pub use config::{LocalizerConfig, PipelineSettings, Prompts, Scenario};
pub use depth::{DepthMap, DepthPrediction};
pub use detect::{
    post_process, Detection, DetectionWithDistance, LoadOutcome, ModelChain, NmsOrder,
    PositionHint, PostProcessOptions, RawDetection,
};
pub use distance::{attach_distances, DistanceRange, FixtureCategory};
pub use geometry::{compute_iou, BoundingBox};
pub use pipeline::{
    LightLocalizer, PipelineDetections, PipelineRequest, PipelineResult, StageTimings, STAGES,
};
pub use vocabulary::{PromptStrategy, FIXTURE_VOCABULARY, GENERIC_LABEL};
