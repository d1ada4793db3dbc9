mod backend;
pub mod backends;
mod postprocess;
mod registry;
mod result;

pub use backend::{DepthEstimator, FeatureExtractor, FeatureMap, ZeroShotDetector};
pub use backends::{
    DepthFileEstimator, ReplayDetector, StubDepthEstimator, StubDetector, StubFeatureExtractor,
};
pub use postprocess::{
    post_process, NmsOrder, PostProcessOptions, DEFAULT_CONFIDENCE_THRESHOLD,
    DEFAULT_MIN_AREA_RATIO, DEFAULT_NMS_THRESHOLD,
};
pub use registry::{LoadFailure, LoadOutcome, ModelCandidate, ModelChain};
pub use result::{DetectionWithDistance, Detection, PositionHint, RawDetection};

#[cfg(feature = "backend-tract")]
pub use backends::{TractDepthEstimator, TractFeatureExtractor};
