pub mod replay;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use replay::{DepthFileEstimator, ReplayDetector};
pub use stub::{StubDepthEstimator, StubDetector, StubFeatureExtractor};

#[cfg(feature = "backend-tract")]
pub use tract::{TractDepthEstimator, TractFeatureExtractor};
