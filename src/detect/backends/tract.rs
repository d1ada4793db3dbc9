#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::{self, FilterType};
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::depth::DepthPrediction;
use crate::detect::backend::{DepthEstimator, FeatureExtractor, FeatureMap};

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

type Plan = SimplePlan<TypedFact, Box<dyn TypedOp>>;

/// An ONNX vision model taking a single `1×3×H×W` ImageNet-normalized input.
struct VisionModel {
    plan: Plan,
    width: u32,
    height: u32,
}

impl VisionModel {
    fn load(model_path: &Path, width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("model input size must not be empty"));
        }
        let plan = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;
        Ok(Self {
            plan,
            width,
            height,
        })
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let resized = if image.dimensions() == (self.width, self.height) {
            image.clone()
        } else {
            imageops::resize(image, self.width, self.height, FilterType::Triangle)
        };
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| {
                let px = resized.get_pixel(x as u32, y as u32);
                (px[channel] as f32 / 255.0 - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel]
            },
        );
        input.into_tensor()
    }

    fn run(&self, image: &RgbImage) -> Result<TVec<TValue>> {
        let input = self.build_input(image);
        self.plan
            .run(tvec!(input.into()))
            .context("ONNX inference failed")
    }
}

/// Monocular depth estimation through tract.
///
/// The first output is read as `[.., H, W]` relative depth.
pub struct TractDepthEstimator {
    name: String,
    model: VisionModel,
}

impl TractDepthEstimator {
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = VisionModel::load(model_path, width, height)?;
        Ok(Self {
            name: format!("tract:{}", model_path.display()),
            model,
        })
    }
}

impl DepthEstimator for TractDepthEstimator {
    fn name(&self) -> &str {
        &self.name
    }

    fn estimate(&mut self, image: &RgbImage) -> Result<DepthPrediction> {
        let outputs = self.model.run(image)?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("depth model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("depth output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() < 2 {
            return Err(anyhow!("depth output has rank {}, expected >= 2", shape.len()));
        }
        let height = shape[shape.len() - 2];
        let width = shape[shape.len() - 1];
        let values: Vec<f32> = view.iter().copied().collect();
        if values.len() != width * height {
            return Err(anyhow!(
                "depth output {:?} holds more than one map",
                shape
            ));
        }
        DepthPrediction::new(width as u32, height as u32, values)
    }
}

/// ViT-style feature extraction through tract.
///
/// The first output is read as `[1, 1 + N, D]`: a class token followed by N
/// patch tokens.
pub struct TractFeatureExtractor {
    name: String,
    model: VisionModel,
}

impl TractFeatureExtractor {
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = VisionModel::load(model_path, width, height)?;
        Ok(Self {
            name: format!("tract:{}", model_path.display()),
            model,
        })
    }
}

impl FeatureExtractor for TractFeatureExtractor {
    fn name(&self) -> &str {
        &self.name
    }

    fn extract(&mut self, image: &RgbImage) -> Result<FeatureMap> {
        let outputs = self.model.run(image)?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("feature model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("feature output tensor was not f32")?;
        let shape = view.shape();
        if shape.len() != 3 || shape[0] != 1 || shape[1] == 0 {
            return Err(anyhow!("unexpected feature output shape {:?}", shape));
        }
        let tokens = shape[1];
        let dim = shape[2];
        let flat: Vec<f32> = view.iter().copied().collect();
        let (cls, patches) = flat.split_at(dim);
        Ok(FeatureMap {
            cls: cls.to_vec(),
            patches: patches.to_vec(),
            num_patches: tokens - 1,
            dim,
        })
    }
}
