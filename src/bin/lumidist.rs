//! lumidist - locate light fixtures in a photo and estimate their distance
//!
//! Detector hits are replayed from a JSON file; depth comes from the first
//! loadable `--depth` source (a depth image, a JSON grid or, with the
//! `backend-tract` feature, an ONNX model).

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use lumidist::detect::{
    DepthEstimator, DepthFileEstimator, LoadOutcome, ModelCandidate, ModelChain, ReplayDetector,
};
use lumidist::{
    LightLocalizer, LocalizerConfig, PipelineDetections, PipelineRequest, Prompts, Scenario,
};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input photo (JPEG or PNG).
    #[arg(long)]
    image: PathBuf,
    /// JSON array of raw detector hits for the photo.
    #[arg(long)]
    detections: PathBuf,
    /// Depth source; repeat to give fallbacks in priority order.
    #[arg(long)]
    depth: Vec<PathBuf>,
    /// TOML config file (overrides LUMIDIST_CONFIG).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Threshold preset: general, indoor, industrial or dense.
    #[arg(long)]
    scenario: Option<String>,
    /// Prompt strategy name or comma-separated phrases.
    #[arg(long)]
    prompts: Option<String>,
    /// Minimum detector confidence.
    #[arg(long)]
    confidence: Option<f32>,
    #[arg(long)]
    no_nms: bool,
    #[arg(long)]
    no_depth: bool,
    #[arg(long)]
    no_distance: bool,
    /// Stop at the first depth source that fails to load.
    #[arg(long)]
    no_fallback: bool,
    /// Include the normalized depth map in the output.
    #[arg(long)]
    include_depth_map: bool,
    /// Write JSON here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto)]
    ui: ui::UiMode,
    /// ONNX depth model tried before any `--depth` source.
    #[cfg(feature = "backend-tract")]
    #[arg(long)]
    depth_model: Vec<PathBuf>,
    /// ONNX ViT feature model run alongside detection.
    #[cfg(feature = "backend-tract")]
    #[arg(long)]
    feature_model: Option<PathBuf>,
    /// Square input size of the ONNX models.
    #[cfg(feature = "backend-tract")]
    #[arg(long, default_value_t = 518)]
    model_size: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let piped_json = args.output.is_none() && !stdout_is_tty;
    let ui = ui::Ui::new(args.ui, is_tty, piped_json, 5);

    let cfg = {
        let _stage = ui.stage("Load config");
        load_config(&args)?
    };

    let image = {
        let stage = ui.stage("Read image");
        let image = image::open(&args.image)
            .with_context(|| format!("failed to open image {}", args.image.display()))?
            .to_rgb8();
        stage.detail(format!("{}x{}", image.width(), image.height()));
        image
    };

    let mut localizer = {
        let stage = ui.stage("Load models");
        let detector = ReplayDetector::open(&args.detections)?;
        let mut localizer = LightLocalizer::new(Box::new(detector), &cfg);
        if args.no_depth || !cfg.pipeline.compute_depth {
            stage.detail("depth disabled");
        } else {
            match depth_chain(&args, cfg.pipeline.enable_fallback)
                .load_first(|candidate| load_depth(&args, candidate))
            {
                LoadOutcome::Loaded {
                    candidate, model, ..
                } => {
                    stage.detail(format!("depth from {}", candidate.description));
                    localizer = localizer.with_depth(model);
                }
                LoadOutcome::Unavailable { failures } => {
                    if !failures.is_empty() {
                        log::warn!("continuing without depth");
                    }
                    stage.detail("no depth source");
                }
            }
        }
        let mut localizer = with_feature_model(&args, localizer)?;
        localizer.warm_up()?;
        localizer
    };

    let result = {
        let stage = ui.stage("Localize lights");
        let request = PipelineRequest {
            compute_depth: !args.no_depth && cfg.pipeline.compute_depth,
            compute_distance: !args.no_distance && cfg.pipeline.compute_distance,
            include_depth_map: args.include_depth_map,
        };
        let result = localizer.process_image(&image, &request);
        if let Some(features) = &result.features {
            log::info!(
                "extracted {} patch embeddings of dim {}",
                features.num_patches,
                features.dim
            );
        }
        stage.detail(summary(&result.detections));
        result
    };

    {
        let _stage = ui.stage("Write output");
        let json = serde_json::to_string_pretty(&result)?;
        match &args.output {
            Some(path) => std::fs::write(path, json)
                .with_context(|| format!("failed to write {}", path.display()))?,
            None => println!("{json}"),
        }
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<LocalizerConfig> {
    let mut cfg = match &args.config {
        Some(path) => LocalizerConfig::load_from(path)?,
        None => LocalizerConfig::load()?,
    };
    if let Some(scenario) = args.scenario.as_deref() {
        cfg.set_scenario(Scenario::parse(scenario)?);
    }
    if let Some(prompts) = args.prompts.as_deref() {
        cfg.prompts = Prompts::parse(prompts)?;
    }
    if let Some(confidence) = args.confidence {
        cfg.detection.confidence_threshold = confidence;
    }
    if args.no_nms {
        cfg.detection.use_nms = false;
    }
    if args.no_fallback {
        cfg.pipeline.enable_fallback = false;
    }
    cfg.validate()?;
    Ok(cfg)
}

fn depth_chain(args: &Args, enable_fallback: bool) -> ModelChain {
    let mut chain = ModelChain::new("depth").with_fallback(enable_fallback);
    for path in &args.depth {
        chain = chain.candidate(path.display().to_string(), path.display().to_string());
    }
    prefer_onnx_models(args, chain)
}

#[cfg(feature = "backend-tract")]
fn prefer_onnx_models(args: &Args, mut chain: ModelChain) -> ModelChain {
    for path in args.depth_model.iter().rev() {
        chain = chain.with_preferred(
            path.display().to_string(),
            format!("ONNX model {}", path.display()),
        );
    }
    chain
}

#[cfg(not(feature = "backend-tract"))]
fn prefer_onnx_models(_args: &Args, chain: ModelChain) -> ModelChain {
    chain
}

#[cfg(feature = "backend-tract")]
fn with_feature_model(args: &Args, localizer: LightLocalizer) -> Result<LightLocalizer> {
    let Some(path) = &args.feature_model else {
        return Ok(localizer);
    };
    let model =
        lumidist::detect::TractFeatureExtractor::new(path, args.model_size, args.model_size)?;
    log::info!("features from ONNX model {}", path.display());
    Ok(localizer.with_features(Box::new(model)))
}

#[cfg(not(feature = "backend-tract"))]
fn with_feature_model(_args: &Args, localizer: LightLocalizer) -> Result<LightLocalizer> {
    Ok(localizer)
}

fn load_depth(args: &Args, candidate: &ModelCandidate) -> Result<Box<dyn DepthEstimator>> {
    let path = Path::new(&candidate.id);
    let is_onnx = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
    if !is_onnx {
        return Ok(Box::new(DepthFileEstimator::open(path)?));
    }
    load_onnx_depth(args, path)
}

#[cfg(feature = "backend-tract")]
fn load_onnx_depth(args: &Args, path: &Path) -> Result<Box<dyn DepthEstimator>> {
    let model = lumidist::detect::TractDepthEstimator::new(path, args.model_size, args.model_size)?;
    Ok(Box::new(model))
}

#[cfg(not(feature = "backend-tract"))]
fn load_onnx_depth(_args: &Args, path: &Path) -> Result<Box<dyn DepthEstimator>> {
    Err(anyhow::anyhow!(
        "{} is an ONNX model; rebuild with --features backend-tract",
        path.display()
    ))
}

fn summary(detections: &PipelineDetections) -> String {
    match detections.measured() {
        Some(measured) => {
            let ranged = measured.iter().filter(|d| d.distance.is_some()).count();
            format!("{} light(s), {} with distance", measured.len(), ranged)
        }
        None => format!("{} light(s)", detections.len()),
    }
}
