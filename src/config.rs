use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::path::Path;

use crate::camera::{CameraParams, Intrinsics};
use crate::detect::{NmsOrder, PostProcessOptions};
use crate::vocabulary::PromptStrategy;

const CONFIG_ENV: &str = "LUMIDIST_CONFIG";

#[derive(Debug, Deserialize, Default)]
struct LocalizerConfigFile {
    scenario: Option<String>,
    prompts: Option<PromptsFile>,
    detection: Option<DetectionConfigFile>,
    camera: Option<CameraConfigFile>,
    pipeline: Option<PipelineConfigFile>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PromptsFile {
    Strategy(String),
    Phrases(Vec<String>),
}

#[derive(Debug, Deserialize, Default)]
struct DetectionConfigFile {
    confidence_threshold: Option<f32>,
    use_nms: Option<bool>,
    nms_threshold: Option<f32>,
    nms_order: Option<String>,
    min_area_ratio: Option<f32>,
    min_box_area: Option<f32>,
    max_box_ratio: Option<f32>,
    edge_margin: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    min_distance: Option<f32>,
    max_distance: Option<f32>,
    fx: Option<f32>,
    fy: Option<f32>,
    cx: Option<f32>,
    cy: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    compute_depth: Option<bool>,
    compute_distance: Option<bool>,
    enable_fallback: Option<bool>,
}

/// Detection tuning presets for typical scenes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Scenario {
    #[default]
    General,
    Indoor,
    Industrial,
    /// Many small, tightly packed fixtures.
    Dense,
}

impl Scenario {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "general" => Ok(Scenario::General),
            "indoor" => Ok(Scenario::Indoor),
            "industrial" => Ok(Scenario::Industrial),
            "dense" => Ok(Scenario::Dense),
            other => Err(anyhow!("unknown scenario '{}'", other)),
        }
    }

    pub fn confidence_threshold(self) -> f32 {
        match self {
            Scenario::General => 0.15,
            Scenario::Indoor => 0.18,
            Scenario::Industrial => 0.20,
            Scenario::Dense => 0.12,
        }
    }

    pub fn nms_threshold(self) -> f32 {
        match self {
            Scenario::Dense => 0.40,
            _ => 0.5,
        }
    }

    fn options(self) -> PostProcessOptions {
        PostProcessOptions {
            confidence_threshold: self.confidence_threshold(),
            nms_threshold: self.nms_threshold(),
            ..PostProcessOptions::default()
        }
    }
}

/// Query list sent to the detector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Prompts {
    Strategy(PromptStrategy),
    Custom(Vec<String>),
}

impl Default for Prompts {
    fn default() -> Self {
        Prompts::Strategy(PromptStrategy::default())
    }
}

impl Prompts {
    /// A strategy name, or else a comma-separated phrase list.
    pub fn parse(value: &str) -> Result<Self> {
        if let Ok(strategy) = PromptStrategy::parse(value) {
            return Ok(Prompts::Strategy(strategy));
        }
        let phrases = split_csv(value);
        if phrases.is_empty() {
            return Err(anyhow!("prompt list must not be empty"));
        }
        Ok(Prompts::Custom(phrases))
    }

    pub fn queries(&self) -> Vec<String> {
        match self {
            Prompts::Strategy(strategy) => strategy.queries(),
            Prompts::Custom(phrases) => phrases.clone(),
        }
    }
}

/// Which stages run by default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PipelineSettings {
    pub compute_depth: bool,
    pub compute_distance: bool,
    /// Walk the whole model chain instead of stopping at the first failure.
    pub enable_fallback: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            compute_depth: true,
            compute_distance: true,
            enable_fallback: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalizerConfig {
    pub scenario: Scenario,
    pub prompts: Prompts,
    pub detection: PostProcessOptions,
    pub camera: CameraParams,
    pub pipeline: PipelineSettings,
}

impl Default for LocalizerConfig {
    fn default() -> Self {
        Self {
            scenario: Scenario::default(),
            prompts: Prompts::default(),
            detection: Scenario::default().options(),
            camera: CameraParams::default(),
            pipeline: PipelineSettings::default(),
        }
    }
}

impl LocalizerConfig {
    /// Load from the file named by `LUMIDIST_CONFIG`, if any, then the
    /// environment.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var(CONFIG_ENV).ok();
        let file_cfg = match config_path.as_deref().map(str::trim) {
            Some(path) if !path.is_empty() => Some(read_config_file(Path::new(path))?),
            _ => None,
        };
        Self::build(file_cfg.unwrap_or_default())
    }

    /// Load from an explicit file, then the environment.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::build(read_config_file(path.as_ref())?)
    }

    fn build(file: LocalizerConfigFile) -> Result<Self> {
        let mut cfg = Self::from_file(file)?;
        cfg.apply_env()?;
        cfg.validate()?;
        log::debug!("localizer config: {:?}", cfg);
        Ok(cfg)
    }

    pub fn queries(&self) -> Vec<String> {
        self.prompts.queries()
    }

    /// Switch scenario and reset the thresholds it governs.
    pub fn set_scenario(&mut self, scenario: Scenario) {
        self.scenario = scenario;
        self.detection.confidence_threshold = scenario.confidence_threshold();
        self.detection.nms_threshold = scenario.nms_threshold();
    }

    fn from_file(file: LocalizerConfigFile) -> Result<Self> {
        // The scenario seeds the thresholds, so its env override applies here.
        let scenario = match non_empty_env("LUMIDIST_SCENARIO") {
            Some(value) => Scenario::parse(&value)?,
            None => match file.scenario.as_deref() {
                Some(value) => Scenario::parse(value)?,
                None => Scenario::default(),
            },
        };

        let prompts = match file.prompts {
            Some(PromptsFile::Strategy(name)) => Prompts::Strategy(PromptStrategy::parse(&name)?),
            Some(PromptsFile::Phrases(phrases)) => Prompts::Custom(
                phrases
                    .into_iter()
                    .map(|p| p.trim().to_string())
                    .filter(|p| !p.is_empty())
                    .collect(),
            ),
            None => Prompts::default(),
        };

        let mut detection = scenario.options();
        if let Some(file) = file.detection {
            if let Some(v) = file.confidence_threshold {
                detection.confidence_threshold = v;
            }
            if let Some(v) = file.use_nms {
                detection.use_nms = v;
            }
            if let Some(v) = file.nms_threshold {
                detection.nms_threshold = v;
            }
            if let Some(order) = file.nms_order.as_deref() {
                detection.nms_order = NmsOrder::parse(order)?;
            }
            if let Some(v) = file.min_area_ratio {
                detection.min_area_ratio = v;
            }
            detection.min_box_area = file.min_box_area;
            detection.max_box_ratio = file.max_box_ratio;
            detection.edge_margin = file.edge_margin;
        }

        let camera = match file.camera {
            Some(camera) => CameraParams {
                min_distance: camera.min_distance,
                max_distance: camera.max_distance,
                intrinsics: match (camera.fx, camera.fy, camera.cx, camera.cy) {
                    (Some(fx), Some(fy), Some(cx), Some(cy)) => Some(Intrinsics { fx, fy, cx, cy }),
                    (None, None, None, None) => None,
                    _ => {
                        return Err(anyhow!(
                            "camera intrinsics need all of fx, fy, cx and cy"
                        ))
                    }
                },
            },
            None => CameraParams::default(),
        };

        let defaults = PipelineSettings::default();
        let pipeline = match file.pipeline {
            Some(p) => PipelineSettings {
                compute_depth: p.compute_depth.unwrap_or(defaults.compute_depth),
                compute_distance: p.compute_distance.unwrap_or(defaults.compute_distance),
                enable_fallback: p.enable_fallback.unwrap_or(defaults.enable_fallback),
            },
            None => defaults,
        };

        Ok(Self {
            scenario,
            prompts,
            detection,
            camera,
            pipeline,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(prompts) = non_empty_env("LUMIDIST_PROMPTS") {
            self.prompts = Prompts::parse(&prompts)?;
        }
        if let Some(v) = env_f32("LUMIDIST_CONFIDENCE_THRESHOLD")? {
            self.detection.confidence_threshold = v;
        }
        if let Some(v) = env_f32("LUMIDIST_NMS_THRESHOLD")? {
            self.detection.nms_threshold = v;
        }
        if let Some(v) = env_f32("LUMIDIST_MIN_AREA_RATIO")? {
            self.detection.min_area_ratio = v;
        }
        if let Some(v) = env_f32("LUMIDIST_MIN_DISTANCE")? {
            self.camera.min_distance = Some(v);
        }
        if let Some(v) = env_f32("LUMIDIST_MAX_DISTANCE")? {
            self.camera.max_distance = Some(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.detection;
        for (name, value) in [
            ("confidence_threshold", d.confidence_threshold),
            ("nms_threshold", d.nms_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(anyhow!("{} must be within [0, 1], got {}", name, value));
            }
        }
        if !(0.0..1.0).contains(&d.min_area_ratio) {
            return Err(anyhow!(
                "min_area_ratio must be within [0, 1), got {}",
                d.min_area_ratio
            ));
        }
        if let Some(area) = d.min_box_area {
            if !(area.is_finite() && area >= 0.0) {
                return Err(anyhow!("min_box_area must be non-negative"));
            }
        }
        if let Some(ratio) = d.max_box_ratio {
            if !(ratio > 0.0 && ratio <= 1.0) {
                return Err(anyhow!("max_box_ratio must be within (0, 1], got {}", ratio));
            }
        }
        if let Some(margin) = d.edge_margin {
            if !(margin.is_finite() && margin >= 0.0) {
                return Err(anyhow!("edge_margin must be non-negative"));
            }
        }
        if self.queries().is_empty() {
            return Err(anyhow!("at least one prompt is required"));
        }
        self.camera.validate()
    }
}

fn read_config_file(path: &Path) -> Result<LocalizerConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn non_empty_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_f32(name: &str) -> Result<Option<f32>> {
    match non_empty_env(name) {
        Some(raw) => {
            let value: f32 = raw
                .trim()
                .parse()
                .map_err(|_| anyhow!("{} must be a number, got '{}'", name, raw))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|entry| entry.trim())
        .filter(|entry| !entry.is_empty())
        .map(|entry| entry.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_presets() {
        assert_eq!(Scenario::General.confidence_threshold(), 0.15);
        assert_eq!(Scenario::Indoor.confidence_threshold(), 0.18);
        assert_eq!(Scenario::Industrial.nms_threshold(), 0.5);
        assert_eq!(Scenario::Dense.nms_threshold(), 0.40);
        assert!(Scenario::parse("outdoor").is_err());
    }

    #[test]
    fn prompts_parse_strategies_and_lists() {
        assert_eq!(
            Prompts::parse("indoor").unwrap(),
            Prompts::Strategy(PromptStrategy::Indoor)
        );
        assert_eq!(
            Prompts::parse("neon sign, lantern ,").unwrap(),
            Prompts::Custom(vec!["neon sign".to_string(), "lantern".to_string()])
        );
        assert!(Prompts::parse(" , ").is_err());
    }

    #[test]
    fn set_scenario_resets_thresholds() {
        let mut cfg = LocalizerConfig::default();
        cfg.detection.confidence_threshold = 0.9;
        cfg.set_scenario(Scenario::Dense);
        assert_eq!(cfg.detection.confidence_threshold, 0.12);
        assert_eq!(cfg.detection.nms_threshold, 0.40);
    }

    #[test]
    fn defaults_validate() {
        let cfg = LocalizerConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.queries().len(), crate::vocabulary::FIXTURE_VOCABULARY.len());
    }

    #[test]
    fn validation_rejects_out_of_range_values() {
        let mut cfg = LocalizerConfig::default();
        cfg.detection.min_area_ratio = 1.0;
        assert!(cfg.validate().is_err());

        let mut cfg = LocalizerConfig::default();
        cfg.detection.max_box_ratio = Some(0.0);
        assert!(cfg.validate().is_err());

        let mut cfg = LocalizerConfig::default();
        cfg.prompts = Prompts::Custom(Vec::new());
        assert!(cfg.validate().is_err());
    }
}
