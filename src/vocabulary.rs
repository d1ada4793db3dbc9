//! Text queries handed to the zero-shot detector.

use anyhow::{anyhow, Result};
use serde::Deserialize;

/// Label used when the detector reports an index outside the query list.
pub const GENERIC_LABEL: &str = "light";

/// The complete indoor fixture vocabulary, grouped by mounting type.
pub const FIXTURE_VOCABULARY: &[&str] = &[
    // hanging
    "chandelier",
    "pendant light",
    "hanging lamp",
    "drop light",
    // ceiling
    "ceiling light",
    "ceiling lamp",
    "flush mount light",
    "recessed light",
    "downlight",
    // wall
    "wall lamp",
    "wall sconce",
    "wall light",
    "wall mounted light",
    // table / floor
    "table lamp",
    "desk lamp",
    "floor lamp",
    "standing lamp",
    // spot / can
    "spotlight",
    "track light",
    "can light",
    "pot light",
    // LED
    "LED panel",
    "LED light",
    "LED strip",
    "LED bulb",
    // decorative
    "decorative light",
    "ambient light",
    "mood light",
    // generic
    "light fixture",
    "lighting",
    "lamp",
    "bulb",
    "light",
];

const GENERAL_PROMPTS: &[&str] = &[
    "light",
    "lamp",
    "chandelier",
    "ceiling light",
    "pendant light",
    "wall lamp",
    "bulb",
    "lighting fixture",
    "LED light",
    "tube light",
    "spotlight",
    "downlight",
    "light source",
    "illumination",
    "bright light",
];

const INDOOR_PROMPTS: &[&str] = &[
    "ceiling lamp",
    "ceiling light",
    "overhead light",
    "recessed light",
    "track light",
    "pendant lamp",
    "chandelier",
    "wall sconce",
    "table lamp",
    "floor lamp",
    "desk lamp",
    "LED panel",
];

const INDUSTRIAL_PROMPTS: &[&str] = &[
    "industrial light",
    "warehouse light",
    "high bay light",
    "LED strip",
    "tube light",
    "fluorescent light",
    "spotlight",
    "floodlight",
    "panel light",
];

const SIMPLE_PROMPTS: &[&str] = &["light", "lamp", "lighting"];

/// Which phrase list to query the detector with.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptStrategy {
    #[default]
    Full,
    General,
    Indoor,
    Industrial,
    Simple,
}

impl PromptStrategy {
    pub fn phrases(self) -> &'static [&'static str] {
        match self {
            PromptStrategy::Full => FIXTURE_VOCABULARY,
            PromptStrategy::General => GENERAL_PROMPTS,
            PromptStrategy::Indoor => INDOOR_PROMPTS,
            PromptStrategy::Industrial => INDUSTRIAL_PROMPTS,
            PromptStrategy::Simple => SIMPLE_PROMPTS,
        }
    }

    pub fn queries(self) -> Vec<String> {
        self.phrases().iter().map(|p| p.to_string()).collect()
    }

    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(PromptStrategy::Full),
            "general" => Ok(PromptStrategy::General),
            "indoor" => Ok(PromptStrategy::Indoor),
            "industrial" => Ok(PromptStrategy::Industrial),
            "simple" => Ok(PromptStrategy::Simple),
            other => Err(anyhow!("unknown prompt strategy '{}'", other)),
        }
    }
}

/// Resolve a detector label index against the query list.
pub fn resolve_label<S: AsRef<str>>(queries: &[S], index: usize) -> &str {
    queries
        .get(index)
        .map(|q| q.as_ref())
        .unwrap_or(GENERIC_LABEL)
}
