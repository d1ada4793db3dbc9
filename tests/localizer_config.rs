use std::sync::Mutex;

use tempfile::NamedTempFile;

use lumidist::config::{LocalizerConfig, Prompts, Scenario};
use lumidist::{NmsOrder, PromptStrategy};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LUMIDIST_CONFIG",
        "LUMIDIST_SCENARIO",
        "LUMIDIST_PROMPTS",
        "LUMIDIST_CONFIDENCE_THRESHOLD",
        "LUMIDIST_NMS_THRESHOLD",
        "LUMIDIST_MIN_AREA_RATIO",
        "LUMIDIST_MIN_DISTANCE",
        "LUMIDIST_MAX_DISTANCE",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(toml: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, toml.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = LocalizerConfig::load().expect("load config");
    assert_eq!(cfg.scenario, Scenario::General);
    assert_eq!(cfg.prompts, Prompts::Strategy(PromptStrategy::Full));
    assert_eq!(cfg.detection.confidence_threshold, 0.15);
    assert_eq!(cfg.detection.nms_threshold, 0.5);
    assert_eq!(cfg.detection.min_area_ratio, 0.001);
    assert!(cfg.detection.use_nms);
    assert!(cfg.camera.intrinsics.is_none());
    assert!(cfg.pipeline.compute_depth && cfg.pipeline.compute_distance);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
        scenario = "dense"
        prompts = ["pendant light", "track light"]

        [detection]
        nms_order = "emission"
        min_area_ratio = 0.002
        edge_margin = 10.0

        [camera]
        max_distance = 6.0
        fx = 600.0
        fy = 600.0
        cx = 320.0
        cy = 240.0

        [pipeline]
        compute_distance = false
        "#,
    );

    std::env::set_var("LUMIDIST_CONFIG", file.path());
    std::env::set_var("LUMIDIST_CONFIDENCE_THRESHOLD", "0.3");
    std::env::set_var("LUMIDIST_MIN_DISTANCE", "1.5");

    let cfg = LocalizerConfig::load().expect("load config");

    assert_eq!(cfg.scenario, Scenario::Dense);
    assert_eq!(cfg.queries(), vec!["pendant light", "track light"]);
    assert_eq!(cfg.detection.confidence_threshold, 0.3);
    assert_eq!(cfg.detection.nms_threshold, 0.40);
    assert_eq!(cfg.detection.nms_order, NmsOrder::Emission);
    assert_eq!(cfg.detection.min_area_ratio, 0.002);
    assert_eq!(cfg.detection.edge_margin, Some(10.0));
    assert_eq!(cfg.camera.min_distance, Some(1.5));
    assert_eq!(cfg.camera.max_distance, Some(6.0));
    assert_eq!(cfg.camera.intrinsics.map(|k| k.fx), Some(600.0));
    assert!(cfg.pipeline.compute_depth);
    assert!(!cfg.pipeline.compute_distance);

    clear_env();
}

#[test]
fn env_scenario_seeds_thresholds_below_file_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"
        scenario = "general"
        prompts = "industrial"

        [detection]
        nms_threshold = 0.45
        "#,
    );
    std::env::set_var("LUMIDIST_SCENARIO", "industrial");
    std::env::set_var("LUMIDIST_PROMPTS", "lantern, neon sign");

    let cfg = LocalizerConfig::load_from(file.path()).expect("load config");
    assert_eq!(cfg.scenario, Scenario::Industrial);
    assert_eq!(cfg.detection.confidence_threshold, 0.20);
    assert_eq!(cfg.detection.nms_threshold, 0.45);
    assert_eq!(cfg.queries(), vec!["lantern", "neon sign"]);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let partial_intrinsics = write_config("[camera]\nfx = 500.0\n");
    assert!(LocalizerConfig::load_from(partial_intrinsics.path()).is_err());

    let inverted = write_config("[camera]\nmin_distance = 4.0\nmax_distance = 2.0\n");
    assert!(LocalizerConfig::load_from(inverted.path()).is_err());

    let bad_order = write_config("[detection]\nnms_order = \"random\"\n");
    assert!(LocalizerConfig::load_from(bad_order.path()).is_err());

    let bad_scenario = write_config("scenario = \"outdoor\"\n");
    assert!(LocalizerConfig::load_from(bad_scenario.path()).is_err());

    std::env::set_var("LUMIDIST_CONFIDENCE_THRESHOLD", "high");
    assert!(LocalizerConfig::load().is_err());
    std::env::set_var("LUMIDIST_CONFIDENCE_THRESHOLD", "1.5");
    assert!(LocalizerConfig::load().is_err());

    clear_env();
    std::env::set_var("LUMIDIST_CONFIG", "/nonexistent/lumidist.toml");
    assert!(LocalizerConfig::load().is_err());

    clear_env();
}
