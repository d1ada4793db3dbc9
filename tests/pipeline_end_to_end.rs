use anyhow::Result;
use image::{ImageBuffer, Luma, RgbImage};
use tempfile::tempdir;

use lumidist::detect::{
    DepthEstimator, DepthFileEstimator, ReplayDetector, StubDepthEstimator, StubDetector,
};
use lumidist::{
    DepthPrediction, LightLocalizer, LocalizerConfig, ModelChain, PipelineRequest, PositionHint,
    RawDetection, FIXTURE_VOCABULARY,
};

/// Depth at 0.5 everywhere except one near and one far pixel in the corners.
struct HalfDepth;

impl DepthEstimator for HalfDepth {
    fn name(&self) -> &str {
        "half"
    }

    fn estimate(&mut self, image: &RgbImage) -> Result<DepthPrediction> {
        let (width, height) = image.dimensions();
        let mut values = vec![0.5; (width * height) as usize];
        values[0] = 0.0;
        if let Some(last) = values.last_mut() {
            *last = 1.0;
        }
        DepthPrediction::new(width, height, values)
    }
}

fn hit(bbox: [f32; 4], score: f32, label: usize) -> RawDetection {
    RawDetection { bbox, score, label }
}

fn table_lamp_index() -> usize {
    FIXTURE_VOCABULARY
        .iter()
        .position(|p| *p == "table lamp")
        .expect("table lamp in vocabulary")
}

#[test]
fn table_lamp_at_mid_depth() -> Result<()> {
    let detector = StubDetector::new(vec![hit([100.0, 100.0, 200.0, 200.0], 0.9, table_lamp_index())]);
    let mut localizer = LightLocalizer::new(Box::new(detector), &LocalizerConfig::default())
        .with_depth(Box::new(HalfDepth));

    let result = localizer.process_image(&RgbImage::new(640, 480), &PipelineRequest::default());
    let measured = result.detections.measured().expect("distances computed");
    assert_eq!(measured.len(), 1);

    let lamp = &measured[0];
    assert_eq!(lamp.detection.label, "table lamp");
    assert_eq!(lamp.distance_range, Some((1.0, 3.0)));
    assert_eq!(lamp.position_hint, Some(PositionHint::Upper));
    let distance = lamp.distance.expect("distance");
    assert!((distance - 2.18).abs() < 0.01, "distance {}", distance);
    assert!((1.0..=3.0).contains(&distance));
    Ok(())
}

#[test]
fn duplicates_are_merged_and_output_is_sorted() -> Result<()> {
    let detector = StubDetector::new(vec![
        hit([10.0, 10.0, 110.0, 110.0], 0.4, 0),
        hit([12.0, 12.0, 112.0, 112.0], 0.8, 0),
        hit([300.0, 300.0, 360.0, 360.0], 0.6, 4),
        // Too small for the default area floor.
        hit([500.0, 10.0, 505.0, 15.0], 0.95, 1),
    ]);
    let mut localizer = LightLocalizer::new(Box::new(detector), &LocalizerConfig::default())
        .with_depth(Box::new(StubDepthEstimator::ramp(64, 48)));

    let result = localizer.process_image(&RgbImage::new(640, 480), &PipelineRequest::default());
    let detections = result.detections.detections();
    assert_eq!(detections.len(), 2);
    assert_eq!(detections[0].confidence, 0.8);
    assert_eq!(detections[1].confidence, 0.6);

    for measured in result.detections.measured().expect("measured") {
        let (min, max) = measured.distance_range.expect("range");
        let distance = measured.distance.expect("distance");
        assert!(distance >= min && distance <= max);
    }
    Ok(())
}

#[test]
fn replayed_files_through_the_pipeline() -> Result<()> {
    let dir = tempdir()?;
    let hits_path = dir.path().join("hits.json");
    std::fs::write(
        &hits_path,
        r#"[{"box": [40, 20, 80, 60], "score": 0.7, "label": 1},
            {"box": [0, 0, 10, 10], "score": 0.1, "label": 2}]"#,
    )?;
    let depth_path = dir.path().join("depth.png");
    let depth: ImageBuffer<Luma<u16>, Vec<u16>> =
        ImageBuffer::from_fn(32, 24, |x, _| Luma([(x as u16) * 2000]));
    depth.save(&depth_path)?;

    let missing = dir.path().join("missing.png");
    let chain = ModelChain::new("depth")
        .candidate(missing.display().to_string(), "missing")
        .candidate(depth_path.display().to_string(), "png");
    let outcome = chain.load_first(|c| DepthFileEstimator::open(&c.id));
    assert_eq!(outcome.failures().len(), 1);
    let estimator = outcome.into_model().expect("png depth loads");

    let mut localizer = LightLocalizer::new(
        Box::new(ReplayDetector::open(&hits_path)?),
        &LocalizerConfig::default(),
    )
    .with_depth(Box::new(estimator));

    let request = PipelineRequest {
        include_depth_map: true,
        ..PipelineRequest::default()
    };
    let result = localizer.process_image(&RgbImage::new(128, 96), &request);
    let json = serde_json::to_value(&result)?;

    let detections = json["detections"].as_array().expect("array");
    assert_eq!(detections.len(), 1);
    assert_eq!(detections[0]["label"], FIXTURE_VOCABULARY[1]);
    assert_eq!(detections[0]["box"], serde_json::json!([40.0, 20.0, 80.0, 60.0]));
    assert!(detections[0]["distance"].is_number());
    assert_eq!(json["depth_map"].as_array().map(Vec::len), Some(96));
    assert_eq!(json["depth_map"][0].as_array().map(Vec::len), Some(128));
    assert!(json["timing"]["depth"].is_number());
    Ok(())
}

#[test]
fn missing_depth_keeps_plain_detections() -> Result<()> {
    let detector = StubDetector::new(vec![hit([10.0, 10.0, 60.0, 60.0], 0.5, 99)]);
    let mut localizer = LightLocalizer::new(Box::new(detector), &LocalizerConfig::default())
        .with_depth(Box::new(StubDepthEstimator::failing()));

    let result = localizer.process_image(&RgbImage::new(100, 100), &PipelineRequest::default());
    assert!(result.detections.measured().is_none());
    let json = serde_json::to_value(&result)?;
    assert_eq!(json["detections"][0]["label"], "light");
    assert!(json["detections"][0].get("distance").is_none());
    Ok(())
}
