use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use image::{Rgb, RgbImage};
use ndarray::Array4;

use super::onnx::to_input_tensor;
use super::*;

/// Classifier returning a fixed raw output, or failing
struct FixedClassifier {
    output: Option<RawOutput>,
    calls: Arc<AtomicUsize>,
}

impl FixedClassifier {
    fn boxed(output: Option<RawOutput>, calls: &Arc<AtomicUsize>) -> Box<dyn BinaryClassifier> {
        Box::new(Self { output, calls: Arc::clone(calls) })
    }
}

impl BinaryClassifier for FixedClassifier {
    fn infer(&self, input: &Array4<f32>) -> Result<RawOutput, DetectorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        assert_eq!(input.shape(), &[1, 8, 8, 3]);
        self.output
            .clone()
            .ok_or_else(|| DetectorError::Inference("runtime exploded".to_string()))
    }
}

fn sample() -> ImageSample {
    ImageSample::from_rgb(RgbImage::from_pixel(32, 32, Rgb([200, 40, 30])))
}

fn model_context(plastic: Option<RawOutput>, oil: Option<RawOutput>) -> (DetectorContext, Arc<AtomicUsize>) {
    let calls = Arc::new(AtomicUsize::new(0));
    let detector = ModelBackedDetector::new(
        FixedClassifier::boxed(plastic, &calls),
        FixedClassifier::boxed(oil, &calls),
        (8, 8),
    );
    (DetectorContext::with_detector(Arc::new(detector)), calls)
}

#[test]
fn test_input_tensor_layout() {
    let rgb = RgbImage::from_pixel(20, 10, Rgb([255, 0, 51]));
    let tensor = to_input_tensor(&rgb, (6, 4));

    assert_eq!(tensor.shape(), &[1, 4, 6, 3]);
    assert!((tensor[[0, 2, 3, 0]] - 1.0).abs() < 1e-2);
    assert!(tensor[[0, 2, 3, 1]].abs() < 1e-6);
    assert!((tensor[[0, 2, 3, 2]] - 0.2).abs() < 1e-2);
}

#[test]
fn test_model_backed_normalises_each_output() {
    let (ctx, calls) = model_context(
        Some(RawOutput::new(vec![1, 1], vec![0.8])),
        Some(RawOutput::new(vec![1, 2], vec![0.9, 0.1])),
    );

    let detection = ctx.detect(&sample());
    assert_eq!(detection.kind, DetectorKind::Model);
    assert_eq!(detection.probabilities.p_plastic, 0.8);
    assert_eq!(detection.probabilities.p_oil, 0.1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(ctx.is_model_loaded());
}

#[test]
fn test_inference_failure_demotes_permanently() {
    let (ctx, calls) = model_context(Some(RawOutput::scalar(0.8)), None);
    let sample = sample();

    let first = ctx.detect(&sample);
    assert_eq!(first.kind, DetectorKind::Heuristic);
    assert_eq!(first.probabilities, HeuristicDetector::estimate(&sample.stats));

    let status = ctx.status();
    assert_eq!(status.mode, DetectorKind::Heuristic);
    assert!(status.reason.unwrap().contains("runtime exploded"));

    // Model is not consulted again
    let before = calls.load(Ordering::SeqCst);
    ctx.detect(&sample);
    assert_eq!(calls.load(Ordering::SeqCst), before);
}

#[test]
fn test_unsupported_shape_demotes() {
    let (ctx, _) = model_context(
        Some(RawOutput::new(vec![2, 2], vec![0.1, 0.2, 0.3, 0.4])),
        Some(RawOutput::scalar(0.5)),
    );

    assert_eq!(ctx.detect(&sample()).kind, DetectorKind::Heuristic);
    assert!(ctx.status().reason.unwrap().contains("unsupported model output shape"));
}

#[test]
fn test_missing_model_files_fall_back() {
    let dir = tempfile::tempdir().unwrap();
    let (ctx, outcome) = DetectorContext::load(ModelConfig {
        plastic_model: dir.path().join("plastic.onnx"),
        oil_model: dir.path().join("oil.onnx"),
        target_size: (224, 224),
    });

    match outcome {
        LoadOutcome::Unavailable(reason) => assert!(reason.contains("plastic.onnx")),
        LoadOutcome::Loaded => panic!("no model files exist"),
    }
    assert!(!ctx.is_model_loaded());
    assert_eq!(ctx.detect(&sample()).kind, DetectorKind::Heuristic);

    // Still missing on reload
    assert!(matches!(ctx.reload(), LoadOutcome::Unavailable(_)));
}

#[test]
fn test_status_counts_inferences() {
    let ctx = DetectorContext::heuristic_only("tests");
    ctx.detect(&sample());
    ctx.detect(&sample());

    let status = ctx.status();
    assert_eq!(status.inference_count, 2);
    assert!(!status.models_loaded);
    assert_eq!(status.reason.as_deref(), Some("tests"));
}

#[test]
fn test_context_is_a_dual_detector() {
    let ctx = DetectorContext::heuristic_only("tests");
    let detector: &dyn DualDetector = &ctx;
    assert_eq!(detector.kind(), DetectorKind::Heuristic);
    assert!(detector.predict(&sample()).is_ok());
}
