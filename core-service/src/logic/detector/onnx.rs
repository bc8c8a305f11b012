//! Model-backed detector - ONNX Runtime Integration
//!
//! Two independent binary classifiers (plastic-vs-not, oil-vs-not).
//! Input: RGB resized to the target size, scaled to [0, 1], NHWC with a batch axis.

use std::path::Path;

use image::imageops::FilterType;
use image::RgbImage;
use ndarray::Array4;
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use parking_lot::Mutex;

use super::output::RawOutput;
use super::{DetectorError, DetectorKind, DualDetector, ModelConfig, ProbabilityPair};
use crate::logic::sample::ImageSample;

// ============================================================================
// PREPROCESSING
// ============================================================================

/// `[1, h, w, 3]` tensor with pixel values in [0, 1]
pub fn to_input_tensor(rgb: &RgbImage, target_size: (u32, u32)) -> Array4<f32> {
    let (width, height) = target_size;
    let resized = image::imageops::resize(rgb, width, height, FilterType::CatmullRom);

    Array4::from_shape_fn((1, height as usize, width as usize, 3), |(_, y, x, c)| {
        resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0
    })
}

// ============================================================================
// CLASSIFIER SEAM
// ============================================================================

/// One binary classifier producing a raw output tensor
pub trait BinaryClassifier: Send + Sync {
    fn infer(&self, input: &Array4<f32>) -> Result<RawOutput, DetectorError>;
}

/// ONNX session; `run` needs `&mut`, so it sits behind a mutex
pub struct OnnxClassifier {
    name: String,
    session: Mutex<Session>,
}

impl OnnxClassifier {
    pub fn from_file(path: &Path) -> Result<Self, DetectorError> {
        log::info!("Loading ONNX model from: {}", path.display());

        if !path.exists() {
            return Err(DetectorError::ModelNotFound(path.to_path_buf()));
        }

        let session = Session::builder()
            .map_err(|e| DetectorError::Session(format!("Failed to create session builder: {}", e)))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| DetectorError::Session(format!("Failed to set optimization: {}", e)))?
            .commit_from_file(path)
            .map_err(|e| DetectorError::Session(format!("Failed to load model: {}", e)))?;

        log::info!("ONNX model loaded: {}", path.display());

        Ok(Self {
            name: path.display().to_string(),
            session: Mutex::new(session),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl BinaryClassifier for OnnxClassifier {
    fn infer(&self, input: &Array4<f32>) -> Result<RawOutput, DetectorError> {
        let mut session = self.session.lock();

        let output_name = session.outputs.first()
            .map(|o| o.name.clone())
            .ok_or_else(|| DetectorError::Inference(format!("{}: no output defined", self.name)))?;

        let input_tensor = Value::from_array(input.clone())
            .map_err(|e| DetectorError::Inference(format!("Tensor error: {}", e)))?;

        let outputs = session.run(ort::inputs![input_tensor])
            .map_err(|e| DetectorError::Inference(format!("{}: inference failed: {}", self.name, e)))?;

        let output = outputs.get(&output_name)
            .ok_or_else(|| DetectorError::Inference(format!("{}: no output", self.name)))?;

        let (shape, data) = output.try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::Inference(format!("Extract error: {}", e)))?;

        let dims: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
        log::debug!("{}: raw output shape {:?}", self.name, dims);

        Ok(RawOutput::new(dims, data.to_vec()))
    }
}

// ============================================================================
// DETECTOR
// ============================================================================

pub struct ModelBackedDetector {
    plastic: Box<dyn BinaryClassifier>,
    oil: Box<dyn BinaryClassifier>,
    target_size: (u32, u32),
}

impl ModelBackedDetector {
    pub fn new(
        plastic: Box<dyn BinaryClassifier>,
        oil: Box<dyn BinaryClassifier>,
        target_size: (u32, u32),
    ) -> Self {
        Self { plastic, oil, target_size }
    }

    /// Both files must exist and load
    pub fn load(config: &ModelConfig) -> Result<Self, DetectorError> {
        log::info!("Plastic model path: {}", config.plastic_model.display());
        log::info!("Oil model path: {}", config.oil_model.display());

        for path in [&config.plastic_model, &config.oil_model] {
            if !path.exists() {
                return Err(DetectorError::ModelNotFound(path.clone()));
            }
        }

        let plastic = OnnxClassifier::from_file(&config.plastic_model)?;
        let oil = OnnxClassifier::from_file(&config.oil_model)?;

        Ok(Self::new(Box::new(plastic), Box::new(oil), config.target_size))
    }
}

impl DualDetector for ModelBackedDetector {
    fn kind(&self) -> DetectorKind {
        DetectorKind::Model
    }

    fn predict(&self, sample: &ImageSample) -> Result<ProbabilityPair, DetectorError> {
        let input = to_input_tensor(&sample.rgb, self.target_size);

        let p_plastic = self.plastic.infer(&input)?.probability()?;
        let p_oil = self.oil.infer(&input)?.probability()?;

        log::info!("Model predictions: plastic={:.4} oil={:.4}", p_plastic, p_oil);
        Ok(ProbabilityPair { p_plastic, p_oil })
    }
}
