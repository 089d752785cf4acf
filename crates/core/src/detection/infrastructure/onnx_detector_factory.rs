use std::path::PathBuf;

use crate::detection::domain::face_detector::{DetectError, DetectorFactory, FaceDetector};
use crate::detection::domain::options::{DetectorOptions, PerformanceMode};
use crate::detection::infrastructure::model_resolver;
use crate::detection::infrastructure::onnx_blazeface_detector::OnnxBlazefaceDetector;
use crate::detection::infrastructure::skip_frame_detector::SkipFrameDetector;
use crate::shared::constants::{BLAZEFACE_MODEL_NAME, BLAZEFACE_MODEL_URL, FAST_SKIP_INTERVAL};

/// Builds a fresh BlazeFace detector per scan, resolving the model file on
/// first use (cache → bundled directory → download).
pub struct OnnxDetectorFactory {
    bundled_dir: Option<PathBuf>,
}

impl OnnxDetectorFactory {
    pub fn new() -> Self {
        Self { bundled_dir: None }
    }

    /// Also look for the model in `dir` before downloading.
    pub fn with_bundled_dir(dir: PathBuf) -> Self {
        Self {
            bundled_dir: Some(dir),
        }
    }
}

impl Default for OnnxDetectorFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorFactory for OnnxDetectorFactory {
    fn create(&self, options: &DetectorOptions) -> Result<Box<dyn FaceDetector>, DetectError> {
        options.validate()?;
        let model_path = model_resolver::resolve(
            BLAZEFACE_MODEL_NAME,
            BLAZEFACE_MODEL_URL,
            self.bundled_dir.as_deref(),
            None,
        )
        .map_err(|e| DetectError::ModelLoad(e.to_string()))?;
        let detector = OnnxBlazefaceDetector::new(&model_path, *options)?;
        // Fast mode trades per-frame detection for extrapolated reuse;
        // accurate mode runs the model on every frame.
        match options.performance_mode {
            PerformanceMode::Fast => Ok(Box::new(SkipFrameDetector::new(
                Box::new(detector),
                FAST_SKIP_INTERVAL,
            ))),
            PerformanceMode::Accurate => Ok(Box::new(detector)),
        }
    }
}
