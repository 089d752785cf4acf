use thiserror::Error;

use crate::detection::domain::face::Face;
use crate::detection::domain::options::{DetectorOptions, OptionsError};
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum DetectError {
    #[error("invalid detector options: {0}")]
    Options(#[from] OptionsError),
    #[error("failed to load detection model: {0}")]
    ModelLoad(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("unexpected model output: {0}")]
    ModelOutput(String),
}

/// Domain interface for face detection.
///
/// Implementations may be stateful (e.g., tracking across frames),
/// hence `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Face>, DetectError>;
}

/// Builds a fresh detector instance configured for one scan or one
/// static-image call. Instances are never shared between scans.
pub trait DetectorFactory: Send + Sync {
    fn create(&self, options: &DetectorOptions) -> Result<Box<dyn FaceDetector>, DetectError>;
}
