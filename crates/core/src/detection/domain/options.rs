use std::str::FromStr;

use thiserror::Error;

use crate::shared::constants::DEFAULT_MIN_FACE_SIZE;

#[derive(Error, Debug, PartialEq)]
pub enum OptionsError {
    #[error("minFaceSize must be in (0.0, 1.0], got {0}")]
    MinFaceSize(f32),
}

/// Detection speed/accuracy trade-off.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PerformanceMode {
    #[default]
    Fast,
    Accurate,
}

/// Whether per-face landmarks are computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LandmarkMode {
    #[default]
    None,
    All,
}

/// Whether per-face outline contours are computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ContourMode {
    #[default]
    None,
    All,
}

/// Whether classification probabilities (smiling, eyes open) are computed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClassificationMode {
    #[default]
    None,
    All,
}

/// Which camera the live scan binds to.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LensFacing {
    #[default]
    Back,
    Front,
}

impl FromStr for LensFacing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BACK" => Ok(LensFacing::Back),
            "FRONT" => Ok(LensFacing::Front),
            other => Err(format!("unknown lens facing: {other}")),
        }
    }
}

/// Configuration handed to the detector factory for one scan or one
/// static-image call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DetectorOptions {
    pub performance_mode: PerformanceMode,
    pub landmark_mode: LandmarkMode,
    pub contour_mode: ContourMode,
    pub classification_mode: ClassificationMode,
    /// Minimum face width as a fraction of image width. Faces narrower than
    /// this are dropped before any landmark/contour work.
    pub min_face_size: f32,
    pub enable_tracking: bool,
}

impl Default for DetectorOptions {
    fn default() -> Self {
        Self {
            performance_mode: PerformanceMode::default(),
            landmark_mode: LandmarkMode::default(),
            contour_mode: ContourMode::default(),
            classification_mode: ClassificationMode::default(),
            min_face_size: DEFAULT_MIN_FACE_SIZE,
            enable_tracking: false,
        }
    }
}

impl DetectorOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        if !(self.min_face_size > 0.0 && self.min_face_size <= 1.0) {
            return Err(OptionsError::MinFaceSize(self.min_face_size));
        }
        Ok(())
    }
}

/// Live-scan configuration: detector options plus camera selection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScanOptions {
    pub detector: DetectorOptions,
    pub lens_facing: LensFacing,
}

impl ScanOptions {
    pub fn validate(&self) -> Result<(), OptionsError> {
        self.detector.validate()
    }
}
