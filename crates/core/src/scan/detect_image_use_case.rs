use std::path::Path;
use std::sync::Arc;

use crate::detection::domain::face::DetectionResult;
use crate::detection::domain::face_detector::DetectorFactory;
use crate::detection::domain::options::DetectorOptions;
use crate::scan::scan_controller::ScanError;
use crate::shared::frame::Frame;

/// Detects faces in a single image file.
///
/// Independent of any live scan: each call gets its own detector instance
/// and returns the full multi-face result instead of streaming events.
pub struct DetectImageUseCase {
    factory: Arc<dyn DetectorFactory>,
}

impl DetectImageUseCase {
    pub fn new(factory: Arc<dyn DetectorFactory>) -> Self {
        Self { factory }
    }

    pub fn execute(
        &self,
        path: &Path,
        options: &DetectorOptions,
    ) -> Result<DetectionResult, ScanError> {
        options.validate()?;

        let rgb = image::open(path)
            .map_err(|e| {
                log::warn!("failed to load {}: {e}", path.display());
                ScanError::ImageLoad(path.to_path_buf())
            })?
            .to_rgb8();
        let (width, height) = rgb.dimensions();
        let frame = Frame::new(rgb.into_raw(), width, height, 3, 0);

        let mut detector = self.factory.create(options)?;
        let faces = detector.detect(&frame)?;
        log::info!("{}: {} face(s)", path.display(), faces.len());
        Ok(DetectionResult::new(faces))
    }
}
