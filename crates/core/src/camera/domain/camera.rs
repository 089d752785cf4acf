use thiserror::Error;

use crate::detection::domain::options::LensFacing;
use crate::shared::frame::Frame;
use crate::shared::geometry::ImageSize;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("no camera available for {0:?} lens")]
    NoCamera(LensFacing),
    #[error("failed to read frame: {0}")]
    FrameRead(String),
    #[error("torch is not available on this camera")]
    TorchUnavailable,
    #[error("camera I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// An opened capture session.
///
/// Frames are pulled one at a time; `Ok(None)` means the stream ended.
/// Torch state belongs to the session and dies with it.
pub trait Camera: Send {
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError>;

    /// Dimensions of the frames this session produces.
    fn image_size(&self) -> ImageSize;

    fn has_torch(&self) -> bool;

    fn set_torch(&mut self, on: bool) -> Result<(), CameraError>;
}

/// Port to the platform camera subsystem.
pub trait CameraProvider: Send + Sync {
    fn open(&self, facing: LensFacing) -> Result<Box<dyn Camera>, CameraError>;

    /// Whether any camera hardware exists at all.
    fn is_supported(&self) -> bool;

    /// Whether the device has a flash unit, independent of any open session.
    fn is_torch_available(&self) -> bool;
}
