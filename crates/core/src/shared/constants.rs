pub const BLAZEFACE_MODEL_NAME: &str = "blazeface_short_range.onnx";
pub const BLAZEFACE_MODEL_URL: &str =
    "https://github.com/facescan/models/releases/download/v0.1.0/blazeface_short_range.onnx";

/// Max frames a tracked face can go unmatched before its id is retired
/// (~1 second at 30 fps).
pub const TRACKER_MAX_LOST: usize = 30;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Frames between real detections in fast mode; in-between frames reuse
/// extrapolated results.
pub const FAST_SKIP_INTERVAL: usize = 2;

/// Default minimum face width, as a fraction of image width.
pub const DEFAULT_MIN_FACE_SIZE: f32 = 0.1;
