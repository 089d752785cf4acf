use serde::Serialize;

use crate::detection::domain::face::Face;
use crate::shared::geometry::ImageSize;

/// Events emitted during a live scan, one channel message each.
///
/// The event name travels out of band (listener registration keys on it);
/// the serialized value is the payload only, hence `untagged`.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScanEvent {
    /// One detected face in one analyzed frame. `image_size` is the analyzed
    /// frame's dimensions, for mapping coordinates into view space.
    FaceScanned {
        face: Face,
        #[serde(rename = "imageSize")]
        image_size: ImageSize,
    },
    /// A per-frame detection failure. The scan keeps running.
    Error { message: String },
}

impl ScanEvent {
    /// Listener event name for this payload.
    pub fn name(&self) -> &'static str {
        match self {
            ScanEvent::FaceScanned { .. } => "faceScanned",
            ScanEvent::Error { .. } => "scanError",
        }
    }
}
