use std::path::{Path, PathBuf};

use crate::camera::domain::camera::{Camera, CameraError, CameraProvider};
use crate::detection::domain::options::LensFacing;
use crate::shared::constants::IMAGE_EXTENSIONS;
use crate::shared::frame::Frame;
use crate::shared::geometry::ImageSize;

/// Adapts a directory of image files to the [`Camera`] port.
///
/// Files are served in name order, one per frame; the stream ends when the
/// directory is exhausted. The torch is a software flag so lifecycle logic
/// (enable/disable/toggle, off-on-stop) can be exercised without hardware.
pub struct ImageDirCamera {
    paths: Vec<PathBuf>,
    next: usize,
    size: ImageSize,
    torch_on: bool,
}

impl ImageDirCamera {
    /// Opens the directory, probing the first image for frame dimensions.
    pub fn open(dir: &Path, facing: LensFacing) -> Result<Self, CameraError> {
        let paths = list_image_files(dir)?;
        let first = paths.first().ok_or(CameraError::NoCamera(facing))?;
        let (width, height) =
            image::image_dimensions(first).map_err(|e| CameraError::FrameRead(e.to_string()))?;
        Ok(Self {
            paths,
            next: 0,
            size: ImageSize::new(width, height),
            torch_on: false,
        })
    }
}

impl Camera for ImageDirCamera {
    fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };
        let index = self.next;
        self.next += 1;

        let rgb = image::open(path)
            .map_err(|e| CameraError::FrameRead(format!("{}: {e}", path.display())))?
            .to_rgb8();
        let (w, h) = rgb.dimensions();
        Ok(Some(Frame::new(rgb.into_raw(), w, h, 3, index)))
    }

    fn image_size(&self) -> ImageSize {
        self.size
    }

    fn has_torch(&self) -> bool {
        true
    }

    fn set_torch(&mut self, on: bool) -> Result<(), CameraError> {
        self.torch_on = on;
        Ok(())
    }
}

/// Provider over a root directory.
///
/// When `root/back` or `root/front` exist they back the corresponding lens;
/// otherwise every lens maps to the root directory itself.
pub struct ImageDirCameraProvider {
    root: PathBuf,
}

impl ImageDirCameraProvider {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn dir_for(&self, facing: LensFacing) -> PathBuf {
        let sub = match facing {
            LensFacing::Back => self.root.join("back"),
            LensFacing::Front => self.root.join("front"),
        };
        if sub.is_dir() {
            sub
        } else {
            self.root.clone()
        }
    }
}

impl CameraProvider for ImageDirCameraProvider {
    fn open(&self, facing: LensFacing) -> Result<Box<dyn Camera>, CameraError> {
        let camera = ImageDirCamera::open(&self.dir_for(facing), facing)?;
        Ok(Box::new(camera))
    }

    fn is_supported(&self) -> bool {
        self.root.is_dir()
    }

    fn is_torch_available(&self) -> bool {
        true
    }
}

fn list_image_files(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| is_image(p))
        .collect();
    paths.sort();
    Ok(paths)
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
