use std::collections::HashMap;

use crate::detection::domain::face::Face;
use crate::detection::domain::face_detector::{DetectError, FaceDetector};
use crate::shared::frame::Frame;

/// Decorator that runs detection every N frames, reusing results in between.
///
/// On skipped frames, face positions are linearly extrapolated from the
/// velocity observed between the two most recent real detections, preventing
/// the stutter that would result from simply repeating stale positions.
pub struct SkipFrameDetector {
    inner: Box<dyn FaceDetector>,
    skip_interval: usize,
    frame_count: usize,
    last_faces: Vec<Face>,
    /// Per-track velocity (dx, dy per frame) between last two real detections.
    velocity: HashMap<u32, (f64, f64)>,
    /// Per-track top-left corner at last real detection.
    prev_pos: HashMap<u32, (i32, i32)>,
    frames_since_detect: usize,
}

impl SkipFrameDetector {
    /// An interval of 0 or 1 delegates every frame.
    pub fn new(inner: Box<dyn FaceDetector>, skip_interval: usize) -> Self {
        Self {
            inner,
            skip_interval: skip_interval.max(1),
            frame_count: 0,
            last_faces: Vec::new(),
            velocity: HashMap::new(),
            prev_pos: HashMap::new(),
            frames_since_detect: 0,
        }
    }

    fn update_velocity(&mut self, faces: &[Face]) {
        let mut new_pos: HashMap<u32, (i32, i32)> = HashMap::new();
        for f in faces {
            if let Some(tid) = f.tracking_id {
                new_pos.insert(tid, (f.bounds.left, f.bounds.top));
                if let Some(&(old_x, old_y)) = self.prev_pos.get(&tid) {
                    let dx = (f.bounds.left - old_x) as f64 / self.skip_interval as f64;
                    let dy = (f.bounds.top - old_y) as f64 / self.skip_interval as f64;
                    self.velocity.insert(tid, (dx, dy));
                }
            }
        }
        self.prev_pos = new_pos;
    }

    fn extrapolate(&self, faces: &[Face], steps: usize) -> Vec<Face> {
        faces
            .iter()
            .map(|f| {
                let vel = f.tracking_id.and_then(|tid| self.velocity.get(&tid));
                match vel {
                    None => f.clone(),
                    Some(&(dx, dy)) => {
                        let shift_x = (dx * steps as f64) as i32;
                        let shift_y = (dy * steps as f64) as i32;
                        let mut shifted = f.clone();
                        shifted.bounds.left = (f.bounds.left + shift_x).max(0);
                        shifted.bounds.top = (f.bounds.top + shift_y).max(0);
                        shifted.bounds.right = shifted.bounds.left + f.bounds.width();
                        shifted.bounds.bottom = shifted.bounds.top + f.bounds.height();
                        for lm in &mut shifted.landmarks {
                            lm.position.x += dx * steps as f64;
                            lm.position.y += dy * steps as f64;
                        }
                        shifted
                    }
                }
            })
            .collect()
    }
}

impl FaceDetector for SkipFrameDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Face>, DetectError> {
        if self.frame_count % self.skip_interval == 0 {
            let new_faces = self.inner.detect(frame)?;
            self.update_velocity(&new_faces);
            self.last_faces = new_faces;
            self.frames_since_detect = 0;
        } else {
            self.frames_since_detect += 1;
        }
        self.frame_count += 1;

        if self.frames_since_detect == 0 {
            Ok(self.last_faces.clone())
        } else {
            Ok(self.extrapolate(&self.last_faces, self.frames_since_detect))
        }
    }
}
