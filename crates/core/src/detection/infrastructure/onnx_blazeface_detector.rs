/// BlazeFace face detector using ONNX Runtime via `ort`.
///
/// The short-range BlazeFace model emits a bounding box plus six keypoints
/// (eyes, nose tip, mouth center, ear tragions) per face. The keypoints are
/// surfaced as landmarks when requested and always feed the head pose
/// estimate. Contours and classification probabilities are not provided by
/// this model; faces carry none regardless of the requested modes.
use std::path::Path;

use crate::detection::domain::face::{Face, Landmark, LandmarkKind};
use crate::detection::domain::face_detector::{DetectError, FaceDetector};
use crate::detection::domain::options::{DetectorOptions, LandmarkMode, PerformanceMode};
use crate::detection::infrastructure::face_tracker::FaceTracker;
use crate::shared::constants::TRACKER_MAX_LOST;
use crate::shared::frame::Frame;
use crate::shared::geometry::{Bounds, ImageSize, Point};

/// BlazeFace model input resolution.
const INPUT_SIZE: u32 = 128;

/// NMS IoU threshold.
const NMS_IOU_THRESH: f64 = 0.3;

/// Number of BlazeFace anchors (short-range model).
const NUM_ANCHORS: usize = 896;

/// Confidence floor in the default (fast) mode.
const FAST_SCORE_THRESH: f32 = 0.5;

/// Accurate mode trades more downstream work for recall.
const ACCURATE_SCORE_THRESH: f32 = 0.3;

/// Keypoint order in the BlazeFace regressor output.
const KP_RIGHT_EYE: usize = 0;
const KP_LEFT_EYE: usize = 1;
const KP_NOSE_TIP: usize = 2;
const KP_MOUTH_CENTER: usize = 3;
const KP_RIGHT_EAR: usize = 4;
const KP_LEFT_EAR: usize = 5;

pub struct OnnxBlazefaceDetector {
    session: ort::session::Session,
    options: DetectorOptions,
    score_thresh: f32,
    anchors: Vec<[f32; 2]>,
    tracker: Option<FaceTracker>,
}

impl OnnxBlazefaceDetector {
    /// Load a BlazeFace ONNX model configured for one scan.
    pub fn new(model_path: &Path, options: DetectorOptions) -> Result<Self, DetectError> {
        options.validate()?;
        let session = ort::session::Session::builder()
            .and_then(|mut b| b.commit_from_file(model_path))
            .map_err(|e| DetectError::ModelLoad(e.to_string()))?;
        let score_thresh = match options.performance_mode {
            PerformanceMode::Fast => FAST_SCORE_THRESH,
            PerformanceMode::Accurate => ACCURATE_SCORE_THRESH,
        };
        let tracker = options
            .enable_tracking
            .then(|| FaceTracker::new(TRACKER_MAX_LOST));
        Ok(Self {
            session,
            options,
            score_thresh,
            anchors: generate_anchors(),
            tracker,
        })
    }
}

impl FaceDetector for OnnxBlazefaceDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Face>, DetectError> {
        let (fw, fh) = (frame.width(), frame.height());

        // 1. Preprocess: resize to 128x128, normalize to [0,1], NCHW
        let input_tensor = preprocess(frame, INPUT_SIZE);

        // 2. Inference
        let input_value = ort::value::Tensor::from_array(input_tensor)
            .map_err(|e| DetectError::Inference(e.to_string()))?;
        let outputs = self
            .session
            .run(ort::inputs![input_value])
            .map_err(|e| DetectError::Inference(e.to_string()))?;

        // BlazeFace outputs two tensors:
        // - regressors: [1, 896, 16] (box deltas + keypoints)
        // - classificators: [1, 896, 1] (confidence scores)
        if outputs.len() < 2 {
            return Err(DetectError::ModelOutput(format!(
                "expected 2 outputs, got {}",
                outputs.len()
            )));
        }

        let regressors = outputs[0]
            .try_extract_array::<f32>()
            .map_err(|e| DetectError::ModelOutput(e.to_string()))?;
        let scores = outputs[1]
            .try_extract_array::<f32>()
            .map_err(|e| DetectError::ModelOutput(e.to_string()))?;
        let reg_data = regressors
            .as_slice()
            .ok_or_else(|| DetectError::ModelOutput("non-contiguous regressors".into()))?;
        let score_data = scores
            .as_slice()
            .ok_or_else(|| DetectError::ModelOutput("non-contiguous scores".into()))?;

        // 3. Decode, suppress, filter by minimum face size
        let mut raw =
            decode_detections(reg_data, score_data, &self.anchors, self.score_thresh, fw, fh);
        let mut kept = nms(&mut raw, NMS_IOU_THRESH);
        kept.retain(|d| relative_width(d, fw) >= self.options.min_face_size);

        // 4. Build faces, then attach tracking ids in one pass
        let mut faces: Vec<Face> = kept
            .iter()
            .map(|d| build_face(d, ImageSize::new(fw, fh), self.options.landmark_mode))
            .collect();

        if let Some(tracker) = &mut self.tracker {
            let boxes: Vec<Bounds> = faces.iter().map(|f| f.bounds).collect();
            let scores: Vec<f64> = kept.iter().map(|d| d.score).collect();
            for (face, id) in faces.iter_mut().zip(tracker.assign(&boxes, &scores)) {
                face.tracking_id = id;
            }
        }

        Ok(faces)
    }
}

// ---------------------------------------------------------------------------
// Decoding
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct RawDetection {
    x1: f64,
    y1: f64,
    x2: f64,
    y2: f64,
    /// Six keypoints in frame pixel coordinates.
    keypoints: [[f64; 2]; 6],
    score: f64,
}

fn decode_detections(
    reg_data: &[f32],
    score_data: &[f32],
    anchors: &[[f32; 2]],
    score_thresh: f32,
    fw: u32,
    fh: u32,
) -> Vec<RawDetection> {
    let mut dets = Vec::new();
    let num_anchors = anchors.len().min(NUM_ANCHORS);

    for (i, &raw_score) in score_data.iter().enumerate().take(num_anchors) {
        let score = sigmoid(raw_score);
        if score < score_thresh {
            continue;
        }

        let anchor = &anchors[i];
        let reg_offset = i * 16;
        if reg_offset + 16 > reg_data.len() {
            break;
        }

        // Box center + size relative to anchor
        let cx = anchor[0] + reg_data[reg_offset] / INPUT_SIZE as f32;
        let cy = anchor[1] + reg_data[reg_offset + 1] / INPUT_SIZE as f32;
        let w = reg_data[reg_offset + 2] / INPUT_SIZE as f32;
        let h = reg_data[reg_offset + 3] / INPUT_SIZE as f32;

        let x1 = ((cx - w / 2.0) * fw as f32).max(0.0);
        let y1 = ((cy - h / 2.0) * fh as f32).max(0.0);
        let x2 = ((cx + w / 2.0) * fw as f32).min(fw as f32);
        let y2 = ((cy + h / 2.0) * fh as f32).min(fh as f32);

        // Keypoints follow the box fields as (x, y) pairs
        let mut keypoints = [[0.0f64; 2]; 6];
        for (k, kp) in keypoints.iter_mut().enumerate() {
            let off = reg_offset + 4 + k * 2;
            let kx = anchor[0] + reg_data[off] / INPUT_SIZE as f32;
            let ky = anchor[1] + reg_data[off + 1] / INPUT_SIZE as f32;
            *kp = [(kx * fw as f32) as f64, (ky * fh as f32) as f64];
        }

        dets.push(RawDetection {
            x1: x1 as f64,
            y1: y1 as f64,
            x2: x2 as f64,
            y2: y2 as f64,
            keypoints,
            score: score as f64,
        });
    }

    dets
}

fn relative_width(det: &RawDetection, frame_width: u32) -> f32 {
    if frame_width == 0 {
        return 0.0;
    }
    ((det.x2 - det.x1) / frame_width as f64) as f32
}

// ---------------------------------------------------------------------------
// Face assembly
// ---------------------------------------------------------------------------

fn build_face(det: &RawDetection, size: ImageSize, landmark_mode: LandmarkMode) -> Face {
    let bounds = Bounds::new(
        det.x1 as i32,
        det.y1 as i32,
        det.x2 as i32,
        det.y2 as i32,
    )
    .clamped_to(size);

    let mut face = Face::new(bounds);
    let (yaw, roll) = estimate_head_pose(&det.keypoints);
    face.head_euler_angle_y = yaw;
    face.head_euler_angle_z = roll;

    if landmark_mode == LandmarkMode::All {
        face.landmarks = keypoint_landmarks(&det.keypoints);
    }

    face
}

fn keypoint_landmarks(keypoints: &[[f64; 2]; 6]) -> Vec<Landmark> {
    let kinds = [
        (KP_RIGHT_EYE, LandmarkKind::RightEye),
        (KP_LEFT_EYE, LandmarkKind::LeftEye),
        (KP_NOSE_TIP, LandmarkKind::NoseBase),
        (KP_MOUTH_CENTER, LandmarkKind::MouthBottom),
        (KP_RIGHT_EAR, LandmarkKind::RightEar),
        (KP_LEFT_EAR, LandmarkKind::LeftEar),
    ];
    kinds
        .iter()
        .map(|&(idx, kind)| Landmark {
            kind,
            position: Point::new(keypoints[idx][0], keypoints[idx][1]),
        })
        .collect()
}

/// Estimates `(yaw, roll)` in degrees from the six keypoints.
///
/// Roll is the eye-line angle. Yaw is the nose tip's horizontal offset from
/// the ear midpoint, scaled by the inter-ear span. Pitch has no usable signal
/// in this keypoint set and is reported as 0.
fn estimate_head_pose(keypoints: &[[f64; 2]; 6]) -> (f32, f32) {
    let right_eye = keypoints[KP_RIGHT_EYE];
    let left_eye = keypoints[KP_LEFT_EYE];
    let nose = keypoints[KP_NOSE_TIP];
    let right_ear = keypoints[KP_RIGHT_EAR];
    let left_ear = keypoints[KP_LEFT_EAR];

    // Image y grows downward, so negate for the conventional sign.
    let roll = (-(left_eye[1] - right_eye[1]))
        .atan2(left_eye[0] - right_eye[0])
        .to_degrees();

    let ear_span = left_ear[0] - right_ear[0];
    let yaw = if ear_span.abs() < f64::EPSILON {
        0.0
    } else {
        let mid_ear = (left_ear[0] + right_ear[0]) / 2.0;
        ((nose[0] - mid_ear) / ear_span * 90.0).clamp(-90.0, 90.0)
    };

    (yaw as f32, roll as f32)
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

/// Resize frame to `size × size` and normalize to [0,1] NCHW float32.
fn preprocess(frame: &Frame, size: u32) -> ndarray::Array4<f32> {
    let src = frame.as_ndarray();
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let s = size as usize;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, s, s));

    for y in 0..s {
        let src_y = (((y as f64 + 0.5) * src_h as f64 / s as f64) as usize).min(src_h - 1);
        for x in 0..s {
            let src_x = (((x as f64 + 0.5) * src_w as f64 / s as f64) as usize).min(src_w - 1);
            for c in 0..3 {
                tensor[[0, c, y, x]] = src[[src_y, src_x, c]] as f32 / 255.0;
            }
        }
    }

    tensor
}

// ---------------------------------------------------------------------------
// Anchor generation (BlazeFace short-range)
// ---------------------------------------------------------------------------

/// Generate BlazeFace anchors for the short-range model.
///
/// The short-range model uses two feature map sizes: 16×16 and 8×8,
/// with 2 and 6 anchors per cell respectively.
fn generate_anchors() -> Vec<[f32; 2]> {
    let strides = [(8, 2), (16, 6)]; // (stride, anchors_per_cell)
    let mut anchors = Vec::with_capacity(NUM_ANCHORS);

    for &(stride, num) in &strides {
        let grid_size = INPUT_SIZE as usize / stride;
        for y in 0..grid_size {
            for x in 0..grid_size {
                let cx = (x as f32 + 0.5) / grid_size as f32;
                let cy = (y as f32 + 0.5) / grid_size as f32;
                for _ in 0..num {
                    anchors.push([cx, cy]);
                }
            }
        }
    }

    anchors
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

fn nms(dets: &mut [RawDetection], iou_thresh: f64) -> Vec<RawDetection> {
    dets.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = Vec::new();
    let mut suppressed = vec![false; dets.len()];

    for i in 0..dets.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(dets[i].clone());
        for j in (i + 1)..dets.len() {
            if suppressed[j] {
                continue;
            }
            if raw_iou(&dets[i], &dets[j]) > iou_thresh {
                suppressed[j] = true;
            }
        }
    }
    keep
}

fn raw_iou(a: &RawDetection, b: &RawDetection) -> f64 {
    let x1 = a.x1.max(b.x1);
    let y1 = a.y1.max(b.y1);
    let x2 = a.x2.min(b.x2);
    let y2 = a.y2.min(b.y2);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    if inter == 0.0 {
        return 0.0;
    }
    let area_a = (a.x2 - a.x1) * (a.y2 - a.y1);
    let area_b = (b.x2 - b.x1) * (b.y2 - b.y1);
    inter / (area_a + area_b - inter)
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn raw(x1: f64, y1: f64, x2: f64, y2: f64, score: f64) -> RawDetection {
        RawDetection {
            x1,
            y1,
            x2,
            y2,
            keypoints: [[0.0; 2]; 6],
            score,
        }
    }

    /// Symmetric frontal face: eyes level, nose centered between ears.
    fn frontal_keypoints() -> [[f64; 2]; 6] {
        let mut kp = [[0.0; 2]; 6];
        kp[KP_RIGHT_EYE] = [40.0, 50.0];
        kp[KP_LEFT_EYE] = [80.0, 50.0];
        kp[KP_NOSE_TIP] = [60.0, 70.0];
        kp[KP_MOUTH_CENTER] = [60.0, 90.0];
        kp[KP_RIGHT_EAR] = [20.0, 55.0];
        kp[KP_LEFT_EAR] = [100.0, 55.0];
        kp
    }

    #[test]
    fn test_preprocess_shape() {
        let data = vec![128u8; 200 * 100 * 3];
        let frame = Frame::new(data, 200, 100, 3, 0);
        let tensor = preprocess(&frame, 128);
        assert_eq!(tensor.shape(), &[1, 3, 128, 128]);
    }

    #[test]
    fn test_preprocess_normalized() {
        let data = vec![255u8; 50 * 50 * 3];
        let frame = Frame::new(data, 50, 50, 3, 0);
        let tensor = preprocess(&frame, 128);
        // All source pixels are 255, so resized pixels should be ~1.0
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_generate_anchors_count() {
        // 16×16 grid × 2 anchors + 8×8 grid × 6 anchors = 512 + 384 = 896
        assert_eq!(generate_anchors().len(), NUM_ANCHORS);
    }

    #[test]
    fn test_anchors_in_unit_range() {
        for a in &generate_anchors() {
            assert!(a[0] > 0.0 && a[0] < 1.0);
            assert!(a[1] > 0.0 && a[1] < 1.0);
        }
    }

    #[test]
    fn test_sigmoid_zero() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let mut dets = vec![raw(0.0, 0.0, 100.0, 100.0, 0.9), raw(5.0, 5.0, 105.0, 105.0, 0.7)];
        assert_eq!(nms(&mut dets, 0.3).len(), 1);
    }

    #[test]
    fn test_nms_keeps_separate() {
        let mut dets = vec![
            raw(0.0, 0.0, 50.0, 50.0, 0.9),
            raw(200.0, 200.0, 250.0, 250.0, 0.8),
        ];
        assert_eq!(nms(&mut dets, 0.3).len(), 2);
    }

    #[test]
    fn test_relative_width() {
        let d = raw(0.0, 0.0, 50.0, 50.0, 0.9);
        assert_relative_eq!(relative_width(&d, 200), 0.25);
    }

    #[test]
    fn test_relative_width_zero_frame() {
        let d = raw(0.0, 0.0, 50.0, 50.0, 0.9);
        assert_relative_eq!(relative_width(&d, 0), 0.0);
    }

    #[test]
    fn test_head_pose_frontal_face_is_neutral() {
        let (yaw, roll) = estimate_head_pose(&frontal_keypoints());
        assert_relative_eq!(yaw, 0.0);
        assert_relative_eq!(roll, 0.0);
    }

    #[test]
    fn test_head_pose_tilted_eyes_give_roll() {
        let mut kp = frontal_keypoints();
        // Left eye raised: counterclockwise tilt in image space
        kp[KP_LEFT_EYE] = [80.0, 10.0];
        let (_, roll) = estimate_head_pose(&kp);
        assert!(roll > 0.0);
    }

    #[test]
    fn test_head_pose_offset_nose_gives_yaw() {
        let mut kp = frontal_keypoints();
        kp[KP_NOSE_TIP] = [90.0, 70.0]; // nose shifted toward left ear
        let (yaw, _) = estimate_head_pose(&kp);
        assert!(yaw > 0.0);
    }

    #[test]
    fn test_head_pose_degenerate_ears() {
        let mut kp = frontal_keypoints();
        kp[KP_RIGHT_EAR] = [60.0, 55.0];
        kp[KP_LEFT_EAR] = [60.0, 55.0];
        let (yaw, _) = estimate_head_pose(&kp);
        assert_relative_eq!(yaw, 0.0);
    }

    #[test]
    fn test_build_face_clamps_bounds() {
        let mut d = raw(-10.0, -5.0, 120.0, 90.0, 0.9);
        d.keypoints = frontal_keypoints();
        let face = build_face(&d, ImageSize::new(100, 80), LandmarkMode::None);
        assert_eq!(face.bounds, Bounds::new(0, 0, 100, 80));
    }

    #[test]
    fn test_build_face_landmarks_off_by_default_mode() {
        let mut d = raw(0.0, 0.0, 100.0, 100.0, 0.9);
        d.keypoints = frontal_keypoints();
        let face = build_face(&d, ImageSize::new(200, 200), LandmarkMode::None);
        assert!(face.landmarks.is_empty());
    }

    #[test]
    fn test_build_face_landmarks_mapped_when_requested() {
        let mut d = raw(0.0, 0.0, 100.0, 100.0, 0.9);
        d.keypoints = frontal_keypoints();
        let face = build_face(&d, ImageSize::new(200, 200), LandmarkMode::All);
        assert_eq!(face.landmarks.len(), 6);

        let nose = face
            .landmarks
            .iter()
            .find(|l| l.kind == LandmarkKind::NoseBase)
            .unwrap();
        assert_relative_eq!(nose.position.x, 60.0);
        assert_relative_eq!(nose.position.y, 70.0);
    }

    #[test]
    fn test_build_face_no_classification_probabilities() {
        let mut d = raw(0.0, 0.0, 100.0, 100.0, 0.9);
        d.keypoints = frontal_keypoints();
        let face = build_face(&d, ImageSize::new(200, 200), LandmarkMode::All);
        assert!(face.smiling_probability.is_none());
        assert!(face.left_eye_open_probability.is_none());
        assert!(face.right_eye_open_probability.is_none());
    }

    #[test]
    fn test_decode_skips_below_threshold() {
        let anchors = generate_anchors();
        let reg_data = vec![0.0f32; NUM_ANCHORS * 16];
        let score_data = vec![-10.0f32; NUM_ANCHORS]; // sigmoid ≈ 0
        let dets = decode_detections(&reg_data, &score_data, &anchors, 0.5, 100, 100);
        assert!(dets.is_empty());
    }

    #[test]
    fn test_decode_emits_above_threshold() {
        let anchors = generate_anchors();
        let mut reg_data = vec![0.0f32; NUM_ANCHORS * 16];
        // Anchor at grid cell (8,8) of the 16x16 map: first anchor index is
        // (8*16 + 8) * 2 = 272, centered enough that nothing clamps.
        let i = 272;
        reg_data[i * 16 + 2] = 32.0; // w/h encoded in input-pixel units
        reg_data[i * 16 + 3] = 32.0;
        let mut score_data = vec![-10.0f32; NUM_ANCHORS];
        score_data[i] = 10.0; // sigmoid ≈ 1
        let dets = decode_detections(&reg_data, &score_data, &anchors, 0.5, 128, 128);
        assert_eq!(dets.len(), 1);
        assert_relative_eq!(dets[0].x2 - dets[0].x1, 32.0, epsilon = 0.01);
    }
}
