use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::shared::geometry::{Bounds, Point};

/// Well-known facial landmark positions.
///
/// The numeric codes are the ones embedders already match on, so the enum
/// serializes as its code rather than its name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LandmarkKind {
    MouthBottom,
    LeftCheek,
    LeftEar,
    LeftEye,
    MouthLeft,
    NoseBase,
    RightCheek,
    RightEar,
    RightEye,
    MouthRight,
}

impl LandmarkKind {
    pub fn code(&self) -> i32 {
        match self {
            LandmarkKind::MouthBottom => 0,
            LandmarkKind::LeftCheek => 1,
            LandmarkKind::LeftEar => 3,
            LandmarkKind::LeftEye => 4,
            LandmarkKind::MouthLeft => 5,
            LandmarkKind::NoseBase => 6,
            LandmarkKind::RightCheek => 7,
            LandmarkKind::RightEar => 9,
            LandmarkKind::RightEye => 10,
            LandmarkKind::MouthRight => 11,
        }
    }
}

impl Serialize for LandmarkKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

/// Face outline groups, same code-over-name serialization as landmarks.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ContourKind {
    Face,
    LeftEyebrowTop,
    LeftEyebrowBottom,
    RightEyebrowTop,
    RightEyebrowBottom,
    LeftEye,
    RightEye,
    UpperLipTop,
    UpperLipBottom,
    LowerLipTop,
    LowerLipBottom,
    NoseBridge,
    NoseBottom,
    LeftCheek,
    RightCheek,
}

impl ContourKind {
    pub fn code(&self) -> i32 {
        match self {
            ContourKind::Face => 1,
            ContourKind::LeftEyebrowTop => 2,
            ContourKind::LeftEyebrowBottom => 3,
            ContourKind::RightEyebrowTop => 4,
            ContourKind::RightEyebrowBottom => 5,
            ContourKind::LeftEye => 6,
            ContourKind::RightEye => 7,
            ContourKind::UpperLipTop => 8,
            ContourKind::UpperLipBottom => 9,
            ContourKind::LowerLipTop => 10,
            ContourKind::LowerLipBottom => 11,
            ContourKind::NoseBridge => 12,
            ContourKind::NoseBottom => 13,
            ContourKind::LeftCheek => 14,
            ContourKind::RightCheek => 15,
        }
    }
}

impl Serialize for ContourKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i32(self.code())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Landmark {
    #[serde(rename = "type")]
    pub kind: LandmarkKind,
    pub position: Point,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Contour {
    #[serde(rename = "type")]
    pub kind: ContourKind,
    pub points: Vec<Point>,
}

/// One detected face.
///
/// Optional payloads are omitted from serialized output entirely rather
/// than emitted as null/empty, matching what downstream result consumers
/// already expect.
#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    pub bounds: Bounds,
    pub landmarks: Vec<Landmark>,
    pub contours: Vec<Contour>,
    pub tracking_id: Option<u32>,
    pub head_euler_angle_x: f32,
    pub head_euler_angle_y: f32,
    pub head_euler_angle_z: f32,
    pub smiling_probability: Option<f32>,
    pub left_eye_open_probability: Option<f32>,
    pub right_eye_open_probability: Option<f32>,
}

impl Face {
    pub fn new(bounds: Bounds) -> Self {
        Self {
            bounds,
            landmarks: Vec::new(),
            contours: Vec::new(),
            tracking_id: None,
            head_euler_angle_x: 0.0,
            head_euler_angle_y: 0.0,
            head_euler_angle_z: 0.0,
            smiling_probability: None,
            left_eye_open_probability: None,
            right_eye_open_probability: None,
        }
    }
}

impl Serialize for Face {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut present = 4; // bounds + three euler angles
        present += usize::from(!self.landmarks.is_empty());
        present += usize::from(!self.contours.is_empty());
        present += usize::from(self.tracking_id.is_some());
        present += usize::from(self.smiling_probability.is_some());
        present += usize::from(self.left_eye_open_probability.is_some());
        present += usize::from(self.right_eye_open_probability.is_some());

        let mut s = serializer.serialize_struct("Face", present)?;
        s.serialize_field("bounds", &self.bounds)?;
        if !self.landmarks.is_empty() {
            s.serialize_field("landmarks", &self.landmarks)?;
        }
        if !self.contours.is_empty() {
            s.serialize_field("contours", &self.contours)?;
        }
        if let Some(id) = self.tracking_id {
            s.serialize_field("trackingId", &id)?;
        }
        s.serialize_field("headEulerAngleX", &self.head_euler_angle_x)?;
        s.serialize_field("headEulerAngleY", &self.head_euler_angle_y)?;
        s.serialize_field("headEulerAngleZ", &self.head_euler_angle_z)?;
        if let Some(p) = self.smiling_probability {
            s.serialize_field("smilingProbability", &p)?;
        }
        if let Some(p) = self.left_eye_open_probability {
            s.serialize_field("leftEyeOpenProbability", &p)?;
        }
        if let Some(p) = self.right_eye_open_probability {
            s.serialize_field("rightEyeOpenProbability", &p)?;
        }
        s.end()
    }
}

/// Result of detecting faces in a single image: `{"faces":[...]}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionResult {
    pub faces: Vec<Face>,
}

impl DetectionResult {
    pub fn new(faces: Vec<Face>) -> Self {
        Self { faces }
    }
}
