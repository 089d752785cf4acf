pub mod face_tracker;
pub mod model_resolver;
pub mod onnx_blazeface_detector;
pub mod onnx_detector_factory;
pub mod skip_frame_detector;
