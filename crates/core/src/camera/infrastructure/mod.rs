pub mod image_dir_camera;
pub mod static_permission_gate;
