pub mod camera;
pub mod permission;
