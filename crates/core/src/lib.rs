pub mod camera;
pub mod detection;
pub mod scan;
pub mod shared;
