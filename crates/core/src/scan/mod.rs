pub mod detect_image_use_case;
pub mod scan_controller;
pub mod scan_event;
