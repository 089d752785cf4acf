use serde::Serialize;

use crate::camera::domain::camera::CameraError;

/// Host-OS camera permission state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionState {
    Granted,
    Denied,
    /// Not yet determined; the user has not been asked.
    Prompt,
}

/// Port to the host permission subsystem.
///
/// `request` may block on user interaction and returns the state the user
/// settled on. `open_settings` sends the user to the app's OS settings page
/// for permissions that can only be changed there.
pub trait PermissionGate: Send + Sync {
    fn check(&self) -> PermissionState;

    fn request(&self) -> PermissionState;

    fn open_settings(&self) -> Result<(), CameraError>;
}
