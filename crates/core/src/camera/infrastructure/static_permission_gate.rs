use std::sync::Mutex;

use crate::camera::domain::camera::CameraError;
use crate::camera::domain::permission::{PermissionGate, PermissionState};

/// In-process stand-in for the host permission subsystem.
///
/// Starts in a configured state; a `Prompt` gate resolves to granted or
/// denied on the first `request`, mirroring how a real OS prompt settles
/// the state permanently.
pub struct StaticPermissionGate {
    state: Mutex<PermissionState>,
    grant_on_request: bool,
}

impl StaticPermissionGate {
    pub fn granted() -> Self {
        Self::with_state(PermissionState::Granted, true)
    }

    pub fn denied() -> Self {
        Self::with_state(PermissionState::Denied, false)
    }

    pub fn prompt(grant_on_request: bool) -> Self {
        Self::with_state(PermissionState::Prompt, grant_on_request)
    }

    fn with_state(state: PermissionState, grant_on_request: bool) -> Self {
        Self {
            state: Mutex::new(state),
            grant_on_request,
        }
    }
}

impl PermissionGate for StaticPermissionGate {
    fn check(&self) -> PermissionState {
        *self.state.lock().expect("permission state poisoned")
    }

    fn request(&self) -> PermissionState {
        let mut state = self.state.lock().expect("permission state poisoned");
        if *state == PermissionState::Prompt {
            *state = if self.grant_on_request {
                PermissionState::Granted
            } else {
                PermissionState::Denied
            };
        }
        *state
    }

    fn open_settings(&self) -> Result<(), CameraError> {
        log::info!("open_settings requested; no settings surface in-process");
        Ok(())
    }
}
