use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use thiserror::Error;

use crate::camera::domain::camera::{Camera, CameraError, CameraProvider};
use crate::camera::domain::permission::{PermissionGate, PermissionState};
use crate::detection::domain::face_detector::{DetectError, DetectorFactory, FaceDetector};
use crate::detection::domain::options::{OptionsError, ScanOptions};
use crate::scan::scan_event::ScanEvent;
use crate::shared::geometry::ImageSize;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("User denied access to camera.")]
    PermissionDenied,
    #[error("image could not be loaded.")]
    ImageLoad(PathBuf),
    #[error(transparent)]
    Options(#[from] OptionsError),
    #[error(transparent)]
    Detector(#[from] DetectError),
    #[error(transparent)]
    Camera(#[from] CameraError),
}

type SharedCamera = Arc<Mutex<Box<dyn Camera>>>;

struct ActiveScan {
    camera: SharedCamera,
    cancelled: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    torch_on: bool,
}

/// Stateful live-scan orchestrator: start scan → bind camera → per-frame
/// detection → event dispatch → stop scan, with torch and permission
/// side-channels.
///
/// At most one scan runs at a time; starting a new one tears the previous
/// scan down first. The controller owns the only handles to the detector
/// factory, camera provider and permission gate, so every scan goes through
/// the same permission negotiation and gets a fresh detector.
pub struct ScanController {
    factory: Arc<dyn DetectorFactory>,
    provider: Arc<dyn CameraProvider>,
    permissions: Arc<dyn PermissionGate>,
    active: Option<ActiveScan>,
}

impl ScanController {
    pub fn new(
        factory: Arc<dyn DetectorFactory>,
        provider: Arc<dyn CameraProvider>,
        permissions: Arc<dyn PermissionGate>,
    ) -> Self {
        Self {
            factory,
            provider,
            permissions,
            active: None,
        }
    }

    /// Starts a live scan, returning the event stream.
    ///
    /// Any running scan is stopped first. The channel closes when the frame
    /// stream ends or the scan is stopped; the scan itself stays active until
    /// [`stop_scan`](Self::stop_scan) either way.
    pub fn start_scan(&mut self, options: ScanOptions) -> Result<Receiver<ScanEvent>, ScanError> {
        self.stop_scan();
        options.validate()?;
        self.ensure_permission()?;

        let detector = self.factory.create(&options.detector)?;
        let camera = self.provider.open(options.lens_facing)?;
        let image_size = camera.image_size();
        let camera: SharedCamera = Arc::new(Mutex::new(camera));

        let cancelled = Arc::new(AtomicBool::new(false));
        let (tx, rx) = crossbeam_channel::unbounded::<ScanEvent>();

        let worker = {
            let camera = camera.clone();
            let cancelled = cancelled.clone();
            thread::spawn(move || run_scan_loop(camera, detector, tx, cancelled, image_size))
        };

        log::info!("scan started ({:?} lens)", options.lens_facing);
        self.active = Some(ActiveScan {
            camera,
            cancelled,
            worker: Some(worker),
            torch_on: false,
        });
        Ok(rx)
    }

    /// Stops the running scan, if any. Idempotent.
    ///
    /// The torch is switched off before teardown so it never outlives the
    /// session that enabled it.
    pub fn stop_scan(&mut self) {
        let Some(mut active) = self.active.take() else {
            return;
        };
        if active.torch_on {
            let mut camera = active.camera.lock().expect("camera mutex poisoned");
            if let Err(e) = camera.set_torch(false) {
                log::warn!("failed to disable torch on stop: {e}");
            }
        }
        active.cancelled.store(true, Ordering::Relaxed);
        if let Some(worker) = active.worker.take() {
            let _ = worker.join();
        }
        log::info!("scan stopped");
    }

    pub fn is_scanning(&self) -> bool {
        self.active.is_some()
    }

    pub fn is_supported(&self) -> bool {
        self.provider.is_supported()
    }

    // ── Torch ────────────────────────────────────────────────────────

    /// No-op when no scan is active, matching the session-bound torch model.
    pub fn enable_torch(&mut self) -> Result<(), ScanError> {
        self.set_torch(true)
    }

    pub fn disable_torch(&mut self) -> Result<(), ScanError> {
        self.set_torch(false)
    }

    pub fn toggle_torch(&mut self) -> Result<(), ScanError> {
        if self.is_torch_enabled() {
            self.disable_torch()
        } else {
            self.enable_torch()
        }
    }

    pub fn is_torch_enabled(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.torch_on)
    }

    pub fn is_torch_available(&self) -> bool {
        self.provider.is_torch_available()
    }

    fn set_torch(&mut self, on: bool) -> Result<(), ScanError> {
        let Some(active) = &mut self.active else {
            return Ok(());
        };
        let mut camera = active.camera.lock().expect("camera mutex poisoned");
        // A session without a flash unit ignores torch requests.
        if !camera.has_torch() {
            return Ok(());
        }
        camera.set_torch(on)?;
        active.torch_on = on;
        Ok(())
    }

    // ── Permissions ──────────────────────────────────────────────────

    pub fn check_permissions(&self) -> PermissionState {
        self.permissions.check()
    }

    pub fn request_permissions(&self) -> PermissionState {
        self.permissions.request()
    }

    pub fn open_settings(&self) -> Result<(), ScanError> {
        self.permissions.open_settings()?;
        Ok(())
    }

    fn ensure_permission(&self) -> Result<(), ScanError> {
        match self.permissions.check() {
            PermissionState::Granted => Ok(()),
            PermissionState::Denied => Err(ScanError::PermissionDenied),
            PermissionState::Prompt => match self.permissions.request() {
                PermissionState::Granted => Ok(()),
                _ => Err(ScanError::PermissionDenied),
            },
        }
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        self.stop_scan();
    }
}

/// Per-frame worker: pull → detect → dispatch until the stream ends or the
/// scan is cancelled.
///
/// Detector failures are forwarded as error events and the scan keeps
/// running; camera failures end the stream. The cancellation check before
/// dispatch keeps results that raced a stop from leaking out.
fn run_scan_loop(
    camera: SharedCamera,
    mut detector: Box<dyn FaceDetector>,
    tx: Sender<ScanEvent>,
    cancelled: Arc<AtomicBool>,
    image_size: ImageSize,
) {
    loop {
        if cancelled.load(Ordering::Relaxed) {
            return;
        }

        // Hold the camera lock only while pulling, so torch control and
        // teardown never wait on inference.
        let frame = {
            let mut camera = camera.lock().expect("camera mutex poisoned");
            camera.next_frame()
        };

        let frame = match frame {
            Ok(Some(frame)) => frame,
            Ok(None) => return,
            Err(e) => {
                let _ = tx.send(ScanEvent::Error {
                    message: e.to_string(),
                });
                return;
            }
        };

        match detector.detect(&frame) {
            Ok(faces) => {
                if cancelled.load(Ordering::Relaxed) {
                    return;
                }
                log::debug!("frame {}: {} face(s)", frame.index(), faces.len());
                for face in faces {
                    let _ = tx.send(ScanEvent::FaceScanned { face, image_size });
                }
            }
            Err(e) => {
                let _ = tx.send(ScanEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use crate::camera::infrastructure::static_permission_gate::StaticPermissionGate;
    use crate::detection::domain::face::Face;
    use crate::detection::domain::options::{DetectorOptions, LensFacing};
    use crate::shared::frame::Frame;
    use crate::shared::geometry::Bounds;

    // --- Stubs ---

    struct StubDetector {
        /// frame index → scripted result
        results: HashMap<usize, Result<Vec<Face>, String>>,
    }

    impl FaceDetector for StubDetector {
        fn detect(&mut self, frame: &Frame) -> Result<Vec<Face>, DetectError> {
            match self.results.get(&frame.index()) {
                Some(Ok(faces)) => Ok(faces.clone()),
                Some(Err(msg)) => Err(DetectError::Inference(msg.clone())),
                None => Ok(vec![]),
            }
        }
    }

    #[derive(Default)]
    struct StubFactory {
        results: Mutex<HashMap<usize, Result<Vec<Face>, String>>>,
        created: Mutex<usize>,
    }

    impl StubFactory {
        fn with_faces(results: HashMap<usize, Result<Vec<Face>, String>>) -> Self {
            Self {
                results: Mutex::new(results),
                created: Mutex::new(0),
            }
        }

        fn created(&self) -> usize {
            *self.created.lock().unwrap()
        }
    }

    impl DetectorFactory for StubFactory {
        fn create(&self, _options: &DetectorOptions) -> Result<Box<dyn FaceDetector>, DetectError> {
            *self.created.lock().unwrap() += 1;
            Ok(Box::new(StubDetector {
                results: self.results.lock().unwrap().clone(),
            }))
        }
    }

    struct StubCamera {
        remaining: Vec<Frame>,
        /// Error instead of ending the stream once frames run out.
        fail_at_end: bool,
        has_torch: bool,
        torch_log: Arc<Mutex<Vec<bool>>>,
    }

    impl Camera for StubCamera {
        fn next_frame(&mut self) -> Result<Option<Frame>, CameraError> {
            if self.remaining.is_empty() {
                if self.fail_at_end {
                    return Err(CameraError::FrameRead("sensor disconnected".to_string()));
                }
                return Ok(None);
            }
            Ok(Some(self.remaining.remove(0)))
        }

        fn image_size(&self) -> ImageSize {
            ImageSize::new(64, 48)
        }

        fn has_torch(&self) -> bool {
            self.has_torch
        }

        fn set_torch(&mut self, on: bool) -> Result<(), CameraError> {
            self.torch_log.lock().unwrap().push(on);
            Ok(())
        }
    }

    struct StubProvider {
        frame_count: usize,
        fail_at_end: bool,
        has_torch: bool,
        torch_log: Arc<Mutex<Vec<bool>>>,
    }

    impl StubProvider {
        fn new(frame_count: usize) -> Self {
            Self {
                frame_count,
                fail_at_end: false,
                has_torch: true,
                torch_log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Camera that errors after delivering `frame_count` frames.
        fn failing_after(frame_count: usize) -> Self {
            Self {
                fail_at_end: true,
                ..Self::new(frame_count)
            }
        }

        fn torchless(frame_count: usize) -> Self {
            Self {
                has_torch: false,
                ..Self::new(frame_count)
            }
        }
    }

    impl CameraProvider for StubProvider {
        fn open(&self, _facing: LensFacing) -> Result<Box<dyn Camera>, CameraError> {
            let frames = (0..self.frame_count)
                .map(|i| Frame::new(vec![0u8; 64 * 48 * 3], 64, 48, 3, i))
                .collect();
            Ok(Box::new(StubCamera {
                remaining: frames,
                fail_at_end: self.fail_at_end,
                has_torch: self.has_torch,
                torch_log: self.torch_log.clone(),
            }))
        }

        fn is_supported(&self) -> bool {
            true
        }

        fn is_torch_available(&self) -> bool {
            self.has_torch
        }
    }

    // --- Helpers ---

    fn face(left: i32) -> Face {
        Face::new(Bounds::new(left, 0, left + 50, 50))
    }

    fn controller_with(
        results: HashMap<usize, Result<Vec<Face>, String>>,
        frame_count: usize,
        gate: StaticPermissionGate,
    ) -> (ScanController, Arc<StubFactory>, Arc<StubProvider>) {
        let factory = Arc::new(StubFactory::with_faces(results));
        let provider = Arc::new(StubProvider::new(frame_count));
        let controller = ScanController::new(factory.clone(), provider.clone(), Arc::new(gate));
        (controller, factory, provider)
    }

    fn granted() -> StaticPermissionGate {
        StaticPermissionGate::granted()
    }

    // --- Tests ---

    #[test]
    fn test_scan_emits_one_event_per_face() {
        let mut results = HashMap::new();
        results.insert(0, Ok(vec![face(0), face(100)]));
        results.insert(1, Ok(vec![face(10)]));
        let (mut controller, _, _) = controller_with(results, 2, granted());

        let rx = controller.start_scan(ScanOptions::default()).unwrap();
        let events: Vec<ScanEvent> = rx.iter().collect();

        assert_eq!(events.len(), 3);
        assert!(events
            .iter()
            .all(|e| matches!(e, ScanEvent::FaceScanned { .. })));
    }

    #[test]
    fn test_events_carry_image_size() {
        let mut results = HashMap::new();
        results.insert(0, Ok(vec![face(0)]));
        let (mut controller, _, _) = controller_with(results, 1, granted());

        let rx = controller.start_scan(ScanOptions::default()).unwrap();
        let event = rx.iter().next().unwrap();
        let ScanEvent::FaceScanned { image_size, .. } = event else {
            panic!("expected FaceScanned");
        };
        assert_eq!(image_size, ImageSize::new(64, 48));
    }

    #[test]
    fn test_channel_closes_when_stream_ends() {
        let (mut controller, _, _) = controller_with(HashMap::new(), 2, granted());
        let rx = controller.start_scan(ScanOptions::default()).unwrap();
        // No faces scripted: stream drains to a clean disconnect
        assert_eq!(rx.iter().count(), 0);
        // Original semantics: the scan session itself does not auto-stop
        assert!(controller.is_scanning());
    }

    #[test]
    fn test_detector_error_is_event_and_scan_continues() {
        let mut results = HashMap::new();
        results.insert(0, Err("model exploded".to_string()));
        results.insert(1, Ok(vec![face(0)]));
        let (mut controller, _, _) = controller_with(results, 2, granted());

        let rx = controller.start_scan(ScanOptions::default()).unwrap();
        let events: Vec<ScanEvent> = rx.iter().collect();

        assert_eq!(events.len(), 2);
        assert!(
            matches!(&events[0], ScanEvent::Error { message } if message.contains("model exploded"))
        );
        assert!(matches!(&events[1], ScanEvent::FaceScanned { .. }));
    }

    #[test]
    fn test_camera_error_emits_event_and_ends_stream() {
        let mut results = HashMap::new();
        results.insert(0, Ok(vec![face(0)]));
        let factory = Arc::new(StubFactory::with_faces(results));
        let provider = Arc::new(StubProvider::failing_after(1));
        let mut controller = ScanController::new(factory, provider, Arc::new(granted()));

        let rx = controller.start_scan(ScanOptions::default()).unwrap();
        let events: Vec<ScanEvent> = rx.iter().collect();

        // One good frame, then the read failure closes the channel
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ScanEvent::FaceScanned { .. }));
        assert!(matches!(
            &events[1],
            ScanEvent::Error { message } if message.contains("sensor disconnected")
        ));
        // The session stays active until an explicit stop
        assert!(controller.is_scanning());
    }

    #[test]
    fn test_denied_permission_fails_start() {
        let gate = StaticPermissionGate::denied();
        let (mut controller, _, _) = controller_with(HashMap::new(), 1, gate);

        let err = controller.start_scan(ScanOptions::default()).unwrap_err();
        assert!(matches!(err, ScanError::PermissionDenied));
        assert_eq!(err.to_string(), "User denied access to camera.");
        assert!(!controller.is_scanning());
    }

    #[test]
    fn test_prompt_permission_requested_then_granted() {
        let gate = StaticPermissionGate::prompt(true);
        let (mut controller, _, _) = controller_with(HashMap::new(), 1, gate);
        assert!(controller.start_scan(ScanOptions::default()).is_ok());
    }

    #[test]
    fn test_prompt_permission_refused() {
        let gate = StaticPermissionGate::prompt(false);
        let (mut controller, _, _) = controller_with(HashMap::new(), 1, gate);
        assert!(matches!(
            controller.start_scan(ScanOptions::default()),
            Err(ScanError::PermissionDenied)
        ));
    }

    #[test]
    fn test_invalid_options_rejected() {
        let (mut controller, _, _) = controller_with(HashMap::new(), 1, granted());
        let options = ScanOptions {
            detector: DetectorOptions {
                min_face_size: -1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            controller.start_scan(options),
            Err(ScanError::Options(_))
        ));
    }

    #[test]
    fn test_restart_builds_fresh_detector() {
        let (mut controller, factory, _) = controller_with(HashMap::new(), 1, granted());

        let first = controller.start_scan(ScanOptions::default()).unwrap();
        let second = controller.start_scan(ScanOptions::default()).unwrap();

        assert_eq!(factory.created(), 2);
        // The first scan's channel is fully torn down
        assert!(first.iter().next().is_none());
        drop(second);
    }

    #[test]
    fn test_stop_scan_idempotent() {
        let (mut controller, _, _) = controller_with(HashMap::new(), 1, granted());
        controller.stop_scan(); // idle: no-op
        controller.start_scan(ScanOptions::default()).unwrap();
        controller.stop_scan();
        controller.stop_scan();
        assert!(!controller.is_scanning());
    }

    #[test]
    fn test_torch_noop_when_idle() {
        let (mut controller, _, provider) = controller_with(HashMap::new(), 1, granted());
        controller.enable_torch().unwrap();
        assert!(!controller.is_torch_enabled());
        assert!(provider.torch_log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_torch_lifecycle_during_scan() {
        let (mut controller, _, provider) = controller_with(HashMap::new(), 1, granted());
        controller.start_scan(ScanOptions::default()).unwrap();

        controller.enable_torch().unwrap();
        assert!(controller.is_torch_enabled());

        controller.toggle_torch().unwrap();
        assert!(!controller.is_torch_enabled());

        controller.toggle_torch().unwrap();
        assert!(controller.is_torch_enabled());

        assert_eq!(*provider.torch_log.lock().unwrap(), vec![true, false, true]);
    }

    #[test]
    fn test_stop_scan_disables_torch() {
        let (mut controller, _, provider) = controller_with(HashMap::new(), 1, granted());
        controller.start_scan(ScanOptions::default()).unwrap();
        controller.enable_torch().unwrap();

        controller.stop_scan();

        assert!(!controller.is_torch_enabled());
        assert_eq!(*provider.torch_log.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_restart_disables_torch_from_previous_scan() {
        let (mut controller, _, provider) = controller_with(HashMap::new(), 1, granted());
        controller.start_scan(ScanOptions::default()).unwrap();
        controller.enable_torch().unwrap();

        controller.start_scan(ScanOptions::default()).unwrap();

        assert!(!controller.is_torch_enabled());
        assert_eq!(*provider.torch_log.lock().unwrap(), vec![true, false]);
    }

    #[test]
    fn test_torch_noop_on_torchless_camera() {
        let factory = Arc::new(StubFactory::default());
        let provider = Arc::new(StubProvider::torchless(1));
        let mut controller =
            ScanController::new(factory, provider.clone(), Arc::new(granted()));
        controller.start_scan(ScanOptions::default()).unwrap();

        controller.enable_torch().unwrap();

        assert!(!controller.is_torch_enabled());
        assert!(provider.torch_log.lock().unwrap().is_empty());
    }

    #[test]
    fn test_capability_queries() {
        let (controller, _, _) = controller_with(HashMap::new(), 1, granted());
        assert!(controller.is_supported());
        assert!(controller.is_torch_available());
    }

    #[test]
    fn test_permission_forwarding() {
        let gate = StaticPermissionGate::prompt(true);
        let (controller, _, _) = controller_with(HashMap::new(), 1, gate);
        assert_eq!(controller.check_permissions(), PermissionState::Prompt);
        assert_eq!(controller.request_permissions(), PermissionState::Granted);
        assert!(controller.open_settings().is_ok());
    }
}
