#![allow(dead_code)]

use anyhow::Result;
use glam::{Mat4, Vec3};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use winit::keyboard::KeyCode;

use starfield_vr::render::{RenderError, StereoRenderer};
use starfield_vr::scene::{CameraView, Material, Star};
use starfield_vr::vr::{
    Compositor, CompositorError, DeviceIndex, DeviceProperty, Eye, EyeTransforms, PropertyError,
    TrackedDevice, VrEvent, VrRuntime,
};
use starfield_vr::window::WindowSurface;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    PollEvents,
    BeginEye(Eye),
    DrawStar {
        position: Vec3,
        projection: Mat4,
        view: Mat4,
        camera_position: Vec3,
    },
    RenderDevices(usize),
    ResolveEye(Eye),
    BlankEye(Eye),
    Distortion((u32, u32)),
    Submit {
        eye: Eye,
        texture: Eye,
    },
    SwapBuffers,
    WaitGetPoses,
}

pub type Journal = Rc<RefCell<Vec<Call>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn recorded(journal: &Journal) -> Vec<Call> {
    journal.borrow().clone()
}

pub fn count(journal: &Journal, predicate: impl Fn(&Call) -> bool) -> usize {
    journal.borrow().iter().filter(|call| predicate(call)).count()
}

pub struct MockWindow {
    journal: Journal,
    close: bool,
    size: (u32, u32),
    key_script: VecDeque<Vec<KeyCode>>,
    pending_keys: Vec<KeyCode>,
    close_after_swaps: Option<usize>,
    swaps: usize,
}

impl MockWindow {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            close: false,
            size: (1280, 720),
            key_script: VecDeque::new(),
            pending_keys: Vec::new(),
            close_after_swaps: None,
            swaps: 0,
        }
    }

    /// Keys reported by successive polls, one entry per poll.
    pub fn with_keys(mut self, script: Vec<Vec<KeyCode>>) -> Self {
        self.key_script = script.into();
        self
    }

    /// Simulates the user closing the window once `frames` have been shown.
    pub fn closing_after(mut self, frames: usize) -> Self {
        self.close_after_swaps = Some(frames);
        self
    }

    pub fn closed(mut self) -> Self {
        self.close = true;
        self
    }
}

impl WindowSurface for MockWindow {
    fn poll_events(&mut self) {
        self.journal.borrow_mut().push(Call::PollEvents);
        if let Some(keys) = self.key_script.pop_front() {
            self.pending_keys.extend(keys);
        }
    }

    fn take_key_presses(&mut self) -> Vec<KeyCode> {
        std::mem::take(&mut self.pending_keys)
    }

    fn should_close(&self) -> bool {
        self.close
    }

    fn set_should_close(&mut self, value: bool) {
        self.close = value;
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn swap_buffers(&mut self) -> Result<()> {
        self.journal.borrow_mut().push(Call::SwapBuffers);
        self.swaps += 1;
        if self.close_after_swaps == Some(self.swaps) {
            self.close = true;
        }
        Ok(())
    }
}

pub struct MockRuntime {
    pub recommended: (u32, u32),
    pub events: VecDeque<VrEvent>,
    pub transforms: EyeTransforms,
    pub exit_requested: bool,
}

impl MockRuntime {
    pub fn new(recommended: (u32, u32)) -> Self {
        Self {
            recommended,
            events: VecDeque::new(),
            transforms: test_eye_transforms(),
            exit_requested: false,
        }
    }

    /// The runtime has already asked the app to quit.
    pub fn requesting_exit(mut self) -> Self {
        self.exit_requested = true;
        self
    }

    pub fn with_events(mut self, events: Vec<VrEvent>) -> Self {
        self.events = events.into();
        self
    }
}

pub fn test_eye_transforms() -> EyeTransforms {
    EyeTransforms {
        projection_left: Mat4::perspective_rh(1.6, 0.9, 0.1, 30.0),
        projection_right: Mat4::perspective_rh(1.6, 0.9, 0.1, 30.0)
            * Mat4::from_translation(Vec3::new(0.01, 0.0, 0.0)),
        view_offset_left: Mat4::from_translation(Vec3::new(0.032, 0.0, 0.0)),
        view_offset_right: Mat4::from_translation(Vec3::new(-0.032, 0.0, 0.0)),
    }
}

impl VrRuntime for MockRuntime {
    fn string_property(
        &self,
        device: DeviceIndex,
        property: DeviceProperty,
    ) -> Result<String, PropertyError> {
        if device != DeviceIndex::HMD {
            return Err(PropertyError::InvalidDevice(device));
        }
        match property {
            DeviceProperty::TrackingSystemName => Ok("mock_tracker".to_string()),
            DeviceProperty::SerialNumber => Ok("MOCK-0001".to_string()),
            other => Err(PropertyError::UnknownProperty(other)),
        }
    }

    fn poll_next_event(&mut self) -> Option<VrEvent> {
        self.events.pop_front()
    }

    fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    fn recommended_target_size(&self) -> (u32, u32) {
        self.recommended
    }

    fn eye_transforms(&self, _near: f32, _far: f32) -> EyeTransforms {
        self.transforms
    }
}

/// Stands in for an eye texture; remembers which eye it belongs to.
#[derive(Debug)]
pub struct MockTexture(pub Eye);

pub struct MockRenderer {
    journal: Journal,
    target_size: (u32, u32),
    textures: [MockTexture; 2],
    current: Option<Eye>,
    fail_begin: Option<Eye>,
}

impl MockRenderer {
    pub fn new(journal: &Journal, target_size: (u32, u32)) -> Self {
        Self {
            journal: journal.clone(),
            target_size,
            textures: [MockTexture(Eye::Left), MockTexture(Eye::Right)],
            current: None,
            fail_begin: None,
        }
    }

    pub fn failing_eye(mut self, eye: Eye) -> Self {
        self.fail_begin = Some(eye);
        self
    }
}

impl<W: WindowSurface + ?Sized> StereoRenderer<W> for MockRenderer {
    type EyeTexture = MockTexture;

    fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    fn begin_eye(&mut self, eye: Eye) -> Result<(), RenderError> {
        if self.fail_begin == Some(eye) {
            return Err(RenderError::Surface("injected failure".to_string()));
        }
        self.journal.borrow_mut().push(Call::BeginEye(eye));
        self.current = Some(eye);
        Ok(())
    }

    fn draw_star(
        &mut self,
        star: &Star,
        _material: &Material,
        projection: Mat4,
        view: Mat4,
        camera: &dyn CameraView,
    ) -> Result<(), RenderError> {
        self.current.ok_or(RenderError::NoActivePass)?;
        self.journal.borrow_mut().push(Call::DrawStar {
            position: star.position,
            projection,
            view,
            camera_position: camera.position(),
        });
        Ok(())
    }

    fn render_devices(
        &mut self,
        devices: &[TrackedDevice],
        _projection: Mat4,
        _view: Mat4,
        _camera: &dyn CameraView,
    ) -> Result<(), RenderError> {
        self.journal.borrow_mut().push(Call::RenderDevices(devices.len()));
        Ok(())
    }

    fn resolve_eye(&mut self, eye: Eye) -> Result<(), RenderError> {
        match self.current.take() {
            Some(open) if open == eye => {
                self.journal.borrow_mut().push(Call::ResolveEye(eye));
                Ok(())
            }
            Some(open) => Err(RenderError::PassAlreadyOpen(open)),
            None => Err(RenderError::NoActivePass),
        }
    }

    fn blank_eye(&mut self, eye: Eye) {
        self.current = None;
        self.journal.borrow_mut().push(Call::BlankEye(eye));
    }

    fn render_distortion(&mut self, window: &mut W) -> Result<(), RenderError> {
        self.journal.borrow_mut().push(Call::Distortion(window.size()));
        Ok(())
    }

    fn resolve_texture(&self, eye: Eye) -> &MockTexture {
        &self.textures[eye.index()]
    }
}

/// Replays one HMD pose per `wait_get_poses`; `None` marks an invalid pose.
/// Once the script runs out the last entry repeats.
pub struct MockCompositor {
    journal: Journal,
    hmd_script: VecDeque<Option<Mat4>>,
    hmd: Option<Mat4>,
    devices: Vec<TrackedDevice>,
    fail_wait_at: Option<usize>,
    glitch_wait_at: Option<usize>,
    waits: usize,
}

impl MockCompositor {
    pub fn new(journal: &Journal) -> Self {
        Self {
            journal: journal.clone(),
            hmd_script: VecDeque::new(),
            hmd: None,
            devices: Vec::new(),
            fail_wait_at: None,
            glitch_wait_at: None,
            waits: 0,
        }
    }

    pub fn with_hmd_poses(mut self, script: Vec<Option<Mat4>>) -> Self {
        self.hmd_script = script.into();
        self
    }

    pub fn with_devices(mut self, devices: Vec<TrackedDevice>) -> Self {
        self.devices = devices;
        self
    }

    /// Makes the n-th wait (1-based) report a lost session.
    pub fn losing_session_at(mut self, wait: usize) -> Self {
        self.fail_wait_at = Some(wait);
        self
    }
}

impl MockCompositor {
    /// Makes the n-th wait (1-based) fail with a recoverable runtime error.
    /// The pose script does not advance on that wait.
    pub fn glitching_at(mut self, wait: usize) -> Self {
        self.glitch_wait_at = Some(wait);
        self
    }
}

impl Compositor<MockTexture> for MockCompositor {
    fn submit(&mut self, eye: Eye, texture: &MockTexture) -> Result<(), CompositorError> {
        self.journal.borrow_mut().push(Call::Submit { eye, texture: texture.0 });
        Ok(())
    }

    fn wait_get_poses(&mut self) -> Result<(), CompositorError> {
        self.journal.borrow_mut().push(Call::WaitGetPoses);
        self.waits += 1;
        if self.fail_wait_at == Some(self.waits) {
            return Err(CompositorError::SessionLost("headset unplugged".to_string()));
        }
        if self.glitch_wait_at == Some(self.waits) {
            return Err(CompositorError::Runtime("XR_ERROR_SESSION_NOT_RUNNING".to_string()));
        }
        if let Some(next) = self.hmd_script.pop_front() {
            self.hmd = next;
        }
        Ok(())
    }

    fn is_pose_valid(&self, device: DeviceIndex) -> bool {
        device == DeviceIndex::HMD && self.hmd.is_some()
    }

    fn render_pose(&self, device: DeviceIndex) -> Mat4 {
        match device {
            DeviceIndex::HMD => self.hmd.unwrap_or(Mat4::IDENTITY),
            _ => Mat4::IDENTITY,
        }
    }

    fn tracked_devices(&self) -> Vec<TrackedDevice> {
        self.devices.clone()
    }
}
