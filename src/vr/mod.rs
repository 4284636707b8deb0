//! Provider-facing side of the VR stack.
//!
//! The frame loop talks to the VR runtime and the compositor only through the
//! traits in this module, so it can be driven by the OpenXR backend in
//! [`crate::xr`] or by synthetic providers in tests.

pub mod event;
pub mod eye;
pub mod pose;
pub mod session;

pub use event::VrEvent;
pub use eye::{Eye, EyeTransforms};
pub use pose::HeadPose;
pub use session::VrSession;

use glam::Mat4;
use std::fmt;
use thiserror::Error;

/// Index of a tracked device as understood by the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceIndex(pub u32);

impl DeviceIndex {
    /// The head-mounted display is always device zero.
    pub const HMD: DeviceIndex = DeviceIndex(0);
}

impl fmt::Display for DeviceIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// String properties a runtime can be asked about a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceProperty {
    TrackingSystemName,
    SerialNumber,
    ManufacturerName,
    ModelNumber,
}

impl fmt::Display for DeviceProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceProperty::TrackingSystemName => "tracking system name",
            DeviceProperty::SerialNumber => "serial number",
            DeviceProperty::ManufacturerName => "manufacturer name",
            DeviceProperty::ModelNumber => "model number",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("device {0} is not tracked")]
    InvalidDevice(DeviceIndex),
    #[error("property {0} is not provided by this runtime")]
    UnknownProperty(DeviceProperty),
}

#[derive(Debug, Error)]
pub enum CompositorError {
    #[error("the VR session was lost: {0}")]
    SessionLost(String),
    #[error("compositor call failed: {0}")]
    Runtime(String),
}

/// A non-HMD device with a valid pose this frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedDevice {
    pub index: DeviceIndex,
    pub device_to_world: Mat4,
}

/// The runtime connection: device queries, events and display geometry.
pub trait VrRuntime {
    fn string_property(
        &self,
        device: DeviceIndex,
        property: DeviceProperty,
    ) -> Result<String, PropertyError>;

    /// Non-blocking; `None` once the queue is drained.
    fn poll_next_event(&mut self) -> Option<VrEvent>;

    /// True once the runtime has asked the application to quit.
    fn exit_requested(&self) -> bool;

    fn recommended_target_size(&self) -> (u32, u32);

    fn eye_transforms(&self, near: f32, far: f32) -> EyeTransforms;
}

/// Frame submission, pacing and pose queries. `T` is the renderer's eye
/// texture type.
pub trait Compositor<T: ?Sized> {
    fn submit(&mut self, eye: Eye, texture: &T) -> Result<(), CompositorError>;

    /// Blocks until the runtime wants the next frame, then refreshes poses.
    fn wait_get_poses(&mut self) -> Result<(), CompositorError>;

    fn is_pose_valid(&self, device: DeviceIndex) -> bool;

    /// Device-to-world transform from the last `wait_get_poses`.
    fn render_pose(&self, device: DeviceIndex) -> Mat4;

    /// Every non-HMD device whose pose is currently valid.
    fn tracked_devices(&self) -> Vec<TrackedDevice>;
}
