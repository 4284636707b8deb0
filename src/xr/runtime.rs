use glam::Mat4;
use openxr as xr;

use super::math::{pose_to_matrix, projection_from_fov};
use super::{SharedSession, LEFT_HAND, RIGHT_HAND};
use crate::vr::{DeviceIndex, DeviceProperty, EyeTransforms, PropertyError, VrEvent, VrRuntime};

/// Per-eye optics captured once at startup.
#[derive(Debug, Clone, Copy)]
pub struct EyeView {
    pub fov: xr::Fovf,
    /// Eye pose relative to the head.
    pub pose: xr::Posef,
}

/// [`VrRuntime`] over an OpenXR instance.
///
/// Devices are numbered 0 = HMD, 1 = left hand, 2 = right hand.
pub struct OpenXrRuntime {
    shared: SharedSession,
    instance: xr::Instance,
    system: xr::SystemId,
    system_name: String,
    runtime_name: String,
    recommended_size: (u32, u32),
    eyes: [EyeView; 2],
    event_buffer: xr::EventDataBuffer,
}

impl OpenXrRuntime {
    pub(crate) fn new(
        shared: SharedSession,
        instance: xr::Instance,
        system: xr::SystemId,
        recommended_size: (u32, u32),
        eyes: [EyeView; 2],
    ) -> anyhow::Result<Self> {
        let system_name = instance
            .system_properties(system)
            .map_err(|err| anyhow::anyhow!("Failed to get system properties: {}", err))?
            .system_name;
        let runtime_name = instance
            .properties()
            .map_err(|err| anyhow::anyhow!("Failed to get runtime properties: {}", err))?
            .runtime_name;

        Ok(Self {
            shared,
            instance,
            system,
            system_name,
            runtime_name,
            recommended_size,
            eyes,
            event_buffer: xr::EventDataBuffer::new(),
        })
    }
}

impl VrRuntime for OpenXrRuntime {
    fn string_property(
        &self,
        device: DeviceIndex,
        property: DeviceProperty,
    ) -> Result<String, PropertyError> {
        if device.0 > RIGHT_HAND.0 {
            return Err(PropertyError::InvalidDevice(device));
        }
        match property {
            DeviceProperty::TrackingSystemName => Ok(self.system_name.clone()),
            DeviceProperty::ManufacturerName => Ok(self.runtime_name.clone()),
            // No serial in OpenXR; the system id is stable for the instance.
            DeviceProperty::SerialNumber => Ok(format!("{:016x}", self.system.into_raw())),
            DeviceProperty::ModelNumber => Err(PropertyError::UnknownProperty(property)),
        }
    }

    fn poll_next_event(&mut self) -> Option<VrEvent> {
        if let Some(event) = self.shared.borrow_mut().pending_events.pop_front() {
            return Some(event);
        }

        let event = match self.instance.poll_event(&mut self.event_buffer) {
            Ok(event) => event?,
            Err(err) => {
                log::warn!("Failed to poll OpenXR events: {}", err);
                return None;
            }
        };

        let mut shared = self.shared.borrow_mut();
        match event {
            xr::Event::SessionStateChanged(change) => {
                if let Err(err) = shared.handle_state_change(change.state()) {
                    log::error!("{:#}", err);
                    shared.lost = true;
                }
                Some(VrEvent::Other)
            }
            xr::Event::InteractionProfileChanged(_) => {
                shared.pending_events.push_back(VrEvent::DeviceUpdated(RIGHT_HAND));
                Some(VrEvent::DeviceUpdated(LEFT_HAND))
            }
            xr::Event::InstanceLossPending(_) => {
                log::warn!("OpenXR instance loss pending");
                shared.running = false;
                shared.lost = true;
                Some(VrEvent::Other)
            }
            _ => Some(VrEvent::Other),
        }
    }

    fn exit_requested(&self) -> bool {
        self.shared.borrow().exit_requested
    }

    fn recommended_target_size(&self) -> (u32, u32) {
        self.recommended_size
    }

    fn eye_transforms(&self, near: f32, far: f32) -> EyeTransforms {
        let [left, right] = &self.eyes;
        let view_offset = |eye: &EyeView| -> Mat4 { pose_to_matrix(&eye.pose).inverse() };

        EyeTransforms {
            projection_left: projection_from_fov(&left.fov, near, far),
            projection_right: projection_from_fov(&right.fov, near, far),
            view_offset_left: view_offset(left),
            view_offset_right: view_offset(right),
        }
    }
}
