use anyhow::{Context, Result};

use super::{DeviceIndex, DeviceProperty, EyeTransforms, PropertyError, VrEvent, VrRuntime};

/// Owns the runtime connection once the headset has identified itself.
pub struct VrSession<R: VrRuntime> {
    runtime: R,
    system_name: String,
    serial_number: String,
}

impl<R: VrRuntime> VrSession<R> {
    /// Reads the headset's tracking system name and serial number. Either
    /// lookup failing means the runtime is unusable and setup stops here.
    pub fn connect(runtime: R) -> Result<Self> {
        let system_name = runtime
            .string_property(DeviceIndex::HMD, DeviceProperty::TrackingSystemName)
            .with_context(|| property_failure(DeviceProperty::TrackingSystemName))?;

        let serial_number = runtime
            .string_property(DeviceIndex::HMD, DeviceProperty::SerialNumber)
            .with_context(|| property_failure(DeviceProperty::SerialNumber))?;

        log::info!("Connected to {} {}", system_name, serial_number);

        Ok(Self {
            runtime,
            system_name,
            serial_number,
        })
    }

    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    pub fn serial_number(&self) -> &str {
        &self.serial_number
    }

    pub fn string_property(
        &self,
        device: DeviceIndex,
        property: DeviceProperty,
    ) -> Result<String, PropertyError> {
        self.runtime.string_property(device, property)
    }

    pub fn poll_next_event(&mut self) -> Option<VrEvent> {
        self.runtime.poll_next_event()
    }

    pub fn exit_requested(&self) -> bool {
        self.runtime.exit_requested()
    }

    pub fn recommended_target_size(&self) -> (u32, u32) {
        self.runtime.recommended_target_size()
    }

    pub fn eye_transforms(&self, near: f32, far: f32) -> EyeTransforms {
        self.runtime.eye_transforms(near, far)
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }
}

fn property_failure(property: DeviceProperty) -> String {
    format!("Couldn't get property {} from device {}", property, DeviceIndex::HMD)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Mat4;
    use std::cell::RefCell;

    struct FakeRuntime {
        serial: Option<&'static str>,
        asked: RefCell<Vec<DeviceProperty>>,
    }

    impl VrRuntime for FakeRuntime {
        fn string_property(
            &self,
            device: DeviceIndex,
            property: DeviceProperty,
        ) -> Result<String, PropertyError> {
            assert_eq!(device, DeviceIndex::HMD);
            self.asked.borrow_mut().push(property);
            match property {
                DeviceProperty::TrackingSystemName => Ok("lighthouse".to_string()),
                DeviceProperty::SerialNumber => self
                    .serial
                    .map(str::to_string)
                    .ok_or(PropertyError::UnknownProperty(property)),
                _ => Err(PropertyError::UnknownProperty(property)),
            }
        }

        fn poll_next_event(&mut self) -> Option<VrEvent> {
            None
        }

        fn exit_requested(&self) -> bool {
            false
        }

        fn recommended_target_size(&self) -> (u32, u32) {
            (1512, 1680)
        }

        fn eye_transforms(&self, _near: f32, _far: f32) -> EyeTransforms {
            EyeTransforms {
                projection_left: Mat4::IDENTITY,
                projection_right: Mat4::IDENTITY,
                view_offset_left: Mat4::IDENTITY,
                view_offset_right: Mat4::IDENTITY,
            }
        }
    }

    #[test]
    fn test_connect_queries_requested_properties() {
        let runtime = FakeRuntime {
            serial: Some("LHR-1234"),
            asked: RefCell::new(Vec::new()),
        };
        let session = VrSession::connect(runtime).unwrap();

        assert_eq!(session.system_name(), "lighthouse");
        assert_eq!(session.serial_number(), "LHR-1234");
        assert_eq!(
            *session.runtime().asked.borrow(),
            vec![DeviceProperty::TrackingSystemName, DeviceProperty::SerialNumber]
        );
    }

    #[test]
    fn test_connect_fails_without_serial() {
        let runtime = FakeRuntime {
            serial: None,
            asked: RefCell::new(Vec::new()),
        };
        let err = VrSession::connect(runtime).err().expect("identity check should fail");
        let message = format!("{:#}", err);
        assert!(message.contains("serial number"), "unexpected error: {}", message);
        assert!(message.contains("device 0"), "unexpected error: {}", message);
    }

    #[test]
    fn test_pass_through() {
        let runtime = FakeRuntime {
            serial: Some("x"),
            asked: RefCell::new(Vec::new()),
        };
        let mut session = VrSession::connect(runtime).unwrap();
        assert_eq!(session.recommended_target_size(), (1512, 1680));
        assert_eq!(session.poll_next_event(), None);
        assert!(!session.exit_requested());
        assert_eq!(
            session.string_property(DeviceIndex::HMD, DeviceProperty::ModelNumber),
            Err(PropertyError::UnknownProperty(DeviceProperty::ModelNumber))
        );
    }
}
