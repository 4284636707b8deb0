use super::DeviceIndex;

/// Runtime notifications the frame loop cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VrEvent {
    DeviceAttached(DeviceIndex),
    DeviceDetached(DeviceIndex),
    DeviceUpdated(DeviceIndex),
    Other,
}

impl VrEvent {
    /// Human-readable line for device events, `None` for everything else.
    pub fn describe(&self) -> Option<String> {
        match self {
            VrEvent::DeviceAttached(index) => Some(format!("Device {} attached.", index)),
            VrEvent::DeviceDetached(index) => Some(format!("Device {} detached.", index)),
            VrEvent::DeviceUpdated(index) => Some(format!("Device {} updated.", index)),
            VrEvent::Other => None,
        }
    }

    pub fn log(&self) {
        match self.describe() {
            Some(line) => log::info!("{}", line),
            None => log::trace!("Ignoring VR event {:?}", self),
        }
    }
}
