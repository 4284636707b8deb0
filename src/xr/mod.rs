//! OpenXR backend: the headset as both the VR runtime and the compositor.

mod blit;
pub mod bootstrap;
mod compositor;
pub mod math;
mod runtime;
pub mod vulkan;

pub use bootstrap::{bootstrap, XrBackend};
pub use compositor::OpenXrCompositor;
pub use runtime::OpenXrRuntime;

use openxr as xr;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use crate::vr::{DeviceIndex, VrEvent};

pub const LEFT_HAND: DeviceIndex = DeviceIndex(1);
pub const RIGHT_HAND: DeviceIndex = DeviceIndex(2);

/// Nominal refresh rate used for pacing while the session is idle.
pub const IDLE_REFRESH_HZ: f64 = 90.0;

/// What a session state change asks of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Lifecycle {
    Begin,
    End,
    /// The runtime wants the application to quit.
    Exit,
    /// The session is going away and cannot be recovered.
    Lose,
    Ignore,
}

pub(crate) fn lifecycle_step(state: xr::SessionState) -> Lifecycle {
    match state {
        xr::SessionState::READY => Lifecycle::Begin,
        xr::SessionState::STOPPING => Lifecycle::End,
        xr::SessionState::EXITING => Lifecycle::Exit,
        xr::SessionState::LOSS_PENDING => Lifecycle::Lose,
        _ => Lifecycle::Ignore,
    }
}

/// Session lifecycle shared by the runtime (which reacts to state events)
/// and the compositor (which drives frames).
pub(crate) struct SessionState {
    pub session: xr::Session<xr::Vulkan>,
    pub running: bool,
    pub exit_requested: bool,
    pub lost: bool,
    pub pending_events: VecDeque<VrEvent>,
}

pub(crate) type SharedSession = Rc<RefCell<SessionState>>;

impl SessionState {
    pub fn new(session: xr::Session<xr::Vulkan>) -> SharedSession {
        Rc::new(RefCell::new(Self {
            session,
            running: false,
            exit_requested: false,
            lost: false,
            pending_events: VecDeque::new(),
        }))
    }

    pub fn handle_state_change(&mut self, state: xr::SessionState) -> anyhow::Result<()> {
        log::info!("Session state changed to: {:?}", state);
        match lifecycle_step(state) {
            Lifecycle::Begin => {
                self.session
                    .begin(xr::ViewConfigurationType::PRIMARY_STEREO)
                    .map_err(|err| anyhow::anyhow!("Failed to begin session: {}", err))?;
                self.running = true;
            }
            Lifecycle::End => {
                self.running = false;
                self.session
                    .end()
                    .map_err(|err| anyhow::anyhow!("Failed to end session: {}", err))?;
            }
            Lifecycle::Exit => {
                self.running = false;
                self.exit_requested = true;
            }
            Lifecycle::Lose => {
                self.running = false;
                self.lost = true;
            }
            Lifecycle::Ignore => {}
        }
        Ok(())
    }
}
