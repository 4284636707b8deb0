use anyhow::{Context, Result};
use rand::Rng;

use crate::config::StarfieldConfig;
use crate::input::KeyBindings;
use crate::render::{RenderError, StereoRenderer};
use crate::scene::{FixedCamera, Material, Starfield};
use crate::timing::FrameClock;
use crate::vr::{
    Compositor, CompositorError, DeviceIndex, Eye, EyeTransforms, HeadPose, TrackedDevice,
    VrRuntime, VrSession,
};
use crate::window::WindowSurface;

const TARGET_FPS: u32 = 90;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Closing,
}

/// Owns everything that lives for the duration of the render loop and runs
/// one stereo frame per iteration.
///
/// Fields drop in declaration order: the compositor and the VR session go
/// before the GPU objects they were handed.
pub struct FrameDriver<W, R, C, B>
where
    W: WindowSurface,
    R: VrRuntime,
    B: StereoRenderer<W>,
    C: Compositor<B::EyeTexture>,
{
    compositor: C,
    session: VrSession<R>,
    renderer: B,
    window: W,
    starfield: Starfield,
    eye_transforms: EyeTransforms,
    head: HeadPose,
    bindings: KeyBindings,
    timing: FrameClock,
    state: LoopState,
}

impl<W, R, C, B> FrameDriver<W, R, C, B>
where
    W: WindowSurface,
    R: VrRuntime,
    B: StereoRenderer<W>,
    C: Compositor<B::EyeTexture>,
{
    /// Sizes the eye targets to the headset's recommendation, scatters the
    /// stars and fixes the per-eye transforms for the session.
    pub fn new<G, F>(
        window: W,
        session: VrSession<R>,
        compositor: C,
        make_renderer: F,
        config: &StarfieldConfig,
        rng: &mut G,
    ) -> Result<Self>
    where
        G: Rng,
        F: FnOnce((u32, u32)) -> Result<B>,
    {
        let target_size = session.recommended_target_size();
        log::info!("Eye target size: {}x{}", target_size.0, target_size.1);

        let renderer = make_renderer(target_size).context("Failed to create the stereo renderer")?;

        let material = Material::new(config.star_color, config.star_shininess);
        let starfield = Starfield::generate(rng, config.star_count, config.star_extent, material);

        let eye_transforms = session.eye_transforms(config.clip.near, config.clip.far);

        Ok(Self {
            compositor,
            session,
            renderer,
            window,
            starfield,
            eye_transforms,
            head: HeadPose::default(),
            bindings: KeyBindings::default(),
            timing: FrameClock::new(TARGET_FPS),
            state: LoopState::Running,
        })
    }

    /// Runs frames until the window's close flag is seen. A fatal frame
    /// error also ends the loop and is returned.
    pub fn run(&mut self) -> Result<()> {
        log::info!("Entering render loop");
        while self.state == LoopState::Running {
            if self.window.should_close() {
                self.state = LoopState::Closing;
                break;
            }
            if let Err(err) = self.frame() {
                self.state = LoopState::Closing;
                return Err(err);
            }
        }
        log::info!("Leaving render loop after {} frames", self.timing.frame_count());
        Ok(())
    }

    /// One iteration of the loop. Only a lost compositor session is fatal;
    /// everything else degrades the frame and is logged.
    pub fn frame(&mut self) -> Result<()> {
        self.timing.begin_frame();

        self.window.poll_events();
        let pressed = self.window.take_key_presses();
        self.bindings.apply(&pressed, &mut self.window);

        while let Some(event) = self.session.poll_next_event() {
            event.log();
        }
        if self.session.exit_requested() && !self.window.should_close() {
            log::info!("VR runtime asked to quit, closing after this frame");
            self.window.set_should_close(true);
        }

        let devices = self.compositor.tracked_devices();
        for eye in Eye::BOTH {
            if let Err(err) = self.render_eye(eye, &devices) {
                log::warn!("{:?} eye pass failed, blanking it: {}", eye, err);
                self.renderer.blank_eye(eye);
            }
        }

        if let Err(err) = self.renderer.render_distortion(&mut self.window) {
            log::warn!("Mirror distortion pass failed: {}", err);
        }

        for eye in Eye::BOTH {
            if let Err(err) = self.compositor.submit(eye, self.renderer.resolve_texture(eye)) {
                log::warn!("Compositor rejected {:?} eye: {}", eye, err);
            }
        }

        if let Err(err) = self.window.swap_buffers() {
            log::warn!("Failed to present mirror window: {:#}", err);
        }
        self.timing.end_frame();

        match self.compositor.wait_get_poses() {
            Ok(()) => {
                self.head = self.head.advance(self.compositor.is_pose_valid(DeviceIndex::HMD), || {
                    self.compositor.render_pose(DeviceIndex::HMD)
                });
            }
            Err(err @ CompositorError::SessionLost(_)) => {
                return Err(err).context("Lost the compositor while waiting for poses");
            }
            Err(err) => log::warn!("Waiting for poses failed, keeping the previous pose: {}", err),
        }

        Ok(())
    }

    fn render_eye(&mut self, eye: Eye, devices: &[TrackedDevice]) -> Result<(), RenderError> {
        let projection = self.eye_transforms.projection(eye);
        let view = self.eye_transforms.view_offset(eye) * self.head.view;
        let camera = FixedCamera::new(view, self.head.position);

        self.renderer.begin_eye(eye)?;
        for star in &self.starfield.stars {
            self.renderer
                .draw_star(star, &self.starfield.material, projection, view, &camera)?;
        }
        self.renderer.render_devices(devices, projection, view, &camera)?;
        self.renderer.resolve_eye(eye)
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn head_pose(&self) -> HeadPose {
        self.head
    }

    pub fn starfield(&self) -> &Starfield {
        &self.starfield
    }

    pub fn eye_transforms(&self) -> &EyeTransforms {
        &self.eye_transforms
    }

    pub fn session(&self) -> &VrSession<R> {
        &self.session
    }

    pub fn window(&self) -> &W {
        &self.window
    }

    pub fn renderer(&self) -> &B {
        &self.renderer
    }
}
