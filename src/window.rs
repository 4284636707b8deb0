use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use winit::{
    dpi::PhysicalSize,
    event::{ElementState, Event, KeyEvent, WindowEvent},
    event_loop::EventLoop,
    keyboard::{KeyCode, PhysicalKey},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    window::{Window, WindowBuilder},
};

use crate::config::WindowConfig;
use crate::render::GpuContext;

/// The desktop side of the app: input, close requests and a presentable
/// back buffer.
pub trait WindowSurface {
    /// Processes pending window events without blocking.
    fn poll_events(&mut self);

    /// Keys pressed since the previous call.
    fn take_key_presses(&mut self) -> Vec<KeyCode>;

    fn should_close(&self) -> bool;

    fn set_should_close(&mut self, value: bool);

    /// Live size of the drawable area in pixels.
    fn size(&self) -> (u32, u32);

    fn swap_buffers(&mut self) -> Result<()>;
}

struct SurfaceState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    device: Arc<wgpu::Device>,
    frame: Option<wgpu::SurfaceTexture>,
}

/// A winit window whose swapchain is presented without vsync; frame pacing
/// comes from the VR compositor instead.
pub struct DesktopWindow {
    // Declared before `window` so the surface is released first.
    surface: Option<SurfaceState>,
    window: Arc<Window>,
    event_loop: EventLoop<()>,
    size: (u32, u32),
    resized: bool,
    should_close: bool,
    pressed: Vec<KeyCode>,
}

impl DesktopWindow {
    pub fn new(config: &WindowConfig) -> Result<Self> {
        let event_loop = EventLoop::new().context("Failed to create event loop")?;

        let window = WindowBuilder::new()
            .with_title(config.title.as_str())
            .with_inner_size(PhysicalSize::new(config.width, config.height))
            .with_visible(true)
            .build(&event_loop)
            .context("Failed to create window")?;

        let size = window.inner_size();
        log::info!("Window created - width: {}, height: {}", size.width, size.height);

        Ok(Self {
            surface: None,
            window: Arc::new(window),
            event_loop,
            size: (size.width, size.height),
            resized: false,
            should_close: false,
            pressed: Vec::new(),
        })
    }

    /// Creates the presentable surface on the GPU the headset uses.
    pub fn attach_surface(&mut self, gpu: &GpuContext) -> Result<()> {
        let surface = gpu
            .instance
            .create_surface(self.window.clone())
            .context("Failed to create surface")?;

        let caps = surface.get_capabilities(&gpu.adapter);
        let format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .context("Surface reports no supported formats")?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: self.size.0.max(1),
            height: self.size.1.max(1),
            present_mode: wgpu::PresentMode::AutoNoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&gpu.device, &config);
        log::info!("Window surface configured as {:?}", format);

        self.surface = Some(SurfaceState {
            surface,
            config,
            device: gpu.device.clone(),
            frame: None,
        });
        Ok(())
    }

    pub fn surface_format(&self) -> Option<wgpu::TextureFormat> {
        self.surface.as_ref().map(|s| s.config.format)
    }

    /// View of this frame's back buffer, or `None` when there is nothing to
    /// draw into (minimised window, surface being rebuilt).
    pub fn acquire_back_buffer(&mut self) -> Result<Option<wgpu::TextureView>> {
        let (width, height) = self.size;
        let resized = std::mem::take(&mut self.resized);
        let Some(state) = self.surface.as_mut() else {
            return Ok(None);
        };
        if width == 0 || height == 0 {
            return Ok(None);
        }
        if resized {
            state.config.width = width;
            state.config.height = height;
            state.surface.configure(&state.device, &state.config);
        }

        if state.frame.is_none() {
            match state.surface.get_current_texture() {
                Ok(frame) => state.frame = Some(frame),
                Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                    log::debug!("Surface out of date, reconfiguring");
                    state.surface.configure(&state.device, &state.config);
                    return Ok(None);
                }
                Err(wgpu::SurfaceError::Timeout) => return Ok(None),
                Err(err) => return Err(anyhow::anyhow!("Failed to acquire back buffer: {}", err)),
            }
        }

        Ok(state
            .frame
            .as_ref()
            .map(|frame| frame.texture.create_view(&wgpu::TextureViewDescriptor::default())))
    }
}

impl WindowSurface for DesktopWindow {
    fn poll_events(&mut self) {
        let Self {
            event_loop,
            size,
            resized,
            should_close,
            pressed,
            ..
        } = self;

        let status = event_loop.pump_events(Some(Duration::ZERO), |event, _target| {
            if let Event::WindowEvent { event, .. } = event {
                match event {
                    WindowEvent::CloseRequested => *should_close = true,
                    WindowEvent::Resized(new_size) => {
                        *size = (new_size.width, new_size.height);
                        *resized = true;
                    }
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(code),
                                state: ElementState::Pressed,
                                repeat: false,
                                ..
                            },
                        ..
                    } => pressed.push(code),
                    _ => {}
                }
            }
        });

        if let PumpStatus::Exit(code) = status {
            log::info!("Event loop exited with code {}", code);
            self.should_close = true;
        }
    }

    fn take_key_presses(&mut self) -> Vec<KeyCode> {
        std::mem::take(&mut self.pressed)
    }

    fn should_close(&self) -> bool {
        self.should_close
    }

    fn set_should_close(&mut self, value: bool) {
        self.should_close = value;
    }

    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn swap_buffers(&mut self) -> Result<()> {
        if let Some(frame) = self.surface.as_mut().and_then(|s| s.frame.take()) {
            frame.present();
        }
        Ok(())
    }
}
