//! Stereo eye rendering and the desktop mirror.

pub mod distortion;
pub mod gpu;
pub mod mesh;
pub mod pipeline;
pub mod targets;

pub use distortion::{DistortionLens, LensParams};
pub use gpu::GpuContext;
pub use targets::{EyeTarget, StereoTargets};

use glam::{Mat4, Vec3, Vec4};
use std::sync::Arc;
use thiserror::Error;

use crate::config::{STAR_RADIUS, STAR_RINGS, STAR_SEGMENTS};
use crate::scene::{CameraView, Material, Star};
use crate::vr::{Eye, TrackedDevice};
use crate::window::{DesktopWindow, WindowSurface};
use mesh::{GpuMesh, MeshData};
use pipeline::{CameraUniform, InstanceRaw, ScenePipeline};

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.15,
    g: 0.15,
    b: 0.18,
    a: 1.0,
};

/// Half extents of the box drawn for each tracked controller.
const DEVICE_HALF_EXTENTS: Vec3 = Vec3::new(0.025, 0.015, 0.075);
const DEVICE_COLOR: Vec4 = Vec4::new(0.5, 0.5, 0.5, 1.0);
const DEVICE_SHININESS: f32 = 4.0;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{0:?} eye pass is already open")]
    PassAlreadyOpen(Eye),
    #[error("no eye pass is open")]
    NoActivePass,
    #[error("window surface unavailable: {0}")]
    Surface(String),
}

/// Everything the frame loop asks of the rendering engine.
///
/// An eye is drawn between `begin_eye` and `resolve_eye`; after resolving,
/// `resolve_texture` hands out the single-sampled image for the compositor.
pub trait StereoRenderer<W: ?Sized> {
    type EyeTexture: ?Sized;

    /// Size of each eye target in pixels.
    fn target_size(&self) -> (u32, u32);

    /// Binds the eye's multisampled target; the pass clears colour and depth.
    fn begin_eye(&mut self, eye: Eye) -> Result<(), RenderError>;

    fn draw_star(
        &mut self,
        star: &Star,
        material: &Material,
        projection: Mat4,
        view: Mat4,
        camera: &dyn CameraView,
    ) -> Result<(), RenderError>;

    fn render_devices(
        &mut self,
        devices: &[TrackedDevice],
        projection: Mat4,
        view: Mat4,
        camera: &dyn CameraView,
    ) -> Result<(), RenderError>;

    /// Ends the eye pass and resolves its colour samples.
    fn resolve_eye(&mut self, eye: Eye) -> Result<(), RenderError>;

    /// Drops any open pass for `eye` and leaves its resolve target blank.
    fn blank_eye(&mut self, eye: Eye);

    /// Draws both resolved eyes, lens-corrected, into the window.
    fn render_distortion(&mut self, window: &mut W) -> Result<(), RenderError>;

    fn resolve_texture(&self, eye: Eye) -> &Self::EyeTexture;
}

struct EyePass {
    eye: Eye,
    camera: Option<CameraUniform>,
    stars: Vec<InstanceRaw>,
    devices: Vec<InstanceRaw>,
}

impl EyePass {
    fn new(eye: Eye, star_capacity: usize) -> Self {
        Self {
            eye,
            camera: None,
            stars: Vec::with_capacity(star_capacity),
            devices: Vec::new(),
        }
    }
}

/// wgpu implementation of [`StereoRenderer`]. Stars are gathered into one
/// instance buffer per eye and drawn with a single instanced call.
pub struct WgpuStereoRenderer {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    pipeline: ScenePipeline,
    lens: DistortionLens,
    targets: StereoTargets,
    star_mesh: GpuMesh,
    device_mesh: GpuMesh,
    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,
    pass: Option<EyePass>,
}

impl WgpuStereoRenderer {
    pub fn new(
        gpu: &GpuContext,
        target_size: (u32, u32),
        mirror_format: wgpu::TextureFormat,
        star_capacity: usize,
    ) -> Self {
        let (width, height) = target_size;
        let device = gpu.device.clone();

        let targets = StereoTargets::new(&device, width, height, gpu.eye_format);
        let pipeline = ScenePipeline::new(&device, gpu.eye_format);
        let lens = DistortionLens::new(&device, &targets, mirror_format, LensParams::default());

        let star_mesh = GpuMesh::upload(
            &device,
            "Star",
            &MeshData::sphere(STAR_RADIUS, STAR_SEGMENTS, STAR_RINGS),
        );
        let device_mesh =
            GpuMesh::upload(&device, "Tracked Device", &MeshData::cuboid(DEVICE_HALF_EXTENTS));

        // Room for every star plus a handful of devices.
        let instance_capacity = star_capacity + 8;
        let instance_buffer = create_instance_buffer(&device, instance_capacity);

        log::info!("Stereo renderer ready: {}x{} per eye, {:?}", width, height, gpu.eye_format);

        Self {
            device,
            queue: gpu.queue.clone(),
            pipeline,
            lens,
            targets,
            star_mesh,
            device_mesh,
            instance_buffer,
            instance_capacity,
            pass: None,
        }
    }

    fn active_pass(&mut self) -> Result<&mut EyePass, RenderError> {
        self.pass.as_mut().ok_or(RenderError::NoActivePass)
    }

    fn ensure_instance_capacity(&mut self, needed: usize) {
        if needed <= self.instance_capacity {
            return;
        }
        let capacity = needed.next_power_of_two();
        log::debug!("Growing instance buffer from {} to {}", self.instance_capacity, capacity);
        self.instance_buffer = create_instance_buffer(&self.device, capacity);
        self.instance_capacity = capacity;
    }
}

fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Instance Buffer"),
        size: (capacity * std::mem::size_of::<InstanceRaw>()) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl StereoRenderer<DesktopWindow> for WgpuStereoRenderer {
    type EyeTexture = wgpu::Texture;

    fn target_size(&self) -> (u32, u32) {
        (self.targets.left.width, self.targets.left.height)
    }

    fn begin_eye(&mut self, eye: Eye) -> Result<(), RenderError> {
        if let Some(open) = &self.pass {
            return Err(RenderError::PassAlreadyOpen(open.eye));
        }
        self.pass = Some(EyePass::new(eye, self.instance_capacity));
        Ok(())
    }

    fn draw_star(
        &mut self,
        star: &Star,
        material: &Material,
        projection: Mat4,
        view: Mat4,
        camera: &dyn CameraView,
    ) -> Result<(), RenderError> {
        let pass = self.active_pass()?;
        if pass.camera.is_none() {
            pass.camera = Some(CameraUniform::new(projection, view, camera.position()));
        }
        pass.stars.push(InstanceRaw::new(
            Mat4::from_translation(star.position),
            material.diffuse_color,
            material.shininess,
        ));
        Ok(())
    }

    fn render_devices(
        &mut self,
        devices: &[TrackedDevice],
        projection: Mat4,
        view: Mat4,
        camera: &dyn CameraView,
    ) -> Result<(), RenderError> {
        let pass = self.active_pass()?;
        if pass.camera.is_none() {
            pass.camera = Some(CameraUniform::new(projection, view, camera.position()));
        }
        pass.devices.extend(devices.iter().map(|device| {
            InstanceRaw::new(device.device_to_world, DEVICE_COLOR, DEVICE_SHININESS)
        }));
        Ok(())
    }

    fn resolve_eye(&mut self, eye: Eye) -> Result<(), RenderError> {
        let pass = match self.pass.take() {
            Some(pass) if pass.eye == eye => pass,
            Some(other) => {
                let open = other.eye;
                self.pass = Some(other);
                return Err(RenderError::PassAlreadyOpen(open));
            }
            None => return Err(RenderError::NoActivePass),
        };

        let star_count = pass.stars.len() as u32;
        let device_count = pass.devices.len() as u32;
        self.ensure_instance_capacity(pass.stars.len() + pass.devices.len());

        if let Some(camera) = &pass.camera {
            self.pipeline.update_camera(&self.queue, camera);
        }
        if star_count > 0 {
            self.queue
                .write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&pass.stars));
        }
        if device_count > 0 {
            let offset =
                (pass.stars.len() * std::mem::size_of::<InstanceRaw>()) as wgpu::BufferAddress;
            self.queue
                .write_buffer(&self.instance_buffer, offset, bytemuck::cast_slice(&pass.devices));
        }

        let target = self.targets.get(eye);
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&format!("{:?} Eye Encoder", eye)),
        });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&format!("{:?} Eye Pass", eye)),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.render_view,
                    resolve_target: Some(&target.resolve_view),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Discard,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &target.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_viewport(0.0, 0.0, target.width as f32, target.height as f32, 0.0, 1.0);

            if pass.camera.is_some() && star_count + device_count > 0 {
                render_pass.set_pipeline(&self.pipeline.render_pipeline);
                render_pass.set_bind_group(0, &self.pipeline.camera_bind_group, &[]);
                render_pass.set_bind_group(1, &self.pipeline.light_bind_group, &[]);
                render_pass.set_vertex_buffer(1, self.instance_buffer.slice(..));

                if star_count > 0 {
                    self.star_mesh.bind(&mut render_pass);
                    render_pass.draw_indexed(0..self.star_mesh.num_elements, 0, 0..star_count);
                }
                if device_count > 0 {
                    self.device_mesh.bind(&mut render_pass);
                    render_pass.draw_indexed(
                        0..self.device_mesh.num_elements,
                        0,
                        star_count..star_count + device_count,
                    );
                }
            }
        }

        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn blank_eye(&mut self, eye: Eye) {
        if self.pass.as_ref().is_some_and(|pass| pass.eye == eye) {
            self.pass = None;
        }

        let target = self.targets.get(eye);
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&format!("{:?} Eye Blank Encoder", eye)),
        });
        {
            let _render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&format!("{:?} Eye Blank Pass", eye)),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target.resolve_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
        }
        self.queue.submit(Some(encoder.finish()));
    }

    fn render_distortion(&mut self, window: &mut DesktopWindow) -> Result<(), RenderError> {
        let (width, height) = window.size();
        let back_buffer = window
            .acquire_back_buffer()
            .map_err(|err| RenderError::Surface(err.to_string()))?;
        let Some(view) = back_buffer else {
            return Ok(());
        };

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Distortion Encoder"),
        });
        self.lens.render(&mut encoder, &view, width, height);
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn resolve_texture(&self, eye: Eye) -> &wgpu::Texture {
        &self.targets.get(eye).resolve_texture
    }
}
