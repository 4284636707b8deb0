use crate::config::MSAA_SAMPLES;
use crate::vr::Eye;

use super::pipeline::DEPTH_FORMAT;

/// One eye's offscreen surfaces: a multisampled colour/depth pair to render
/// into and a single-sampled texture the samples are resolved to.
pub struct EyeTarget {
    pub width: u32,
    pub height: u32,
    pub render_texture: wgpu::Texture,
    pub render_view: wgpu::TextureView,
    pub depth_texture: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
    pub resolve_texture: wgpu::Texture,
    pub resolve_view: wgpu::TextureView,
}

impl EyeTarget {
    pub fn new(
        device: &wgpu::Device,
        eye: Eye,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        let render_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{:?} Eye Render Texture", eye)),
            size,
            mip_level_count: 1,
            sample_count: MSAA_SAMPLES,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let depth_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{:?} Eye Depth Texture", eye)),
            size,
            mip_level_count: 1,
            sample_count: MSAA_SAMPLES,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        let resolve_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&format!("{:?} Eye Resolve Texture", eye)),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });

        let render_view = render_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let depth_view = depth_texture.create_view(&wgpu::TextureViewDescriptor::default());
        let resolve_view = resolve_texture.create_view(&wgpu::TextureViewDescriptor::default());

        Self {
            width,
            height,
            render_texture,
            render_view,
            depth_texture,
            depth_view,
            resolve_texture,
            resolve_view,
        }
    }
}

pub struct StereoTargets {
    pub left: EyeTarget,
    pub right: EyeTarget,
}

impl StereoTargets {
    pub fn new(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        format: wgpu::TextureFormat,
    ) -> Self {
        log::info!("Creating {}x{} stereo render targets ({}x MSAA)", width, height, MSAA_SAMPLES);
        Self {
            left: EyeTarget::new(device, Eye::Left, width, height, format),
            right: EyeTarget::new(device, Eye::Right, width, height, format),
        }
    }

    pub fn get(&self, eye: Eye) -> &EyeTarget {
        match eye {
            Eye::Left => &self.left,
            Eye::Right => &self.right,
        }
    }
}
