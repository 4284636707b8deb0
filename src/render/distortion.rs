use wgpu::util::DeviceExt;

use super::targets::StereoTargets;

/// Radial polynomial coefficients for the mirror's barrel pre-warp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LensParams {
    pub k1: f32,
    pub k2: f32,
    pub scale: f32,
}

impl Default for LensParams {
    fn default() -> Self {
        Self {
            k1: 0.22,
            k2: 0.24,
            scale: 1.0,
        }
    }
}

impl LensParams {
    /// Where the sample for `uv` (0..1 within one eye) is read from.
    pub fn warp(&self, uv: [f32; 2]) -> [f32; 2] {
        let x = uv[0] * 2.0 - 1.0;
        let y = uv[1] * 2.0 - 1.0;
        let r2 = x * x + y * y;
        let factor = 1.0 + self.k1 * r2 + self.k2 * r2 * r2;
        [
            x * factor / self.scale * 0.5 + 0.5,
            y * factor / self.scale * 0.5 + 0.5,
        ]
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct LensUniform {
    coefficients: [f32; 4],
}

/// Draws both resolved eye images side by side into the desktop window,
/// pre-warped for the headset lenses.
pub struct DistortionLens {
    pipeline: wgpu::RenderPipeline,
    bind_group: wgpu::BindGroup,
    _lens_buffer: wgpu::Buffer,
    _sampler: wgpu::Sampler,
}

impl DistortionLens {
    pub fn new(
        device: &wgpu::Device,
        targets: &StereoTargets,
        output_format: wgpu::TextureFormat,
        params: LensParams,
    ) -> Self {
        let texture_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Distortion Bind Group Layout"),
            entries: &[
                texture_entry(0),
                texture_entry(1),
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Distortion Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let lens_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Distortion Lens Buffer"),
            contents: bytemuck::cast_slice(&[LensUniform {
                coefficients: [params.k1, params.k2, params.scale, 0.0],
            }]),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Distortion Bind Group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&targets.left.resolve_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&targets.right.resolve_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: lens_buffer.as_entire_binding(),
                },
            ],
        });

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Distortion Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/distortion.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Distortion Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Distortion Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: output_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        Self {
            pipeline,
            bind_group,
            _lens_buffer: lens_buffer,
            _sampler: sampler,
        }
    }

    pub fn render(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        output: &wgpu::TextureView,
        width: u32,
        height: u32,
    ) {
        let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Distortion Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: output,
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

        render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        render_pass.set_pipeline(&self.pipeline);
        render_pass.set_bind_group(0, &self.bind_group, &[]);
        render_pass.draw(0..3, 0..1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_centre_is_fixed_point() {
        let lens = LensParams::default();
        let [u, v] = lens.warp([0.5, 0.5]);
        assert_relative_eq!(u, 0.5);
        assert_relative_eq!(v, 0.5);
    }

    #[test]
    fn test_barrel_pushes_samples_outward() {
        let lens = LensParams::default();
        let [u, _] = lens.warp([0.9, 0.5]);
        assert!(u > 0.9, "edge sample should move outward, got {}", u);
    }

    #[test]
    fn test_zero_coefficients_is_identity() {
        let lens = LensParams {
            k1: 0.0,
            k2: 0.0,
            scale: 1.0,
        };
        let [u, v] = lens.warp([0.2, 0.7]);
        assert_relative_eq!(u, 0.2, epsilon = 1e-6);
        assert_relative_eq!(v, 0.7, epsilon = 1e-6);
    }
}
