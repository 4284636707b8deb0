use std::sync::Arc;

/// The wgpu objects shared by the mirror window, the eye renderer and the
/// headset swapchain. All of them sit on the Vulkan device the XR runtime
/// picked.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    /// Format of the eye targets; matches the headset swapchain.
    pub eye_format: wgpu::TextureFormat,
}

impl GpuContext {
    pub fn log_adapter(&self) {
        let info = self.adapter.get_info();
        log::info!(
            "Using GPU: {} ({:?}, driver {} {})",
            info.name,
            info.backend,
            info.driver,
            info.driver_info
        );
    }
}
