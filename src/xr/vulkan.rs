use anyhow::{Context, Result};
use ash::vk::{self, Handle};
use openxr as xr;
use std::ffi::{c_char, c_void, CStr};
use std::mem::transmute;
use std::sync::Arc;
use wgpu::hal::api::Vulkan as VulkanApi;

const VK_TARGET_VERSION: u32 = vk::make_api_version(0, 1, 2, 0);

/// Eye formats in order of preference; both are sRGB so the compositor gets
/// gamma-encoded images.
pub const PREFERRED_FORMATS: [wgpu::TextureFormat; 2] = [
    wgpu::TextureFormat::Rgba8UnormSrgb,
    wgpu::TextureFormat::Bgra8UnormSrgb,
];

pub fn wgpu_format_to_vulkan(format: wgpu::TextureFormat) -> Option<vk::Format> {
    match format {
        wgpu::TextureFormat::Bgra8UnormSrgb => Some(vk::Format::B8G8R8A8_SRGB),
        wgpu::TextureFormat::Rgba8UnormSrgb => Some(vk::Format::R8G8B8A8_SRGB),
        wgpu::TextureFormat::R8Unorm => Some(vk::Format::R8_UNORM),
        wgpu::TextureFormat::Rgba8Unorm => Some(vk::Format::R8G8B8A8_UNORM),
        wgpu::TextureFormat::Bgra8Unorm => Some(vk::Format::B8G8R8A8_UNORM),
        _ => None,
    }
}

/// First preferred format the runtime offers for swapchains.
pub fn pick_swapchain_format(offered: &[u32]) -> Option<(wgpu::TextureFormat, u32)> {
    PREFERRED_FORMATS.iter().find_map(|&format| {
        let raw = wgpu_format_to_vulkan(format)?.as_raw() as u32;
        offered.contains(&raw).then_some((format, raw))
    })
}

/// A Vulkan device created through the XR runtime and wrapped for wgpu.
pub struct SharedVulkanDevice {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    pub session_info: xr::vulkan::SessionCreateInfo,
}

type XrGetInstanceProcAddr =
    unsafe extern "system" fn(*const c_void, *const c_char) -> Option<unsafe extern "system" fn()>;

pub fn create_shared_device(
    xr_instance: &xr::Instance,
    system: xr::SystemId,
) -> Result<SharedVulkanDevice> {
    let requirements = xr_instance
        .graphics_requirements::<xr::Vulkan>(system)
        .map_err(|err| anyhow::anyhow!("Failed to get Vulkan requirements: {}", err))?;
    let target = xr::Version::new(1, 2, 0);
    if target < requirements.min_api_version_supported
        || target.major() > requirements.max_api_version_supported.major()
    {
        anyhow::bail!(
            "Runtime needs Vulkan {}..{}, this app targets {}",
            requirements.min_api_version_supported,
            requirements.max_api_version_supported,
            target
        );
    }

    let vk_entry = unsafe { ash::Entry::load() }
        .map_err(|err| anyhow::anyhow!("Failed to load Vulkan entry point: {}", err))?;
    let get_instance_proc_addr = unsafe {
        transmute::<vk::PFN_vkGetInstanceProcAddr, XrGetInstanceProcAddr>(
            vk_entry.static_fn().get_instance_proc_addr,
        )
    };

    let flags = wgpu::InstanceFlags::empty();
    let instance_extensions =
        wgpu::hal::vulkan::Instance::desired_extensions(&vk_entry, VK_TARGET_VERSION, flags)
            .map_err(|err| {
                anyhow::anyhow!("Failed to query Vulkan instance extensions: {}", err)
            })?;

    let vk_instance = unsafe {
        let app_name = CStr::from_bytes_with_nul(b"starfield\0")?;
        let extension_names: Vec<*const c_char> =
            instance_extensions.iter().map(|name| name.as_ptr()).collect();
        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .application_version(1)
            .engine_name(app_name)
            .engine_version(1)
            .api_version(VK_TARGET_VERSION);
        let create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names);

        let raw = xr_instance
            .create_vulkan_instance(
                system,
                get_instance_proc_addr,
                &create_info as *const _ as *const _,
            )
            .map_err(|err| anyhow::anyhow!("Failed to create Vulkan instance: {}", err))?
            .map_err(|raw| anyhow::anyhow!("Vulkan error: {}", vk::Result::from_raw(raw)))?;

        ash::Instance::load(vk_entry.static_fn(), vk::Instance::from_raw(raw as _))
    };

    let physical_device = unsafe {
        let raw = xr_instance
            .vulkan_graphics_device(system, vk_instance.handle().as_raw() as _)
            .map_err(|err| anyhow::anyhow!("Failed to get Vulkan physical device: {}", err))?;
        vk::PhysicalDevice::from_raw(raw as _)
    };

    let properties = unsafe { vk_instance.get_physical_device_properties(physical_device) };
    if properties.api_version < VK_TARGET_VERSION {
        anyhow::bail!("Headset GPU does not support Vulkan 1.2");
    }

    let queue_families =
        unsafe { vk_instance.get_physical_device_queue_family_properties(physical_device) };
    let queue_family_index = queue_families
        .into_iter()
        .position(|family| family.queue_flags.contains(vk::QueueFlags::GRAPHICS))
        .context("Headset GPU has no graphics queue")? as u32;

    let hal_instance = unsafe {
        wgpu::hal::vulkan::Instance::from_raw(
            vk_entry.clone(),
            vk_instance.clone(),
            VK_TARGET_VERSION,
            0,
            None,
            instance_extensions,
            flags,
            false,
            None,
        )
    }
    .map_err(|err| anyhow::anyhow!("Failed to wrap Vulkan instance: {}", err))?;

    let exposed_adapter = hal_instance
        .expose_adapter(physical_device)
        .context("wgpu cannot use the headset GPU")?;

    let features = wgpu::Features::empty();
    let device_extensions = exposed_adapter.adapter.required_device_extensions(features);
    let mut physical_features = exposed_adapter
        .adapter
        .physical_device_features(&device_extensions, features);

    let (raw_device, open_device) = unsafe {
        let priorities = [1.0];
        let queue_infos = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(queue_family_index)
            .queue_priorities(&priorities)];
        let extension_names: Vec<*const c_char> =
            device_extensions.iter().map(|name| name.as_ptr()).collect();
        let device_info = physical_features.add_to_device_create(
            vk::DeviceCreateInfo::default()
                .queue_create_infos(&queue_infos)
                .enabled_extension_names(&extension_names),
        );

        let raw_device = xr_instance
            .create_vulkan_device(
                system,
                get_instance_proc_addr,
                physical_device.as_raw() as _,
                &device_info as *const _ as *const _,
            )
            .map_err(|err| anyhow::anyhow!("Failed to create Vulkan device: {}", err))?
            .map_err(|raw| anyhow::anyhow!("Vulkan error: {}", vk::Result::from_raw(raw)))?;

        let vk_device =
            ash::Device::load(vk_instance.fp_v1_0(), vk::Device::from_raw(raw_device as _));
        let open_device = exposed_adapter
            .adapter
            .device_from_raw(
                vk_device,
                None,
                &device_extensions,
                features,
                &wgpu::MemoryHints::Performance,
                queue_family_index,
                0,
            )
            .map_err(|err| anyhow::anyhow!("Failed to wrap Vulkan device: {}", err))?;

        (raw_device, open_device)
    };

    let session_info = xr::vulkan::SessionCreateInfo {
        instance: vk_instance.handle().as_raw() as _,
        physical_device: physical_device.as_raw() as _,
        device: raw_device,
        queue_family_index,
        queue_index: 0,
    };

    let instance = unsafe { wgpu::Instance::from_hal::<VulkanApi>(hal_instance) };
    let adapter = unsafe { instance.create_adapter_from_hal(exposed_adapter) };
    let (device, queue) = unsafe {
        adapter.create_device_from_hal(
            open_device,
            &wgpu::DeviceDescriptor {
                label: Some("Headset Device"),
                required_features: features,
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        )
    }
    .map_err(|err| anyhow::anyhow!("Failed to create wgpu device: {}", err))?;

    Ok(SharedVulkanDevice {
        instance,
        adapter,
        device: Arc::new(device),
        queue: Arc::new(queue),
        session_info,
    })
}

/// Wraps one runtime-owned swapchain image as a two-layer wgpu texture.
///
/// # Safety
/// `image` must be a live `VkImage` of the given size and format created on
/// `device`, and must outlive the returned texture.
pub unsafe fn swapchain_texture(
    device: &wgpu::Device,
    image: u64,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
) -> wgpu::Texture {
    let size = wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 2,
    };

    // The runtime owns the image, so the drop callback must not destroy it.
    let hal_texture = wgpu::hal::vulkan::Device::texture_from_raw(
        vk::Image::from_raw(image),
        &wgpu::hal::TextureDescriptor {
            label: Some("Headset Swapchain Image"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::hal::TextureUses::COLOR_TARGET,
            memory_flags: wgpu::hal::MemoryFlags::empty(),
            view_formats: vec![],
        },
        Some(Box::new(|| {})),
    );

    device.create_texture_from_hal::<VulkanApi>(
        hal_texture,
        &wgpu::TextureDescriptor {
            label: Some("Headset Swapchain Image"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        },
    )
}
