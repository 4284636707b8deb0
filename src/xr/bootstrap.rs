use anyhow::{Context, Result};
use openxr as xr;
use std::time::{Duration, Instant};

use super::compositor::{HandTracking, SwapchainImage};
use super::runtime::EyeView;
use super::vulkan::{create_shared_device, pick_swapchain_format, swapchain_texture};
use super::{OpenXrCompositor, OpenXrRuntime, SessionState, SharedSession};
use crate::render::GpuContext;

const READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Everything the app needs from the headset, sharing one GPU device.
pub struct XrBackend {
    pub gpu: GpuContext,
    pub runtime: OpenXrRuntime,
    pub compositor: OpenXrCompositor,
}

pub fn bootstrap() -> Result<XrBackend> {
    log::info!("Initializing OpenXR");

    let xr_entry = unsafe { xr::Entry::load() }
        .map_err(|err| anyhow::anyhow!("Failed to load the OpenXR loader: {}", err))?;

    let available_extensions = xr_entry
        .enumerate_extensions()
        .map_err(|err| anyhow::anyhow!("Failed to enumerate OpenXR extensions: {}", err))?;

    let mut enabled_extensions = xr::ExtensionSet::default();
    enabled_extensions.khr_vulkan_enable2 = available_extensions.khr_vulkan_enable2;
    if !enabled_extensions.khr_vulkan_enable2 {
        anyhow::bail!("OpenXR Vulkan support not available");
    }

    let app_info = xr::ApplicationInfo {
        application_name: "starfield",
        application_version: 0,
        engine_name: "starfield",
        engine_version: 0,
    };

    let instance = xr_entry
        .create_instance(&app_info, &enabled_extensions, &[])
        .map_err(|err| anyhow::anyhow!("Failed to create OpenXR instance: {}", err))?;

    let system = instance
        .system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)
        .map_err(|err| anyhow::anyhow!("No head-mounted display found: {}", err))?;

    if !instance
        .enumerate_environment_blend_modes(system, xr::ViewConfigurationType::PRIMARY_STEREO)
        .unwrap_or_default()
        .contains(&xr::EnvironmentBlendMode::OPAQUE)
    {
        anyhow::bail!("OpenXR opaque blend mode not supported");
    }

    let view_configuration_views = instance
        .enumerate_view_configuration_views(system, xr::ViewConfigurationType::PRIMARY_STEREO)
        .map_err(|err| anyhow::anyhow!("Failed to get view configuration: {}", err))?;
    let primary_view = view_configuration_views
        .first()
        .context("Runtime reported no stereo views")?;
    let resolution = (
        primary_view.recommended_image_rect_width,
        primary_view.recommended_image_rect_height,
    );
    log::info!("Recommended eye resolution: {}x{}", resolution.0, resolution.1);

    let shared_device = create_shared_device(&instance, system)?;

    let (session, mut frame_waiter, mut frame_stream) = unsafe {
        instance
            .create_session::<xr::Vulkan>(system, &shared_device.session_info)
            .map_err(|err| anyhow::anyhow!("Failed to create session: {}", err))?
    };

    let stage = session
        .create_reference_space(xr::ReferenceSpaceType::STAGE, xr::Posef::IDENTITY)
        .map_err(|err| anyhow::anyhow!("Failed to create stage space: {}", err))?;
    let view_space = session
        .create_reference_space(xr::ReferenceSpaceType::VIEW, xr::Posef::IDENTITY)
        .map_err(|err| anyhow::anyhow!("Failed to create view space: {}", err))?;

    let hands = create_hand_tracking(&instance, &session)?;

    let offered_formats = session
        .enumerate_swapchain_formats()
        .map_err(|err| anyhow::anyhow!("Failed to get swapchain formats: {}", err))?;
    let (eye_format, vk_format) =
        pick_swapchain_format(&offered_formats).context("Runtime offers no sRGB swapchain format")?;

    let swapchain = session
        .create_swapchain(&xr::SwapchainCreateInfo {
            create_flags: xr::SwapchainCreateFlags::EMPTY,
            usage_flags: xr::SwapchainUsageFlags::COLOR_ATTACHMENT,
            format: vk_format,
            sample_count: 1,
            width: resolution.0,
            height: resolution.1,
            face_count: 1,
            array_size: 2,
            mip_count: 1,
        })
        .map_err(|err| anyhow::anyhow!("Failed to create swapchain: {}", err))?;

    let images = swapchain
        .enumerate_images()
        .map_err(|err| anyhow::anyhow!("Failed to enumerate swapchain images: {}", err))?
        .into_iter()
        .map(|image| unsafe {
            SwapchainImage::new(swapchain_texture(
                &shared_device.device,
                image,
                eye_format,
                resolution.0,
                resolution.1,
            ))
        })
        .collect::<Vec<_>>();
    log::info!("Created {} swapchain images as {:?}", images.len(), eye_format);

    let shared = SessionState::new(session);
    wait_until_running(&instance, &shared)?;
    let eyes = capture_eye_views(&shared, &mut frame_waiter, &mut frame_stream, &view_space)?;

    let gpu = GpuContext {
        instance: shared_device.instance,
        adapter: shared_device.adapter,
        device: shared_device.device,
        queue: shared_device.queue,
        eye_format,
    };
    gpu.log_adapter();

    let runtime = OpenXrRuntime::new(shared.clone(), instance, system, resolution, eyes)?;
    let compositor = OpenXrCompositor::new(
        shared,
        frame_waiter,
        frame_stream,
        swapchain,
        images,
        stage,
        view_space,
        hands,
        gpu.device.clone(),
        gpu.queue.clone(),
        eye_format,
        resolution,
    );

    Ok(XrBackend {
        gpu,
        runtime,
        compositor,
    })
}

fn create_hand_tracking(
    instance: &xr::Instance,
    session: &xr::Session<xr::Vulkan>,
) -> Result<HandTracking> {
    let path = |name: &str| {
        instance
            .string_to_path(name)
            .map_err(|err| anyhow::anyhow!("Failed to create path {}: {}", name, err))
    };

    let action_set = instance
        .create_action_set("starfield", "Starfield", 0)
        .map_err(|err| anyhow::anyhow!("Failed to create action set: {}", err))?;
    let left_action = action_set
        .create_action::<xr::Posef>("left_hand", "Left Hand Controller", &[])
        .map_err(|err| anyhow::anyhow!("Failed to create left hand action: {}", err))?;
    let right_action = action_set
        .create_action::<xr::Posef>("right_hand", "Right Hand Controller", &[])
        .map_err(|err| anyhow::anyhow!("Failed to create right hand action: {}", err))?;

    instance
        .suggest_interaction_profile_bindings(
            path("/interaction_profiles/khr/simple_controller")?,
            &[
                xr::Binding::new(&left_action, path("/user/hand/left/input/grip/pose")?),
                xr::Binding::new(&right_action, path("/user/hand/right/input/grip/pose")?),
            ],
        )
        .map_err(|err| anyhow::anyhow!("Failed to suggest controller bindings: {}", err))?;

    session
        .attach_action_sets(&[&action_set])
        .map_err(|err| anyhow::anyhow!("Failed to attach action set: {}", err))?;

    let left_space = left_action
        .create_space(session.clone(), xr::Path::NULL, xr::Posef::IDENTITY)
        .map_err(|err| anyhow::anyhow!("Failed to create left hand space: {}", err))?;
    let right_space = right_action
        .create_space(session.clone(), xr::Path::NULL, xr::Posef::IDENTITY)
        .map_err(|err| anyhow::anyhow!("Failed to create right hand space: {}", err))?;

    Ok(HandTracking {
        left_space,
        right_space,
        left_action,
        right_action,
        action_set,
    })
}

/// Pumps session events until the runtime says READY and the session has
/// begun.
fn wait_until_running(instance: &xr::Instance, shared: &SharedSession) -> Result<()> {
    let started = Instant::now();
    let mut event_storage = xr::EventDataBuffer::new();

    while !shared.borrow().running {
        if started.elapsed() > READY_TIMEOUT {
            anyhow::bail!("Headset session did not become ready within {:?}", READY_TIMEOUT);
        }

        let event = instance
            .poll_event(&mut event_storage)
            .map_err(|err| anyhow::anyhow!("Failed to poll OpenXR events: {}", err))?;
        match event {
            Some(xr::Event::SessionStateChanged(change)) => {
                let mut state = shared.borrow_mut();
                state.handle_state_change(change.state())?;
                if state.lost || state.exit_requested {
                    anyhow::bail!("VR session is exiting");
                }
            }
            Some(_) => {}
            None => std::thread::sleep(Duration::from_millis(10)),
        }
    }
    Ok(())
}

/// Runs one empty frame to read each eye's FoV and its offset from the head.
fn capture_eye_views(
    shared: &SharedSession,
    frame_waiter: &mut xr::FrameWaiter,
    frame_stream: &mut xr::FrameStream<xr::Vulkan>,
    view_space: &xr::Space,
) -> Result<[EyeView; 2]> {
    let state = frame_waiter
        .wait()
        .map_err(|err| anyhow::anyhow!("Failed to wait for frame: {}", err))?;
    frame_stream
        .begin()
        .map_err(|err| anyhow::anyhow!("Failed to begin frame: {}", err))?;

    let located = shared.borrow().session.locate_views(
        xr::ViewConfigurationType::PRIMARY_STEREO,
        state.predicted_display_time,
        view_space,
    );

    frame_stream
        .end(state.predicted_display_time, xr::EnvironmentBlendMode::OPAQUE, &[])
        .map_err(|err| anyhow::anyhow!("Failed to end frame: {}", err))?;

    let (_, views) = located.map_err(|err| anyhow::anyhow!("Failed to locate views: {}", err))?;
    match views.as_slice() {
        [left, right, ..] => {
            let eyes = [left, right].map(|view| EyeView {
                fov: view.fov,
                pose: view.pose,
            });
            log::info!(
                "Eye separation: {:.1} mm",
                (eyes[1].pose.position.x - eyes[0].pose.position.x).abs() * 1000.0
            );
            Ok(eyes)
        }
        _ => anyhow::bail!("Runtime located {} views, expected 2", views.len()),
    }
}
