use glam::Mat4;
use openxr as xr;
use std::sync::Arc;
use std::time::Duration;

use super::blit::SwapchainBlit;
use super::math::{is_location_valid, pose_to_matrix};
use super::runtime::EyeView;
use super::{SharedSession, IDLE_REFRESH_HZ, LEFT_HAND, RIGHT_HAND};
use crate::vr::{Compositor, CompositorError, DeviceIndex, Eye, TrackedDevice, VrEvent};

fn runtime_error(err: xr::sys::Result) -> CompositorError {
    match err {
        xr::sys::Result::ERROR_SESSION_LOST | xr::sys::Result::ERROR_INSTANCE_LOST => {
            CompositorError::SessionLost(err.to_string())
        }
        _ => CompositorError::Runtime(err.to_string()),
    }
}

/// Pose actions for both controllers.
pub(crate) struct HandTracking {
    pub left_space: xr::Space,
    pub right_space: xr::Space,
    pub left_action: xr::Action<xr::Posef>,
    pub right_action: xr::Action<xr::Posef>,
    pub action_set: xr::ActionSet,
}

/// A swapchain image wrapped for wgpu, with one view per eye layer.
pub(crate) struct SwapchainImage {
    pub layers: [wgpu::TextureView; 2],
    pub texture: wgpu::Texture,
}

impl SwapchainImage {
    pub fn new(texture: wgpu::Texture) -> Self {
        let layer = |index: u32| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some("Headset Swapchain Layer"),
                dimension: Some(wgpu::TextureViewDimension::D2),
                base_array_layer: index,
                array_layer_count: Some(1),
                ..Default::default()
            })
        };
        Self {
            layers: [layer(0), layer(1)],
            texture,
        }
    }
}

/// Attach or detach event for a hand whose tracking changed.
fn hand_transition(device: DeviceIndex, was_tracked: bool, now_tracked: bool) -> Option<VrEvent> {
    match (was_tracked, now_tracked) {
        (false, true) => Some(VrEvent::DeviceAttached(device)),
        (true, false) => Some(VrEvent::DeviceDetached(device)),
        _ => None,
    }
}

/// Latest pose per device, indexed by [`DeviceIndex`]; `None` when untracked.
#[derive(Debug, Default)]
struct PoseTable {
    poses: [Option<Mat4>; 3],
}

impl PoseTable {
    fn set_hmd(&mut self, pose: Option<Mat4>) {
        self.poses[DeviceIndex::HMD.0 as usize] = pose;
    }

    fn set_hand(&mut self, device: DeviceIndex, pose: Option<Mat4>) -> Option<VrEvent> {
        let slot = &mut self.poses[device.0 as usize];
        let event = hand_transition(device, slot.is_some(), pose.is_some());
        *slot = pose;
        event
    }

    /// Forgets every pose. Hands that were tracked report a detach.
    fn invalidate(&mut self) -> Vec<VrEvent> {
        self.set_hmd(None);
        [LEFT_HAND, RIGHT_HAND]
            .into_iter()
            .filter_map(|hand| self.set_hand(hand, None))
            .collect()
    }

    fn is_valid(&self, device: DeviceIndex) -> bool {
        self.poses
            .get(device.0 as usize)
            .is_some_and(|pose| pose.is_some())
    }

    fn pose(&self, device: DeviceIndex) -> Mat4 {
        self.poses
            .get(device.0 as usize)
            .copied()
            .flatten()
            .unwrap_or(Mat4::IDENTITY)
    }

    fn tracked_hands(&self) -> Vec<TrackedDevice> {
        [LEFT_HAND, RIGHT_HAND]
            .into_iter()
            .filter_map(|index| {
                self.poses[index.0 as usize].map(|device_to_world| TrackedDevice {
                    index,
                    device_to_world,
                })
            })
            .collect()
    }
}

/// A frame between `xrBeginFrame` and `xrEndFrame`.
struct FrameInFlight {
    state: xr::FrameState,
    views: Option<[EyeView; 2]>,
    image: Option<u32>,
    submitted: [bool; 2],
}

impl FrameInFlight {
    fn new(state: xr::FrameState) -> Self {
        Self {
            state,
            views: None,
            image: None,
            submitted: [false, false],
        }
    }

    fn set_views(&mut self, views: &[xr::View]) {
        self.views = match views {
            [left, right, ..] => Some([left, right].map(|view| EyeView {
                fov: view.fov,
                pose: view.pose,
            })),
            _ => None,
        };
    }

    /// Marks `eye` as handed over; true once both eyes are in.
    fn accept(&mut self, eye: Eye) -> bool {
        self.submitted[eye.index()] = true;
        self.submitted == [true, true]
    }

    /// Views for the projection layer, or `None` when the frame has to be
    /// ended without layers.
    fn projection_views(&self) -> Option<&[EyeView; 2]> {
        if self.image.is_some() && self.submitted == [true, true] {
            self.views.as_ref()
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubmitStep {
    /// No frame is open.
    Skip,
    /// The runtime does not want pixels this frame; only track the eye.
    Record,
    /// Copy the eye into the swapchain.
    Draw,
}

fn submit_step(frame: Option<&FrameInFlight>) -> SubmitStep {
    match frame {
        None => SubmitStep::Skip,
        Some(frame) if frame.state.should_render => SubmitStep::Draw,
        Some(_) => SubmitStep::Record,
    }
}

/// [`Compositor`] over an OpenXR session.
///
/// `wait_get_poses` opens a frame, each `submit` fills one eye layer of the
/// swapchain, and the frame is ended once both eyes are in.
pub struct OpenXrCompositor {
    frame: Option<FrameInFlight>,
    images: Vec<SwapchainImage>,
    swapchain: xr::Swapchain<xr::Vulkan>,
    frame_stream: xr::FrameStream<xr::Vulkan>,
    frame_waiter: xr::FrameWaiter,
    hands: HandTracking,
    view_space: xr::Space,
    stage: xr::Space,
    shared: SharedSession,
    blit: SwapchainBlit,
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    resolution: (u32, u32),
    poses: PoseTable,
}

impl OpenXrCompositor {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        shared: SharedSession,
        frame_waiter: xr::FrameWaiter,
        frame_stream: xr::FrameStream<xr::Vulkan>,
        swapchain: xr::Swapchain<xr::Vulkan>,
        images: Vec<SwapchainImage>,
        stage: xr::Space,
        view_space: xr::Space,
        hands: HandTracking,
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        format: wgpu::TextureFormat,
        resolution: (u32, u32),
    ) -> Self {
        let blit = SwapchainBlit::new(&device, format);
        Self {
            frame: None,
            images,
            swapchain,
            frame_stream,
            frame_waiter,
            hands,
            view_space,
            stage,
            shared,
            blit,
            device,
            queue,
            resolution,
            poses: PoseTable::default(),
        }
    }

    fn locate(&self, space: &xr::Space, time: xr::Time) -> Result<Option<Mat4>, CompositorError> {
        let location = space.locate(&self.stage, time).map_err(runtime_error)?;
        Ok(is_location_valid(location.location_flags).then(|| pose_to_matrix(&location.pose)))
    }

    fn queue_events(&self, events: impl IntoIterator<Item = VrEvent>) {
        self.shared.borrow_mut().pending_events.extend(events);
    }

    /// Blits `texture` into this frame's swapchain image, acquiring the
    /// image on the first eye.
    fn draw_eye(&mut self, eye: Eye, texture: &wgpu::Texture) -> Result<(), CompositorError> {
        let image_index = match self.frame.as_ref().and_then(|frame| frame.image) {
            Some(index) => index,
            None => {
                let index = self.swapchain.acquire_image().map_err(runtime_error)?;
                if let Some(frame) = self.frame.as_mut() {
                    frame.image = Some(index);
                }
                self.swapchain
                    .wait_image(xr::Duration::INFINITE)
                    .map_err(runtime_error)?;
                index
            }
        };

        let destination = &self.images[image_index as usize].layers[eye.index()];
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Headset Submit Encoder"),
        });
        self.blit.copy(&self.device, &mut encoder, texture, destination);
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    /// Releases the swapchain image and ends the open frame, with the
    /// projection layer when both eyes made it into the image.
    fn end_frame(&mut self) -> Result<(), CompositorError> {
        let Some(frame) = self.frame.take() else {
            return Ok(());
        };

        if frame.image.is_some() {
            self.swapchain.release_image().map_err(runtime_error)?;
        }

        let time = frame.state.predicted_display_time;
        let Some(views) = frame.projection_views() else {
            self.frame_stream
                .end(time, xr::EnvironmentBlendMode::OPAQUE, &[])
                .map_err(runtime_error)?;
            return Ok(());
        };

        let rect = xr::Rect2Di {
            offset: xr::Offset2Di { x: 0, y: 0 },
            extent: xr::Extent2Di {
                width: self.resolution.0 as i32,
                height: self.resolution.1 as i32,
            },
        };
        let projection_views = [0usize, 1].map(|index| {
            xr::CompositionLayerProjectionView::new()
                .pose(views[index].pose)
                .fov(views[index].fov)
                .sub_image(
                    xr::SwapchainSubImage::new()
                        .swapchain(&self.swapchain)
                        .image_array_index(index as u32)
                        .image_rect(rect),
                )
        });
        let layer = xr::CompositionLayerProjection::new()
            .space(&self.stage)
            .views(&projection_views);

        self.frame_stream
            .end(time, xr::EnvironmentBlendMode::OPAQUE, &[&layer])
            .map_err(runtime_error)?;
        Ok(())
    }
}

impl Compositor<wgpu::Texture> for OpenXrCompositor {
    fn submit(&mut self, eye: Eye, texture: &wgpu::Texture) -> Result<(), CompositorError> {
        match submit_step(self.frame.as_ref()) {
            SubmitStep::Skip => {
                log::trace!("No frame in flight, skipping {:?} eye", eye);
                return Ok(());
            }
            SubmitStep::Draw => self.draw_eye(eye, texture)?,
            SubmitStep::Record => {}
        }

        let both_in = self.frame.as_mut().is_some_and(|frame| frame.accept(eye));
        if both_in {
            self.end_frame()?;
        }
        Ok(())
    }

    fn wait_get_poses(&mut self) -> Result<(), CompositorError> {
        // A frame the loop never finished still has to be closed.
        self.end_frame()?;

        let (running, lost) = {
            let shared = self.shared.borrow();
            (shared.running, shared.lost)
        };
        if lost {
            return Err(CompositorError::SessionLost(
                "runtime is shutting the session down".to_string(),
            ));
        }
        if !running {
            let detached = self.poses.invalidate();
            self.queue_events(detached);
            std::thread::sleep(Duration::from_secs_f64(1.0 / IDLE_REFRESH_HZ));
            return Ok(());
        }

        let state = self.frame_waiter.wait().map_err(runtime_error)?;
        self.frame_stream.begin().map_err(runtime_error)?;
        self.frame = Some(FrameInFlight::new(state));

        let time = state.predicted_display_time;
        let views = {
            let shared = self.shared.borrow();
            shared
                .session
                .sync_actions(&[(&self.hands.action_set).into()])
                .map_err(runtime_error)?;
            let (_, views) = shared
                .session
                .locate_views(xr::ViewConfigurationType::PRIMARY_STEREO, time, &self.stage)
                .map_err(runtime_error)?;
            views
        };
        if let Some(frame) = self.frame.as_mut() {
            frame.set_views(&views);
        }

        let hmd = self.locate(&self.view_space, time)?;
        let left = self.locate(&self.hands.left_space, time)?;
        let right = self.locate(&self.hands.right_space, time)?;
        self.poses.set_hmd(hmd);
        let changes = [
            self.poses.set_hand(LEFT_HAND, left),
            self.poses.set_hand(RIGHT_HAND, right),
        ];
        self.queue_events(changes.into_iter().flatten());
        Ok(())
    }

    fn is_pose_valid(&self, device: DeviceIndex) -> bool {
        self.poses.is_valid(device)
    }

    fn render_pose(&self, device: DeviceIndex) -> Mat4 {
        self.poses.pose(device)
    }

    fn tracked_devices(&self) -> Vec<TrackedDevice> {
        self.poses.tracked_hands()
    }
}

impl Drop for OpenXrCompositor {
    fn drop(&mut self) {
        if let Err(err) = self.end_frame() {
            log::warn!("Failed to end in-flight frame on shutdown: {}", err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn frame_state(should_render: bool) -> xr::FrameState {
        xr::FrameState {
            predicted_display_time: xr::Time::from_nanos(1_000_000),
            predicted_display_period: xr::Duration::from_nanos(11_111_111),
            should_render,
        }
    }

    fn eye_view(x: f32) -> EyeView {
        EyeView {
            fov: xr::Fovf {
                angle_left: -0.8,
                angle_right: 0.8,
                angle_up: 0.8,
                angle_down: -0.8,
            },
            pose: xr::Posef {
                orientation: xr::Quaternionf::IDENTITY,
                position: xr::Vector3f { x, y: 0.0, z: 0.0 },
            },
        }
    }

    fn located_frame(should_render: bool) -> FrameInFlight {
        let mut frame = FrameInFlight::new(frame_state(should_render));
        frame.views = Some([eye_view(-0.032), eye_view(0.032)]);
        frame
    }

    #[test]
    fn test_hand_transitions() {
        assert_eq!(
            hand_transition(LEFT_HAND, false, true),
            Some(VrEvent::DeviceAttached(LEFT_HAND))
        );
        assert_eq!(
            hand_transition(RIGHT_HAND, true, false),
            Some(VrEvent::DeviceDetached(RIGHT_HAND))
        );
        assert_eq!(hand_transition(LEFT_HAND, true, true), None);
        assert_eq!(hand_transition(LEFT_HAND, false, false), None);
    }

    #[test]
    fn test_hand_tracking_appearing_and_disappearing() {
        let mut poses = PoseTable::default();
        let grip = Mat4::from_translation(Vec3::new(0.2, 1.0, -0.3));

        assert_eq!(poses.set_hand(LEFT_HAND, Some(grip)), Some(VrEvent::DeviceAttached(LEFT_HAND)));
        assert_eq!(poses.set_hand(LEFT_HAND, Some(grip)), None);
        assert_eq!(
            poses.tracked_hands(),
            vec![TrackedDevice {
                index: LEFT_HAND,
                device_to_world: grip,
            }]
        );

        assert_eq!(poses.set_hand(LEFT_HAND, None), Some(VrEvent::DeviceDetached(LEFT_HAND)));
        assert!(poses.tracked_hands().is_empty());
    }

    #[test]
    fn test_invalidate_drops_every_pose() {
        let mut poses = PoseTable::default();
        let head = Mat4::from_translation(Vec3::new(0.0, 1.7, 0.0));
        poses.set_hmd(Some(head));
        poses.set_hand(RIGHT_HAND, Some(Mat4::IDENTITY));
        assert!(poses.is_valid(DeviceIndex::HMD));
        assert_eq!(poses.pose(DeviceIndex::HMD), head);

        let events = poses.invalidate();

        assert_eq!(events, vec![VrEvent::DeviceDetached(RIGHT_HAND)]);
        for device in [DeviceIndex::HMD, LEFT_HAND, RIGHT_HAND] {
            assert!(!poses.is_valid(device));
            assert_eq!(poses.pose(device), Mat4::IDENTITY);
        }
        assert!(poses.tracked_hands().is_empty());
        assert!(poses.invalidate().is_empty());
    }

    #[test]
    fn test_unknown_device_has_no_pose() {
        let poses = PoseTable::default();
        assert!(!poses.is_valid(DeviceIndex(7)));
        assert_eq!(poses.pose(DeviceIndex(7)), Mat4::IDENTITY);
    }

    #[test]
    fn test_submissions_without_open_frame_are_skipped() {
        assert_eq!(submit_step(None), SubmitStep::Skip);
        assert_eq!(submit_step(Some(&located_frame(true))), SubmitStep::Draw);
        assert_eq!(submit_step(Some(&located_frame(false))), SubmitStep::Record);
    }

    #[test]
    fn test_frame_ends_after_both_eyes() {
        let mut frame = located_frame(true);
        frame.image = Some(0);

        assert!(!frame.accept(Eye::Left));
        assert!(frame.projection_views().is_none());
        assert!(!frame.accept(Eye::Left));
        assert!(frame.accept(Eye::Right));

        let views = frame.projection_views().expect("complete frame has a layer");
        assert_eq!(views[0].pose.position.x, -0.032);
        assert_eq!(views[1].pose.position.x, 0.032);
    }

    #[test]
    fn test_frame_without_image_ends_empty() {
        let mut frame = located_frame(false);
        frame.accept(Eye::Left);
        frame.accept(Eye::Right);
        assert!(frame.projection_views().is_none());
    }

    #[test]
    fn test_frame_without_views_ends_empty() {
        let mut frame = FrameInFlight::new(frame_state(true));
        frame.set_views(&[]);
        frame.image = Some(1);
        frame.accept(Eye::Left);
        frame.accept(Eye::Right);
        assert!(frame.projection_views().is_none());
    }

    #[test]
    fn test_only_lost_session_results_are_fatal() {
        assert!(matches!(
            runtime_error(xr::sys::Result::ERROR_SESSION_LOST),
            CompositorError::SessionLost(_)
        ));
        assert!(matches!(
            runtime_error(xr::sys::Result::ERROR_INSTANCE_LOST),
            CompositorError::SessionLost(_)
        ));
        assert!(matches!(
            runtime_error(xr::sys::Result::ERROR_SESSION_NOT_RUNNING),
            CompositorError::Runtime(_)
        ));
    }
}
