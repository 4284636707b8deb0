use glam::{Mat4, Vec3};

/// The viewer's head as the renderer sees it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeadPose {
    /// World-to-device transform, i.e. the head's view matrix.
    pub view: Mat4,
    /// Head position in world space.
    pub position: Vec3,
}

impl Default for HeadPose {
    fn default() -> Self {
        Self {
            view: Mat4::IDENTITY,
            position: Vec3::ZERO,
        }
    }
}

impl HeadPose {
    pub fn from_device_to_world(device_to_world: Mat4) -> Self {
        Self {
            view: device_to_world.inverse(),
            position: device_to_world.w_axis.truncate(),
        }
    }

    /// The pose to render the next frame with: a fresh one when the runtime
    /// vouches for it, otherwise the current one unchanged.
    pub fn advance(self, valid: bool, device_to_world: impl FnOnce() -> Mat4) -> Self {
        if valid {
            Self::from_device_to_world(device_to_world())
        } else {
            self
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Quat;

    #[test]
    fn test_default_is_origin() {
        let pose = HeadPose::default();
        assert_eq!(pose.view, Mat4::IDENTITY);
        assert_eq!(pose.position, Vec3::ZERO);
    }

    #[test]
    fn test_view_inverts_device_to_world() {
        let device_to_world = Mat4::from_rotation_translation(
            Quat::from_rotation_y(0.5),
            Vec3::new(1.0, 1.7, -2.0),
        );
        let pose = HeadPose::from_device_to_world(device_to_world);

        let round_trip = pose.view * device_to_world;
        for (a, b) in round_trip.to_cols_array().iter().zip(Mat4::IDENTITY.to_cols_array().iter()) {
            assert_relative_eq!(*a, *b, epsilon = 1e-5);
        }
        assert_eq!(pose.position, Vec3::new(1.0, 1.7, -2.0));
    }

    #[test]
    fn test_invalid_pose_keeps_previous_bits() {
        let previous =
            HeadPose::from_device_to_world(Mat4::from_translation(Vec3::new(0.3, 1.5, 0.1)));
        let next = previous.advance(false, || panic!("pose must not be read when invalid"));
        assert_eq!(
            next.view.to_cols_array().map(f32::to_bits),
            previous.view.to_cols_array().map(f32::to_bits)
        );
        assert_eq!(
            next.position.to_array().map(f32::to_bits),
            previous.position.to_array().map(f32::to_bits)
        );
    }

    #[test]
    fn test_valid_pose_replaces() {
        let previous = HeadPose::default();
        let next = previous.advance(true, || Mat4::from_translation(Vec3::new(0.0, 1.8, 0.0)));
        assert_eq!(next.position, Vec3::new(0.0, 1.8, 0.0));
        assert_ne!(next, previous);
    }
}
