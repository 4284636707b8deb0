use glam::{Mat4, Quat, Vec3};
use openxr as xr;

/// Right-handed projection from per-edge FoV angles with a finite far plane
/// and 0..1 depth.
pub fn projection_from_fov(fov: &xr::Fovf, near: f32, far: f32) -> Mat4 {
    let left = f32::tan(fov.angle_left);
    let right = f32::tan(fov.angle_right);
    let up = f32::tan(fov.angle_up);
    let down = f32::tan(fov.angle_down);

    let width = right - left;
    let height = up - down;

    let x = 2.0 / width;
    let y = 2.0 / height;

    let a = (right + left) / width;
    let b = (up + down) / height;
    let c = far / (near - far);
    let d = near * far / (near - far);

    Mat4::from_cols_array(&[
        x,   0.0, 0.0, 0.0,
        0.0, y,   0.0, 0.0,
        a,   b,   c,   -1.0,
        0.0, 0.0, d,   0.0,
    ])
}

/// Pose in its parent space as a local-to-parent transform.
pub fn pose_to_matrix(pose: &xr::Posef) -> Mat4 {
    let position = Vec3::new(pose.position.x, pose.position.y, pose.position.z);
    let orientation = Quat::from_xyzw(
        pose.orientation.x,
        pose.orientation.y,
        pose.orientation.z,
        pose.orientation.w,
    );

    Mat4::from_rotation_translation(orientation, position)
}

/// Whether a located space has both a usable orientation and position.
pub fn is_location_valid(flags: xr::SpaceLocationFlags) -> bool {
    flags.contains(
        xr::SpaceLocationFlags::ORIENTATION_VALID | xr::SpaceLocationFlags::POSITION_VALID,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use glam::Vec4;

    fn symmetric_fov(angle: f32) -> xr::Fovf {
        xr::Fovf {
            angle_left: -angle,
            angle_right: angle,
            angle_up: angle,
            angle_down: -angle,
        }
    }

    #[test]
    fn test_symmetric_projection() {
        let fov = std::f32::consts::FRAC_PI_4;
        let mat = projection_from_fov(&symmetric_fov(fov), 0.1, 30.0);

        // Symmetric FoV gives equal scales and no skew
        assert_relative_eq!(mat.col(0)[0], mat.col(1)[1], epsilon = 1e-6);
        assert_relative_eq!(mat.col(2)[0], 0.0, epsilon = 1e-6);
        assert_relative_eq!(mat.col(2)[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(mat.col(2)[3], -1.0);
    }

    #[test]
    fn test_depth_maps_near_to_zero_and_far_to_one() {
        let mat = projection_from_fov(&symmetric_fov(0.8), 0.1, 30.0);

        let near = mat * Vec4::new(0.0, 0.0, -0.1, 1.0);
        let far = mat * Vec4::new(0.0, 0.0, -30.0, 1.0);
        assert_relative_eq!(near.z / near.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(far.z / far.w, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn test_asymmetric_fov_skews_centre() {
        let fov = xr::Fovf {
            angle_left: -0.9,
            angle_right: 0.7,
            angle_up: 0.8,
            angle_down: -0.8,
        };
        let mat = projection_from_fov(&fov, 0.1, 30.0);
        assert!(mat.col(2)[0] < 0.0, "left-heavy FoV should shift the centre left");
    }

    #[test]
    fn test_pose_to_matrix() {
        let pose = xr::Posef {
            orientation: xr::Quaternionf {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                w: 1.0,
            },
            position: xr::Vector3f {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            },
        };

        let mat = pose_to_matrix(&pose);

        // Translation lands in the fourth column
        assert_relative_eq!(mat.col(3)[0], 1.0);
        assert_relative_eq!(mat.col(3)[1], 2.0);
        assert_relative_eq!(mat.col(3)[2], 3.0);
        assert_relative_eq!(mat.col(3)[3], 1.0);
    }

    #[test]
    fn test_location_needs_both_flags() {
        assert!(is_location_valid(
            xr::SpaceLocationFlags::ORIENTATION_VALID | xr::SpaceLocationFlags::POSITION_VALID
        ));
        assert!(!is_location_valid(xr::SpaceLocationFlags::ORIENTATION_VALID));
        assert!(!is_location_valid(xr::SpaceLocationFlags::EMPTY));
    }
}
