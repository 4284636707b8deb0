use glam::{Mat4, Vec3};

/// What the renderer needs to know about the viewer: where it looks from.
pub trait CameraView {
    fn view_matrix(&self) -> Mat4;
    fn position(&self) -> Vec3;
}

/// A camera pinned to a precomputed view, rebuilt for each eye every frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCamera {
    pub view: Mat4,
    pub position: Vec3,
}

impl FixedCamera {
    pub fn new(view: Mat4, position: Vec3) -> Self {
        Self { view, position }
    }
}

impl CameraView for FixedCamera {
    fn view_matrix(&self) -> Mat4 {
        self.view
    }

    fn position(&self) -> Vec3 {
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_camera_returns_what_it_was_given() {
        let view = Mat4::from_translation(Vec3::new(0.0, -1.6, 0.0));
        let camera = FixedCamera::new(view, Vec3::new(0.0, 1.6, 0.0));
        assert_eq!(camera.view_matrix(), view);
        assert_eq!(camera.position(), Vec3::new(0.0, 1.6, 0.0));
    }

    #[test]
    fn test_usable_as_trait_object() {
        let camera = FixedCamera::new(Mat4::IDENTITY, Vec3::X);
        let dyn_camera: &dyn CameraView = &camera;
        assert_eq!(dyn_camera.position(), Vec3::X);
        assert_eq!(dyn_camera.view_matrix(), Mat4::IDENTITY);
    }
}
