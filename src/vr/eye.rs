use glam::Mat4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Eye {
    Left,
    Right,
}

impl Eye {
    /// Render order within a frame.
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        match self {
            Eye::Left => 0,
            Eye::Right => 1,
        }
    }
}

/// Per-eye projection and head-to-eye view offset, fixed for the session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeTransforms {
    pub projection_left: Mat4,
    pub projection_right: Mat4,
    pub view_offset_left: Mat4,
    pub view_offset_right: Mat4,
}

impl EyeTransforms {
    pub fn projection(&self, eye: Eye) -> Mat4 {
        match eye {
            Eye::Left => self.projection_left,
            Eye::Right => self.projection_right,
        }
    }

    pub fn view_offset(&self, eye: Eye) -> Mat4 {
        match eye {
            Eye::Left => self.view_offset_left,
            Eye::Right => self.view_offset_right,
        }
    }
}
