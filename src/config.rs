use glam::Vec4;

pub const NEAR_CLIP: f32 = 0.1;
pub const FAR_CLIP: f32 = 30.0;

pub const STAR_COUNT: usize = 1000;
/// Edge length of the cube stars are scattered in, centred on the origin.
pub const STAR_EXTENT: f32 = 10.0;
pub const STAR_RADIUS: f32 = 0.1;
pub const STAR_SEGMENTS: u32 = 5;
pub const STAR_RINGS: u32 = 5;

pub const MSAA_SAMPLES: u32 = 4;

/// Settings for the desktop mirror window.
#[derive(Debug, Clone)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            title: "starfield".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipPlanes {
    pub near: f32,
    pub far: f32,
}

#[derive(Debug, Clone)]
pub struct StarfieldConfig {
    pub window: WindowConfig,
    pub clip: ClipPlanes,
    pub star_count: usize,
    pub star_extent: f32,
    pub star_color: Vec4,
    pub star_shininess: f32,
    /// Fixed seed for the star field; `None` draws from OS entropy.
    pub seed: Option<u64>,
}

impl Default for StarfieldConfig {
    fn default() -> Self {
        Self {
            window: WindowConfig::default(),
            clip: ClipPlanes {
                near: NEAR_CLIP,
                far: FAR_CLIP,
            },
            star_count: STAR_COUNT,
            star_extent: STAR_EXTENT,
            star_color: Vec4::ONE,
            star_shininess: 10.0,
            seed: None,
        }
    }
}
