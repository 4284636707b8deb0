pub mod camera;
#[cfg(test)]
mod tests;

pub use camera::{CameraView, FixedCamera};

use glam::{Vec3, Vec4};
use rand::Rng;

/// Surface parameters shared by everything drawn with the basic shader.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    pub diffuse_color: Vec4,
    pub shininess: f32,
}

impl Material {
    pub fn new(diffuse_color: Vec4, shininess: f32) -> Self {
        Self {
            diffuse_color,
            shininess,
        }
    }
}

/// One sphere instance at a fixed world position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Star {
    pub position: Vec3,
}

pub struct Starfield {
    pub stars: Vec<Star>,
    pub material: Material,
}

impl Starfield {
    /// Scatters `count` stars uniformly in a cube of edge `extent` centred on
    /// the origin. Positions are taken as sampled, overlaps included.
    pub fn generate<R: Rng>(rng: &mut R, count: usize, extent: f32, material: Material) -> Self {
        let extent = extent as f64;
        let mut sample = || ((rng.gen::<f64>() * extent) - extent / 2.0) as f32;

        let stars = (0..count)
            .map(|_| {
                let x = sample();
                let y = sample();
                let z = sample();
                Star {
                    position: Vec3::new(x, y, z),
                }
            })
            .collect::<Vec<_>>();

        log::info!("Generated {} stars within ±{} units", stars.len(), extent / 2.0);

        Self { stars, material }
    }

    pub fn len(&self) -> usize {
        self.stars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stars.is_empty()
    }
}
