pub mod config;
pub mod driver;
pub mod input;
pub mod render;
pub mod scene;
pub mod timing;
pub mod vr;
pub mod window;
pub mod xr;

use anyhow::{Context, Result};
use rand::{rngs::StdRng, SeedableRng};

pub use config::StarfieldConfig;
pub use driver::{FrameDriver, LoopState};

use render::WgpuStereoRenderer;
use vr::VrSession;
use window::DesktopWindow;

/// Opens the mirror window, connects to the headset and runs the starfield
/// until the window is closed. Must be called on the main thread.
pub fn run(config: StarfieldConfig) -> Result<()> {
    let mut window = DesktopWindow::new(&config.window)?;

    let xr::XrBackend {
        gpu,
        runtime,
        compositor,
    } = xr::bootstrap().context("Failed to start the VR runtime")?;

    window.attach_surface(&gpu)?;
    let mirror_format = window
        .surface_format()
        .context("Mirror window has no surface")?;

    let session = VrSession::connect(runtime)?;

    let mut rng = match config.seed {
        Some(seed) => {
            log::info!("Using star field seed {}", seed);
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let star_count = config.star_count;
    let mut driver = FrameDriver::new(
        window,
        session,
        compositor,
        |target_size| Ok(WgpuStereoRenderer::new(&gpu, target_size, mirror_format, star_count)),
        &config,
        &mut rng,
    )?;

    driver.run()
}
