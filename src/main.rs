use clap::Parser;
use starfield_vr::config::{StarfieldConfig, WindowConfig, STAR_COUNT};

#[derive(Parser)]
#[command(author, version, about = "Stereo starfield for OpenXR headsets", long_about = None)]
struct Args {
    /// Number of stars to scatter around the viewer
    #[arg(long, default_value_t = STAR_COUNT)]
    stars: usize,

    /// Seed for a reproducible star field
    #[arg(long)]
    seed: Option<u64>,

    /// Mirror window width
    #[arg(long, default_value_t = 1280)]
    width: u32,

    /// Mirror window height
    #[arg(long, default_value_t = 720)]
    height: u32,
}

impl Args {
    fn into_config(self) -> StarfieldConfig {
        StarfieldConfig {
            window: WindowConfig {
                width: self.width,
                height: self.height,
                ..WindowConfig::default()
            },
            star_count: self.stars,
            seed: self.seed,
            ..StarfieldConfig::default()
        }
    }
}

fn main() {
    env_logger::init();
    let config = Args::parse().into_config();

    if let Err(err) = starfield_vr::run(config) {
        log::error!("{:#}", err);
        std::process::exit(1);
    }
}
