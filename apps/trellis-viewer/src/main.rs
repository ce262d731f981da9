//! Trellis Engine Demo Viewer
//!
//! Builds a small scene of textured models and point lights, uploads its textures
//! into the bindless global set and drives the frame loop.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p trellis-viewer -- [OPTIONS]
//! ```
//!
//! ## Controls
//!
//! - `F3`: cycle debug visualization mode
//! - `F2`: toggle wireframe flag
//! - `Space`: pause or resume the camera orbit
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)
//! - `TRELLIS_ASSETS`: Directory texture paths are resolved against (default: `assets`)

mod app;
mod loader;

use trellis_app::{run_app, AppConfig};

use crate::app::Viewer;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

/// Command line options.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Options {
    vsync: bool,
    target_fps: Option<u32>,
    validation: Option<bool>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            vsync: true,
            target_fps: None,
            validation: None,
        }
    }
}

impl Options {
    fn parse(args: &[String]) -> Self {
        let mut options = Self::default();
        let mut i = 0;
        while i < args.len() {
            match args[i].as_str() {
                "--no-vsync" => options.vsync = false,
                "--validation" => options.validation = Some(true),
                "--no-validation" => options.validation = Some(false),
                "--fps" => {
                    if let Some(fps) = args.get(i + 1).and_then(|v| v.parse().ok()) {
                        options.target_fps = Some(fps);
                        i += 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
        options
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }
    let options = Options::parse(&args);

    let mut config = AppConfig::new("Trellis Engine - Viewer")
        .with_size(WIDTH, HEIGHT)
        .with_vsync(options.vsync);
    if let Some(fps) = options.target_fps {
        config = config.with_target_fps(fps);
    }
    if let Some(validation) = options.validation {
        config = config.with_validation(validation);
    }

    run_app::<Viewer>(config)
}

fn print_help() {
    eprintln!(
        "Trellis Engine Demo Viewer

USAGE:
    cargo run -p trellis-viewer -- [OPTIONS]

OPTIONS:
    --no-vsync          Present without waiting for vertical blank
    --fps <N>           Limit the frame rate
    --validation        Force Vulkan validation layers on
    --no-validation     Force Vulkan validation layers off
    -h, --help          Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG            Set log level (e.g., info, debug, trace)
    TRELLIS_ASSETS      Texture directory (default: assets)"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_flags() {
        let options = Options::parse(&args(&["--no-vsync", "--fps", "90", "--no-validation"]));
        assert!(!options.vsync);
        assert_eq!(options.target_fps, Some(90));
        assert_eq!(options.validation, Some(false));
    }

    #[test]
    fn ignores_malformed_fps() {
        let options = Options::parse(&args(&["--fps", "fast"]));
        assert_eq!(options, Options::default());
    }
}
