//! Walk around a small textured room in a head-mounted display.
//!
//! Renders the room once per eye with Direct3D 11, submits both eyes through
//! OpenXR and mirrors them to a desktop window. Windows only.
//!
//! Controls: W/S or Up/Down to walk, A/D to strafe, Left/Right to turn,
//! Escape or Ctrl+Q to quit.

use anyhow::Result;
use clap::Parser;
use room_tiny::config::Config;

#[cfg(all(windows, feature = "static"))]
#[link(name = "advapi32")]
unsafe extern "C" {}

fn main() -> Result<()> {
    // Initialize logging; default to "info" if RUST_LOG is unset.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    log::debug!("{config:?}");

    run(&config)
}

#[cfg(windows)]
fn run(config: &Config) -> Result<()> {
    use anyhow::Context;
    use room_tiny::frame::supervise;
    use room_tiny::platform::DesktopPlatform;

    let mut platform = DesktopPlatform::new(config).context("opening the mirror window")?;
    supervise(&mut platform, config).context("running the headset session")?;
    log::info!("exiting cleanly");
    Ok(())
}

#[cfg(not(windows))]
fn run(_config: &Config) -> Result<()> {
    anyhow::bail!("room-tiny needs Windows with a Direct3D 11 GPU and an OpenXR runtime")
}
