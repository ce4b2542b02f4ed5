//! A small textured room rendered once per eye for a head-mounted display.
//!
//! The portable core (geometry, textures, camera maths, the eye-buffer ring and
//! the frame loop) talks to the GPU and the VR runtime only through the
//! [`gfx::Graphics`] and [`runtime::HeadsetRuntime`] traits. The Direct3D 11 and
//! OpenXR implementations live in [`platform`] and only build on Windows.

pub mod camera;
pub mod config;
pub mod error;
pub mod eye_buffer;
pub mod frame;
pub mod gfx;
pub mod input;
pub mod mesh;
pub mod runtime;
pub mod scene;
pub mod texture;

#[cfg(windows)]
pub mod platform;

pub use error::{Error, Result};
