//! Windows implementations of the three collaborators: a Direct3D 11 device,
//! an OpenXR runtime and a winit desktop window.
//!
//! Look for "INTERFACE POINT" comments to see where OpenXR and Direct3D hand
//! resources to each other.

pub mod d3d11;
pub mod openxr;
pub mod window;

pub use self::d3d11::D3D11Graphics;
pub use self::openxr::OpenXrRuntime;
pub use self::window::DesktopPlatform;
