//! The seam between the frame driver and the VR runtime.
//!
//! The runtime owns head tracking, the per-eye swap textures and compositing.
//! The driver only relies on the calling contract below; see
//! [`crate::frame::FrameDriver::run_frame`] for the order in which the methods are
//! called each frame.

use glam::{Quat, Vec3};

use crate::error::Result;
use crate::gfx::{Extent, Graphics, Viewport};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Eye {
    Left = 0,
    Right = 1,
}

impl Eye {
    /// Render order within a frame.
    pub const BOTH: [Eye; 2] = [Eye::Left, Eye::Right];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Asymmetric field of view as four angles in radians; left and down are negative.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Fov {
    pub angle_left: f32,
    pub angle_right: f32,
    pub angle_up: f32,
    pub angle_down: f32,
}

impl Fov {
    /// A symmetric frustum with the given horizontal and vertical half-angles.
    pub fn symmetric(half_horizontal: f32, half_vertical: f32) -> Self {
        Self {
            angle_left: -half_horizontal,
            angle_right: half_horizontal,
            angle_up: half_vertical,
            angle_down: -half_vertical,
        }
    }
}

/// Where one eye is, relative to the tracking origin, at the predicted display time.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EyePose {
    pub position: Vec3,
    pub orientation: Quat,
}

impl EyePose {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        orientation: Quat::IDENTITY,
    };
}

/// One tracking sample, shared by both eyes of a frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrackingState {
    /// Runtime-defined timestamp the poses were predicted for.
    pub display_time: i64,
    pub poses: [EyePose; 2],
    pub fovs: [Fov; 2],
}

/// Everything the compositor needs to display one frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct EyeFovLayer {
    pub display_time: i64,
    /// Ring slot each eye rendered into (or last rendered into, when skipped).
    pub texture_index: [usize; 2],
    pub viewport: [Viewport; 2],
    pub fov: [Fov; 2],
    pub pose: [EyePose; 2],
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SubmitStatus {
    /// Displayed; keep rendering.
    Visible,
    /// Accepted but the headset is not showing the app (system menu, removed).
    /// Keep tracking and submitting, skip drawing.
    NotVisible,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// Frames should be produced.
    Running,
    /// The runtime is not ready for frames yet; poll again later.
    Idle,
    /// The runtime asked the application to quit.
    Exiting,
}

pub trait HeadsetRuntime<G: Graphics> {
    /// Drain runtime events and report whether frames should be produced.
    fn poll(&mut self) -> Result<SessionStatus>;

    /// Size the runtime recommends for `eye`'s render target.
    fn eye_texture_size(&self, eye: Eye) -> Extent;

    /// Create `eye`'s swap texture set and wrap each slot as a render target.
    ///
    /// The returned vector's length is the runtime's ring length, which the
    /// caller validates.
    fn create_eye_textures(
        &mut self,
        gfx: &mut G,
        eye: Eye,
        size: Extent,
    ) -> Result<Vec<G::RenderTarget>>;

    /// Wait for the next frame and sample the head pose once for both eyes.
    fn begin_frame(&mut self) -> Result<TrackingState>;

    /// Claim `eye`'s next swap texture and return the slot the runtime handed out.
    /// `expected` is the slot the ring advanced to.
    fn acquire_eye_texture(&mut self, eye: Eye, expected: usize) -> Result<usize>;

    /// Hand the frame to the compositor.
    fn submit_frame(&mut self, layer: &EyeFovLayer) -> Result<SubmitStatus>;
}
