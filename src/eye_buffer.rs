//! Per-eye render targets.
//!
//! Each eye renders into a short ring of swap textures owned by the runtime, so
//! the compositor can read one slot while the next frame is drawn into another.
//! The depth buffer is never read back by the compositor and is not ring-buffered.

use log::{debug, info};

use crate::error::{Error, Result};
use crate::gfx::{Extent, Graphics, Viewport};
use crate::runtime::{Eye, HeadsetRuntime};

/// A fixed-length rotation of render targets.
///
/// [`advance_to_next_texture`](Self::advance_to_next_texture) must be called
/// exactly once per frame, before the eye is drawn: skipping it redraws the slot
/// the compositor may still be reading, calling it twice skips a slot.
#[derive(Debug)]
pub struct EyeTextureRing<T> {
    textures: Vec<T>,
    current: usize,
}

impl<T> EyeTextureRing<T> {
    /// Wrap the runtime's textures, refusing any count other than `expected`.
    pub fn new(eye: Eye, textures: Vec<T>, expected: usize) -> Result<Self> {
        if textures.len() != expected || expected == 0 {
            return Err(Error::RingLengthMismatch {
                eye,
                expected,
                actual: textures.len(),
            });
        }
        Ok(Self {
            textures,
            current: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.textures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.textures.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> &T {
        &self.textures[self.current]
    }

    pub fn advance_to_next_texture(&mut self) -> usize {
        self.current = (self.current + 1) % self.textures.len();
        self.current
    }

    /// Follow the runtime when it hands out a different slot than predicted.
    pub fn adopt(&mut self, index: usize) {
        debug_assert!(index < self.textures.len());
        self.current = index % self.textures.len();
    }
}

/// Everything one eye draws into.
pub struct EyeBuffer<G: Graphics> {
    pub eye: Eye,
    pub ring: EyeTextureRing<G::RenderTarget>,
    pub depth: G::DepthBuffer,
    pub viewport: Viewport,
}

impl<G: Graphics> EyeBuffer<G> {
    /// Create `eye`'s ring at the runtime's recommended size, plus a matching depth buffer.
    ///
    /// The viewport covers the texture the runtime actually recommended, which may
    /// differ between eyes.
    pub fn create<R: HeadsetRuntime<G>>(
        gfx: &mut G,
        runtime: &mut R,
        eye: Eye,
        ring_length: usize,
    ) -> Result<Self> {
        let size = runtime.eye_texture_size(eye);
        let textures = runtime.create_eye_textures(gfx, eye, size)?;
        let ring = EyeTextureRing::new(eye, textures, ring_length)?;
        let depth = gfx.create_depth_buffer(size)?;
        info!(
            "{eye:?} eye: {}x{} render target, {} ring slots",
            size.width,
            size.height,
            ring.len()
        );
        Ok(Self {
            eye,
            ring,
            depth,
            viewport: Viewport::covering(size),
        })
    }

    pub fn size(&self) -> Extent {
        Extent::new(self.viewport.width, self.viewport.height)
    }

    /// Advance the ring and reconcile with the slot the runtime hands out.
    pub fn acquire<R: HeadsetRuntime<G>>(&mut self, runtime: &mut R) -> Result<usize> {
        let expected = self.ring.advance_to_next_texture();
        let acquired = runtime.acquire_eye_texture(self.eye, expected)?;
        if acquired != expected {
            debug!(
                "{:?} eye: runtime handed out slot {acquired}, ring predicted {expected}",
                self.eye
            );
            self.ring.adopt(acquired);
        }
        Ok(self.ring.current_index())
    }
}
