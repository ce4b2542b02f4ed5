//! The seam between the portable core and the graphics device.
//!
//! Only the handful of operations the room needs are exposed: buffer and texture
//! creation, binding a render target, setting the viewport, and one indexed draw
//! with a freshly uploaded uniform block. Pipeline state (shaders, sampler, blend
//! and depth state) is fixed and owned by the implementation.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec4};

use crate::error::Result;
use crate::mesh::TriangleSet;
use crate::texture::TextureImage;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Extent {
    pub width: u32,
    pub height: u32,
}

impl Extent {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// A pixel rectangle within a render target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// The whole of a target of the given size.
    pub fn covering(size: Extent) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size.width,
            height: size.height,
        }
    }
}

/// Per-draw constants, rewritten before every draw call.
///
/// Matrices are column-major, matching HLSL's default packing, so the shader
/// multiplies `mul(world_view_proj, position)` without any transpose.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct DrawUniforms {
    pub world_view_proj: [f32; 16],
    pub tint: [f32; 4],
}

impl DrawUniforms {
    pub fn new(world: Mat4, view_proj: Mat4, tint: Vec4) -> Self {
        Self {
            world_view_proj: (view_proj * world).to_cols_array(),
            tint: tint.to_array(),
        }
    }
}

pub trait Graphics {
    /// GPU-resident vertex and index buffers of one triangle set.
    type Mesh;
    /// A sampled, mip-mapped texture.
    type Texture;
    /// One slot of an eye's swap texture ring, bindable as a colour target.
    type RenderTarget;
    type DepthBuffer;

    fn create_mesh(&mut self, triangles: &TriangleSet) -> Result<Self::Mesh>;

    fn create_texture(&mut self, image: &TextureImage) -> Result<Self::Texture>;

    fn create_depth_buffer(&mut self, size: Extent) -> Result<Self::DepthBuffer>;

    /// Bind `target` and `depth` for drawing and clear both.
    fn set_and_clear_render_target(&mut self, target: &Self::RenderTarget, depth: &Self::DepthBuffer);

    fn set_viewport(&mut self, viewport: Viewport);

    /// Upload `uniforms` and draw all of `mesh`'s indices sampling `texture`.
    fn draw(
        &mut self,
        mesh: &Self::Mesh,
        texture: &Self::Texture,
        uniforms: &DrawUniforms,
    ) -> Result<()>;

    /// Copy both eyes' images into the mirror image. Only valid while the
    /// runtime still has them acquired, i.e. before the frame is submitted.
    fn copy_mirror(&mut self, eyes: [&Self::RenderTarget; 2]);

    /// Show the mirror image on the desktop window without waiting for vsync.
    fn present_mirror(&mut self) -> Result<()>;
}
