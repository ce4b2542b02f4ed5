//! Box-based triangle sets with a baked pseudo-lighting term.
//!
//! Every piece of room geometry is an axis-aligned box. [`TriangleSet::add_box`]
//! turns the two opposite corners into six independent quads (24 vertices,
//! 36 indices), so no vertex is shared between faces and each face can carry
//! its own texture coordinates.
//!
//! Texture coordinates are the two in-plane world coordinates of the face, not
//! a normalized `[0,1]` range. Combined with a wrapping sampler the room
//! textures tile once per world unit regardless of box size.
//!
//! There is no runtime lighting. Each vertex colour is darkened or brightened
//! once when the box is added, based on its distance to three fixed points and
//! a random jitter that breaks up the flat faces.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{Error, Result};

/// Offsets added to a vertex position before measuring distance; the lights sit
/// at the negated offsets.
const LIGHT_OFFSETS: [Vec3; 3] = [
    Vec3::new(2.0, -4.0, 2.0),
    Vec3::new(-3.0, -4.0, 3.0),
    Vec3::new(4.0, -3.0, -25.0),
];

/// Upper bound (exclusive) of the per-vertex brightness jitter.
const JITTER_RANGE: u32 = 160;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    /// Packed `0xAARRGGBB`, read by the input assembler as B8G8R8A8.
    pub color: u32,
    pub uv: [f32; 2],
}

/// An append-only triangle list with 16-bit indices.
#[derive(Clone, Debug)]
pub struct TriangleSet {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
    rng: StdRng,
}

impl TriangleSet {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// A triangle set whose colour jitter is reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            vertices: Vec::new(),
            indices: Vec::new(),
            rng,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Append the box spanned by corners `(x1, y1, z1)` and `(x2, y2, z2)`.
    ///
    /// The corners need not be ordered; the faces are emitted in the same
    /// winding either way, matching how the room layout was authored.
    #[allow(clippy::too_many_arguments)]
    pub fn add_box(
        &mut self,
        x1: f32,
        y1: f32,
        z1: f32,
        x2: f32,
        y2: f32,
        z2: f32,
        color: u32,
    ) -> Result<()> {
        let vertices = self.vertices.len() + 24;
        if vertices > usize::from(u16::MAX) + 1 {
            return Err(Error::IndexOverflow { vertices });
        }

        // Each corner is (position, uv).
        let faces: [[([f32; 3], [f32; 2]); 4]; 6] = [
            // top (y2)
            [
                ([x1, y2, z1], [z1, x1]),
                ([x2, y2, z1], [z1, x2]),
                ([x1, y2, z2], [z2, x1]),
                ([x2, y2, z2], [z2, x2]),
            ],
            // bottom (y1)
            [
                ([x2, y1, z1], [z1, x2]),
                ([x1, y1, z1], [z1, x1]),
                ([x2, y1, z2], [z2, x2]),
                ([x1, y1, z2], [z2, x1]),
            ],
            // x1 side
            [
                ([x1, y1, z2], [z2, y1]),
                ([x1, y1, z1], [z1, y1]),
                ([x1, y2, z2], [z2, y2]),
                ([x1, y2, z1], [z1, y2]),
            ],
            // x2 side
            [
                ([x2, y1, z1], [z1, y1]),
                ([x2, y1, z2], [z2, y1]),
                ([x2, y2, z1], [z1, y2]),
                ([x2, y2, z2], [z2, y2]),
            ],
            // z1 side
            [
                ([x1, y1, z1], [x1, y1]),
                ([x2, y1, z1], [x2, y1]),
                ([x1, y2, z1], [x1, y2]),
                ([x2, y2, z1], [x2, y2]),
            ],
            // z2 side
            [
                ([x2, y1, z2], [x2, y1]),
                ([x1, y1, z2], [x1, y1]),
                ([x2, y2, z2], [x2, y2]),
                ([x1, y2, z2], [x1, y2]),
            ],
        ];

        for quad in &faces {
            let base = self.vertices.len() as u16;
            for &(position, uv) in quad {
                let jitter = self.rng.gen_range(0..JITTER_RANGE);
                self.vertices.push(Vertex {
                    position,
                    color: bake_color(color, Vec3::from(position), jitter),
                    uv,
                });
            }
            // (v0, v1, v2) and (v3, v2, v1)
            self.indices
                .extend_from_slice(&[base, base + 1, base + 2, base + 3, base + 2, base + 1]);
        }

        Ok(())
    }
}

impl Default for TriangleSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale the RGB channels of `color` by the static lighting term at `position`.
///
/// Alpha passes through untouched and each channel saturates at 255.
pub fn bake_color(color: u32, position: Vec3, jitter: u32) -> u32 {
    let [d1, d2, d3] = LIGHT_OFFSETS.map(|offset| (position + offset).length());
    let light = jitter as f32 + 192.0 * (0.65 + 8.0 / d1 + 1.0 / d2 + 4.0 / d3);

    let scale = |shift: u32| {
        let channel = ((color >> shift) & 0xff) as f32 * light / 255.0;
        (channel.min(255.0) as u32) << shift
    };

    (color & 0xff00_0000) | scale(16) | scale(8) | scale(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> TriangleSet {
        let mut set = TriangleSet::with_seed(7);
        set.add_box(0.5, -0.5, 0.5, -0.5, 0.5, -0.5, 0xff40_4040).unwrap();
        set
    }

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn box_has_24_vertices_and_36_indices() {
        let set = unit_box();
        assert_eq!(set.vertices.len(), 24);
        assert_eq!(set.indices.len(), 36);
    }

    #[test]
    fn counts_scale_with_box_count() {
        let mut set = TriangleSet::with_seed(1);
        for i in 0..5 {
            let f = i as f32;
            set.add_box(f, 0.0, 0.0, f + 0.1, 1.0, 0.1, 0xff50_5050).unwrap();
        }
        assert_eq!(set.vertices.len(), 5 * 24);
        assert_eq!(set.indices.len(), 5 * 36);
        assert_eq!(set.indices.len() % 3, 0);
    }

    #[test]
    fn indices_stay_in_range() {
        let mut set = unit_box();
        set.add_box(1.0, 1.0, 1.0, 2.0, 2.0, 2.0, 0xff80_8080).unwrap();
        for &idx in &set.indices {
            assert!((idx as usize) < set.vertices.len(), "index {idx} out of range");
        }
    }

    #[test]
    fn faces_do_not_share_vertices() {
        let set = unit_box();
        for (face, quad) in set.indices.chunks(6).enumerate() {
            let lo = (face * 4) as u16;
            assert!(quad.iter().all(|&i| (lo..lo + 4).contains(&i)));
        }
    }

    #[test]
    fn uvs_follow_world_coordinates() {
        let mut set = TriangleSet::with_seed(3);
        set.add_box(-10.0, 0.0, 20.0, 10.0, 4.0, -20.0, 0xff80_8080).unwrap();
        // Top face: uv = (z, x)
        assert_eq!(set.vertices[0].position, [-10.0, 4.0, 20.0]);
        assert_eq!(set.vertices[0].uv, [20.0, -10.0]);
        // z1 side: uv = (x, y)
        let v = set.vertices[16];
        assert_eq!(v.uv, [v.position[0], v.position[1]]);
    }

    #[test]
    fn same_seed_gives_same_colors() {
        let a = unit_box();
        let b = unit_box();
        assert_eq!(a.vertices, b.vertices);
    }

    #[test]
    fn bake_keeps_alpha_and_saturates() {
        // Right next to the first light the term explodes.
        let near_light = Vec3::new(-2.0, 4.0, -2.001);
        let c = bake_color(0x80ff_ffff, near_light, 0);
        assert_eq!(c, 0x80ff_ffff);

        let black = bake_color(0xff00_0000, Vec3::ZERO, 159);
        assert_eq!(black, 0xff00_0000);
    }

    #[test]
    fn bake_scales_channels_independently() {
        let pos = Vec3::new(0.0, 1.0, 0.0);
        let c = bake_color(0xff20_1000, pos, 0);
        let r = (c >> 16) & 0xff;
        let g = (c >> 8) & 0xff;
        let b = c & 0xff;
        assert_eq!(b, 0);
        assert!(r > g, "red {r} should stay brighter than green {g}");
    }

    #[test]
    fn bake_matches_the_three_light_falloff() {
        // Distances to the lights from (0, 1, 0): sqrt(17), sqrt(27), sqrt(645).
        // light = 50 + 192 * (0.65 + 8/d1 + 1/d2 + 4/d3) = 614.525..
        let c = bake_color(0xff40_2010, Vec3::new(0.0, 1.0, 0.0), 50);
        // 0x40 * light / 255 = 154.23, 0x20 -> 77.12, 0x10 -> 38.56
        assert_eq!(c, 0xff9a_4d26);
    }

    #[test]
    fn overflowing_16_bit_indices_is_an_error() {
        let mut set = TriangleSet::with_seed(0);
        // 2730 boxes * 24 = 65520 vertices still fit, one more does not.
        for _ in 0..2730 {
            set.add_box(0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0xffff_ffff).unwrap();
        }
        let err = set.add_box(0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 0xffff_ffff);
        assert!(matches!(err, Err(Error::IndexOverflow { vertices: 65544 })));
        assert_eq!(set.vertices.len(), 65520);
    }
}
