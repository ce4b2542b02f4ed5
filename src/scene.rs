//! The room: a handful of models, each one triangle set and one texture.
//!
//! Geometry is described by [`RoomLayout`] without touching the GPU, then
//! uploaded once through [`Graphics`] into a [`Scene`]. After upload the only
//! thing that changes is the position of the decorative cube.

use std::collections::HashMap;
use std::rc::Rc;

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::error::Result;
use crate::gfx::{DrawUniforms, Graphics};
use crate::mesh::TriangleSet;
use crate::texture::{TextureFill, TextureImage};

/// Index of the model [`CubeAnimation`] moves around.
pub const ANIMATED_MODEL: usize = 0;

/// CPU-side description of one model.
#[derive(Clone, Debug)]
pub struct ModelDesc {
    pub name: &'static str,
    pub triangles: TriangleSet,
    pub position: Vec3,
    pub rotation: Quat,
    pub fill: TextureFill,
}

#[derive(Clone, Debug)]
pub struct RoomLayout {
    pub models: Vec<ModelDesc>,
}

impl RoomLayout {
    pub fn new() -> Result<Self> {
        Self::build(TriangleSet::new)
    }

    /// The same room with reproducible vertex colours.
    pub fn with_seed(seed: u64) -> Result<Self> {
        let mut next = seed;
        Self::build(move || {
            next = next.wrapping_add(1);
            TriangleSet::with_seed(next)
        })
    }

    fn build(mut new_set: impl FnMut() -> TriangleSet) -> Result<Self> {
        let mut models = Vec::new();
        let mut add = |name, triangles, position, fill| {
            models.push(ModelDesc {
                name,
                triangles,
                position,
                rotation: Quat::IDENTITY,
                fill,
            });
        };

        let mut cube = new_set();
        cube.add_box(0.5, -0.5, 0.5, -0.5, 0.5, -0.5, 0xff40_4040)?;
        add("cube", cube, Vec3::ZERO, TextureFill::Ceiling);

        // Parked below the floor, out of sight.
        let mut spare = new_set();
        spare.add_box(0.1, -0.1, 0.1, -0.1, 0.1, -0.1, 0xffff_0000)?;
        add("spare cube", spare, Vec3::new(0.0, -10.0, 0.0), TextureFill::Ceiling);

        let mut walls = new_set();
        walls.add_box(10.1, 0.0, 20.0, 10.0, 4.0, -20.0, 0xff80_8080)?; // left
        walls.add_box(10.0, -0.1, 20.1, -10.0, 4.0, 20.0, 0xff80_8080)?; // back
        walls.add_box(-10.0, -0.1, 20.0, -10.1, 4.0, -20.0, 0xff80_8080)?; // right
        add("walls", walls, Vec3::ZERO, TextureFill::Wall);

        let mut floors = new_set();
        floors.add_box(10.0, -0.1, 20.0, -10.0, 0.0, -20.1, 0xff80_8080)?; // main
        floors.add_box(15.0, -6.1, -18.0, -15.0, -6.0, -30.0, 0xff80_8080)?; // below the balcony
        add("floors", floors, Vec3::ZERO, TextureFill::Floor);

        let mut ceiling = new_set();
        ceiling.add_box(10.0, 4.0, 20.0, -10.0, 4.1, -20.1, 0xff80_8080)?;
        add("ceiling", ceiling, Vec3::ZERO, TextureFill::Ceiling);

        let mut furniture = new_set();
        add_furniture(&mut furniture)?;
        add("furniture", furniture, Vec3::ZERO, TextureFill::White);

        Ok(Self { models })
    }
}

fn add_furniture(set: &mut TriangleSet) -> Result<()> {
    const SHELF: u32 = 0xff38_3838;
    const BARS: u32 = 0xff50_5050;
    const TABLE: u32 = 0xff50_5000;
    const CHAIR: u32 = 0xff20_2050;
    const POSTS: u32 = 0xff40_4040;

    // Shelf on the right wall: two uprights, two boards.
    set.add_box(-9.5, 0.75, -3.0, -10.1, 2.5, -3.1, SHELF)?;
    set.add_box(-9.5, 0.95, -3.7, -10.1, 2.75, -3.8, SHELF)?;
    set.add_box(-9.55, 1.20, -2.5, -10.1, 1.30, -3.75, SHELF)?;
    set.add_box(-9.55, 2.00, -3.05, -10.1, 2.10, -4.2, SHELF)?;

    // Balcony railings and their bars.
    set.add_box(-5.0, 1.1, -20.0, -10.0, 1.2, -20.1, SHELF)?;
    set.add_box(10.0, 1.1, -20.0, 5.0, 1.2, -20.1, SHELF)?;
    for f in (5..=9).map(|f| f as f32) {
        set.add_box(-f, 0.0, -20.0, -f - 0.1, 1.1, -20.1, BARS)?;
        set.add_box(f, 1.1, -20.0, f + 0.1, 0.0, -20.1, BARS)?;
    }

    // Table.
    set.add_box(1.8, 0.8, -1.0, 0.0, 0.7, 0.0, TABLE)?;
    set.add_box(1.8, 0.0, 0.0, 1.7, 0.7, -0.1, TABLE)?;
    set.add_box(1.8, 0.7, -1.0, 1.7, 0.0, -0.9, TABLE)?;
    set.add_box(0.0, 0.0, -1.0, 0.1, 0.7, -0.9, TABLE)?;
    set.add_box(0.0, 0.7, 0.0, 0.1, 0.0, -0.1, TABLE)?;

    // Chair: seat, four legs, back bar.
    set.add_box(1.4, 0.5, 1.1, 0.8, 0.55, 0.5, CHAIR)?;
    set.add_box(1.401, 0.0, 1.101, 1.339, 1.0, 1.039, CHAIR)?;
    set.add_box(1.401, 0.5, 0.499, 1.339, 0.0, 0.561, CHAIR)?;
    set.add_box(0.799, 0.0, 0.499, 0.861, 0.5, 0.561, CHAIR)?;
    set.add_box(0.799, 1.0, 1.101, 0.861, 0.0, 1.039, CHAIR)?;
    set.add_box(1.4, 0.97, 1.05, 0.8, 0.92, 1.10, CHAIR)?;

    // Row of posts.
    for f in (0..9).map(|k| 3.0 + 0.4 * k as f32) {
        set.add_box(3.0, 0.0, -f, 2.9, 1.3, -f - 0.1, POSTS)?;
    }

    Ok(())
}

/// The cube circling the room at head height: `(9 sin t, 3, 9 cos t)`,
/// with `t` advancing by a fixed step every frame.
#[derive(Copy, Clone, Debug, Default)]
pub struct CubeAnimation {
    clock: f32,
}

impl CubeAnimation {
    pub const STEP: f32 = 0.015;

    pub fn clock(&self) -> f32 {
        self.clock
    }

    /// Advance one frame and return the new position.
    pub fn step(&mut self) -> Vec3 {
        self.clock += Self::STEP;
        Vec3::new(9.0 * self.clock.sin(), 3.0, 9.0 * self.clock.cos())
    }
}

/// An uploaded model. Owns its buffers; shares its texture with other models.
pub struct Model<G: Graphics> {
    pub name: &'static str,
    pub mesh: G::Mesh,
    pub position: Vec3,
    pub rotation: Quat,
    pub tint: Vec4,
    pub texture: Rc<G::Texture>,
}

impl<G: Graphics> Model<G> {
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    pub fn render(&self, gfx: &mut G, view_proj: Mat4) -> Result<()> {
        let uniforms = DrawUniforms::new(self.world_matrix(), view_proj, self.tint);
        gfx.draw(&self.mesh, &self.texture, &uniforms)
    }
}

pub struct Scene<G: Graphics> {
    pub models: Vec<Model<G>>,
}

impl<G: Graphics> Scene<G> {
    /// Upload every model; each distinct texture fill is generated and uploaded once.
    pub fn upload(gfx: &mut G, layout: &RoomLayout) -> Result<Self> {
        let mut textures: HashMap<TextureFill, Rc<G::Texture>> = HashMap::new();
        let mut models = Vec::with_capacity(layout.models.len());

        for desc in &layout.models {
            let texture = match textures.get(&desc.fill) {
                Some(texture) => texture.clone(),
                None => {
                    let texture = Rc::new(gfx.create_texture(&TextureImage::generate(desc.fill))?);
                    textures.insert(desc.fill, texture.clone());
                    texture
                }
            };

            models.push(Model {
                name: desc.name,
                mesh: gfx.create_mesh(&desc.triangles)?,
                position: desc.position,
                rotation: desc.rotation,
                tint: Vec4::ONE,
                texture,
            });
        }

        log::debug!(
            "uploaded {} models sharing {} textures",
            models.len(),
            textures.len()
        );
        Ok(Self { models })
    }

    /// Draw every model, in order, against one eye's view-projection.
    pub fn render(&self, gfx: &mut G, view_proj: Mat4) -> Result<()> {
        for model in &self.models {
            model.render(gfx, view_proj)?;
        }
        Ok(())
    }

    /// Move the animated cube one frame along its circle.
    pub fn animate(&mut self, animation: &mut CubeAnimation) {
        let position = animation.step();
        if let Some(cube) = self.models.get_mut(ANIMATED_MODEL) {
            cube.position = position;
        }
    }
}
