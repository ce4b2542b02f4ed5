//! Recording stand-ins for the device, the VR runtime and the window.
//!
//! All three append to one shared call log so tests can check the order in
//! which the frame loop talks to them.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use glam::{Quat, Vec3};
use room_tiny::config::Config;
use room_tiny::frame::Platform;
use room_tiny::gfx::{DrawUniforms, Extent, Graphics, Viewport};
use room_tiny::input::Keyboard;
use room_tiny::mesh::TriangleSet;
use room_tiny::runtime::{
    Eye, EyeFovLayer, EyePose, Fov, HeadsetRuntime, SessionStatus, SubmitStatus, TrackingState,
};
use room_tiny::texture::{TextureFill, TextureImage};
use room_tiny::{Error, Result};

pub const EYE_SIZE: Extent = Extent {
    width: 1182,
    height: 1464,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MockTarget {
    pub eye: Eye,
    pub slot: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Call {
    CreateMesh { id: usize, indices: usize },
    CreateTexture { id: usize, fill: TextureFill },
    CreateDepth(Extent),
    CreateEyeTextures(Eye, Extent),
    Bind(MockTarget),
    Viewport(Viewport),
    Draw { mesh: usize, texture: usize, uniforms: DrawUniforms },
    CopyMirror([MockTarget; 2]),
    Present,
    /// The device was dropped.
    Released,
    Poll,
    BeginFrame,
    Acquire(Eye, usize),
    Submit(EyeFovLayer),
}

pub type Log = Rc<RefCell<Vec<Call>>>;

pub fn new_log() -> Log {
    Rc::new(RefCell::new(Vec::new()))
}

pub fn count(log: &Log, pred: impl Fn(&Call) -> bool) -> usize {
    log.borrow().iter().filter(|c| pred(c)).count()
}

pub fn submitted(log: &Log) -> Vec<EyeFovLayer> {
    log.borrow()
        .iter()
        .filter_map(|c| match c {
            Call::Submit(layer) => Some(*layer),
            _ => None,
        })
        .collect()
}

pub fn draws(log: &Log) -> Vec<DrawUniforms> {
    log.borrow()
        .iter()
        .filter_map(|c| match c {
            Call::Draw { uniforms, .. } => Some(*uniforms),
            _ => None,
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Graphics
// ----------------------------------------------------------------------------

pub struct MockMesh {
    pub id: usize,
}

pub struct MockTexture {
    pub id: usize,
    pub fill: TextureFill,
}

pub struct MockDepth {
    pub size: Extent,
}

pub struct MockGraphics {
    log: Log,
    next_id: usize,
}

impl MockGraphics {
    pub fn new(log: Log) -> Self {
        Self { log, next_id: 0 }
    }

    fn id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }
}

impl Drop for MockGraphics {
    fn drop(&mut self) {
        self.record(Call::Released);
    }
}

impl Graphics for MockGraphics {
    type Mesh = MockMesh;
    type Texture = MockTexture;
    type RenderTarget = MockTarget;
    type DepthBuffer = MockDepth;

    fn create_mesh(&mut self, triangles: &TriangleSet) -> Result<MockMesh> {
        let id = self.id();
        self.record(Call::CreateMesh {
            id,
            indices: triangles.indices.len(),
        });
        Ok(MockMesh { id })
    }

    fn create_texture(&mut self, image: &TextureImage) -> Result<MockTexture> {
        let id = self.id();
        self.record(Call::CreateTexture {
            id,
            fill: image.fill,
        });
        Ok(MockTexture {
            id,
            fill: image.fill,
        })
    }

    fn create_depth_buffer(&mut self, size: Extent) -> Result<MockDepth> {
        self.record(Call::CreateDepth(size));
        Ok(MockDepth { size })
    }

    fn set_and_clear_render_target(&mut self, target: &MockTarget, _depth: &MockDepth) {
        self.record(Call::Bind(*target));
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.record(Call::Viewport(viewport));
    }

    fn draw(&mut self, mesh: &MockMesh, texture: &MockTexture, uniforms: &DrawUniforms) -> Result<()> {
        self.record(Call::Draw {
            mesh: mesh.id,
            texture: texture.id,
            uniforms: *uniforms,
        });
        Ok(())
    }

    fn copy_mirror(&mut self, eyes: [&MockTarget; 2]) {
        self.record(Call::CopyMirror([*eyes[0], *eyes[1]]));
    }

    fn present_mirror(&mut self) -> Result<()> {
        self.record(Call::Present);
        Ok(())
    }
}

// ----------------------------------------------------------------------------
// Runtime
// ----------------------------------------------------------------------------

pub fn eye_pose(eye: Eye) -> EyePose {
    let x = match eye {
        Eye::Left => -0.032,
        Eye::Right => 0.032,
    };
    EyePose {
        position: Vec3::new(x, 0.0, 0.0),
        orientation: Quat::from_rotation_y(0.1),
    }
}

pub fn eye_fov(eye: Eye) -> Fov {
    match eye {
        Eye::Left => Fov {
            angle_left: -0.9,
            angle_right: 0.75,
            angle_up: 0.85,
            angle_down: -0.9,
        },
        Eye::Right => Fov {
            angle_left: -0.75,
            angle_right: 0.9,
            angle_up: 0.85,
            angle_down: -0.9,
        },
    }
}

pub struct MockRuntime {
    log: Log,
    /// Number of textures handed out per eye.
    pub ring_length: usize,
    /// Scripted `poll` answers; `Running` once exhausted.
    pub statuses: VecDeque<SessionStatus>,
    /// Scripted `submit_frame` answers; `Visible` once exhausted.
    pub submits: VecDeque<Result<SubmitStatus>>,
    /// Slots to hand out instead of the predicted one.
    pub handed_out: VecDeque<usize>,
    frame: i64,
}

impl MockRuntime {
    pub fn new(log: Log) -> Self {
        Self {
            log,
            ring_length: 3,
            statuses: VecDeque::new(),
            submits: VecDeque::new(),
            handed_out: VecDeque::new(),
            frame: 0,
        }
    }

    fn record(&self, call: Call) {
        self.log.borrow_mut().push(call);
    }
}

impl HeadsetRuntime<MockGraphics> for MockRuntime {
    fn poll(&mut self) -> Result<SessionStatus> {
        self.record(Call::Poll);
        Ok(self.statuses.pop_front().unwrap_or(SessionStatus::Running))
    }

    fn eye_texture_size(&self, _eye: Eye) -> Extent {
        EYE_SIZE
    }

    fn create_eye_textures(
        &mut self,
        _gfx: &mut MockGraphics,
        eye: Eye,
        size: Extent,
    ) -> Result<Vec<MockTarget>> {
        self.record(Call::CreateEyeTextures(eye, size));
        Ok((0..self.ring_length)
            .map(|slot| MockTarget { eye, slot })
            .collect())
    }

    fn begin_frame(&mut self) -> Result<TrackingState> {
        self.record(Call::BeginFrame);
        self.frame += 1;
        Ok(TrackingState {
            display_time: self.frame * 11_111_111,
            poses: Eye::BOTH.map(eye_pose),
            fovs: Eye::BOTH.map(eye_fov),
        })
    }

    fn acquire_eye_texture(&mut self, eye: Eye, expected: usize) -> Result<usize> {
        let slot = self.handed_out.pop_front().unwrap_or(expected);
        self.record(Call::Acquire(eye, slot));
        Ok(slot)
    }

    fn submit_frame(&mut self, layer: &EyeFovLayer) -> Result<SubmitStatus> {
        self.record(Call::Submit(*layer));
        self.submits.pop_front().unwrap_or(Ok(SubmitStatus::Visible))
    }
}

// ----------------------------------------------------------------------------
// Platform
// ----------------------------------------------------------------------------

pub enum Plan {
    Connect(MockRuntime),
    Fail(Error),
}

pub struct MockPlatform {
    pub log: Log,
    pub keyboard: Keyboard,
    /// How many more times `handle_messages` reports an open window.
    pub open_for: usize,
    /// Scripted `connect` answers; `HeadsetNotFound` once exhausted.
    pub plans: VecDeque<Plan>,
    pub connects: usize,
}

impl MockPlatform {
    pub fn new(log: Log, open_for: usize, plans: impl IntoIterator<Item = Plan>) -> Self {
        Self {
            log,
            keyboard: Keyboard::new(),
            open_for,
            plans: plans.into_iter().collect(),
            connects: 0,
        }
    }
}

impl Platform for MockPlatform {
    type Graphics = MockGraphics;
    type Runtime = MockRuntime;

    fn handle_messages(&mut self) -> bool {
        if self.open_for == 0 {
            return false;
        }
        self.open_for -= 1;
        true
    }

    fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    fn connect(&mut self, _config: &Config) -> Result<(MockGraphics, MockRuntime)> {
        self.connects += 1;
        match self.plans.pop_front() {
            Some(Plan::Connect(runtime)) => Ok((MockGraphics::new(self.log.clone()), runtime)),
            Some(Plan::Fail(e)) => Err(e),
            None => Err(Error::HeadsetNotFound),
        }
    }
}

/// Defaults, without the pause between attempts.
pub fn test_config() -> Config {
    Config {
        retry_delay_ms: 0,
        ..Config::default()
    }
}
