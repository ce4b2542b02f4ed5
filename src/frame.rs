//! The frame loop and the supervisor around it.
//!
//! One frame, strictly in this order and on one thread:
//!
//! 1. pump window messages and apply keyboard movement,
//! 2. sample head tracking once for both eyes,
//! 3. render the left eye, then the right eye, and copy both into the mirror
//!    image (skipped while the headset is not showing the app),
//! 4. submit both eyes to the runtime,
//! 5. present the mirror image on the desktop window.
//!
//! [`supervise`] wraps sessions in a small retry loop: losing the headset tears
//! the whole session down and starts again after a short pause; closing the
//! window ends the program.

use std::time::Duration;

use glam::{Quat, Vec3};
use log::{debug, error, info, trace, warn};

use crate::camera::{Camera, WalkControls, projection};
use crate::config::Config;
use crate::error::Result;
use crate::eye_buffer::EyeBuffer;
use crate::gfx::Graphics;
use crate::input::Keyboard;
use crate::runtime::{Eye, EyeFovLayer, HeadsetRuntime, SessionStatus, SubmitStatus, TrackingState};
use crate::scene::{ANIMATED_MODEL, CubeAnimation, RoomLayout, Scene};

/// Where the player stands when a session starts.
pub const START_POSITION: Vec3 = Vec3::new(0.0, 1.6, 5.0);

/// How long to wait before polling a runtime that is not ready for frames.
const IDLE_POLL: Duration = Duration::from_millis(100);

/// The window, keyboard and the factory for device + runtime pairs.
pub trait Platform {
    type Graphics: Graphics;
    type Runtime: HeadsetRuntime<Self::Graphics>;

    /// Dispatch pending window messages. Returns `false` once the window is gone
    /// or a quit key was pressed.
    fn handle_messages(&mut self) -> bool;

    fn keyboard(&self) -> &Keyboard;

    /// Find the headset and create a graphics device on the adapter driving it.
    fn connect(&mut self, config: &Config) -> Result<(Self::Graphics, Self::Runtime)>;
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FramePhase {
    Tracking,
    RenderingEye(Eye),
    Mirroring,
    Submitting,
    Presenting,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// The runtime is not ready for frames; nothing was tracked or drawn.
    Idle,
    /// The runtime asked the app to quit.
    Exit,
}

/// Player and animation state that outlives a single headset session.
///
/// The player's position always restarts at [`START_POSITION`]; heading and
/// the cube's orbit continue where the lost session left them.
#[derive(Copy, Clone, Debug, Default)]
pub struct Carryover {
    pub yaw: f32,
    pub cube: CubeAnimation,
}

/// Everything one headset session needs: device, runtime, eye targets, scene and player.
pub struct FrameDriver<G: Graphics, R: HeadsetRuntime<G>> {
    gfx: G,
    runtime: R,
    eyes: [EyeBuffer<G>; 2],
    scene: Scene<G>,
    camera: Camera,
    controls: WalkControls,
    cube: CubeAnimation,
    near: f32,
    far: f32,
    visible: bool,
    phase: FramePhase,
    frames: u64,
}

impl<G: Graphics, R: HeadsetRuntime<G>> FrameDriver<G, R> {
    pub fn new(mut gfx: G, mut runtime: R, config: &Config, layout: &RoomLayout) -> Result<Self> {
        let left = EyeBuffer::create(&mut gfx, &mut runtime, Eye::Left, config.ring_length)?;
        let right = EyeBuffer::create(&mut gfx, &mut runtime, Eye::Right, config.ring_length)?;
        let scene = Scene::upload(&mut gfx, layout)?;

        Ok(Self {
            gfx,
            runtime,
            eyes: [left, right],
            scene,
            camera: Camera::new(START_POSITION, Quat::IDENTITY),
            controls: WalkControls::new(config.move_speed, config.turn_speed),
            cube: CubeAnimation::default(),
            near: config.near,
            far: config.far,
            visible: true,
            phase: FramePhase::Tracking,
            frames: 0,
        })
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn scene(&self) -> &Scene<G> {
        &self.scene
    }

    pub fn cube_position(&self) -> Vec3 {
        self.scene.models[ANIMATED_MODEL].position
    }

    pub fn eye(&self, eye: Eye) -> &EyeBuffer<G> {
        &self.eyes[eye.index()]
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn carryover(&self) -> Carryover {
        Carryover {
            yaw: self.controls.yaw(),
            cube: self.cube,
        }
    }

    /// Continue from state saved by an earlier session.
    pub fn resume(&mut self, carried: Carryover) {
        self.controls.set_yaw(&mut self.camera, carried.yaw);
        self.cube = carried.cube;
    }

    pub fn phase(&self) -> FramePhase {
        self.phase
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn enter(&mut self, phase: FramePhase) {
        trace!("frame {}: {phase:?}", self.frames);
        self.phase = phase;
    }

    /// Produce one frame.
    ///
    /// Errors from submission (typically [`crate::Error::DisplayLost`]) end the
    /// session; the caller decides whether to retry.
    pub fn run_frame(&mut self, keys: &Keyboard) -> Result<FrameOutcome> {
        match self.runtime.poll()? {
            SessionStatus::Running => {}
            SessionStatus::Idle => return Ok(FrameOutcome::Idle),
            SessionStatus::Exiting => return Ok(FrameOutcome::Exit),
        }

        self.controls.apply(&mut self.camera, keys);
        self.scene.animate(&mut self.cube);

        self.enter(FramePhase::Tracking);
        let tracking = self.runtime.begin_frame()?;

        if self.visible {
            for eye in Eye::BOTH {
                self.enter(FramePhase::RenderingEye(eye));
                self.render_eye(eye, &tracking)?;
            }

            // Eye images may not be touched once they are handed back on submit.
            self.enter(FramePhase::Mirroring);
            let [left, right] = &self.eyes;
            self.gfx.copy_mirror([left.ring.current(), right.ring.current()]);
        }

        self.enter(FramePhase::Submitting);
        let layer = self.layer(&tracking);
        let status = self.runtime.submit_frame(&layer)?;
        let visible = status == SubmitStatus::Visible;
        if visible != self.visible {
            info!("headset display {}", if visible { "visible" } else { "hidden" });
            self.visible = visible;
        }

        self.enter(FramePhase::Presenting);
        self.gfx.present_mirror()?;

        self.frames += 1;
        Ok(FrameOutcome::Presented)
    }

    fn render_eye(&mut self, eye: Eye, tracking: &TrackingState) -> Result<()> {
        let buffer = &mut self.eyes[eye.index()];
        // The ring must move on before anything is bound.
        buffer.acquire(&mut self.runtime)?;
        self.gfx
            .set_and_clear_render_target(buffer.ring.current(), &buffer.depth);
        self.gfx.set_viewport(buffer.viewport);

        let eye_camera = self.camera.for_eye(&tracking.poses[eye.index()]);
        let proj = projection(&tracking.fovs[eye.index()], self.near, self.far);
        self.scene.render(&mut self.gfx, proj * eye_camera.view_matrix())
    }

    fn layer(&self, tracking: &TrackingState) -> EyeFovLayer {
        let [left, right] = &self.eyes;
        EyeFovLayer {
            display_time: tracking.display_time,
            texture_index: [left.ring.current_index(), right.ring.current_index()],
            viewport: [left.viewport, right.viewport],
            fov: tracking.fovs,
            pose: tracking.poses,
        }
    }
}

/// Why a session ended without an error.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionEnd {
    WindowClosed,
    RuntimeExit,
}

/// Run frames until the window closes, the runtime exits, or a frame fails.
pub fn run_session<P: Platform>(
    platform: &mut P,
    driver: &mut FrameDriver<P::Graphics, P::Runtime>,
) -> Result<SessionEnd> {
    while platform.handle_messages() {
        match driver.run_frame(platform.keyboard())? {
            FrameOutcome::Presented => {}
            FrameOutcome::Idle => std::thread::sleep(IDLE_POLL),
            FrameOutcome::Exit => return Ok(SessionEnd::RuntimeExit),
        }
    }
    Ok(SessionEnd::WindowClosed)
}

/// Supervisor states.
pub enum LoopState<D> {
    /// Acquire the headset and build a session.
    Init,
    Run(D),
    /// The headset went away; pause, then go back to `Init`.
    Retry,
    Exit,
}

/// Create sessions and run them until the user quits.
///
/// Failing to find the headset on the very first attempt is fatal. Once a
/// session has been established, losing the headset (at startup of a later
/// session or mid-frame) only triggers another attempt after
/// [`Config::retry_delay`], for as long as the window stays open. The new
/// session picks up the lost one's [`Carryover`].
pub fn supervise<P: Platform>(platform: &mut P, config: &Config) -> Result<()> {
    let mut state = LoopState::Init;
    let mut started = false;
    let mut attempts = 0u32;
    let mut carried = Carryover::default();

    loop {
        state = match state {
            LoopState::Init => {
                attempts += 1;
                match connect(platform, config) {
                    Ok(mut driver) => {
                        info!("session started (attempt {attempts})");
                        driver.resume(carried);
                        started = true;
                        LoopState::Run(driver)
                    }
                    Err(e) if started && e.is_recoverable() => {
                        debug!("headset unavailable: {e}");
                        LoopState::Retry
                    }
                    Err(e) => {
                        error!("initialization failed: {e}");
                        return Err(e);
                    }
                }
            }
            LoopState::Run(mut driver) => match run_session(platform, &mut driver) {
                Ok(end) => {
                    info!("session ended: {end:?} after {} frames", driver.frames());
                    LoopState::Exit
                }
                Err(e) if e.is_recoverable() => {
                    warn!("{e}; retrying");
                    carried = driver.carryover();
                    LoopState::Retry
                }
                Err(e) => {
                    error!("session failed: {e}");
                    return Err(e);
                }
            },
            LoopState::Retry => {
                std::thread::sleep(config.retry_delay());
                if platform.handle_messages() {
                    LoopState::Init
                } else {
                    LoopState::Exit
                }
            }
            LoopState::Exit => return Ok(()),
        };
    }
}

fn connect<P: Platform>(
    platform: &mut P,
    config: &Config,
) -> Result<FrameDriver<P::Graphics, P::Runtime>> {
    let (gfx, runtime) = platform.connect(config)?;
    let layout = RoomLayout::new()?;
    FrameDriver::new(gfx, runtime, config, &layout)
}
