//! The desktop side: a winit window pumped once per frame, the keyboard table
//! and Ctrl-C handling. Also wires the OpenXR runtime and the D3D11 device
//! together whenever the supervisor asks for a new session.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use log::{debug, info};
use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use windows::Win32::Foundation::HWND;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowBuilder};

use super::d3d11::D3D11Graphics;
use super::openxr::{Headset, OpenXrRuntime};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::frame::Platform;
use crate::gfx::Extent;
use crate::input::{Key, Keyboard};
use crate::runtime::Eye;

pub struct DesktopPlatform {
    event_loop: EventLoop<()>,
    window: Window,
    keyboard: Keyboard,
    interrupted: Arc<AtomicBool>,
    open: bool,
}

impl DesktopPlatform {
    pub fn new(config: &Config) -> Result<Self> {
        // Handle interrupts gracefully
        let interrupted = Arc::new(AtomicBool::new(false));
        let flag = interrupted.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))
            .map_err(|e| Error::Window(format!("setting Ctrl-C handler: {e}")))?;

        let event_loop =
            EventLoop::new().map_err(|e| Error::Window(format!("create event loop: {e}")))?;
        let window = WindowBuilder::new()
            .with_title(config.title.as_str())
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .map_err(|e| Error::Window(format!("create window: {e}")))?;

        Ok(Self {
            event_loop,
            window,
            keyboard: Keyboard::new(),
            interrupted,
            open: true,
        })
    }

    fn hwnd(&self) -> Result<HWND> {
        let handle = self
            .window
            .window_handle()
            .map_err(|e| Error::Window(format!("window handle: {e}")))?;
        match handle.as_raw() {
            RawWindowHandle::Win32(handle) => Ok(HWND(handle.hwnd.get() as *mut _)),
            other => Err(Error::Window(format!("expected a Win32 window, got {other:?}"))),
        }
    }
}

/// Map a physical key to the virtual key the demo knows about.
fn key_for(code: KeyCode) -> Option<Key> {
    Some(match code {
        KeyCode::ControlLeft | KeyCode::ControlRight => Key::Control,
        KeyCode::Escape => Key::Escape,
        KeyCode::ArrowLeft => Key::Left,
        KeyCode::ArrowUp => Key::Up,
        KeyCode::ArrowRight => Key::Right,
        KeyCode::ArrowDown => Key::Down,
        KeyCode::KeyA => Key::A,
        KeyCode::KeyD => Key::D,
        KeyCode::KeyQ => Key::Q,
        KeyCode::KeyS => Key::S,
        KeyCode::KeyW => Key::W,
        _ => return None,
    })
}

impl Platform for DesktopPlatform {
    type Graphics = D3D11Graphics;
    type Runtime = OpenXrRuntime;

    fn handle_messages(&mut self) -> bool {
        if !self.open {
            return false;
        }

        let keyboard = &mut self.keyboard;
        let mut closed = false;
        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, elwt| {
                let Event::WindowEvent { event, .. } = event else {
                    return;
                };
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        closed = true;
                        elwt.exit();
                    }
                    // Key-up events for keys held while unfocused never arrive.
                    WindowEvent::Focused(false) => keyboard.release_all(),
                    WindowEvent::KeyboardInput {
                        event:
                            KeyEvent {
                                physical_key: PhysicalKey::Code(code),
                                state,
                                ..
                            },
                        ..
                    } => {
                        if let Some(key) = key_for(code) {
                            match state {
                                ElementState::Pressed => keyboard.press(key),
                                ElementState::Released => keyboard.release(key),
                            }
                        }
                    }
                    _ => {}
                }
            });

        if closed || matches!(status, PumpStatus::Exit(_)) {
            info!("window closed");
            self.open = false;
        } else if self.keyboard.quit_requested() {
            info!("quit key pressed");
            self.open = false;
        } else if self.interrupted.load(Ordering::Relaxed) {
            info!("interrupted");
            self.open = false;
        }
        self.open
    }

    fn keyboard(&self) -> &Keyboard {
        &self.keyboard
    }

    fn connect(&mut self, config: &Config) -> Result<(D3D11Graphics, OpenXrRuntime)> {
        let headset = Headset::connect()?;

        // The mirror holds both eyes side by side; the window shows it scaled.
        let [left, right] = Eye::BOTH.map(|eye| headset.eye_size(eye));
        let mirror_size = Extent::new(left.width + right.width, left.height.max(right.height));
        let scaled = |v: u32| ((v as f32 * config.mirror_scale).round() as u32).max(1);
        let window_size = PhysicalSize::new(scaled(mirror_size.width), scaled(mirror_size.height));
        if self.window.request_inner_size(window_size).is_none() {
            debug!("window resize to {window_size:?} is pending");
        }

        let gfx = D3D11Graphics::new(headset.adapter_luid(), self.hwnd()?, mirror_size)?;
        let runtime = OpenXrRuntime::new(headset, gfx.device())?;
        Ok((gfx, runtime))
    }
}
