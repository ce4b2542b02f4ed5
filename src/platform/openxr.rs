//! OpenXR implementation of [`HeadsetRuntime`] on top of [`D3D11Graphics`].
//!
//! Each eye gets its own single-layer swapchain, which plays the part of the
//! eye's texture ring. Poses are located in the LOCAL reference space, whose
//! origin is the head position at startup, so the room camera supplies the
//! standing height.

use std::ffi::c_void;
use std::mem;

use glam::{Quat, Vec3};
use log::{debug, info, warn};
use openxr as xr;
use windows::Win32::Graphics::Direct3D11::ID3D11Device;
use windows::core::Interface;

use super::d3d11::{D3D11Graphics, EYE_FORMAT, EyeTarget};
use crate::error::{Error, Result};
use crate::gfx::Extent;
use crate::runtime::{
    Eye, EyeFovLayer, EyePose, Fov, HeadsetRuntime, SessionStatus, SubmitStatus, TrackingState,
};

const VIEW_TYPE: xr::ViewConfigurationType = xr::ViewConfigurationType::PRIMARY_STEREO;
const APP_NAME: &str = "room-tiny";

fn runtime_error(what: &'static str) -> impl FnOnce(xr::sys::Result) -> Error {
    move |e| match e {
        xr::sys::Result::ERROR_SESSION_LOST | xr::sys::Result::ERROR_INSTANCE_LOST => {
            Error::DisplayLost
        }
        e => Error::Runtime(format!("{what}: {e}")),
    }
}

// ============================================================================
// HEADSET DISCOVERY
// ============================================================================

/// An OpenXR instance with a head-mounted display, before any session exists.
///
/// The device has to be created on the adapter the runtime names here, so this
/// is split from [`OpenXrRuntime`].
pub struct Headset {
    instance: xr::Instance,
    system: xr::SystemId,
    blend_mode: xr::EnvironmentBlendMode,
    eye_sizes: [Extent; 2],
    adapter_luid: u64,
}

impl Headset {
    pub fn connect() -> Result<Self> {
        #[cfg(feature = "static")]
        let entry = xr::Entry::linked();
        #[cfg(not(feature = "static"))]
        let entry = unsafe {
            xr::Entry::load().map_err(|e| {
                Error::Runtime(format!(
                    "couldn't find the OpenXR loader ({e:?}); try enabling the \"static\" feature"
                ))
            })?
        };

        let available_extensions = entry
            .enumerate_extensions()
            .map_err(runtime_error("enumerate extensions"))?;
        if !available_extensions.khr_d3d11_enable {
            return Err(Error::Runtime(
                "the OpenXR runtime does not support XR_KHR_D3D11_enable".into(),
            ));
        }

        let mut enabled_extensions = xr::ExtensionSet::default();
        enabled_extensions.khr_d3d11_enable = true;

        let instance = entry
            .create_instance(
                &xr::ApplicationInfo {
                    application_name: APP_NAME,
                    application_version: 0,
                    engine_name: APP_NAME,
                    engine_version: 0,
                    api_version: xr::Version::new(1, 0, 0),
                },
                &enabled_extensions,
                &[],
            )
            .map_err(runtime_error("create instance"))?;

        let instance_props = instance
            .properties()
            .map_err(runtime_error("query instance"))?;
        info!(
            "loaded OpenXR runtime: {} {}",
            instance_props.runtime_name, instance_props.runtime_version
        );

        let system = instance
            .system(xr::FormFactor::HEAD_MOUNTED_DISPLAY)
            .map_err(|e| match e {
                xr::sys::Result::ERROR_FORM_FACTOR_UNAVAILABLE => Error::HeadsetNotFound,
                e => runtime_error("query system")(e),
            })?;

        let blend_mode = instance
            .enumerate_environment_blend_modes(system, VIEW_TYPE)
            .map_err(runtime_error("enumerate blend modes"))?
            .first()
            .copied()
            .ok_or_else(|| Error::Runtime("runtime offers no environment blend mode".into()))?;

        let views = instance
            .enumerate_view_configuration_views(system, VIEW_TYPE)
            .map_err(runtime_error("enumerate views"))?;
        let [left, right] = views.as_slice() else {
            return Err(Error::Runtime(format!(
                "expected two stereo views, runtime reported {}",
                views.len()
            )));
        };
        let eye_sizes = [left, right].map(|view| {
            Extent::new(
                view.recommended_image_rect_width.min(view.max_image_rect_width),
                view.recommended_image_rect_height.min(view.max_image_rect_height),
            )
        });

        let requirements = instance
            .graphics_requirements::<xr::D3D11>(system)
            .map_err(runtime_error("query D3D11 requirements"))?;
        debug!(
            "D3D11 min feature level: {:?}",
            requirements.min_feature_level
        );
        // Both LUID layouts are { low: u32, high: i32 }.
        let adapter_luid = unsafe { mem::transmute_copy::<_, u64>(&requirements.adapter_luid) };

        Ok(Self {
            instance,
            system,
            blend_mode,
            eye_sizes,
            adapter_luid,
        })
    }

    pub fn adapter_luid(&self) -> u64 {
        self.adapter_luid
    }

    pub fn eye_size(&self, eye: Eye) -> Extent {
        self.eye_sizes[eye.index()]
    }
}

// ============================================================================
// SESSION
// ============================================================================

/// The parts of `xrWaitFrame`'s answer still needed when the frame is submitted.
struct PendingFrame {
    display_time: xr::Time,
    should_render: bool,
}

pub struct OpenXrRuntime {
    swapchains: [Option<xr::Swapchain<xr::D3D11>>; 2],
    acquired: [bool; 2],
    frame: Option<PendingFrame>,
    space: xr::Space,
    frame_wait: xr::FrameWaiter,
    frame_stream: xr::FrameStream<xr::D3D11>,
    session: xr::Session<xr::D3D11>,
    state: xr::SessionState,
    running: bool,
    event_storage: xr::EventDataBuffer,
    headset: Headset,
}

impl OpenXrRuntime {
    /// Create a session rendering with `device`. (INTERFACE POINT)
    pub fn new(headset: Headset, device: &ID3D11Device) -> Result<Self> {
        let (session, frame_wait, frame_stream) = unsafe {
            headset
                .instance
                .create_session::<xr::D3D11>(
                    headset.system,
                    &xr::d3d::SessionCreateInfoD3D11 {
                        device: device.as_raw() as *mut _,
                    },
                )
                .map_err(runtime_error("create session"))?
        };

        let space = session
            .create_reference_space(xr::ReferenceSpaceType::LOCAL, xr::Posef::IDENTITY)
            .map_err(runtime_error("create reference space"))?;

        Ok(Self {
            swapchains: [None, None],
            acquired: [false; 2],
            frame: None,
            space,
            frame_wait,
            frame_stream,
            session,
            state: xr::SessionState::IDLE,
            running: false,
            event_storage: xr::EventDataBuffer::new(),
            headset,
        })
    }

    fn is_visible(&self) -> bool {
        matches!(
            self.state,
            xr::SessionState::VISIBLE | xr::SessionState::FOCUSED
        )
    }

    /// Apply one session state change. Returns the status the frame loop should see, if final.
    fn handle_session_state(&mut self, state: xr::SessionState) -> Result<Option<SessionStatus>> {
        info!("entered session state {state:?}");
        self.state = state;
        match state {
            xr::SessionState::READY => {
                self.session
                    .begin(VIEW_TYPE)
                    .map_err(runtime_error("begin session"))?;
                self.running = true;
            }
            xr::SessionState::STOPPING => {
                self.session.end().map_err(runtime_error("end session"))?;
                self.running = false;
            }
            xr::SessionState::EXITING => return Ok(Some(SessionStatus::Exiting)),
            xr::SessionState::LOSS_PENDING => return Err(Error::DisplayLost),
            _ => {}
        }
        Ok(None)
    }
}

impl HeadsetRuntime<D3D11Graphics> for OpenXrRuntime {
    fn poll(&mut self) -> Result<SessionStatus> {
        loop {
            let event = self
                .headset
                .instance
                .poll_event(&mut self.event_storage)
                .map_err(runtime_error("poll events"))?;

            // Copy what is needed out of the event buffer before touching `self`.
            let state = match event {
                None => break,
                Some(xr::Event::SessionStateChanged(e)) => e.state(),
                Some(xr::Event::InstanceLossPending(_)) => return Err(Error::DisplayLost),
                Some(xr::Event::EventsLost(e)) => {
                    warn!("lost {} runtime events", e.lost_event_count());
                    continue;
                }
                Some(_) => continue,
            };
            if let Some(status) = self.handle_session_state(state)? {
                return Ok(status);
            }
        }

        Ok(if self.running {
            SessionStatus::Running
        } else {
            SessionStatus::Idle
        })
    }

    fn eye_texture_size(&self, eye: Eye) -> Extent {
        self.headset.eye_size(eye)
    }

    /// INTERFACE POINT: the runtime's images become the device's render targets.
    fn create_eye_textures(
        &mut self,
        gfx: &mut D3D11Graphics,
        eye: Eye,
        size: Extent,
    ) -> Result<Vec<EyeTarget>> {
        let swapchain = self
            .session
            .create_swapchain(&xr::SwapchainCreateInfo {
                create_flags: xr::SwapchainCreateFlags::EMPTY,
                usage_flags: xr::SwapchainUsageFlags::COLOR_ATTACHMENT
                    | xr::SwapchainUsageFlags::SAMPLED,
                format: EYE_FORMAT.0 as u32,
                sample_count: 1,
                width: size.width,
                height: size.height,
                face_count: 1,
                array_size: 1,
                mip_count: 1,
            })
            .map_err(runtime_error("create swapchain"))?;

        let targets = swapchain
            .enumerate_images()
            .map_err(runtime_error("enumerate swapchain images"))?
            .into_iter()
            .map(|image| gfx.wrap_eye_texture(image as *mut c_void, size))
            .collect::<Result<Vec<_>>>()?;

        self.swapchains[eye.index()] = Some(swapchain);
        Ok(targets)
    }

    fn begin_frame(&mut self) -> Result<TrackingState> {
        let frame_state = self
            .frame_wait
            .wait()
            .map_err(runtime_error("wait frame"))?;
        self.frame_stream
            .begin()
            .map_err(runtime_error("begin frame"))?;

        let (_, views) = self
            .session
            .locate_views(VIEW_TYPE, frame_state.predicted_display_time, &self.space)
            .map_err(runtime_error("locate views"))?;
        let [left, right] = views.as_slice() else {
            return Err(Error::Runtime(format!(
                "expected two located views, runtime returned {}",
                views.len()
            )));
        };

        self.frame = Some(PendingFrame {
            display_time: frame_state.predicted_display_time,
            should_render: frame_state.should_render,
        });
        self.acquired = [false; 2];

        Ok(TrackingState {
            display_time: frame_state.predicted_display_time.as_nanos(),
            poses: [to_eye_pose(&left.pose), to_eye_pose(&right.pose)],
            fovs: [to_fov(&left.fov), to_fov(&right.fov)],
        })
    }

    fn acquire_eye_texture(&mut self, eye: Eye, _expected: usize) -> Result<usize> {
        let swapchain = self.swapchains[eye.index()]
            .as_mut()
            .ok_or_else(|| Error::Runtime(format!("{eye:?} eye has no swapchain")))?;
        let index = swapchain
            .acquire_image()
            .map_err(runtime_error("acquire swapchain image"))?;
        swapchain
            .wait_image(xr::Duration::INFINITE)
            .map_err(runtime_error("wait swapchain image"))?;
        self.acquired[eye.index()] = true;
        Ok(index as usize)
    }

    fn submit_frame(&mut self, layer: &EyeFovLayer) -> Result<SubmitStatus> {
        let frame = self
            .frame
            .take()
            .ok_or_else(|| Error::Runtime("frame submitted without begin_frame".into()))?;

        // Images must go back to the runtime before the frame ends.
        let drawn = mem::take(&mut self.acquired);
        for (swapchain, drawn) in self.swapchains.iter_mut().zip(drawn) {
            if let (Some(swapchain), true) = (swapchain, drawn) {
                swapchain
                    .release_image()
                    .map_err(runtime_error("release swapchain image"))?;
            }
        }
        let blend_mode = self.headset.blend_mode;

        match (&self.swapchains, drawn == [true; 2]) {
            ([Some(left), Some(right)], true) => {
                let views = [(left, Eye::Left), (right, Eye::Right)].map(|(swapchain, eye)| {
                    let i = eye.index();
                    let viewport = layer.viewport[i];
                    xr::CompositionLayerProjectionView::new()
                        .pose(to_posef(&layer.pose[i]))
                        .fov(to_fovf(&layer.fov[i]))
                        .sub_image(
                            xr::SwapchainSubImage::new()
                                .swapchain(swapchain)
                                .image_array_index(0)
                                .image_rect(xr::Rect2Di {
                                    offset: xr::Offset2Di {
                                        x: viewport.x,
                                        y: viewport.y,
                                    },
                                    extent: xr::Extent2Di {
                                        width: viewport.width as i32,
                                        height: viewport.height as i32,
                                    },
                                }),
                        )
                });
                self.frame_stream
                    .end(
                        frame.display_time,
                        blend_mode,
                        &[&xr::CompositionLayerProjection::new()
                            .space(&self.space)
                            .views(&views)],
                    )
                    .map_err(runtime_error("end frame"))?;
            }
            _ => {
                self.frame_stream
                    .end(frame.display_time, blend_mode, &[])
                    .map_err(runtime_error("end frame"))?;
            }
        }

        Ok(if frame.should_render && self.is_visible() {
            SubmitStatus::Visible
        } else {
            SubmitStatus::NotVisible
        })
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

fn to_eye_pose(pose: &xr::Posef) -> EyePose {
    let (p, q) = (&pose.position, &pose.orientation);
    EyePose {
        position: Vec3::new(p.x, p.y, p.z),
        orientation: Quat::from_xyzw(q.x, q.y, q.z, q.w),
    }
}

fn to_posef(pose: &EyePose) -> xr::Posef {
    let (p, q) = (pose.position, pose.orientation);
    xr::Posef {
        orientation: xr::Quaternionf {
            x: q.x,
            y: q.y,
            z: q.z,
            w: q.w,
        },
        position: xr::Vector3f {
            x: p.x,
            y: p.y,
            z: p.z,
        },
    }
}

fn to_fov(fov: &xr::Fovf) -> Fov {
    Fov {
        angle_left: fov.angle_left,
        angle_right: fov.angle_right,
        angle_up: fov.angle_up,
        angle_down: fov.angle_down,
    }
}

fn to_fovf(fov: &Fov) -> xr::Fovf {
    xr::Fovf {
        angle_left: fov.angle_left,
        angle_right: fov.angle_right,
        angle_up: fov.angle_up,
        angle_down: fov.angle_down,
    }
}
