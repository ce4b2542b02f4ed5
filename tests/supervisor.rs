mod common;

use common::*;
use glam::{Mat4, Quat, Vec3};
use room_tiny::Error;
use room_tiny::camera::{Camera, projection};
use room_tiny::frame::{START_POSITION, supervise};
use room_tiny::input::Key;
use room_tiny::runtime::Eye;
use room_tiny::scene::CubeAnimation;
use room_tiny::runtime::{SessionStatus, SubmitStatus};

fn presented(log: &Log) -> usize {
    count(log, |c| *c == Call::Present)
}

fn losing_display_after(log: &Log, good_frames: usize) -> MockRuntime {
    let mut runtime = MockRuntime::new(log.clone());
    runtime
        .submits
        .extend((0..good_frames).map(|_| Ok(SubmitStatus::Visible)));
    runtime.submits.push_back(Err(Error::DisplayLost));
    runtime
}

#[test]
fn closing_the_window_exits_cleanly() {
    let log = new_log();
    let runtime = MockRuntime::new(log.clone());
    let mut platform = MockPlatform::new(log.clone(), 3, [Plan::Connect(runtime)]);

    supervise(&mut platform, &test_config()).unwrap();
    assert_eq!(platform.connects, 1);
    assert_eq!(presented(&log), 3);
}

#[test]
fn missing_headset_at_first_start_is_fatal() {
    let log = new_log();
    let mut platform = MockPlatform::new(log.clone(), 10, [Plan::Fail(Error::HeadsetNotFound)]);

    let err = supervise(&mut platform, &test_config()).unwrap_err();
    assert!(matches!(err, Error::HeadsetNotFound));
    assert_eq!(platform.connects, 1);
    assert_eq!(presented(&log), 0);
}

#[test]
fn lost_display_reinitializes_everything() {
    let log = new_log();
    let mut platform = MockPlatform::new(
        log.clone(),
        6,
        [
            Plan::Connect(losing_display_after(&log, 1)),
            Plan::Connect(MockRuntime::new(log.clone())),
        ],
    );

    supervise(&mut platform, &test_config()).unwrap();
    assert_eq!(platform.connects, 2);
    // Session one: a good frame, then the failed one. One pump is spent
    // deciding to retry; the second session gets the remaining three.
    assert_eq!(presented(&log), 1 + 3);
    assert_eq!(count(&log, |c| matches!(c, Call::CreateEyeTextures(..))), 4);
}

#[test]
fn heading_and_cube_orbit_survive_a_reconnect() {
    let log = new_log();
    let mut platform = MockPlatform::new(
        log.clone(),
        4,
        [
            Plan::Connect(losing_display_after(&log, 1)),
            Plan::Connect(MockRuntime::new(log.clone())),
        ],
    );
    platform.keyboard.press(Key::Left);

    supervise(&mut platform, &test_config()).unwrap();
    assert_eq!(platform.connects, 2);

    // Both frames of the lost session turned and animated; the first frame of
    // the new one continues from there.
    let mut cube = CubeAnimation::default();
    let mut yaw = 0.0f32;
    for _ in 0..3 {
        cube.step();
        yaw += 0.02;
    }
    let position = Vec3::new(9.0 * cube.clock().sin(), 3.0, 9.0 * cube.clock().cos());
    let camera = Camera::new(START_POSITION, Quat::from_rotation_y(yaw));
    let view = camera.for_eye(&eye_pose(Eye::Left)).view_matrix();
    let expected = projection(&eye_fov(Eye::Left), 0.2, 1000.0) * view * Mat4::from_translation(position);

    // The lost session drew two frames of twelve models before it.
    let all = draws(&log);
    assert_eq!(all.len(), 3 * 12);
    let actual = Mat4::from_cols_array(&all[24].world_view_proj);
    assert!(actual.abs_diff_eq(expected, 1e-3), "{actual} != {expected}");
}

#[test]
fn lost_session_releases_its_device_before_reconnecting() {
    let log = new_log();
    let mut platform = MockPlatform::new(
        log.clone(),
        3,
        [
            Plan::Connect(losing_display_after(&log, 0)),
            Plan::Connect(MockRuntime::new(log.clone())),
        ],
    );

    supervise(&mut platform, &test_config()).unwrap();

    let calls = log.borrow();
    let released = calls.iter().position(|c| *c == Call::Released).unwrap();
    let recreated = calls
        .iter()
        .enumerate()
        .filter(|(_, c)| matches!(c, Call::CreateEyeTextures(..)))
        .nth(2)
        .map(|(i, _)| i)
        .unwrap();
    assert!(released < recreated);
    assert_eq!(calls.iter().filter(|c| **c == Call::Released).count(), 2);
}

#[test]
fn retries_until_the_headset_comes_back() {
    let log = new_log();
    let mut platform = MockPlatform::new(
        log.clone(),
        8,
        [
            Plan::Connect(losing_display_after(&log, 0)),
            Plan::Fail(Error::HeadsetNotFound),
            Plan::Fail(Error::HeadsetNotFound),
            Plan::Connect(MockRuntime::new(log.clone())),
        ],
    );

    supervise(&mut platform, &test_config()).unwrap();
    assert_eq!(platform.connects, 4);
    // 1 failed frame + 3 retry pumps leaves 4 frames for the last session.
    assert_eq!(presented(&log), 4);
}

#[test]
fn window_closed_while_waiting_to_retry_exits() {
    let log = new_log();
    let runtime = losing_display_after(&log, 0);
    let mut platform = MockPlatform::new(log.clone(), 1, [Plan::Connect(runtime)]);

    supervise(&mut platform, &test_config()).unwrap();
    assert_eq!(platform.connects, 1);
}

#[test]
fn fatal_errors_are_not_retried() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    runtime
        .submits
        .push_back(Err(Error::Graphics("device removed".into())));
    let mut platform = MockPlatform::new(log.clone(), 10, [Plan::Connect(runtime)]);

    let err = supervise(&mut platform, &test_config()).unwrap_err();
    assert!(matches!(err, Error::Graphics(_)));
    assert_eq!(platform.connects, 1);
}

#[test]
fn runtime_exit_request_ends_the_program() {
    let log = new_log();
    let mut runtime = MockRuntime::new(log.clone());
    runtime
        .statuses
        .extend([SessionStatus::Running, SessionStatus::Exiting]);
    let mut platform = MockPlatform::new(log.clone(), 10, [Plan::Connect(runtime)]);

    supervise(&mut platform, &test_config()).unwrap();
    assert_eq!(platform.connects, 1);
    assert_eq!(presented(&log), 1);
    // Window still open: the exit came from the runtime.
    assert_eq!(platform.open_for, 8);
}

#[test]
fn ring_mismatch_on_reconnect_is_fatal() {
    let log = new_log();
    let mut short_ring = MockRuntime::new(log.clone());
    short_ring.ring_length = 2;
    let mut platform = MockPlatform::new(
        log.clone(),
        10,
        [
            Plan::Connect(losing_display_after(&log, 0)),
            Plan::Connect(short_ring),
        ],
    );

    let err = supervise(&mut platform, &test_config()).unwrap_err();
    assert!(matches!(err, Error::RingLengthMismatch { actual: 2, .. }));
    assert_eq!(platform.connects, 2);
}
