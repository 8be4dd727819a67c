use cgmath::{Matrix4, Rad};
use instant::Duration;
use winit::{
    dpi::PhysicalPosition,
    event::{DeviceId, ElementState, MouseButton, WindowEvent},
};

use hdri_viewer::{
    lifecycle::{LifecycleAction, SurfaceState},
    viewer::FrameOutcome,
};

use crate::common::test_utils::Harness;

mod common;

const FRAME: Duration = Duration::from_millis(16);

#[test]
fn faulty_frames_do_not_stop_the_loop() {
    let mut harness = Harness::spinning_cube();
    harness.knobs.fail_frames.set(3);

    let outcomes: Vec<_> = (0..5)
        .map(|_| harness.viewer.frame(&harness.scheduler, FRAME))
        .collect();

    assert_eq!(
        outcomes,
        vec![
            FrameOutcome::Faulted,
            FrameOutcome::Faulted,
            FrameOutcome::Faulted,
            FrameOutcome::Rendered,
            FrameOutcome::Rendered,
        ]
    );
    // one from startup, then one per frame
    assert_eq!(harness.scheduler.requests(), 6);
    assert_eq!(harness.viewer.faults(), 3);
    assert_eq!(harness.viewer.frames(), 2);
    assert_eq!(harness.journal.count("render "), 2);
}

#[test]
fn cube_rotation_follows_elapsed_time() {
    let mut harness = Harness::spinning_cube();
    harness.viewer.frame(&harness.scheduler, Duration::from_millis(500));
    harness.viewer.frame(&harness.scheduler, Duration::from_millis(500));

    let cube = harness.viewer.scene().find("cube").unwrap();
    let expected = Matrix4::from_angle_x(Rad(1.0f32)) * Matrix4::from_angle_y(Rad(1.0f32));
    let actual: [[f32; 4]; 4] = cube.transform.into();
    let expected: [[f32; 4]; 4] = expected.into();
    for (a, e) in actual.iter().flatten().zip(expected.iter().flatten()) {
        assert!((a - e).abs() < 1e-5, "{actual:?} != {expected:?}");
    }
}

#[test]
fn lost_surface_skips_draws_but_keeps_scheduling() {
    let mut harness = Harness::showcase();
    harness.knobs.lost.set(true);

    assert_eq!(harness.viewer.frame(&harness.scheduler, FRAME), FrameOutcome::Skipped);
    assert_eq!(harness.viewer.lifecycle().state(), SurfaceState::Lost);
    assert_eq!(harness.viewer.lifecycle().losses(), 1);

    for _ in 0..3 {
        assert_eq!(harness.viewer.frame(&harness.scheduler, FRAME), FrameOutcome::Skipped);
    }
    assert_eq!(harness.scheduler.requests(), 5);
    assert_eq!(harness.journal.count("render "), 0);
    assert_eq!(harness.viewer.faults(), 0);
    assert_eq!(harness.viewer.lifecycle().losses(), 1);
}

#[test]
fn recovered_surface_asks_for_a_reload() {
    let mut harness = Harness::showcase();
    harness.knobs.lost.set(true);
    harness.viewer.frame(&harness.scheduler, FRAME);

    harness.knobs.recovers.set(true);
    assert_eq!(harness.viewer.frame(&harness.scheduler, FRAME), FrameOutcome::Reload);
}

#[test]
fn host_signals_drive_the_lifecycle() {
    let mut harness = Harness::showcase();

    assert_eq!(harness.viewer.on_surface_restored(), LifecycleAction::None);

    harness.viewer.on_surface_lost();
    harness.viewer.on_surface_lost();
    assert_eq!(harness.viewer.lifecycle().losses(), 1);
    assert_eq!(harness.viewer.frame(&harness.scheduler, FRAME), FrameOutcome::Skipped);
    assert_eq!(harness.journal.count("render "), 0);

    assert_eq!(harness.viewer.on_surface_restored(), LifecycleAction::Reload);
}

#[test]
fn frames_render_without_any_assets() {
    let mut harness = Harness::showcase();
    assert_eq!(harness.viewer.frame(&harness.scheduler, FRAME), FrameOutcome::Rendered);
    assert_eq!(
        harness.journal.entries().last().map(String::as_str),
        Some("render 0 renderables, environment: false")
    );
}

#[test]
fn outdated_surface_drops_the_frame_without_counting_it() {
    let mut harness = Harness::showcase();
    harness.knobs.outdated_frames.set(2);

    assert_eq!(harness.viewer.frame(&harness.scheduler, FRAME), FrameOutcome::Skipped);
    assert_eq!(harness.viewer.frame(&harness.scheduler, FRAME), FrameOutcome::Skipped);
    assert_eq!(harness.viewer.frame(&harness.scheduler, FRAME), FrameOutcome::Rendered);

    assert_eq!(harness.viewer.frames(), 1);
    assert_eq!(harness.viewer.faults(), 0);
    assert_eq!(harness.viewer.lifecycle().state(), SurfaceState::Active);
    assert_eq!(harness.journal.count("render "), 1);
}

fn device() -> DeviceId {
    // SAFETY: the id is only compared, never handed back to winit.
    unsafe { DeviceId::dummy() }
}

fn drag(harness: &mut Harness, from: (f64, f64), to: (f64, f64)) {
    for event in [
        WindowEvent::CursorMoved {
            device_id: device(),
            position: PhysicalPosition::new(from.0, from.1),
        },
        WindowEvent::MouseInput {
            device_id: device(),
            state: ElementState::Pressed,
            button: MouseButton::Left,
        },
        WindowEvent::CursorMoved {
            device_id: device(),
            position: PhysicalPosition::new(to.0, to.1),
        },
        WindowEvent::MouseInput {
            device_id: device(),
            state: ElementState::Released,
            button: MouseButton::Left,
        },
    ] {
        harness.viewer.handle_window_event(&event);
    }
}

#[test]
fn drag_moves_the_camera_on_the_next_frames() {
    let mut harness = Harness::showcase();
    let start = harness.viewer.camera().position;
    let distance = harness.viewer.camera().distance();

    drag(&mut harness, (100.0, 100.0), (160.0, 100.0));
    // input alone does not move the camera
    assert_eq!(harness.viewer.camera().position, start);
    assert!(harness.viewer.controls().unwrap().is_settling());

    harness.viewer.frame(&harness.scheduler, FRAME);
    let first = harness.viewer.camera().position;
    assert_ne!(first, start);

    // damping keeps the camera moving after the drag ended
    harness.viewer.frame(&harness.scheduler, FRAME);
    let second = harness.viewer.camera().position;
    assert_ne!(second, first);

    assert!((harness.viewer.camera().distance() - distance).abs() < 1e-3);
}

#[test]
fn input_is_ignored_when_controls_are_disabled() {
    let mut harness = Harness::spinning_cube();
    let start = harness.viewer.camera().position;

    drag(&mut harness, (100.0, 100.0), (400.0, 100.0));
    harness.viewer.frame(&harness.scheduler, FRAME);

    assert!(harness.viewer.controls().is_none());
    assert_eq!(harness.viewer.camera().position, start);
}
