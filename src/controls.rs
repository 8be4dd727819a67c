//! Orbit-style interaction controller.
//!
//! Dragging with the primary mouse button (or a single finger) rotates the
//! camera around its target. Input only accumulates a pending spherical delta;
//! the camera moves in [`OrbitController::update`], which has to run once per
//! rendered frame. With damping enabled every update applies a fraction of the
//! pending delta and decays the rest, which gives the inertia after a drag ends.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Point3, Vector3};
use winit::{
    dpi::PhysicalPosition,
    event::{ElementState, MouseButton, MouseScrollDelta, TouchPhase, WindowEvent},
};

use crate::{camera::Camera, config::ControlSettings};

const EPS: f32 = 0.000_001;
const MIN_DELTA: f32 = 0.000_01;

/// Radius, polar angle (`phi`, from +y) and azimuth (`theta`, around +y).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Spherical {
    pub radius: f32,
    pub phi: f32,
    pub theta: f32,
}

impl Spherical {
    pub fn from_offset(offset: Vector3<f32>) -> Self {
        let radius = offset.magnitude();
        if radius == 0.0 {
            return Self::default();
        }
        Self {
            radius,
            theta: offset.x.atan2(offset.z),
            phi: (offset.y / radius).clamp(-1.0, 1.0).acos(),
        }
    }

    pub fn to_offset(self) -> Vector3<f32> {
        let sin_phi_radius = self.phi.sin() * self.radius;
        Vector3::new(
            sin_phi_radius * self.theta.sin(),
            self.phi.cos() * self.radius,
            sin_phi_radius * self.theta.cos(),
        )
    }

    fn make_safe(mut self) -> Self {
        self.phi = self.phi.clamp(EPS, PI - EPS);
        self
    }
}

#[derive(Debug)]
enum Drag {
    Idle,
    Mouse { last: Option<PhysicalPosition<f64>> },
    Touch { id: u64, last: PhysicalPosition<f64> },
}

#[derive(Debug)]
pub struct OrbitController {
    settings: ControlSettings,
    pending: Spherical,
    scale: f32,
    viewport_height: f32,
    drag: Drag,
    cursor: Option<PhysicalPosition<f64>>,
}

impl OrbitController {
    pub fn new(settings: ControlSettings, viewport_height: u32) -> Self {
        Self {
            settings,
            pending: Spherical::default(),
            scale: 1.0,
            viewport_height: viewport_height.max(1) as f32,
            drag: Drag::Idle,
            cursor: None,
        }
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn set_viewport_height(&mut self, height: u32) {
        self.viewport_height = height.max(1) as f32;
    }

    /// Queue a rotation for a pointer drag of `dx`/`dy` pixels.
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        let speed = self.settings.rotate_speed;
        self.pending.theta -= 2.0 * PI * dx * speed / self.viewport_height;
        self.pending.phi -= 2.0 * PI * dy * speed / self.viewport_height;
    }

    /// Positive steps move towards the target. Ignored while zoom is disabled.
    pub fn dolly(&mut self, steps: f32) {
        if !self.settings.enable_zoom {
            return;
        }
        self.scale *= 0.95_f32.powf(steps * self.settings.zoom_speed);
    }

    /// Whether there is still queued motion that future updates will apply.
    pub fn is_settling(&self) -> bool {
        self.pending.theta.abs() > MIN_DELTA || self.pending.phi.abs() > MIN_DELTA
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.drag = match state {
                    ElementState::Pressed => Drag::Mouse { last: self.cursor },
                    ElementState::Released => Drag::Idle,
                };
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = Some(*position);
                if let Drag::Mouse { last } = &mut self.drag {
                    if let Some(previous) = last.replace(*position) {
                        let dx = (position.x - previous.x) as f32;
                        let dy = (position.y - previous.y) as f32;
                        self.rotate(dx, dy);
                    }
                    return true;
                }
                false
            }
            WindowEvent::CursorLeft { .. } => {
                self.cursor = None;
                false
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let steps = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(position) => position.y as f32 / 100.0,
                };
                self.dolly(steps);
                self.settings.enable_zoom
            }
            WindowEvent::Touch(touch) => match touch.phase {
                TouchPhase::Started => {
                    if !matches!(self.drag, Drag::Idle) {
                        return false;
                    }
                    self.drag = Drag::Touch {
                        id: touch.id,
                        last: touch.location,
                    };
                    true
                }
                TouchPhase::Moved => {
                    let Drag::Touch { id, last } = &mut self.drag else {
                        return false;
                    };
                    if *id != touch.id {
                        return false;
                    }
                    let dx = (touch.location.x - last.x) as f32;
                    let dy = (touch.location.y - last.y) as f32;
                    *last = touch.location;
                    self.rotate(dx, dy);
                    true
                }
                TouchPhase::Ended | TouchPhase::Cancelled => match self.drag {
                    Drag::Touch { id, .. } if id == touch.id => {
                        self.drag = Drag::Idle;
                        true
                    }
                    _ => false,
                },
            },
            _ => false,
        }
    }

    /// Apply queued motion to `camera`. Returns whether the camera moved.
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        let offset = camera.position - camera.target;
        let mut spherical = Spherical::from_offset(offset);

        let factor = if self.settings.enable_damping {
            self.settings.damping_factor
        } else {
            1.0
        };
        spherical.theta += self.pending.theta * factor;
        spherical.phi += self.pending.phi * factor;
        spherical = spherical.make_safe();
        spherical.radius = (spherical.radius * self.scale).max(EPS);

        let position: Point3<f32> = camera.target + spherical.to_offset();
        let moved = (position - camera.position).magnitude2() > EPS * EPS;
        camera.position = position;

        if self.settings.enable_damping {
            self.pending.theta *= 1.0 - self.settings.damping_factor;
            self.pending.phi *= 1.0 - self.settings.damping_factor;
        } else {
            self.pending = Spherical::default();
        }
        self.scale = 1.0;
        moved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new((0.0, 0.0, 5.0), (0.0, 0.0, 0.0))
    }

    #[test]
    fn spherical_round_trips_offsets() {
        let offset = Vector3::new(1.0, 1.0, 5.0);
        let back = Spherical::from_offset(offset).to_offset();
        assert!((back - offset).magnitude() < 1e-4);
    }

    #[test]
    fn damping_spreads_a_drag_over_several_frames() {
        let mut controls = OrbitController::new(ControlSettings::default(), 600);
        let mut camera = camera();
        controls.rotate(100.0, 0.0);

        assert!(controls.update(&mut camera));
        let first = camera.position;
        assert!(controls.is_settling());
        assert!(controls.update(&mut camera));
        assert_ne!(first, camera.position);

        for _ in 0..1000 {
            controls.update(&mut camera);
        }
        assert!(!controls.is_settling());
        assert!((camera.distance() - 5.0).abs() < 1e-3);
    }

    #[test]
    fn without_updates_the_camera_stays_put() {
        let mut controls = OrbitController::new(ControlSettings::default(), 600);
        let camera = camera();
        controls.rotate(100.0, 50.0);
        assert_eq!(camera.position, Point3::new(0.0, 0.0, 5.0));
        assert!(controls.is_settling());
    }

    #[test]
    fn undamped_rotation_applies_at_once() {
        let settings = ControlSettings {
            enable_damping: false,
            ..Default::default()
        };
        let mut controls = OrbitController::new(settings, 600);
        let mut camera = camera();
        // Half the viewport height is a half turn.
        controls.rotate(300.0, 0.0);
        controls.update(&mut camera);
        assert!((camera.position.z + 5.0).abs() < 1e-3);
        assert!(!controls.is_settling());
    }

    #[test]
    fn zoom_is_ignored_when_disabled() {
        let mut controls = OrbitController::new(ControlSettings::default(), 600);
        let mut camera = camera();
        controls.dolly(10.0);
        controls.update(&mut camera);
        assert!((camera.distance() - 5.0).abs() < 1e-4);

        let mut controls = OrbitController::new(
            ControlSettings {
                enable_zoom: true,
                ..Default::default()
            },
            600,
        );
        controls.dolly(10.0);
        controls.update(&mut camera);
        assert!(camera.distance() < 5.0);
    }

    #[test]
    fn polar_angle_never_flips_over_the_pole() {
        let settings = ControlSettings {
            enable_damping: false,
            ..Default::default()
        };
        let mut controls = OrbitController::new(settings, 600);
        let mut camera = camera();
        controls.rotate(0.0, 10_000.0);
        controls.update(&mut camera);
        // Parked at the pole instead of wrapping around to the far side.
        assert!(camera.position.y > 4.99);
        assert!(camera.position.z >= 0.0);
    }

    mod input {
        use winit::event::{DeviceId, Touch};

        use super::*;

        fn device() -> DeviceId {
            // SAFETY: the id is only compared, never handed back to winit.
            unsafe { DeviceId::dummy() }
        }

        fn button(state: ElementState) -> WindowEvent {
            WindowEvent::MouseInput {
                device_id: device(),
                state,
                button: MouseButton::Left,
            }
        }

        fn cursor(x: f64, y: f64) -> WindowEvent {
            WindowEvent::CursorMoved {
                device_id: device(),
                position: PhysicalPosition::new(x, y),
            }
        }

        fn touch(id: u64, phase: TouchPhase, x: f64, y: f64) -> WindowEvent {
            WindowEvent::Touch(Touch {
                device_id: device(),
                phase,
                location: PhysicalPosition::new(x, y),
                force: None,
                id,
            })
        }

        fn wheel(lines: f32) -> WindowEvent {
            WindowEvent::MouseWheel {
                device_id: device(),
                delta: MouseScrollDelta::LineDelta(0.0, lines),
                phase: TouchPhase::Moved,
            }
        }

        fn undamped() -> OrbitController {
            let settings = ControlSettings {
                enable_damping: false,
                ..Default::default()
            };
            OrbitController::new(settings, 600)
        }

        #[test]
        fn mouse_drag_rotates_around_the_target() {
            let mut controls = undamped();
            let mut camera = camera();

            assert!(!controls.handle_window_event(&cursor(100.0, 100.0)));
            assert!(!controls.is_settling());

            assert!(controls.handle_window_event(&button(ElementState::Pressed)));
            assert!(controls.handle_window_event(&cursor(400.0, 100.0)));
            assert!(controls.is_settling());

            assert!(controls.update(&mut camera));
            assert!((camera.position.z + 5.0).abs() < 1e-3);

            assert!(controls.handle_window_event(&button(ElementState::Released)));
            assert!(!controls.handle_window_event(&cursor(500.0, 300.0)));
            assert!(!controls.is_settling());
            assert!(!controls.update(&mut camera));
        }

        #[test]
        fn touch_drag_follows_the_first_finger_only() {
            let mut controls = undamped();
            let mut camera = camera();

            assert!(controls.handle_window_event(&touch(1, TouchPhase::Started, 0.0, 0.0)));
            assert!(!controls.handle_window_event(&touch(2, TouchPhase::Started, 50.0, 50.0)));
            assert!(!controls.handle_window_event(&touch(2, TouchPhase::Moved, 300.0, 50.0)));
            assert!(!controls.is_settling());

            assert!(controls.handle_window_event(&touch(1, TouchPhase::Moved, 300.0, 0.0)));
            assert!(controls.update(&mut camera));
            assert!((camera.position.z + 5.0).abs() < 1e-3);

            assert!(controls.handle_window_event(&touch(1, TouchPhase::Ended, 300.0, 0.0)));
            assert!(!controls.handle_window_event(&touch(1, TouchPhase::Moved, 600.0, 0.0)));
            assert!(!controls.is_settling());
        }

        #[test]
        fn wheel_only_zooms_when_enabled() {
            let mut camera = camera();

            let mut controls = OrbitController::new(ControlSettings::default(), 600);
            assert!(!controls.handle_window_event(&wheel(5.0)));
            controls.update(&mut camera);
            assert!((camera.distance() - 5.0).abs() < 1e-4);

            let mut controls = OrbitController::new(
                ControlSettings {
                    enable_zoom: true,
                    ..Default::default()
                },
                600,
            );
            assert!(controls.handle_window_event(&wheel(5.0)));
            controls.update(&mut camera);
            assert!(camera.distance() < 5.0);
        }
    }
}
