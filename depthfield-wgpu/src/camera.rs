//! Orbit camera driven by raw pointer samples.
//!
//! Pointer events only record positions. [`OrbitCamera::update`] runs once at
//! the start of every tick, eases a follow point toward the latest sample and
//! rotates the drag-origin position about the look-at target by the eased
//! offset. Releasing the pointer leaves the camera where it is.

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::config::CameraConfig;

/// Fraction of the remaining distance the follow point covers per update.
pub const DAMPING: f32 = 0.15;
/// Radians of orbit per pixel of pointer travel.
pub const ROTATE_SPEED: f32 = 0.005;
/// Highest elevation above or below the target's horizon; keeps the view
/// from flipping over the pole.
pub const MAX_ELEVATION: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragState {
    Idle,
    Dragging {
        start: Vec2,
        origin_position: Vec3,
        follow: Vec2,
    },
}

#[derive(Clone, Debug)]
pub struct OrbitCamera {
    position: Vec3,
    target: Vec3,
    z_near: f32,
    z_far: f32,
    fov_y: f32,
    aspect: f32,
    state: DragState,
    latest: Vec2,
}

impl OrbitCamera {
    pub fn new(config: &CameraConfig, aspect: f32) -> Self {
        Self {
            position: config.position,
            target: config.target,
            z_near: config.z_near,
            z_far: config.z_far,
            fov_y: config.fov_y,
            aspect,
            state: DragState::Idle,
            latest: Vec2::ZERO,
        }
    }

    pub fn pointer_down(&mut self, x: f32, y: f32) {
        let start = Vec2::new(x, y);
        self.latest = start;
        self.state = DragState::Dragging {
            start,
            origin_position: self.position,
            follow: start,
        };
    }

    pub fn pointer_move(&mut self, x: f32, y: f32) {
        self.latest = Vec2::new(x, y);
    }

    pub fn pointer_up(&mut self) {
        self.state = DragState::Idle;
    }

    pub fn update(&mut self) {
        let DragState::Dragging {
            start,
            origin_position,
            follow,
        } = &mut self.state
        else {
            return;
        };

        *follow += (self.latest - *follow) * DAMPING;
        let delta = *follow - *start;
        if delta == Vec2::ZERO {
            return;
        }

        let offset = *origin_position - self.target;
        // Positive pitch lowers the camera.
        let elevation = (offset.y / offset.length().max(f32::EPSILON)).clamp(-1.0, 1.0).asin();
        let yaw = -delta.x * ROTATE_SPEED;
        let pitch = (-delta.y * ROTATE_SPEED).clamp(elevation - MAX_ELEVATION, elevation + MAX_ELEVATION);

        let right = (-offset).cross(Vec3::Y).normalize_or_zero();
        let tilt = if right == Vec3::ZERO {
            Quat::IDENTITY
        } else {
            Quat::from_axis_angle(right, pitch)
        };
        self.position = self.target + Quat::from_rotation_y(yaw) * tilt * offset;
    }

    pub fn set_aspect(&mut self, aspect: f32) {
        self.aspect = aspect;
    }

    pub fn set_clip_planes(&mut self, z_near: f32, z_far: f32) {
        self.z_near = z_near;
        self.z_far = z_far;
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    /// Right-handed perspective with `[0, 1]` depth.
    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_y, self.aspect, self.z_near, self.z_far)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn z_near(&self) -> f32 {
        self.z_near
    }

    pub fn z_far(&self) -> f32 {
        self.z_far
    }

    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 1e-3;

    fn camera() -> OrbitCamera {
        OrbitCamera::new(&CameraConfig::default(), 800.0 / 600.0)
    }

    #[test]
    fn test_click_without_motion_keeps_position() {
        let mut cam = camera();
        let before = cam.position();
        cam.pointer_down(100.0, 100.0);
        cam.pointer_move(100.0, 100.0);
        cam.update();
        cam.pointer_up();
        cam.update();
        assert_eq!(cam.position(), before);
        assert_eq!(cam.state(), DragState::Idle);
    }

    #[test]
    fn test_follow_point_is_damped() {
        let mut cam = camera();
        cam.pointer_down(0.0, 0.0);
        cam.pointer_move(100.0, 0.0);
        cam.update();
        match cam.state() {
            DragState::Dragging { follow, .. } => {
                assert!((follow.x - 100.0 * DAMPING).abs() < EPSILON);
                assert_eq!(follow.y, 0.0);
            }
            DragState::Idle => panic!("expected drag"),
        }
    }

    #[test]
    fn test_horizontal_drag_orbits_about_target() {
        let mut cam = camera();
        let radius = cam.position().distance(cam.target());
        cam.pointer_down(0.0, 0.0);
        cam.pointer_move(-200.0, 0.0);
        for _ in 0..200 {
            cam.update();
        }

        // Converged: yaw = 200 px * ROTATE_SPEED = 1 rad about +Y.
        let expected = Quat::from_rotation_y(1.0) * Vec3::new(0.0, 0.0, 150.0);
        assert!(cam.position().distance(expected) < 0.1, "{:?}", cam.position());
        assert!((cam.position().distance(cam.target()) - radius).abs() < EPSILON);
        assert!(cam.position().y.abs() < EPSILON);
    }

    #[test]
    fn test_vertical_drag_pitches() {
        let mut cam = camera();
        cam.pointer_down(0.0, 0.0);
        cam.pointer_move(0.0, 100.0);
        for _ in 0..200 {
            cam.update();
        }
        assert!(cam.position().y.abs() > 1.0);
        assert!(cam.position().x.abs() < EPSILON);
        assert!((cam.position().length() - 150.0).abs() < EPSILON);
    }

    #[test]
    fn test_pitch_stops_short_of_pole() {
        for dy in [-5000.0, 5000.0] {
            let mut cam = camera();
            cam.pointer_down(0.0, 0.0);
            cam.pointer_move(0.0, dy);
            for _ in 0..300 {
                cam.update();
            }
            let offset = cam.position() - cam.target();
            let elevation = (offset.y / offset.length()).asin();
            assert!(elevation.abs() <= MAX_ELEVATION + EPSILON, "dy {dy}: {elevation}");
            assert!(offset.z > 0.0, "dy {dy}: flipped over the pole");
            assert!(cam.view().is_finite());
        }
    }

    #[test]
    fn test_release_stops_motion() {
        let mut cam = camera();
        cam.pointer_down(0.0, 0.0);
        cam.pointer_move(50.0, 0.0);
        cam.update();
        cam.pointer_up();
        let released = cam.position();
        cam.pointer_move(400.0, 300.0);
        cam.update();
        assert_eq!(cam.position(), released);
        assert!(!cam.is_dragging());
    }

    #[test]
    fn test_moves_without_press_are_ignored() {
        let mut cam = camera();
        let before = cam.position();
        cam.pointer_move(300.0, 10.0);
        cam.update();
        assert_eq!(cam.position(), before);
    }

    #[test]
    fn test_clip_planes_change_projection() {
        let mut cam = camera();
        let before = cam.projection();
        cam.set_clip_planes(10.0, 300.0);
        assert_ne!(cam.projection(), before);
        assert_eq!((cam.z_near(), cam.z_far()), (10.0, 300.0));
    }
}
