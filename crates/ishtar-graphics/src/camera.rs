//! First-person camera.
//!
//! Pure CPU state: accumulated yaw/pitch plus a position, from which an
//! orthonormal basis is rederived after every orientation change. No I/O —
//! the runtime feeds it keyboard displacement, mouse deltas, and scroll.

use glam::{Mat4, Vec3};

/// Movement direction for keyboard displacement.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CameraMovement {
    Forward,
    Backward,
    Left,
    Right,
}

pub const DEFAULT_YAW: f32 = -90.0;
pub const DEFAULT_PITCH: f32 = 0.0;
pub const DEFAULT_SPEED: f32 = 2.5;
pub const DEFAULT_SENSITIVITY: f32 = 0.1;
pub const DEFAULT_ZOOM: f32 = 45.0;

/// Pitch is kept strictly inside ±90° so the basis never degenerates at the
/// poles.
const PITCH_LIMIT: f32 = 89.0;

const ZOOM_MIN: f32 = 1.0;
const ZOOM_MAX: f32 = 45.0;

/// A fly-style first-person camera.
///
/// Invariant: `front`, `right`, and `up` are mutually orthonormal and are
/// always derived from (yaw, pitch, world_up) — they are never stored
/// independently of an orientation update.
#[derive(Debug, Clone)]
pub struct FpsCamera {
    pub position: Vec3,
    front: Vec3,
    up: Vec3,
    right: Vec3,
    world_up: Vec3,

    yaw: f32,
    pitch: f32,

    pub movement_speed: f32,
    pub mouse_sensitivity: f32,
    zoom: f32,
}

impl FpsCamera {
    /// Camera at `position` with the default orientation (looking down −Z).
    pub fn new(position: Vec3) -> Self {
        Self::with_orientation(position, Vec3::Y, DEFAULT_YAW, DEFAULT_PITCH)
    }

    pub fn with_orientation(position: Vec3, world_up: Vec3, yaw: f32, pitch: f32) -> Self {
        let mut camera = Self {
            position,
            front: Vec3::NEG_Z,
            up: Vec3::Y,
            right: Vec3::X,
            world_up,
            yaw,
            pitch,
            movement_speed: DEFAULT_SPEED,
            mouse_sensitivity: DEFAULT_SENSITIVITY,
            zoom: DEFAULT_ZOOM,
        };
        camera.update_basis();
        camera
    }

    /// Displaces the camera along its front or right axis by
    /// `movement_speed * dt`.
    pub fn move_keyboard(&mut self, direction: CameraMovement, dt: f32) {
        let velocity = self.movement_speed * dt;
        match direction {
            CameraMovement::Forward => self.position += self.front * velocity,
            CameraMovement::Backward => self.position -= self.front * velocity,
            CameraMovement::Right => self.position += self.right * velocity,
            CameraMovement::Left => self.position -= self.right * velocity,
        }
    }

    /// Applies a mouse delta to yaw/pitch and rederives the basis.
    ///
    /// `dx` turns right, `dy` looks up. With `constrain_pitch` the pitch is
    /// clamped to ±89°; without it the caller accepts a flipping basis near
    /// the poles.
    pub fn look_mouse(&mut self, dx: f32, dy: f32, constrain_pitch: bool) {
        self.yaw += dx * self.mouse_sensitivity;
        self.pitch += dy * self.mouse_sensitivity;

        if constrain_pitch {
            self.pitch = self.pitch.clamp(-PITCH_LIMIT, PITCH_LIMIT);
        }

        self.update_basis();
    }

    /// Zooms by narrowing/widening the field of view, clamped to [1°, 45°].
    pub fn scroll_zoom(&mut self, dy: f32) {
        self.zoom = (self.zoom - dy).clamp(ZOOM_MIN, ZOOM_MAX);
    }

    /// View transform for (position, position + front, up).
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.position + self.front, self.up)
    }

    /// Perspective projection using the current zoom as vertical FOV.
    pub fn projection_matrix(&self, aspect: f32, z_near: f32, z_far: f32) -> Mat4 {
        Mat4::perspective_rh(self.zoom.to_radians(), aspect, z_near, z_far)
    }

    pub fn front(&self) -> Vec3 {
        self.front
    }

    pub fn up(&self) -> Vec3 {
        self.up
    }

    pub fn right(&self) -> Vec3 {
        self.right
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    /// Vertical field of view in degrees.
    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    fn update_basis(&mut self) {
        let (yaw, pitch) = (self.yaw.to_radians(), self.pitch.to_radians());

        let front = Vec3::new(
            yaw.cos() * pitch.cos(),
            pitch.sin(),
            yaw.sin() * pitch.cos(),
        );

        self.front = front.normalize();
        self.right = self.front.cross(self.world_up).normalize();
        self.up = self.right.cross(self.front).normalize();
    }
}

impl Default for FpsCamera {
    fn default() -> Self {
        Self::new(Vec3::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    fn assert_orthonormal(camera: &FpsCamera) {
        assert!((camera.front().length() - 1.0).abs() < EPS, "front not unit");
        assert!((camera.right().length() - 1.0).abs() < EPS, "right not unit");
        assert!((camera.up().length() - 1.0).abs() < EPS, "up not unit");

        assert!(camera.front().dot(camera.right()).abs() < EPS);
        assert!(camera.front().dot(camera.up()).abs() < EPS);
        assert!(camera.right().dot(camera.up()).abs() < EPS);
    }

    // ── basis invariant ───────────────────────────────────────────────────

    #[test]
    fn default_orientation_looks_down_negative_z() {
        let camera = FpsCamera::new(Vec3::ZERO);
        assert!((camera.front() - Vec3::NEG_Z).length() < EPS);
        assert_orthonormal(&camera);
    }

    #[test]
    fn basis_stays_orthonormal_across_the_pitch_range() {
        for yaw_step in 0..12 {
            for pitch_step in -8..=8 {
                let camera = FpsCamera::with_orientation(
                    Vec3::ZERO,
                    Vec3::Y,
                    yaw_step as f32 * 30.0,
                    pitch_step as f32 * 11.0, // within ±88°
                );
                assert_orthonormal(&camera);
            }
        }
    }

    #[test]
    fn look_rederives_the_basis() {
        let mut camera = FpsCamera::new(Vec3::ZERO);
        camera.look_mouse(350.0, 120.0, true);
        assert_orthonormal(&camera);
    }

    // ── pitch clamping ────────────────────────────────────────────────────

    #[test]
    fn constrained_pitch_stops_exactly_at_the_limit() {
        let mut camera = FpsCamera::new(Vec3::ZERO);
        // sensitivity 0.1 → a 10_000-unit delta asks for 1000° of pitch.
        camera.look_mouse(0.0, 10_000.0, true);
        assert_eq!(camera.pitch(), 89.0);

        camera.look_mouse(0.0, -100_000.0, true);
        assert_eq!(camera.pitch(), -89.0);
    }

    #[test]
    fn unconstrained_pitch_may_exceed_the_limit() {
        let mut camera = FpsCamera::new(Vec3::ZERO);
        camera.look_mouse(0.0, 2_000.0, false);
        assert!(camera.pitch() > 89.0);
    }

    // ── zoom clamping ─────────────────────────────────────────────────────

    #[test]
    fn zoom_clamps_to_bounds_exactly() {
        let mut camera = FpsCamera::new(Vec3::ZERO);

        camera.scroll_zoom(100.0);
        assert_eq!(camera.zoom(), 1.0);

        camera.scroll_zoom(-500.0);
        assert_eq!(camera.zoom(), 45.0);
    }

    #[test]
    fn zoom_accumulates_inside_bounds() {
        let mut camera = FpsCamera::new(Vec3::ZERO);
        camera.scroll_zoom(5.0);
        assert_eq!(camera.zoom(), 40.0);
        camera.scroll_zoom(-2.5);
        assert_eq!(camera.zoom(), 42.5);
    }

    // ── view matrix ───────────────────────────────────────────────────────

    #[test]
    fn view_matrix_is_stable_without_mutation() {
        let mut camera = FpsCamera::new(Vec3::new(0.0, 0.0, 3.0));
        camera.look_mouse(37.0, -12.0, true);

        let a = camera.view_matrix();
        let b = camera.view_matrix();
        assert_eq!(a, b);
    }

    #[test]
    fn view_matrix_moves_world_opposite_to_position() {
        let camera = FpsCamera::new(Vec3::new(0.0, 0.0, 3.0));
        let view = camera.view_matrix();

        // The camera sits at +3Z looking down −Z: a point at the origin
        // lands 3 units in front (−Z in view space).
        let p = view.transform_point3(Vec3::ZERO);
        assert!((p - Vec3::new(0.0, 0.0, -3.0)).length() < EPS);
    }

    // ── keyboard displacement ─────────────────────────────────────────────

    #[test]
    fn forward_moves_along_front() {
        let mut camera = FpsCamera::new(Vec3::ZERO);
        camera.move_keyboard(CameraMovement::Forward, 2.0);
        // speed 2.5 * dt 2.0 along −Z.
        assert!((camera.position - Vec3::new(0.0, 0.0, -5.0)).length() < EPS);
    }

    #[test]
    fn left_and_right_cancel() {
        let mut camera = FpsCamera::new(Vec3::new(1.0, 2.0, 3.0));
        camera.move_keyboard(CameraMovement::Left, 0.5);
        camera.move_keyboard(CameraMovement::Right, 0.5);
        assert!((camera.position - Vec3::new(1.0, 2.0, 3.0)).length() < EPS);
    }
}
