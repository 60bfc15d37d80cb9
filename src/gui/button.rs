//! Gaze-activated buttons placed on a sphere around the viewer
//!
//! A button is hit when the gaze direction falls inside its angular box.
//! Delayed-trigger buttons fire once after the gaze dwells for
//! [`ACTIVATION_DELAY`]; auto-repeat buttons fire on entry and then again every
//! [`ACTIVATION_DELAY`] while the gaze stays inside.

use std::time::{Duration, Instant};

use glam::Vec3;

use crate::mesh::TexturedMesh;

/// Dwell time before a delayed button fires, and the auto-repeat interval
pub const ACTIVATION_DELAY: Duration = Duration::from_secs(3);

/// Side length of the button atlas in pixels
const BUTTON_TEXTURE_SIZE: f32 = 1024.0;
/// Footprint of one button face inside its 256px atlas cell
const BUTTON_FACE_SIZE: f32 = 255.0;

/// Action identifiers; the codes match the host-side controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ButtonAction {
    #[default]
    None = 0,
    Recenter2d = 1,
    RecenterYaw = 2,
    VolumeDown = 3,
    VolumeUp = 4,
    OpenFile = 5,
    Play = 6,
    Back = 7,
    Forward = 8,
    Rewind = 9,
    Pause = 10,
}

impl ButtonAction {
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn is_none(self) -> bool {
        self == ButtonAction::None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonBehavior {
    /// Fires once after the gaze dwells past the activation delay
    DelayedTrigger,
    /// Fires on entry, then every activation delay while held
    AutoRepeat,
}

/// Spherical coordinates (azimuth `theta`, elevation `phi`) to a point at distance `r`.
/// `theta == PI` points down -Z.
pub fn spherical_to_cartesian(theta: f32, phi: f32, r: f32) -> Vec3 {
    Vec3::new(r * phi.cos() * theta.sin(), r * phi.sin(), r * phi.cos() * theta.cos())
}

#[derive(Debug, Clone)]
pub struct GuiButton {
    center_theta: f32,
    center_phi: f32,
    size_alpha: f32,
    action: ButtonAction,
    behavior: ButtonBehavior,
    vertex_pos: [f32; 12],
    vertex_uv: [f32; 8],

    visible: bool,
    waiting_for_activation: bool,
    activation_deadline: Option<Instant>,
    // Delayed buttons stay quiet after firing until the gaze leaves
    fired_while_inside: bool,
}

impl GuiButton {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        center_theta: f32,
        center_phi: f32,
        center_distance: f32,
        size_alpha: f32,
        texture_x: u32,
        texture_y: u32,
        action: ButtonAction,
        behavior: ButtonBehavior,
        visible: bool,
    ) -> Self {
        Self {
            center_theta,
            center_phi,
            size_alpha,
            action,
            behavior,
            vertex_pos: compute_vertex_pos(center_theta, center_phi, center_distance, size_alpha),
            vertex_uv: compute_texture_pos(texture_x, texture_y),
            visible,
            waiting_for_activation: false,
            activation_deadline: None,
            fired_while_inside: false,
        }
    }

    pub fn action(&self) -> ButtonAction {
        self.action
    }

    pub fn behavior(&self) -> ButtonBehavior {
        self.behavior
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Hiding a button also drops any pending activation
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if !visible {
            self.disarm();
        }
    }

    /// Shows the button as if it had just fired under the current gaze, so it
    /// stays quiet until the gaze leaves
    pub fn show_latched(&mut self) {
        self.visible = true;
        self.waiting_for_activation = false;
        self.activation_deadline = None;
        self.fired_while_inside = true;
    }

    pub fn is_waiting_for_activation(&self) -> bool {
        self.waiting_for_activation
    }

    pub fn activation_deadline(&self) -> Option<Instant> {
        self.activation_deadline
    }

    pub fn vertex_positions(&self) -> &[f32; 12] {
        &self.vertex_pos
    }

    pub fn vertex_uvs(&self) -> &[f32; 8] {
        &self.vertex_uv
    }

    /// Quad mesh for GPU upload
    pub fn to_mesh(&self) -> TexturedMesh {
        TexturedMesh::new(6, self.vertex_pos.to_vec(), self.vertex_uv.to_vec(), vec![0, 2, 1, 0, 3, 2])
    }

    /// Is the view direction inside the button's angular box?
    pub fn contains(&self, view_theta: f32, view_phi: f32) -> bool {
        (view_theta - self.center_theta).abs() * 2.0 < self.size_alpha
            && (view_phi - self.center_phi).abs() * 2.0 < self.size_alpha
    }

    /// Feeds one frame of gaze direction, returning the action to execute (if any)
    pub fn evaluate_possible_hit(&mut self, view_theta: f32, view_phi: f32, now: Instant) -> ButtonAction {
        if !self.visible {
            return ButtonAction::None;
        }

        if self.contains(view_theta, view_phi) {
            self.evaluate_hit(now)
        } else {
            self.disarm();
            ButtonAction::None
        }
    }

    fn evaluate_hit(&mut self, now: Instant) -> ButtonAction {
        if self.waiting_for_activation {
            match self.activation_deadline {
                Some(deadline) if now < deadline => ButtonAction::None,
                _ => self.do_trigger_button(now),
            }
        } else if self.fired_while_inside {
            ButtonAction::None
        } else {
            self.do_enter_button(now)
        }
    }

    fn do_enter_button(&mut self, now: Instant) -> ButtonAction {
        match self.behavior {
            ButtonBehavior::AutoRepeat => self.do_trigger_button(now),
            ButtonBehavior::DelayedTrigger => {
                self.waiting_for_activation = true;
                self.activation_deadline = Some(now + ACTIVATION_DELAY);
                ButtonAction::None
            }
        }
    }

    fn do_trigger_button(&mut self, now: Instant) -> ButtonAction {
        match self.behavior {
            ButtonBehavior::AutoRepeat => {
                self.waiting_for_activation = true;
                self.activation_deadline = Some(now + ACTIVATION_DELAY);
            }
            ButtonBehavior::DelayedTrigger => {
                self.waiting_for_activation = false;
                self.activation_deadline = None;
                self.fired_while_inside = true;
            }
        }
        log::debug!("GuiButton: {:?} triggered", self.action);
        self.action
    }

    /// Drops any pending activation, as if the gaze had left
    pub fn disarm(&mut self) {
        self.waiting_for_activation = false;
        self.activation_deadline = None;
        self.fired_while_inside = false;
    }
}

/// Four corners, counter-clockwise from top-left as seen from the center
fn compute_vertex_pos(center_theta: f32, center_phi: f32, center_distance: f32, size_alpha: f32) -> [f32; 12] {
    let half = size_alpha / 2.0;
    // corners sit on the same sphere as the center
    let r = center_distance / half.cos();

    let corners = [
        spherical_to_cartesian(center_theta + half, center_phi + half, r),
        spherical_to_cartesian(center_theta - half, center_phi + half, r),
        spherical_to_cartesian(center_theta - half, center_phi - half, r),
        spherical_to_cartesian(center_theta + half, center_phi - half, r),
    ];

    let mut pos = [0.0; 12];
    for (slot, corner) in pos.chunks_exact_mut(3).zip(corners) {
        slot.copy_from_slice(&corner.to_array());
    }
    pos
}

fn compute_texture_pos(texture_x: u32, texture_y: u32) -> [f32; 8] {
    let u0 = texture_x as f32 / BUTTON_TEXTURE_SIZE;
    let v0 = texture_y as f32 / BUTTON_TEXTURE_SIZE;
    let u1 = (texture_x as f32 + BUTTON_FACE_SIZE) / BUTTON_TEXTURE_SIZE;
    let v1 = (texture_y as f32 + BUTTON_FACE_SIZE) / BUTTON_TEXTURE_SIZE;
    [u0, v0, u1, v0, u1, v1, u0, v1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SIZE: f32 = 7.0 * PI / 180.0;

    fn button(behavior: ButtonBehavior) -> GuiButton {
        GuiButton::new(PI, 0.0, 1.98, SIZE, 256, 0, ButtonAction::VolumeUp, behavior, true)
    }

    #[test]
    fn hidden_button_never_fires() {
        let mut b = button(ButtonBehavior::AutoRepeat);
        b.set_visible(false);
        assert_eq!(b.evaluate_possible_hit(PI, 0.0, Instant::now()), ButtonAction::None);
        assert!(!b.is_waiting_for_activation());
    }

    #[test]
    fn hit_region_is_a_box_not_a_disk() {
        let b = button(ButtonBehavior::DelayedTrigger);
        let corner = SIZE / 2.0 * 0.95;
        assert!(b.contains(PI + corner, corner));
        assert!(!b.contains(PI + SIZE / 2.0 * 1.01, 0.0));
        assert!(!b.contains(PI, -SIZE));
    }

    #[test]
    fn leaving_disarms_delayed_button() {
        let start = Instant::now();
        let mut b = button(ButtonBehavior::DelayedTrigger);
        assert_eq!(b.evaluate_possible_hit(PI, 0.0, start), ButtonAction::None);
        assert!(b.is_waiting_for_activation());
        assert_eq!(b.activation_deadline(), Some(start + ACTIVATION_DELAY));

        b.evaluate_possible_hit(PI + 1.0, 0.0, start + Duration::from_secs(1));
        assert!(!b.is_waiting_for_activation());
        assert_eq!(b.activation_deadline(), None);
    }

    #[test]
    fn latched_button_waits_for_the_gaze_to_leave() {
        let start = Instant::now();
        let mut b = button(ButtonBehavior::DelayedTrigger);
        b.set_visible(false);
        b.show_latched();
        assert!(b.is_visible());

        for secs in [0, 3, 6, 9] {
            let now = start + Duration::from_secs(secs);
            assert_eq!(b.evaluate_possible_hit(PI, 0.0, now), ButtonAction::None);
        }

        let away = start + Duration::from_secs(10);
        b.evaluate_possible_hit(PI + 1.0, 0.0, away);
        assert_eq!(b.evaluate_possible_hit(PI, 0.0, away), ButtonAction::None);
        assert!(b.is_waiting_for_activation());
        assert_eq!(b.evaluate_possible_hit(PI, 0.0, away + ACTIVATION_DELAY), ButtonAction::VolumeUp);
    }

    #[test]
    fn corners_share_the_center_distance_sphere() {
        let b = button(ButtonBehavior::DelayedTrigger);
        let expected = 1.98 / (SIZE / 2.0).cos();
        for corner in b.vertex_positions().chunks_exact(3) {
            let r = Vec3::from_slice(corner).length();
            assert!((r - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn center_faces_forward_at_theta_pi() {
        let p = spherical_to_cartesian(PI, 0.0, 2.0);
        assert!(p.x.abs() < 1e-6);
        assert!((p.z + 2.0).abs() < 1e-6);
        assert!(spherical_to_cartesian(PI, 0.5, 1.0).y > 0.0);
    }

    #[test]
    fn texture_cell_maps_into_atlas() {
        let b = button(ButtonBehavior::DelayedTrigger);
        let uv = b.vertex_uvs();
        assert_eq!(uv[0], 0.25);
        assert_eq!(uv[1], 0.0);
        assert_eq!(uv[2], (256.0 + 255.0) / 1024.0);
        assert_eq!(b.to_mesh().vertex_count(), 6);
    }
}
