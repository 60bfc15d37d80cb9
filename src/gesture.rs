//! Head angles from the view matrix and the look-up gesture that toggles the menu

use glam::{Mat4, Vec3};

/// Yaw and pitch of the gaze, radians. Positive yaw turns left, positive pitch looks up.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HeadAngles {
    pub yaw: f32,
    pub pitch: f32,
}

impl HeadAngles {
    /// Derives angles from a world-to-head view rotation. Close to vertical
    /// the yaw is meaningless, so above `gimbal_guard` it keeps `previous_yaw`.
    pub fn from_view(view: &Mat4, previous_yaw: f32, gimbal_guard: f32) -> Self {
        // Gaze in world space: the transposed rotation is head-to-world
        let forward = view.transpose().transform_vector3(Vec3::NEG_Z);
        let pitch = forward.y.clamp(-1.0, 1.0).asin();
        let yaw = if pitch.abs() > gimbal_guard {
            previous_yaw
        } else {
            (-forward.x).atan2(-forward.z)
        };
        Self { yaw, pitch }
    }
}

/// Look-up gesture with hysteresis: fires once when pitch rises above
/// `up_threshold`, then stays latched until pitch drops below `return_threshold`.
#[derive(Debug, Clone)]
pub struct GestureLatch {
    up_threshold: f32,
    return_threshold: f32,
    latched: bool,
}

impl GestureLatch {
    pub fn new(up_threshold: f32, return_threshold: f32) -> Self {
        debug_assert!(return_threshold < up_threshold);
        Self {
            up_threshold,
            return_threshold,
            latched: false,
        }
    }

    pub fn is_latched(&self) -> bool {
        self.latched
    }

    /// Returns true on the frame the gesture fires
    pub fn update(&mut self, pitch: f32) -> bool {
        if self.latched {
            if pitch < self.return_threshold {
                self.latched = false;
            }
            false
        } else if pitch > self.up_threshold {
            self.latched = true;
            true
        } else {
            false
        }
    }
}
