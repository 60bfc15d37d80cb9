//! Tunable parameters for the player core

use std::f32::consts::PI;
use std::time::Duration;

/// Near clip plane shared by every projection
pub const Z_NEAR: f32 = 0.1;
/// Far clip plane; the GUI sphere sits just inside it
pub const Z_FAR: f32 = 2.0;

/// Runtime configuration, constructed once with the Renderer
#[derive(Debug, Clone)]
pub struct PlayerConfig {
    /// Motion-to-photon compensation added to the pose query timestamp
    pub prediction_time: Duration,
    pub z_near: f32,
    pub z_far: f32,
    /// Pitch (radians) above which the head gesture toggles the GUI
    pub gesture_up_threshold: f32,
    /// Pitch (radians) below which the gesture re-arms
    pub gesture_return_threshold: f32,
    /// Pitch (radians) beyond which yaw is no longer updated
    pub gimbal_guard: f32,
    /// How long the progress bar stays up after `show_progress_bar`
    pub progress_bar_display_time: Duration,
    /// Atlas image with all button faces
    pub button_texture_path: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            prediction_time: Duration::from_millis(50),
            z_near: Z_NEAR,
            z_far: Z_FAR,
            gesture_up_threshold: 60.0 * PI / 180.0,
            gesture_return_threshold: 45.0 * PI / 180.0,
            gimbal_guard: 89.0 * PI / 180.0,
            progress_bar_display_time: Duration::from_secs(3),
            button_texture_path: "buttons-texture.png".to_string(),
        }
    }
}
