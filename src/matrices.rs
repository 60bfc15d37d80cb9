//! Model-view-projection and color-map matrices for each output mode

use glam::{Mat4, Vec4};

use crate::options::{Eye, InputVideoLayout, InputVideoMode, OutputMode};

/// Scales the flat video quad so it fits ("contains") the viewport, at depth 0.5.
///
/// The flat mesh is `video_aspect` wide and 1 tall; no rotation is applied so
/// plain videos stay put while the head moves.
pub fn letterbox_matrix(screen_aspect: f32, video_aspect: f32) -> Mat4 {
    let k = (screen_aspect / video_aspect).min(1.0);
    Mat4::from_diagonal(Vec4::new(2.0 * k / screen_aspect, 2.0 * k, -0.5, 1.0))
}

/// Monoscopic perspective: 90 degrees across the wider screen axis
pub fn mono_projection(screen_aspect: f32, z_near: f32, z_far: f32) -> Mat4 {
    let fov_y = 90f32.to_radians() / screen_aspect;
    Mat4::perspective_rh(fov_y, screen_aspect, z_near, z_far)
}

/// Off-axis perspective projection with 0..1 depth, from near-plane extents
pub fn frustum(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
    let x_scale = 2.0 * near / (right - left);
    let y_scale = 2.0 * near / (top - bottom);
    let x_offset = (right + left) / (right - left);
    let y_offset = (top + bottom) / (top - bottom);
    let z_scale = far / (near - far);
    let z_offset = near * far / (near - far);

    Mat4::from_cols(
        Vec4::new(x_scale, 0.0, 0.0, 0.0),
        Vec4::new(0.0, y_scale, 0.0, 0.0),
        Vec4::new(x_offset, y_offset, z_scale, -1.0),
        Vec4::new(0.0, 0.0, z_offset, 0.0),
    )
}

/// Per-eye stereo matrices cached from the lens distortion service
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoMatrices {
    pub eye_from_head: [Mat4; 2],
    pub projection: [Mat4; 2],
}

impl Default for StereoMatrices {
    fn default() -> Self {
        Self {
            eye_from_head: [Mat4::IDENTITY; 2],
            projection: [Mat4::IDENTITY; 2],
        }
    }
}

/// Everything the MVP depends on for one eye
#[derive(Debug, Clone, Copy)]
pub struct MvpInput<'a> {
    pub eye: Eye,
    pub output: OutputMode,
    pub mode: InputVideoMode,
    pub screen_aspect: f32,
    pub video_aspect: f32,
    pub head_view: Mat4,
    pub stereo: &'a StereoMatrices,
    pub z_near: f32,
    pub z_far: f32,
}

/// Video MVP for one eye
pub fn build_mvp_matrix(input: &MvpInput<'_>) -> Mat4 {
    match input.output {
        OutputMode::MonoLeft | OutputMode::MonoRight => {
            if input.mode == InputVideoMode::PlainFov {
                letterbox_matrix(input.screen_aspect, input.video_aspect)
            } else {
                mono_projection(input.screen_aspect, input.z_near, input.z_far) * input.head_view
            }
        }
        OutputMode::CardboardStereo => {
            let e = input.eye.index();
            input.stereo.projection[e] * input.stereo.eye_from_head[e] * input.head_view
        }
    }
}

/// Channel mask applied to the sampled color. Anaglyph video sends red to the
/// left eye and green+blue to the right one.
pub fn build_color_map_matrix(layout: InputVideoLayout, eye: Eye) -> Mat4 {
    match (layout, eye) {
        (InputVideoLayout::AnaglyphRedCyan, Eye::Left) => {
            Mat4::from_diagonal(Vec4::new(1.0, 0.0, 0.0, 1.0))
        }
        (InputVideoLayout::AnaglyphRedCyan, Eye::Right) => {
            Mat4::from_diagonal(Vec4::new(0.0, 1.0, 1.0, 1.0))
        }
        _ => Mat4::IDENTITY,
    }
}

/// Turns the menu so its theta = PI column lines up with the yaw it was opened at
pub fn gui_model_matrix(gui_center_theta: f32) -> Mat4 {
    Mat4::from_rotation_y(gui_center_theta)
}
