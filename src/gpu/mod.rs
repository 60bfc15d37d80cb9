//! GPU seam between the renderer and the graphics API
//!
//! The renderer issues a small set of retained-mode calls through
//! [`RenderBackend`]; [`wgpu_backend::WgpuBackend`] implements them on top of
//! wgpu. Draw calls are only valid between [`RenderBackend::begin_frame`] and
//! [`RenderBackend::end_frame`].

use glam::Mat4;

use crate::distortion::{DistortionMesh, EyeTextureDescription};
use crate::mesh::TexturedMesh;
use crate::options::Eye;
use crate::services::ImageData;

pub mod wgpu_backend;

pub use wgpu_backend::WgpuBackend;

/// Handle to an uploaded mesh
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

/// Handle to a texture: video, static image or render target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// Pixel rectangle of the current target, origin top-left
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Viewport for one eye: half the screen in stereo, all of it otherwise
    pub fn for_eye(eye: Eye, stereo: bool, width: u32, height: u32) -> Self {
        if stereo {
            let half = width / 2;
            Self { x: half * eye.index() as u32, y: 0, width: half, height }
        } else {
            Self { x: 0, y: 0, width, height }
        }
    }
}

/// Shader program a mesh is drawn with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Program {
    /// Opaque video, color passed through the color-map matrix
    Video,
    /// Alpha-blended GUI quads
    Gui,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawUniforms {
    pub mvp: Mat4,
    pub color_map: Mat4,
}

impl DrawUniforms {
    pub fn new(mvp: Mat4) -> Self {
        Self { mvp, color_map: Mat4::IDENTITY }
    }
}

pub trait RenderBackend {
    fn resize(&mut self, width: u32, height: u32);

    fn upload_mesh(&mut self, mesh: &TexturedMesh) -> MeshId;
    fn release_mesh(&mut self, mesh: MeshId);

    /// Texture the video frames stream into; starts out as a single black texel
    fn create_video_texture(&mut self) -> TextureId;
    /// Texture from decoded image data, or a blank texel when decoding failed
    fn create_static_texture(&mut self, image: Option<&ImageData>) -> TextureId;
    /// Replaces the contents of a texture, resizing it when needed
    fn upload_texture(&mut self, texture: TextureId, image: &ImageData);

    /// Offscreen color target both eyes render into before distortion
    fn create_render_target(&mut self, width: u32, height: u32) -> TextureId;
    fn destroy_texture(&mut self, texture: TextureId);

    fn set_distortion_mesh(&mut self, eye: Eye, mesh: &DistortionMesh);

    /// Starts a frame drawing into `target`, or straight to the display with
    /// `None`. Returns false when no display image could be acquired.
    fn begin_frame(&mut self, target: Option<TextureId>) -> bool;
    fn set_viewport(&mut self, viewport: Viewport);
    fn draw_mesh(&mut self, mesh: MeshId, texture: TextureId, program: Program, uniforms: &DrawUniforms);
    /// Line list, two vertices per segment
    fn draw_lines(&mut self, vertices: &[[f32; 3]], mvp: Mat4, color: [f32; 4]);
    /// Warps both eyes from `target` onto the display. Later draws in the
    /// frame go to the display with a full-screen viewport.
    fn render_eyes_to_display(&mut self, target: TextureId, eyes: &[EyeTextureDescription; 2]);
    fn end_frame(&mut self);

    /// Errors raised by the GPU since the last call
    fn drain_errors(&mut self) -> Vec<String>;
}
