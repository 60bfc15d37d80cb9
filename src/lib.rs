//! VR video player core
//!
//! Renders flat, 180° and 360° videos (mono, side-by-side, over-under or
//! anaglyph) for phone-in-a-headset viewers, with a gaze-controlled menu
//! toggled by looking up. The platform-independent core is driven through
//! [`renderer::Renderer`]; the Android host in `host` wires it to sensors,
//! the Java media player and a wgpu surface.

pub mod clock;
pub mod commands;
pub mod config;
pub mod distortion;
pub mod error;
pub mod gesture;
pub mod gpu;
pub mod gui;
pub mod matrices;
pub mod mesh;
pub mod options;
pub mod projection;
pub mod renderer;
pub mod services;

#[cfg(target_os = "android")]
mod host;
#[cfg(target_os = "android")]
pub mod sensors;
#[cfg(target_os = "android")]
pub mod video;

pub use config::PlayerConfig;
pub use error::{Error, Result};
pub use options::{Eye, InputVideoLayout, InputVideoMode, OutputMode};
pub use renderer::Renderer;
