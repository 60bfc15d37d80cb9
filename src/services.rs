//! Platform capabilities the renderer depends on
//!
//! The renderer only sees these traits. Android adapters live in `sensors` and
//! `video`; tests plug in fakes.

use glam::Quat;

use crate::gpu::TextureId;
use crate::gui::ButtonAction;

/// Screen rotation the pose is reported for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DisplayOrientation {
    #[default]
    LandscapeLeft,
    LandscapeRight,
    Portrait,
}

/// Head pose. `orientation` maps world directions into head space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub orientation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self { orientation: Quat::IDENTITY }
    }
}

/// Tightly packed RGBA8 pixels
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImageData {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl ImageData {
    /// Does the pixel buffer hold exactly `width * height` RGBA texels?
    pub fn is_consistent(&self) -> bool {
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(4));
        self.width > 0 && self.height > 0 && expected == Some(self.pixels.len())
    }
}

/// A decoded video frame ready for upload
pub type VideoFrame = ImageData;

pub trait HeadTracker {
    /// Predicted pose at `timestamp_nanos` on the boot-time clock
    fn get_pose(&mut self, timestamp_nanos: i64, orientation: DisplayOrientation) -> Pose;
    fn pause(&mut self);
    fn resume(&mut self);
    /// Makes the current heading the new forward direction
    fn recenter(&mut self);
}

pub trait VideoTextureProvider {
    /// Binds the player output to `texture`. Returns false if the host refused.
    fn initialize_playback(&mut self, texture: TextureId) -> bool;
    /// Latest decoded frame, if a new one arrived since the last poll
    fn poll_frame(&mut self) -> Option<VideoFrame>;
}

pub trait ImageLoader {
    /// Decodes an asset into RGBA pixels
    fn load_texture(&mut self, path: &str) -> Option<ImageData>;
}

pub trait ActionSink {
    /// Forwards a playback action to the host; false if it could not be delivered
    fn execute(&mut self, action: ButtonAction) -> bool;
}

/// Fixed-orientation tracker for devices without a rotation sensor
#[derive(Debug, Clone, Default)]
pub struct StaticHeadTracker {
    orientation: Quat,
}

impl StaticHeadTracker {
    pub fn new(orientation: Quat) -> Self {
        Self { orientation }
    }
}

impl HeadTracker for StaticHeadTracker {
    fn get_pose(&mut self, _timestamp_nanos: i64, _orientation: DisplayOrientation) -> Pose {
        Pose { orientation: self.orientation }
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn recenter(&mut self) {
        self.orientation = Quat::IDENTITY;
    }
}

/// Sink that only logs, for hosts without a playback controller
#[derive(Debug, Default)]
pub struct LoggingActionSink;

impl ActionSink for LoggingActionSink {
    fn execute(&mut self, action: ButtonAction) -> bool {
        log::info!("ActionSink: no controller for {:?}", action);
        false
    }
}

/// Bundle of platform collaborators handed to the renderer
pub struct Platform {
    pub video: Box<dyn VideoTextureProvider>,
    pub images: Box<dyn ImageLoader>,
    pub tracker: Box<dyn HeadTracker>,
    pub actions: Box<dyn ActionSink>,
    pub distortion: Box<dyn crate::distortion::LensDistortionService>,
}
