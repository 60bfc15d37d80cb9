//! Lens distortion for cardboard-style viewers
//!
//! [`LensDistortionService`] owns the viewer calibration and builds a
//! [`LensDistortion`] for a given screen. The built-in
//! [`CardboardDistortionService`] decodes a compact viewer profile and derives
//! per-eye distortion meshes, eye offsets and projections from it.

use std::path::PathBuf;

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::error::{Error, Result};
use crate::matrices::frustum;
use crate::options::Eye;

pub trait LensDistortionService {
    /// Calibration blob saved by a previous scan, if any
    fn saved_calibration(&self) -> Option<Vec<u8>>;

    /// Builds the distortion for a screen of `width` x `height` pixels
    fn create_distortion(&self, calibration: &[u8], width: u32, height: u32) -> Result<Box<dyn LensDistortion>>;

    /// Acquires a new viewer calibration and saves it
    fn scan_calibration_qr(&mut self);
}

/// Per-screen lens model. Dropped and rebuilt whenever device parameters change.
pub trait LensDistortion {
    fn distortion_mesh(&self, eye: Eye) -> DistortionMesh;
    fn eye_from_head(&self, eye: Eye) -> Mat4;
    fn projection(&self, eye: Eye, z_near: f32, z_far: f32) -> Mat4;
}

/// Screen-space vertex of the distortion mesh. `position` is in display NDC,
/// `uv` in the eye's own texture space.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct DistortionVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DistortionMesh {
    pub vertices: Vec<DistortionVertex>,
    pub indices: Vec<u16>,
}

/// Where one eye's image lives inside the shared render target
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeTextureDescription {
    pub left_u: f32,
    pub right_u: f32,
    pub top_v: f32,
    pub bottom_v: f32,
}

impl EyeTextureDescription {
    /// Side-by-side halves of a render target, top row at v = 0
    pub fn side_by_side(eye: Eye) -> Self {
        let half = 0.5 * eye.index() as f32;
        Self {
            left_u: half,
            right_u: half + 0.5,
            top_v: 0.0,
            bottom_v: 1.0,
        }
    }
}

/// `b"CBVP"` read as little-endian
pub const VIEWER_PROFILE_MAGIC: u32 = u32::from_le_bytes(*b"CBVP");
pub const VIEWER_PROFILE_VERSION: u32 = 1;

/// Viewer calibration blob, stored in host byte order (little-endian on every
/// supported target). Distances in meters, angles in degrees.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ViewerProfile {
    pub magic: u32,
    pub version: u32,
    pub inter_lens_distance: f32,
    pub screen_to_lens_distance: f32,
    pub tray_to_lens_distance: f32,
    pub k1: f32,
    pub k2: f32,
    /// Left eye half-angles: outer, inner, bottom, top. The right eye mirrors them.
    pub field_of_view: [f32; 4],
}

impl ViewerProfile {
    /// Original cardboard viewer
    pub fn cardboard_v1() -> Self {
        Self {
            magic: VIEWER_PROFILE_MAGIC,
            version: VIEWER_PROFILE_VERSION,
            inter_lens_distance: 0.06,
            screen_to_lens_distance: 0.042,
            tray_to_lens_distance: 0.035,
            k1: 0.441,
            k2: 0.156,
            field_of_view: [40.0; 4],
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        bytemuck::bytes_of(self).to_vec()
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let profile: ViewerProfile = bytemuck::try_pod_read_unaligned(bytes)
            .map_err(|e| Error::InvalidCalibration(format!("{} bytes: {e}", bytes.len())))?;
        profile.validate()?;
        Ok(profile)
    }

    fn validate(&self) -> Result<()> {
        if self.magic != VIEWER_PROFILE_MAGIC {
            return Err(Error::InvalidCalibration(format!("bad magic {:#010x}", self.magic)));
        }
        if self.version != VIEWER_PROFILE_VERSION {
            return Err(Error::InvalidCalibration(format!("unsupported version {}", self.version)));
        }
        let distances = [self.inter_lens_distance, self.screen_to_lens_distance, self.tray_to_lens_distance];
        if distances.iter().any(|d| !d.is_finite() || *d <= 0.0) {
            return Err(Error::InvalidCalibration("non-positive lens distance".into()));
        }
        if !self.k1.is_finite() || !self.k2.is_finite() {
            return Err(Error::InvalidCalibration("non-finite distortion coefficient".into()));
        }
        if self.field_of_view.iter().any(|a| !(*a > 0.0 && *a < 90.0)) {
            return Err(Error::InvalidCalibration("field of view out of range".into()));
        }
        Ok(())
    }

    /// Radial distortion polynomial in tan-angle space
    pub fn distort(&self, r: f32) -> f32 {
        let r2 = r * r;
        r * (1.0 + self.k1 * r2 + self.k2 * r2 * r2)
    }

    /// Tangents of the half-angles for `eye` as (left, right, bottom, top)
    fn fov_tangents(&self, eye: Eye) -> [f32; 4] {
        let [outer, inner, bottom, top] = self.field_of_view.map(|a| a.to_radians().tan());
        match eye {
            Eye::Left => [outer, inner, bottom, top],
            Eye::Right => [inner, outer, bottom, top],
        }
    }
}

/// Physical size of the display
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayMetrics {
    pub width_meters: f32,
    pub height_meters: f32,
    /// Gap between the bottom of the active area and the viewer tray
    pub bottom_border_meters: f32,
}

impl DisplayMetrics {
    pub fn from_pixels(width: u32, height: u32, dots_per_inch: f32, bottom_border_meters: f32) -> Self {
        let meters_per_dot = 0.0254 / dots_per_inch;
        Self {
            width_meters: width as f32 * meters_per_dot,
            height_meters: height as f32 * meters_per_dot,
            bottom_border_meters,
        }
    }
}

/// Vertices per side of each eye's distortion grid
const DISTORTION_GRID: u16 = 40;
const DEFAULT_DPI: f32 = 400.0;
const DEFAULT_BOTTOM_BORDER: f32 = 0.003;

/// Built-in service for cardboard-style viewers
#[derive(Debug)]
pub struct CardboardDistortionService {
    saved: Option<Vec<u8>>,
    storage: Option<PathBuf>,
    dots_per_inch: f32,
    bottom_border_meters: f32,
}

impl Default for CardboardDistortionService {
    fn default() -> Self {
        Self {
            saved: None,
            storage: None,
            dots_per_inch: DEFAULT_DPI,
            bottom_border_meters: DEFAULT_BOTTOM_BORDER,
        }
    }
}

impl CardboardDistortionService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps the calibration in `path`, loading any profile already saved there
    pub fn with_storage(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let saved = match std::fs::read(&path) {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                log::warn!("CardboardDistortionService: failed to read {}: {}", path.display(), e);
                None
            }
        };
        Self {
            saved,
            storage: Some(path),
            ..Self::default()
        }
    }

    pub fn with_display_density(mut self, dots_per_inch: f32) -> Self {
        self.dots_per_inch = dots_per_inch;
        self
    }

    pub fn save_calibration(&mut self, profile: &ViewerProfile) {
        let bytes = profile.to_bytes();
        if let Some(path) = &self.storage {
            if let Err(e) = std::fs::write(path, &bytes) {
                log::error!("CardboardDistortionService: failed to write {}: {}", path.display(), e);
            }
        }
        self.saved = Some(bytes);
    }
}

impl LensDistortionService for CardboardDistortionService {
    fn saved_calibration(&self) -> Option<Vec<u8>> {
        self.saved.clone()
    }

    fn create_distortion(&self, calibration: &[u8], width: u32, height: u32) -> Result<Box<dyn LensDistortion>> {
        let profile = ViewerProfile::from_bytes(calibration)?;
        let display = DisplayMetrics::from_pixels(width, height, self.dots_per_inch, self.bottom_border_meters);
        log::info!(
            "CardboardDistortionService: {}x{} px ({:.3}m x {:.3}m), k1={} k2={}",
            width,
            height,
            display.width_meters,
            display.height_meters,
            profile.k1,
            profile.k2
        );
        Ok(Box::new(CardboardDistortion { profile, display }))
    }

    /// There is no camera flow in the core; scanning installs the stock viewer
    fn scan_calibration_qr(&mut self) {
        log::info!("CardboardDistortionService: saving default viewer profile");
        self.save_calibration(&ViewerProfile::cardboard_v1());
    }
}

#[derive(Debug, Clone)]
pub struct CardboardDistortion {
    profile: ViewerProfile,
    display: DisplayMetrics,
}

impl CardboardDistortion {
    pub fn new(profile: ViewerProfile, display: DisplayMetrics) -> Self {
        Self { profile, display }
    }

    /// Lens center in meters from the bottom-left corner of the display
    fn lens_center(&self, eye: Eye) -> Vec2 {
        let offset = self.profile.inter_lens_distance / 2.0;
        let x = match eye {
            Eye::Left => self.display.width_meters / 2.0 - offset,
            Eye::Right => self.display.width_meters / 2.0 + offset,
        };
        let y = self.profile.tray_to_lens_distance - self.display.bottom_border_meters;
        Vec2::new(x, y)
    }
}

impl LensDistortion for CardboardDistortion {
    fn distortion_mesh(&self, eye: Eye) -> DistortionMesh {
        let n = DISTORTION_GRID;
        let last = f32::from(n - 1);
        let [left, right, bottom, top] = self.profile.fov_tangents(eye);
        let lens = self.lens_center(eye);
        let half_width = self.display.width_meters / 2.0;
        let x0 = half_width * eye.index() as f32;

        let mut vertices = Vec::with_capacity(usize::from(n) * usize::from(n));
        for row in 0..n {
            for col in 0..n {
                let fx = f32::from(col) / last;
                let fy = f32::from(row) / last;
                let screen = Vec2::new(x0 + fx * half_width, fy * self.display.height_meters);

                // Tan-angle of the ray through the lens, bent outward by the lens
                let tan = (screen - lens) / self.profile.screen_to_lens_distance;
                let r = tan.length();
                let world = if r > 0.0 { tan * (self.profile.distort(r) / r) } else { tan };

                let u = (world.x + left) / (left + right);
                let v = (top - world.y) / (top + bottom);

                vertices.push(DistortionVertex {
                    position: [
                        2.0 * screen.x / self.display.width_meters - 1.0,
                        2.0 * screen.y / self.display.height_meters - 1.0,
                    ],
                    uv: [u.clamp(0.0, 1.0), v.clamp(0.0, 1.0)],
                });
            }
        }

        let mut indices = Vec::with_capacity(6 * usize::from(n - 1) * usize::from(n - 1));
        for row in 0..n - 1 {
            for col in 0..n - 1 {
                let a = row * n + col;
                let b = a + 1;
                let c = a + n + 1;
                let d = a + n;
                indices.extend_from_slice(&[a, b, c, a, c, d]);
            }
        }

        DistortionMesh { vertices, indices }
    }

    fn eye_from_head(&self, eye: Eye) -> Mat4 {
        let offset = self.profile.inter_lens_distance / 2.0;
        match eye {
            Eye::Left => Mat4::from_translation(Vec3::new(offset, 0.0, 0.0)),
            Eye::Right => Mat4::from_translation(Vec3::new(-offset, 0.0, 0.0)),
        }
    }

    fn projection(&self, eye: Eye, z_near: f32, z_far: f32) -> Mat4 {
        let [left, right, bottom, top] = self.profile.fov_tangents(eye);
        frustum(-left * z_near, right * z_near, -bottom * z_near, top * z_near, z_near, z_far)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn distortion() -> Box<dyn LensDistortion> {
        let mut service = CardboardDistortionService::new();
        service.scan_calibration_qr();
        let blob = service.saved_calibration().unwrap();
        service.create_distortion(&blob, 1920, 1080).unwrap()
    }

    #[test]
    fn nothing_saved_until_scanned() {
        let mut service = CardboardDistortionService::new();
        assert!(service.saved_calibration().is_none());
        service.scan_calibration_qr();
        let blob = service.saved_calibration().unwrap();
        assert_eq!(ViewerProfile::from_bytes(&blob).unwrap(), ViewerProfile::cardboard_v1());
    }

    #[test]
    fn rejects_garbage_blobs() {
        let service = CardboardDistortionService::new();
        assert!(matches!(
            service.create_distortion(&[1, 2, 3], 100, 100),
            Err(Error::InvalidCalibration(_))
        ));

        let mut profile = ViewerProfile::cardboard_v1();
        profile.magic = 0;
        assert!(ViewerProfile::from_bytes(&profile.to_bytes()).is_err());

        let mut profile = ViewerProfile::cardboard_v1();
        profile.screen_to_lens_distance = -1.0;
        assert!(ViewerProfile::from_bytes(&profile.to_bytes()).is_err());
    }

    #[test]
    fn eyes_are_offset_by_half_the_lens_distance() {
        let d = distortion();
        let left = d.eye_from_head(Eye::Left).transform_point3(Vec3::ZERO);
        let right = d.eye_from_head(Eye::Right).transform_point3(Vec3::ZERO);
        assert!((left.x - 0.03).abs() < 1e-6);
        assert!((right.x + 0.03).abs() < 1e-6);
    }

    #[test]
    fn symmetric_fov_gives_centered_projection() {
        let p = distortion().projection(Eye::Left, 0.1, 2.0);
        let center = p.project_point3(Vec3::new(0.0, 0.0, -1.0));
        assert!(center.x.abs() < 1e-6 && center.y.abs() < 1e-6);
        let edge = p.project_point3(Vec3::new(40f32.to_radians().tan(), 0.0, -1.0));
        assert!((edge.x - 1.0).abs() < 1e-5);
    }

    #[test]
    fn mesh_covers_each_half_of_the_screen() {
        let d = distortion();
        for eye in Eye::BOTH {
            let mesh = d.distortion_mesh(eye);
            assert_eq!(mesh.vertices.len(), 40 * 40);
            assert_eq!(mesh.indices.len(), 6 * 39 * 39);
            assert!(mesh.indices.iter().all(|&i| usize::from(i) < mesh.vertices.len()));

            let xs = mesh.vertices.iter().map(|v| v.position[0]);
            let (min, max) = xs.fold((f32::MAX, f32::MIN), |(lo, hi), x| (lo.min(x), hi.max(x)));
            match eye {
                Eye::Left => assert!((min + 1.0).abs() < 1e-5 && max.abs() < 1e-5),
                Eye::Right => assert!(min.abs() < 1e-5 && (max - 1.0).abs() < 1e-5),
            }
            assert!(mesh.vertices.iter().all(|v| (0.0..=1.0).contains(&v.uv[0])));
        }
    }

    #[test]
    fn distortion_pushes_outward() {
        let profile = ViewerProfile::cardboard_v1();
        assert_eq!(profile.distort(0.0), 0.0);
        assert!(profile.distort(0.5) > 0.5);
    }

    #[test]
    fn side_by_side_halves() {
        assert_eq!(EyeTextureDescription::side_by_side(Eye::Right).left_u, 0.5);
        assert_eq!(EyeTextureDescription::side_by_side(Eye::Left).right_u, 0.5);
    }
}
