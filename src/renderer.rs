//! Frame orchestration for the player
//!
//! The [`Renderer`] owns playback options, per-eye meshes, the gaze menu and
//! every GPU resource it created through its [`RenderBackend`]. The host
//! drives it from a single render thread: lifecycle callbacks plus one
//! [`Renderer::draw_frame`] per display refresh.

use std::f32::consts::PI;
use std::time::Instant;

use glam::Mat4;
use log::{debug, error, info, warn};

use crate::clock::boot_time_nanos;
use crate::config::PlayerConfig;
use crate::distortion::{EyeTextureDescription, LensDistortion};
use crate::error::Result;
use crate::gesture::{GestureLatch, HeadAngles};
use crate::gpu::{DrawUniforms, MeshId, Program, RenderBackend, TextureId, Viewport};
use crate::gui::{default_buttons, default_progress_bar, ButtonAction, GuiButton, GuiProgressBar};
use crate::matrices::{self, MvpInput, StereoMatrices};
use crate::mesh::TexturedMesh;
use crate::options::{Eye, InputVideoLayout, InputVideoMode, OutputMode};
use crate::projection::build_eye_mesh;
use crate::services::{DisplayOrientation, Platform};

const POINTER_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const POINTER_SIZE: f32 = 0.02;
const PROGRESS_BAR_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
const ALIGN_LINE_COLOR: [f32; 4] = [0.6, 0.6, 0.6, 1.0];
/// Divider between the lenses, from the bottom edge up
const ALIGN_LINE: [[f32; 3]; 2] = [[0.0, -0.2, 0.5], [0.0, -1.0, 0.5]];

/// GPU objects that live from `on_surface_created` until teardown
struct SurfaceResources {
    video_texture: TextureId,
    button_texture: TextureId,
    button_meshes: Vec<MeshId>,
    eye_meshes: [Option<MeshId>; 2],
}

pub struct Renderer<B: RenderBackend> {
    backend: B,
    platform: Platform,
    config: PlayerConfig,

    screen_width: u32,
    screen_height: u32,
    screen_aspect: f32,
    video_aspect: f32,

    input_layout: InputVideoLayout,
    input_mode: InputVideoMode,
    output_mode: OutputMode,

    screen_params_changed: bool,
    device_params_changed: bool,

    head_view: Mat4,
    angles: HeadAngles,
    gesture: GestureLatch,
    gui_visible: bool,
    gui_center_theta: f32,

    eye_meshes: [TexturedMesh; 2],
    distortion: Option<Box<dyn LensDistortion>>,
    stereo: StereoMatrices,
    eye_textures: [EyeTextureDescription; 2],
    render_target: Option<TextureId>,
    surface: Option<SurfaceResources>,

    buttons: Vec<GuiButton>,
    progress_bar: GuiProgressBar,
    frame_count: u64,
}

impl<B: RenderBackend> Renderer<B> {
    pub fn new(backend: B, platform: Platform, config: PlayerConfig) -> Self {
        let gesture = GestureLatch::new(config.gesture_up_threshold, config.gesture_return_threshold);
        let mut renderer = Self {
            backend,
            platform,
            config,
            screen_width: 0,
            screen_height: 0,
            screen_aspect: 1.0,
            video_aspect: 1.0,
            input_layout: InputVideoLayout::Mono,
            input_mode: InputVideoMode::PlainFov,
            output_mode: OutputMode::MonoLeft,
            screen_params_changed: false,
            device_params_changed: false,
            head_view: Mat4::IDENTITY,
            angles: HeadAngles::default(),
            gesture,
            gui_visible: false,
            gui_center_theta: 0.0,
            eye_meshes: Default::default(),
            distortion: None,
            stereo: StereoMatrices::default(),
            eye_textures: [EyeTextureDescription::side_by_side(Eye::Left), EyeTextureDescription::side_by_side(Eye::Right)],
            render_target: None,
            surface: None,
            buttons: default_buttons(),
            progress_bar: default_progress_bar(),
            frame_count: 0,
        };
        debug!("Renderer: created");
        renderer.compute_mesh();
        renderer
    }

    // --- Lifecycle ---

    /// Creates the video and button textures and uploads all meshes
    pub fn on_surface_created(&mut self) {
        info!("Renderer: surface created");
        self.release_surface_resources();

        let video_texture = self.backend.create_video_texture();
        if !self.platform.video.initialize_playback(video_texture) {
            error!("Renderer: couldn't initialize video texture");
        }

        let image = self.platform.images.load_texture(&self.config.button_texture_path);
        if image.is_none() {
            error!("Renderer: couldn't load {}", self.config.button_texture_path);
        }
        let button_texture = self.backend.create_static_texture(image.as_ref());

        let button_meshes = self.buttons.iter().map(|b| self.backend.upload_mesh(&b.to_mesh())).collect();

        self.surface = Some(SurfaceResources {
            video_texture,
            button_texture,
            button_meshes,
            eye_meshes: [None, None],
        });
        self.upload_eye_meshes();
        self.check_gpu_errors("surface setup");

        self.device_params_changed = true;
    }

    /// Releases everything created on the GPU; the next surface starts fresh
    pub fn on_surface_destroyed(&mut self) {
        info!("Renderer: surface destroyed");
        self.gl_teardown();
        self.release_surface_resources();
    }

    pub fn on_pause(&mut self) {
        debug!("Renderer: pause after {} frames", self.frame_count);
        self.platform.tracker.pause();
    }

    pub fn on_resume(&mut self) {
        debug!("Renderer: resume");
        self.frame_count = 0;
        // Viewer parameters may have changed while paused
        self.device_params_changed = true;
        self.platform.tracker.resume();
    }

    // --- Control surface ---

    pub fn set_screen_params(&mut self, width: u32, height: u32) {
        debug!("Renderer: screen params {}x{}", width, height);
        self.screen_width = width;
        self.screen_height = height;
        self.screen_aspect = if height > 0 { width as f32 / height as f32 } else { 1.0 };
        self.backend.resize(width, height);
        self.screen_params_changed = true;
    }

    pub fn set_video_size(&mut self, width: u32, height: u32) {
        debug!("Renderer: video size {}x{}", width, height);
        self.video_aspect = if width > 0 && height > 0 { width as f32 / height as f32 } else { 1.0 };
        self.compute_mesh();
        self.screen_params_changed = true;
    }

    pub fn set_options(&mut self, layout: InputVideoLayout, mode: InputVideoMode, output: OutputMode) {
        debug!("Renderer: options {:?} {:?} {:?}", layout, mode, output);
        self.device_params_changed |= output != self.output_mode;
        self.input_layout = layout;
        self.input_mode = mode;
        self.output_mode = output;
        self.compute_mesh();
    }

    /// Integer option codes from the host bridge; rejected codes leave the options untouched
    pub fn set_options_raw(&mut self, layout: i32, mode: i32, output: i32) -> Result<()> {
        let layout = InputVideoLayout::try_from(layout)?;
        let mode = InputVideoMode::try_from(mode)?;
        let output = OutputMode::try_from(output)?;
        self.set_options(layout, mode, output);
        Ok(())
    }

    pub fn scan_cardboard_calibration(&mut self) {
        debug!("Renderer: scan viewer calibration");
        self.platform.distortion.scan_calibration_qr();
        self.device_params_changed = true;
    }

    pub fn show_progress_bar(&mut self) {
        self.progress_bar.show(Instant::now(), self.config.progress_bar_display_time);
    }

    // --- Accessors ---

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn options(&self) -> (InputVideoLayout, InputVideoMode, OutputMode) {
        (self.input_layout, self.input_mode, self.output_mode)
    }

    pub fn head_angles(&self) -> HeadAngles {
        self.angles
    }

    pub fn is_gui_visible(&self) -> bool {
        self.gui_visible
    }

    pub fn buttons(&self) -> &[GuiButton] {
        &self.buttons
    }

    pub fn progress_bar(&self) -> &GuiProgressBar {
        &self.progress_bar
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn eye_mesh(&self, eye: Eye) -> &TexturedMesh {
        &self.eye_meshes[eye.index()]
    }

    pub fn render_target(&self) -> Option<TextureId> {
        self.render_target
    }

    /// Are screen or device parameters waiting to be applied?
    pub fn params_dirty(&self) -> (bool, bool) {
        (self.screen_params_changed, self.device_params_changed)
    }

    // --- Device parameters ---

    /// Applies pending screen/device changes. Returns false while the frame
    /// can't be drawn yet; the pending flags then stay set.
    pub fn update_device_params(&mut self) -> bool {
        if !self.screen_params_changed && !self.device_params_changed {
            return true;
        }

        if self.output_mode.is_stereo() {
            let Some(calibration) = self.platform.distortion.saved_calibration() else {
                error!("Renderer: viewer calibration not available yet");
                return false;
            };
            match self
                .platform
                .distortion
                .create_distortion(&calibration, self.screen_width, self.screen_height)
            {
                Ok(distortion) => self.distortion = Some(distortion),
                Err(e) => {
                    error!("Renderer: {}", e);
                    return false;
                }
            }
        } else {
            self.distortion = None;
        }

        self.gl_setup();

        if let Some(distortion) = &self.distortion {
            for eye in Eye::BOTH {
                let e = eye.index();
                self.backend.set_distortion_mesh(eye, &distortion.distortion_mesh(eye));
                self.stereo.eye_from_head[e] = distortion.eye_from_head(eye);
                self.stereo.projection[e] = distortion.projection(eye, self.config.z_near, self.config.z_far);
            }
        }

        self.screen_params_changed = false;
        self.device_params_changed = false;

        self.check_gpu_errors("update_device_params");
        true
    }

    /// (Re)creates the screen-sized render target both eyes draw into
    pub fn gl_setup(&mut self) {
        debug!("Renderer: gl setup");
        self.gl_teardown();

        if self.screen_width == 0 || self.screen_height == 0 {
            warn!("Renderer: no screen size yet, skipping render target");
            return;
        }
        self.render_target = Some(self.backend.create_render_target(self.screen_width, self.screen_height));
        self.eye_textures = [EyeTextureDescription::side_by_side(Eye::Left), EyeTextureDescription::side_by_side(Eye::Right)];
        self.check_gpu_errors("gl_setup");
    }

    pub fn gl_teardown(&mut self) {
        if let Some(target) = self.render_target.take() {
            self.backend.destroy_texture(target);
            self.check_gpu_errors("gl_teardown");
        }
    }

    // --- Meshes ---

    /// Rebuilds both eye meshes for the current options and video aspect
    pub fn compute_mesh(&mut self) {
        for eye in Eye::BOTH {
            self.eye_meshes[eye.index()] = build_eye_mesh(self.input_layout, self.input_mode, eye, self.video_aspect);
        }
        self.upload_eye_meshes();
    }

    fn upload_eye_meshes(&mut self) {
        let Some(surface) = self.surface.as_mut() else {
            return;
        };
        for eye in Eye::BOTH {
            let e = eye.index();
            if let Some(old) = surface.eye_meshes[e].take() {
                self.backend.release_mesh(old);
            }
            if !self.eye_meshes[e].is_empty() {
                surface.eye_meshes[e] = Some(self.backend.upload_mesh(&self.eye_meshes[e]));
            }
        }
    }

    fn release_surface_resources(&mut self) {
        let Some(surface) = self.surface.take() else {
            return;
        };
        for mesh in surface.button_meshes.into_iter().chain(surface.eye_meshes.into_iter().flatten()) {
            self.backend.release_mesh(mesh);
        }
        self.backend.destroy_texture(surface.video_texture);
        self.backend.destroy_texture(surface.button_texture);
    }

    // --- Per frame ---

    /// Renders one frame. `video_position` is the playback position in `[0, 1]`.
    pub fn draw_frame(&mut self, video_position: f32) {
        self.draw_frame_at(video_position, Instant::now(), boot_time_nanos());
    }

    fn draw_frame_at(&mut self, video_position: f32, now: Instant, boot_nanos: i64) {
        if !self.update_device_params() {
            return;
        }

        self.update_video_frame();
        self.update_pose(boot_nanos);
        self.update_gui(now);

        if self.progress_bar.update_visibility(now) {
            self.progress_bar.set_progress(video_position);
        }

        let stereo = self.output_mode.is_stereo();
        let target = if stereo {
            match self.render_target {
                Some(target) => Some(target),
                None => {
                    warn!("Renderer: stereo output without a render target");
                    return;
                }
            }
        } else {
            None
        };

        if !self.backend.begin_frame(target) {
            return;
        }

        for &eye in self.output_mode.eyes() {
            self.backend
                .set_viewport(Viewport::for_eye(eye, stereo, self.screen_width, self.screen_height));
            self.draw_eye(eye);
        }
        self.check_gpu_errors("draw eyes");

        if let Some(target) = target {
            self.backend.render_eyes_to_display(target, &self.eye_textures);
            self.check_gpu_errors("render to display");
            self.backend.draw_lines(&ALIGN_LINE, Mat4::IDENTITY, ALIGN_LINE_COLOR);
        }

        self.backend.end_frame();
        self.check_gpu_errors("end frame");
        self.frame_count += 1;
    }

    fn update_video_frame(&mut self) {
        let Some(surface) = &self.surface else {
            return;
        };
        if let Some(frame) = self.platform.video.poll_frame() {
            self.backend.upload_texture(surface.video_texture, &frame);
        }
    }

    fn update_pose(&mut self, boot_nanos: i64) {
        let prediction = i64::try_from(self.config.prediction_time.as_nanos()).unwrap_or(0);
        let pose = self
            .platform
            .tracker
            .get_pose(boot_nanos + prediction, DisplayOrientation::LandscapeLeft);
        self.head_view = Mat4::from_quat(pose.orientation);
        self.angles = HeadAngles::from_view(&self.head_view, self.angles.yaw, self.config.gimbal_guard);
    }

    /// Look-up gesture, then gaze hit-testing of the open menu
    fn update_gui(&mut self, now: Instant) {
        if self.gesture.update(self.angles.pitch) {
            self.gui_visible = !self.gui_visible;
            self.gui_center_theta = self.angles.yaw;
            info!("Renderer: gui {}", if self.gui_visible { "shown" } else { "hidden" });
            if !self.gui_visible {
                self.buttons.iter_mut().for_each(GuiButton::disarm);
            }
        }

        if !self.gui_visible {
            return;
        }

        let theta = PI + self.angles.yaw - self.gui_center_theta;
        let phi = self.angles.pitch;
        for i in 0..self.buttons.len() {
            let action = self.buttons[i].evaluate_possible_hit(theta, phi, now);
            if !action.is_none() {
                self.dispatch(action);
            }
        }
    }

    fn dispatch(&mut self, action: ButtonAction) {
        info!("Renderer: action {:?}", action);
        match action {
            ButtonAction::None | ButtonAction::Recenter2d => {}
            ButtonAction::RecenterYaw => self.platform.tracker.recenter(),
            ButtonAction::Play | ButtonAction::Pause => {
                // Play and Pause share a slot: show the other one, latched
                // under the gaze that just fired
                for button in &mut self.buttons {
                    let shown = match button.action() {
                        ButtonAction::Play => action == ButtonAction::Pause,
                        ButtonAction::Pause => action == ButtonAction::Play,
                        _ => continue,
                    };
                    if shown {
                        button.show_latched();
                    } else {
                        button.set_visible(false);
                    }
                }
                self.forward(action);
            }
            ButtonAction::VolumeDown
            | ButtonAction::VolumeUp
            | ButtonAction::OpenFile
            | ButtonAction::Back
            | ButtonAction::Forward
            | ButtonAction::Rewind => self.forward(action),
        }
    }

    fn forward(&mut self, action: ButtonAction) {
        if !self.platform.actions.execute(action) {
            warn!("Renderer: action {:?} not delivered", action);
        }
    }

    /// Projection (and eye offset) for an eye, in head space
    fn eye_projection(&self, eye: Eye) -> Mat4 {
        match self.output_mode {
            OutputMode::MonoLeft | OutputMode::MonoRight => {
                matrices::mono_projection(self.screen_aspect, self.config.z_near, self.config.z_far)
            }
            OutputMode::CardboardStereo => {
                let e = eye.index();
                self.stereo.projection[e] * self.stereo.eye_from_head[e]
            }
        }
    }

    fn draw_eye(&mut self, eye: Eye) {
        let Some(surface) = &self.surface else {
            return;
        };

        if let Some(mesh) = surface.eye_meshes[eye.index()] {
            let mvp = matrices::build_mvp_matrix(&MvpInput {
                eye,
                output: self.output_mode,
                mode: self.input_mode,
                screen_aspect: self.screen_aspect,
                video_aspect: self.video_aspect,
                head_view: self.head_view,
                stereo: &self.stereo,
                z_near: self.config.z_near,
                z_far: self.config.z_far,
            });
            let uniforms = DrawUniforms {
                mvp,
                color_map: matrices::build_color_map_matrix(self.input_layout, eye),
            };
            self.backend.draw_mesh(mesh, surface.video_texture, Program::Video, &uniforms);
        }

        if self.gui_visible {
            let projection = self.eye_projection(eye);
            let gui = DrawUniforms::new(projection * self.head_view * matrices::gui_model_matrix(self.gui_center_theta));
            for (button, &mesh) in self.buttons.iter().zip(&surface.button_meshes) {
                if button.is_visible() {
                    self.backend.draw_mesh(mesh, surface.button_texture, Program::Gui, &gui);
                }
            }

            // Gaze pointer: a small cross straight ahead, in NDC of the eye viewport
            let pointer = [
                [-POINTER_SIZE, 0.0, 0.5],
                [POINTER_SIZE, 0.0, 0.5],
                [0.0, -POINTER_SIZE, 0.5],
                [0.0, POINTER_SIZE, 0.5],
            ];
            self.backend.draw_lines(&pointer, Mat4::IDENTITY, POINTER_COLOR);
        }

        if self.progress_bar.is_visible() {
            self.backend
                .draw_lines(&self.progress_bar.line_vertices(), Mat4::IDENTITY, PROGRESS_BAR_COLOR);
        }
    }

    /// GPU errors are unrecoverable; the frame state can no longer be trusted
    fn check_gpu_errors(&mut self, label: &str) {
        let errors = self.backend.drain_errors();
        if errors.is_empty() {
            return;
        }
        for e in &errors {
            error!("Renderer: GPU error after {}: {}", label, e);
        }
        panic!("GPU error after {}: {}", label, errors.join("; "));
    }
}

impl<B: RenderBackend> Drop for Renderer<B> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            return;
        }
        self.gl_teardown();
        self.release_surface_resources();
        debug!("Renderer: dropped after {} frames", self.frame_count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::f32::consts::FRAC_PI_2;
    use std::rc::Rc;
    use std::time::Duration;

    use glam::{Quat, Vec4};

    use crate::distortion::{CardboardDistortionService, DistortionMesh};
    use crate::gui::layout::{BUTTON_GRID, BUTTON_PHI_0};
    use crate::services::{
        ActionSink, HeadTracker, ImageData, ImageLoader, Pose, VideoFrame, VideoTextureProvider,
    };

    // --- Fakes ---

    #[derive(Default)]
    struct FakeBackend {
        next_id: u32,
        live_meshes: HashSet<MeshId>,
        live_textures: HashSet<TextureId>,
        live_targets: HashSet<TextureId>,
        targets_created: usize,
        distortion_meshes: usize,
        frames_begun: usize,
        frames_ended: usize,
        video_draws: Vec<DrawUniforms>,
        gui_draws: usize,
        line_draws: usize,
        eyes_composited: usize,
        pending_errors: Vec<String>,
    }

    impl FakeBackend {
        fn id(&mut self) -> u32 {
            self.next_id += 1;
            self.next_id
        }
    }

    impl RenderBackend for FakeBackend {
        fn resize(&mut self, _width: u32, _height: u32) {}

        fn upload_mesh(&mut self, _mesh: &TexturedMesh) -> MeshId {
            let id = MeshId(self.id());
            self.live_meshes.insert(id);
            id
        }

        fn release_mesh(&mut self, mesh: MeshId) {
            assert!(self.live_meshes.remove(&mesh), "double release of {mesh:?}");
        }

        fn create_video_texture(&mut self) -> TextureId {
            let id = TextureId(self.id());
            self.live_textures.insert(id);
            id
        }

        fn create_static_texture(&mut self, _image: Option<&ImageData>) -> TextureId {
            self.create_video_texture()
        }

        fn upload_texture(&mut self, texture: TextureId, _image: &ImageData) {
            assert!(self.live_textures.contains(&texture));
        }

        fn create_render_target(&mut self, _width: u32, _height: u32) -> TextureId {
            assert!(self.live_targets.is_empty(), "second render target while one is alive");
            let id = TextureId(self.id());
            self.live_targets.insert(id);
            self.targets_created += 1;
            id
        }

        fn destroy_texture(&mut self, texture: TextureId) {
            assert!(
                self.live_targets.remove(&texture) || self.live_textures.remove(&texture),
                "double destroy of {texture:?}"
            );
        }

        fn set_distortion_mesh(&mut self, _eye: Eye, _mesh: &DistortionMesh) {
            self.distortion_meshes += 1;
        }

        fn begin_frame(&mut self, target: Option<TextureId>) -> bool {
            if let Some(target) = target {
                assert!(self.live_targets.contains(&target));
            }
            self.frames_begun += 1;
            true
        }

        fn set_viewport(&mut self, _viewport: Viewport) {}

        fn draw_mesh(&mut self, _mesh: MeshId, _texture: TextureId, program: Program, uniforms: &DrawUniforms) {
            match program {
                Program::Video => self.video_draws.push(*uniforms),
                Program::Gui => self.gui_draws += 1,
            }
        }

        fn draw_lines(&mut self, _vertices: &[[f32; 3]], _mvp: Mat4, _color: [f32; 4]) {
            self.line_draws += 1;
        }

        fn render_eyes_to_display(&mut self, _target: TextureId, _eyes: &[EyeTextureDescription; 2]) {
            self.eyes_composited += 1;
        }

        fn end_frame(&mut self) {
            self.frames_ended += 1;
        }

        fn drain_errors(&mut self) -> Vec<String> {
            std::mem::take(&mut self.pending_errors)
        }
    }

    #[derive(Default)]
    struct TrackerState {
        orientation: Quat,
        recenters: usize,
        last_timestamp: i64,
    }

    struct FakeTracker(Rc<RefCell<TrackerState>>);

    impl HeadTracker for FakeTracker {
        fn get_pose(&mut self, timestamp_nanos: i64, _orientation: DisplayOrientation) -> Pose {
            let mut state = self.0.borrow_mut();
            state.last_timestamp = timestamp_nanos;
            Pose { orientation: state.orientation }
        }
        fn pause(&mut self) {}
        fn resume(&mut self) {}
        fn recenter(&mut self) {
            self.0.borrow_mut().recenters += 1;
        }
    }

    struct FakeVideo;

    impl VideoTextureProvider for FakeVideo {
        fn initialize_playback(&mut self, _texture: TextureId) -> bool {
            true
        }
        fn poll_frame(&mut self) -> Option<VideoFrame> {
            Some(ImageData { width: 2, height: 2, pixels: vec![0; 16] })
        }
    }

    struct MissingImages;

    impl ImageLoader for MissingImages {
        fn load_texture(&mut self, _path: &str) -> Option<ImageData> {
            None
        }
    }

    struct RecordingSink(Rc<RefCell<Vec<ButtonAction>>>);

    impl ActionSink for RecordingSink {
        fn execute(&mut self, action: ButtonAction) -> bool {
            self.0.borrow_mut().push(action);
            true
        }
    }

    struct Harness {
        renderer: Renderer<FakeBackend>,
        tracker: Rc<RefCell<TrackerState>>,
        actions: Rc<RefCell<Vec<ButtonAction>>>,
        start: Instant,
    }

    impl Harness {
        fn new() -> Self {
            let tracker = Rc::new(RefCell::new(TrackerState {
                orientation: Quat::IDENTITY,
                ..Default::default()
            }));
            let actions = Rc::new(RefCell::new(Vec::new()));
            let platform = Platform {
                video: Box::new(FakeVideo),
                images: Box::new(MissingImages),
                tracker: Box::new(FakeTracker(tracker.clone())),
                actions: Box::new(RecordingSink(actions.clone())),
                distortion: Box::new(CardboardDistortionService::new()),
            };
            let mut renderer = Renderer::new(FakeBackend::default(), platform, PlayerConfig::default());
            renderer.on_surface_created();
            renderer.set_screen_params(1920, 1080);
            Self { renderer, tracker, actions, start: Instant::now() }
        }

        /// Head turned left by `yaw` and up by `pitch`
        fn look(&self, yaw: f32, pitch: f32) {
            self.tracker.borrow_mut().orientation =
                (Quat::from_rotation_y(yaw) * Quat::from_rotation_x(pitch)).inverse();
        }

        fn frame_at(&mut self, seconds: f32) {
            let now = self.start + Duration::from_secs_f32(seconds);
            self.renderer.draw_frame_at(0.25, now, 1_000);
        }

        fn open_gui(&mut self) {
            self.look(0.0, 70f32.to_radians());
            self.frame_at(0.0);
            self.look(0.0, 0.0);
            self.frame_at(0.0);
            assert!(self.renderer.is_gui_visible());
        }
    }

    // --- Device parameters ---

    #[test]
    fn missing_calibration_keeps_params_dirty_until_scanned() {
        let mut h = Harness::new();
        h.renderer.set_options(InputVideoLayout::Mono, InputVideoMode::Equirect360, OutputMode::CardboardStereo);

        h.frame_at(0.0);
        assert_eq!(h.renderer.params_dirty(), (true, true));
        assert_eq!(h.renderer.backend().frames_begun, 0);
        assert!(!h.renderer.update_device_params());

        h.renderer.scan_cardboard_calibration();
        assert!(h.renderer.update_device_params());
        assert_eq!(h.renderer.params_dirty(), (false, false));
        assert_eq!(h.renderer.backend().distortion_meshes, 2);

        h.frame_at(0.1);
        let backend = h.renderer.backend();
        assert_eq!(backend.frames_begun, 1);
        assert_eq!(backend.eyes_composited, 1);
        assert_eq!(backend.video_draws.len(), 2);
        assert_eq!(h.renderer.frame_count(), 1);
    }

    #[test]
    fn render_target_is_replaced_not_duplicated() {
        let mut h = Harness::new();
        h.renderer.scan_cardboard_calibration();
        h.renderer.set_options(InputVideoLayout::StereoHoriz, InputVideoMode::Equirect180, OutputMode::CardboardStereo);
        h.frame_at(0.0);
        h.renderer.set_screen_params(2400, 1080);
        h.frame_at(0.1);
        h.renderer.gl_setup();

        let backend = h.renderer.backend();
        assert_eq!(backend.targets_created, 3);
        assert_eq!(backend.live_targets.len(), 1);
        assert!(h.renderer.render_target().is_some());
    }

    #[test]
    fn clean_params_are_a_no_op() {
        let mut h = Harness::new();
        h.frame_at(0.0);
        let created = h.renderer.backend().targets_created;
        assert!(h.renderer.update_device_params());
        assert_eq!(h.renderer.backend().targets_created, created);
    }

    #[test]
    fn resume_marks_device_params_dirty() {
        let mut h = Harness::new();
        h.frame_at(0.0);
        assert_eq!(h.renderer.params_dirty(), (false, false));
        h.renderer.on_pause();
        h.renderer.on_resume();
        assert_eq!(h.renderer.params_dirty(), (false, true));
        assert_eq!(h.renderer.frame_count(), 0);
    }

    #[test]
    fn only_output_mode_changes_dirty_device_params() {
        let mut h = Harness::new();
        h.frame_at(0.0);
        h.renderer.set_options(InputVideoLayout::StereoVert, InputVideoMode::Panorama360, OutputMode::MonoLeft);
        assert_eq!(h.renderer.params_dirty(), (false, false));
        h.renderer.set_options(InputVideoLayout::StereoVert, InputVideoMode::Panorama360, OutputMode::MonoRight);
        assert_eq!(h.renderer.params_dirty(), (false, true));
    }

    #[test]
    fn invalid_bridge_codes_leave_options_untouched() {
        let mut h = Harness::new();
        let before = h.renderer.options();
        assert!(h.renderer.set_options_raw(1, 42, 3).is_err());
        assert_eq!(h.renderer.options(), before);
        h.renderer.set_options_raw(2, 3, 2).unwrap();
        assert_eq!(
            h.renderer.options(),
            (InputVideoLayout::StereoHoriz, InputVideoMode::Equirect360, OutputMode::MonoRight)
        );
    }

    #[test]
    #[should_panic(expected = "GPU error")]
    fn gpu_errors_are_fatal() {
        let mut h = Harness::new();
        h.renderer.backend_mut().pending_errors.push("invalid bind group".into());
        h.frame_at(0.0);
    }

    // --- Matrices in the frame ---

    #[test]
    fn plain_fov_mono_draws_with_a_stable_pure_scale() {
        let mut h = Harness::new();
        h.renderer.set_video_size(1920, 1080);
        h.look(0.5, 0.2);
        h.frame_at(0.0);
        h.look(-0.3, 0.1);
        h.frame_at(0.1);

        let draws = &h.renderer.backend().video_draws;
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0], draws[1]);
        let expected = Mat4::from_diagonal(Vec4::new(2.0 / (16.0 / 9.0), 2.0, -0.5, 1.0));
        assert!(draws[0].mvp.abs_diff_eq(expected, 1e-6));
        assert_eq!(draws[0].color_map, Mat4::IDENTITY);
    }

    #[test]
    fn pose_is_queried_with_prediction() {
        let mut h = Harness::new();
        h.frame_at(0.0);
        assert_eq!(h.tracker.borrow().last_timestamp, 1_000 + 50_000_000);
    }

    // --- Gesture and GUI ---

    #[test]
    fn look_up_gesture_toggles_gui_once() {
        let mut h = Harness::new();
        h.look(0.3, 70f32.to_radians());
        h.frame_at(0.0);
        assert!(h.renderer.is_gui_visible());

        // hovering in the hysteresis band keeps it open
        h.look(0.3, 50f32.to_radians());
        h.frame_at(0.1);
        h.look(0.3, 65f32.to_radians());
        h.frame_at(0.2);
        assert!(h.renderer.is_gui_visible());

        h.look(0.3, 10f32.to_radians());
        h.frame_at(0.3);
        h.look(0.3, 70f32.to_radians());
        h.frame_at(0.4);
        assert!(!h.renderer.is_gui_visible());
    }

    #[test]
    fn open_gui_draws_buttons_and_pointer() {
        let mut h = Harness::new();
        h.open_gui();
        let before = h.renderer.backend().gui_draws;
        h.frame_at(0.1);
        let visible = h.renderer.buttons().iter().filter(|b| b.is_visible()).count();
        assert_eq!(h.renderer.backend().gui_draws - before, visible);
        assert!(h.renderer.backend().line_draws > 0);
    }

    #[test]
    fn dwelling_on_pause_swaps_play_and_pause() {
        let mut h = Harness::new();
        h.open_gui();

        // Pause sits one column left of center on the upper row
        h.look(BUTTON_GRID, BUTTON_PHI_0);
        h.frame_at(1.0);
        h.frame_at(3.9);
        assert!(h.actions.borrow().is_empty());
        h.frame_at(4.0);
        assert_eq!(*h.actions.borrow(), vec![ButtonAction::Pause]);

        let visible = |action| {
            h.renderer.buttons().iter().find(|b| b.action() == action).map(|b| b.is_visible())
        };
        assert_eq!(visible(ButtonAction::Play), Some(true));
        assert_eq!(visible(ButtonAction::Pause), Some(false));
    }

    #[test]
    fn steady_gaze_on_pause_fires_only_once() {
        let mut h = Harness::new();
        h.open_gui();
        h.look(BUTTON_GRID, BUTTON_PHI_0);
        let mut t = 0.1;
        while t <= 13.0 {
            h.frame_at(t);
            t += 0.1;
        }
        assert_eq!(*h.actions.borrow(), vec![ButtonAction::Pause]);

        // Looking away and back re-arms the slot, now showing Play
        h.look(0.0, 0.0);
        h.frame_at(13.1);
        h.look(BUTTON_GRID, BUTTON_PHI_0);
        h.frame_at(13.2);
        h.frame_at(16.5);
        assert_eq!(*h.actions.borrow(), vec![ButtonAction::Pause, ButtonAction::Play]);
    }

    #[test]
    fn look_up_gesture_works_while_turned_sideways() {
        let mut h = Harness::new();
        h.look(FRAC_PI_2, 70f32.to_radians());
        h.frame_at(0.0);
        assert!(h.renderer.is_gui_visible());
        let angles = h.renderer.head_angles();
        assert!((angles.yaw - FRAC_PI_2).abs() < 1e-4, "yaw {}", angles.yaw);
        assert!((angles.pitch - 70f32.to_radians()).abs() < 1e-4, "pitch {}", angles.pitch);

        // The menu opened around the turned heading, so Pause is one column left of it
        h.look(FRAC_PI_2, 0.0);
        h.frame_at(0.1);
        h.look(FRAC_PI_2 + BUTTON_GRID, BUTTON_PHI_0);
        h.frame_at(1.0);
        h.frame_at(4.0);
        assert_eq!(*h.actions.borrow(), vec![ButtonAction::Pause]);
    }

    #[test]
    fn recenter_button_goes_to_the_tracker() {
        let mut h = Harness::new();
        h.open_gui();
        h.look(0.0, BUTTON_PHI_0);
        h.frame_at(1.0);
        h.frame_at(4.5);
        assert_eq!(h.tracker.borrow().recenters, 1);
        assert!(h.actions.borrow().is_empty());
    }

    #[test]
    fn hidden_gui_ignores_gaze() {
        let mut h = Harness::new();
        h.look(BUTTON_GRID, BUTTON_PHI_0);
        h.frame_at(0.0);
        h.frame_at(10.0);
        assert!(h.actions.borrow().is_empty());
        assert!(h.renderer.buttons().iter().all(|b| !b.is_waiting_for_activation()));
    }

    #[test]
    fn progress_bar_follows_video_position_while_shown() {
        let mut h = Harness::new();
        h.renderer.show_progress_bar();
        h.renderer.draw_frame_at(0.25, Instant::now(), 0);
        assert!(h.renderer.progress_bar().is_visible());
        assert_eq!(h.renderer.progress_bar().progress(), 0.25);
    }

    #[test]
    fn drop_releases_every_gpu_resource() {
        let mut h = Harness::new();
        h.renderer.scan_cardboard_calibration();
        h.renderer.set_options(InputVideoLayout::Mono, InputVideoMode::Equirect360, OutputMode::CardboardStereo);
        h.frame_at(0.0);
        h.renderer.on_surface_destroyed();
        let backend = h.renderer.backend();
        assert!(backend.live_meshes.is_empty());
        assert!(backend.live_textures.is_empty());
        assert!(backend.live_targets.is_empty());
    }
}
