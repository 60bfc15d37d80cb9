//! Android host: winit event loop driving the renderer
//!
//! The renderer lives exactly as long as the window surface. Settings pushed
//! from Java while no surface exists are remembered and replayed onto the
//! next renderer.

use std::ffi::CStr;
use std::sync::Arc;

use android_activity::AndroidApp;
use glam::Quat;
use jni::objects::JObject;
use jni::sys::jint;
use jni::JNIEnv;
use log::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::event::{TouchPhase, WindowEvent};
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::android::EventLoopBuilderExtAndroid;
use winit::window::{Window, WindowId};

use crate::commands::{drain_commands, push_command, HostCommand, StickySettings};
use crate::config::PlayerConfig;
use crate::distortion::CardboardDistortionService;
use crate::gpu::WgpuBackend;
use crate::renderer::Renderer;
use crate::sensors::SensorHeadTracker;
use crate::services::{HeadTracker, Platform, StaticHeadTracker};
use crate::video::{JniActionSink, JniBridge, JniImageLoader, JniVideoTextureProvider};

const PACKAGE_NAME: &CStr = c"com.vrvideo.player";
const CALIBRATION_FILE: &str = "viewer_profile.bin";
/// A tap at the screen edge seeks this far; the center doesn't seek
const TAP_SEEK_RANGE_MS: f64 = 10_000.0;

struct PlayerApp {
    app: AndroidApp,
    bridge: JniBridge,
    window: Option<Arc<Window>>,
    renderer: Option<Renderer<WgpuBackend>>,
    sticky: StickySettings,
    touch_x: Option<f64>,
}

impl PlayerApp {
    fn new(app: AndroidApp) -> Self {
        let bridge = JniBridge::new(app.clone());
        Self {
            app,
            bridge,
            window: None,
            renderer: None,
            sticky: StickySettings::default(),
            touch_x: None,
        }
    }

    fn platform(&self) -> Platform {
        let tracker: Box<dyn HeadTracker> = match SensorHeadTracker::new(PACKAGE_NAME) {
            Some(tracker) => Box::new(tracker),
            None => {
                warn!("PlayerApp: no head tracking sensor, using a fixed orientation");
                Box::new(StaticHeadTracker::new(Quat::IDENTITY))
            }
        };

        let mut distortion = match self.app.internal_data_path() {
            Some(dir) => CardboardDistortionService::with_storage(dir.join(CALIBRATION_FILE)),
            None => CardboardDistortionService::new(),
        };
        if let Some(dpi) = self.app.config().density() {
            distortion = distortion.with_display_density(dpi as f32);
        }

        Platform {
            video: Box::new(JniVideoTextureProvider::new(self.bridge.clone())),
            images: Box::new(JniImageLoader::new(self.bridge.clone())),
            tracker,
            actions: Box::new(JniActionSink::new(self.bridge.clone())),
            distortion: Box::new(distortion),
        }
    }

    fn create_renderer(&self, window: &Arc<Window>) -> Option<Renderer<WgpuBackend>> {
        let size = window.inner_size();
        let instance = WgpuBackend::create_instance();
        let surface = match instance.create_surface(window.clone()) {
            Ok(surface) => surface,
            Err(e) => {
                error!("PlayerApp: failed to create surface: {}", e);
                return None;
            }
        };
        let backend = match pollster::block_on(WgpuBackend::new(&instance, surface, size.width, size.height)) {
            Ok(backend) => backend,
            Err(e) => {
                error!("PlayerApp: {}", e);
                return None;
            }
        };

        let mut renderer = Renderer::new(backend, self.platform(), PlayerConfig::default());
        renderer.on_surface_created();
        renderer.set_screen_params(size.width, size.height);
        renderer.on_resume();
        for command in self.sticky.replay() {
            command.apply(&mut renderer);
        }
        Some(renderer)
    }

    fn redraw(&mut self) {
        for command in drain_commands() {
            self.sticky.remember(command);
            if let Some(renderer) = &mut self.renderer {
                command.apply(renderer);
            }
        }

        if let Some(renderer) = &mut self.renderer {
            let position = self.bridge.video_position();
            renderer.draw_frame(position);
        }

        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    /// Taps seek proportionally to the distance from the screen center
    fn tap(&mut self, x: f64) {
        let Some(window) = &self.window else { return };
        let half_width = (window.inner_size().width.max(1) as f64) * 0.5;
        let rel_x = (x - half_width) / half_width;
        self.bridge.seek((TAP_SEEK_RANGE_MS * rel_x).round() as i32);
        if let Some(renderer) = &mut self.renderer {
            renderer.show_progress_bar();
        }
    }
}

impl ApplicationHandler for PlayerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        info!("PlayerApp: resumed, creating window");

        let window_attrs = Window::default_attributes().with_title("VR Video Player");
        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                error!("PlayerApp: failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        self.renderer = self.create_renderer(&window);
        if self.renderer.is_none() {
            event_loop.exit();
            return;
        }
        window.request_redraw();
        self.window = Some(window);
    }

    fn suspended(&mut self, _event_loop: &ActiveEventLoop) {
        info!("PlayerApp: suspended, releasing GPU resources");
        if let Some(mut renderer) = self.renderer.take() {
            renderer.on_pause();
            renderer.on_surface_destroyed();
        }
        self.window = None;
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _window_id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),
            WindowEvent::Resized(size) => {
                if let Some(renderer) = &mut self.renderer {
                    renderer.set_screen_params(size.width, size.height);
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            WindowEvent::Touch(touch) => match touch.phase {
                TouchPhase::Started => self.touch_x = Some(touch.location.x),
                TouchPhase::Ended => {
                    if let Some(x) = self.touch_x.take() {
                        self.tap(x);
                    }
                }
                TouchPhase::Cancelled => self.touch_x = None,
                TouchPhase::Moved => {}
            },
            _ => {}
        }
    }
}

/// Android entry point
#[no_mangle]
pub fn android_main(app: AndroidApp) {
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Info)
            .with_tag("VRVideoPlayer"),
    );

    info!("VR video player starting");

    let event_loop = match EventLoop::builder().with_android_app(app.clone()).build() {
        Ok(event_loop) => event_loop,
        Err(e) => {
            error!("PlayerApp: failed to create event loop: {}", e);
            return;
        }
    };

    let mut player = PlayerApp::new(app);
    if let Err(e) = event_loop.run_app(&mut player) {
        error!("PlayerApp: event loop failed: {}", e);
    }
}

// --- JNI exports for the settings menu and media player callbacks ---

#[no_mangle]
pub extern "system" fn Java_com_vrvideo_player_NativeLibrary_nativeSetOptions(
    _env: JNIEnv,
    _class: JObject,
    layout: jint,
    mode: jint,
    output: jint,
) {
    push_command(HostCommand::SetOptions { layout, mode, output });
}

#[no_mangle]
pub extern "system" fn Java_com_vrvideo_player_NativeLibrary_nativeOnVideoSizeChanged(
    _env: JNIEnv,
    _class: JObject,
    width: jint,
    height: jint,
) {
    push_command(HostCommand::SetVideoSize {
        width: width.max(0) as u32,
        height: height.max(0) as u32,
    });
}

#[no_mangle]
pub extern "system" fn Java_com_vrvideo_player_NativeLibrary_nativeScanCardboardQr(_env: JNIEnv, _class: JObject) {
    push_command(HostCommand::ScanCalibration);
}

#[no_mangle]
pub extern "system" fn Java_com_vrvideo_player_NativeLibrary_nativeShowProgressBar(_env: JNIEnv, _class: JObject) {
    push_command(HostCommand::ShowProgressBar);
}
