//! JNI bridge to the Java side of the player
//!
//! The activity owns the Android MediaPlayer and the playback controller; the
//! adapters here call into it and translate the results into the renderer's
//! service traits. Every call attaches the current thread, and any Java
//! exception is logged and cleared so it never crosses back into Rust.

use android_activity::AndroidApp;
use jni::objects::{JByteArray, JIntArray, JObject, JValue};
use jni::sys::jobject;
use jni::{JNIEnv, JavaVM};
use log::{error, info, warn};

use crate::gpu::TextureId;
use crate::gui::ButtonAction;
use crate::services::{ActionSink, ImageData, ImageLoader, VideoFrame, VideoTextureProvider};

/// Handle on the VM and the activity object, shared by the adapters
#[derive(Clone)]
pub struct JniBridge {
    app: AndroidApp,
}

impl JniBridge {
    pub fn new(app: AndroidApp) -> Self {
        Self { app }
    }

    /// Runs `f` with an attached env and the activity. Errors and pending
    /// exceptions are logged under `label` and turn into `None`.
    pub fn with_activity<R>(
        &self,
        label: &str,
        f: impl FnOnce(&mut JNIEnv, &JObject) -> jni::errors::Result<R>,
    ) -> Option<R> {
        let vm = match unsafe { JavaVM::from_raw(self.app.vm_as_ptr() as *mut jni::sys::JavaVM) } {
            Ok(vm) => vm,
            Err(e) => {
                error!("JniBridge: no JavaVM for {}: {:?}", label, e);
                return None;
            }
        };
        let mut env = match vm.attach_current_thread() {
            Ok(env) => env,
            Err(e) => {
                error!("JniBridge: failed to attach thread for {}: {:?}", label, e);
                return None;
            }
        };
        let activity = unsafe { JObject::from_raw(self.app.activity_as_ptr() as jobject) };

        let result = f(&mut *env, &activity);
        if env.exception_check().unwrap_or(false) {
            let _ = env.exception_describe();
            let _ = env.exception_clear();
        }

        match result {
            Ok(value) => Some(value),
            Err(e) => {
                error!("JniBridge: {} failed: {:?}", label, e);
                None
            }
        }
    }

    /// Current playback position in [0, 1]
    pub fn video_position(&self) -> f32 {
        self.with_activity("getVideoPosition", |env, activity| {
            env.call_method(activity, "getVideoPosition", "()F", &[])?.f()
        })
        .unwrap_or(0.0)
    }

    /// Seeks by `millis` relative to the current position
    pub fn seek(&self, millis: i32) {
        self.with_activity("seek", |env, activity| {
            env.call_method(activity, "seek", "(I)V", &[JValue::Int(millis)])?.v()
        });
    }
}

/// Video frames pulled from the activity's decoder as RGBA byte arrays
pub struct JniVideoTextureProvider {
    bridge: JniBridge,
}

impl JniVideoTextureProvider {
    pub fn new(bridge: JniBridge) -> Self {
        Self { bridge }
    }
}

impl VideoTextureProvider for JniVideoTextureProvider {
    fn initialize_playback(&mut self, texture: TextureId) -> bool {
        info!("JniVideoTextureProvider: initializing playback into texture {}", texture.0);
        self.bridge
            .with_activity("initializePlayback", |env, activity| {
                env.call_method(activity, "initializePlayback", "(I)Z", &[JValue::Int(texture.0 as i32)])?.z()
            })
            .unwrap_or(false)
    }

    fn poll_frame(&mut self) -> Option<VideoFrame> {
        self.bridge
            .with_activity("getVideoFrame", |env, activity| {
                let width = env.call_method(activity, "getVideoWidth", "()I", &[])?.i()?;
                let height = env.call_method(activity, "getVideoHeight", "()I", &[])?.i()?;
                if width <= 0 || height <= 0 {
                    return Ok(None);
                }

                let obj = env.call_method(activity, "getVideoFrame", "()[B", &[])?.l()?;
                if obj.is_null() {
                    return Ok(None);
                }
                let bytes: JByteArray = obj.into();
                let pixels = env.convert_byte_array(&bytes)?;
                Ok(Some(ImageData { width: width as u32, height: height as u32, pixels }))
            })
            .flatten()
            .filter(|frame| {
                let ok = frame.is_consistent();
                if !ok {
                    warn!(
                        "JniVideoTextureProvider: dropping {}x{} frame with {} bytes",
                        frame.width,
                        frame.height,
                        frame.pixels.len()
                    );
                }
                ok
            })
    }
}

/// Decodes images from the APK assets with `BitmapFactory`
pub struct JniImageLoader {
    bridge: JniBridge,
}

impl JniImageLoader {
    pub fn new(bridge: JniBridge) -> Self {
        Self { bridge }
    }
}

impl ImageLoader for JniImageLoader {
    fn load_texture(&mut self, path: &str) -> Option<ImageData> {
        self.bridge
            .with_activity("loadTexture", |env, activity| {
                let assets = env
                    .call_method(activity, "getAssets", "()Landroid/content/res/AssetManager;", &[])?
                    .l()?;
                let jpath = env.new_string(path)?;
                let stream = env
                    .call_method(&assets, "open", "(Ljava/lang/String;)Ljava/io/InputStream;", &[JValue::Object(&jpath)])?
                    .l()?;
                let bitmap = env
                    .call_static_method(
                        "android/graphics/BitmapFactory",
                        "decodeStream",
                        "(Ljava/io/InputStream;)Landroid/graphics/Bitmap;",
                        &[JValue::Object(&stream)],
                    )?
                    .l()?;
                env.call_method(&stream, "close", "()V", &[])?;
                if bitmap.is_null() {
                    return Ok(None);
                }

                let width = env.call_method(&bitmap, "getWidth", "()I", &[])?.i()?;
                let height = env.call_method(&bitmap, "getHeight", "()I", &[])?.i()?;
                let argb: JIntArray = env.new_int_array(width * height)?;
                env.call_method(
                    &bitmap,
                    "getPixels",
                    "([IIIIIII)V",
                    &[
                        JValue::Object(&argb),
                        JValue::Int(0),
                        JValue::Int(width),
                        JValue::Int(0),
                        JValue::Int(0),
                        JValue::Int(width),
                        JValue::Int(height),
                    ],
                )?;
                let mut colors = vec![0i32; (width * height) as usize];
                env.get_int_array_region(&argb, 0, &mut colors)?;
                env.call_method(&bitmap, "recycle", "()V", &[])?;

                Ok(Some(ImageData {
                    width: width as u32,
                    height: height as u32,
                    pixels: argb_to_rgba(&colors),
                }))
            })
            .flatten()
    }
}

/// Android `Color` ints to RGBA bytes
fn argb_to_rgba(colors: &[i32]) -> Vec<u8> {
    colors
        .iter()
        .flat_map(|&c| {
            let [a, r, g, b] = (c as u32).to_be_bytes();
            [r, g, b, a]
        })
        .collect()
}

/// Forwards GUI actions to the activity's playback controller
pub struct JniActionSink {
    bridge: JniBridge,
}

impl JniActionSink {
    pub fn new(bridge: JniBridge) -> Self {
        Self { bridge }
    }
}

impl ActionSink for JniActionSink {
    fn execute(&mut self, action: ButtonAction) -> bool {
        info!("JniActionSink: {:?}", action);
        self.bridge
            .with_activity("executeButtonAction", |env, activity| {
                env.call_method(activity, "executeButtonAction", "(I)V", &[JValue::Int(action.code())])?.v()
            })
            .is_some()
    }
}
