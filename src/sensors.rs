//! Head tracking from the Android Game Rotation Vector sensor
//!
//! Uses ndk-sys FFI bindings directly. The game rotation vector fuses the
//! gyroscope and accelerometer without the magnetometer, so it doesn't jump
//! near metal, but its heading drifts slowly. Recentering hides the drift.

use std::f32::consts::FRAC_PI_2;
use std::ptr;

use glam::{Quat, Vec3};
use log::{info, warn};

use crate::services::{DisplayOrientation, HeadTracker, Pose};

const ASENSOR_TYPE_GAME_ROTATION_VECTOR: i32 = 15;
/// ~60Hz
const SENSOR_EVENT_PERIOD_US: i32 = 16_000;

/// Head tracker reading the game rotation vector through an NDK event queue
pub struct SensorHeadTracker {
    sensor_manager: *mut ndk_sys::ASensorManager,
    sensor: *const ndk_sys::ASensor,
    event_queue: *mut ndk_sys::ASensorEventQueue,
    enabled: bool,

    /// Latest sensor reading, device frame to Android world frame
    device_to_world: Quat,
    /// Applied after the world-to-head rotation to undo a recentered heading
    yaw_offset: Quat,
}

impl SensorHeadTracker {
    /// Returns `None` when the device has no usable rotation sensor, so the
    /// host can fall back to a static tracker.
    pub fn new(package_name: &std::ffi::CStr) -> Option<Self> {
        info!("SensorHeadTracker: initializing");

        unsafe {
            let mut sensor_manager = ndk_sys::ASensorManager_getInstanceForPackage(package_name.as_ptr());
            if sensor_manager.is_null() {
                warn!("SensorHeadTracker: no manager for package, trying fallback");
                sensor_manager = ndk_sys::ASensorManager_getInstance();
            }
            if sensor_manager.is_null() {
                warn!("SensorHeadTracker: ASensorManager not available");
                return None;
            }

            let sensor = ndk_sys::ASensorManager_getDefaultSensor(sensor_manager, ASENSOR_TYPE_GAME_ROTATION_VECTOR);
            if sensor.is_null() {
                warn!("SensorHeadTracker: game rotation vector not available");
                return None;
            }

            let mut looper = ndk_sys::ALooper_forThread();
            if looper.is_null() {
                looper = ndk_sys::ALooper_prepare(0);
            }
            if looper.is_null() {
                warn!("SensorHeadTracker: failed to get ALooper");
                return None;
            }

            let event_queue =
                ndk_sys::ASensorManager_createEventQueue(sensor_manager, looper, 0, None, ptr::null_mut());
            if event_queue.is_null() {
                warn!("SensorHeadTracker: failed to create sensor event queue");
                return None;
            }

            let mut tracker = Self {
                sensor_manager,
                sensor,
                event_queue,
                enabled: false,
                device_to_world: Quat::IDENTITY,
                yaw_offset: Quat::IDENTITY,
            };
            tracker.enable();
            info!("SensorHeadTracker: ready");
            Some(tracker)
        }
    }

    fn enable(&mut self) {
        if self.enabled {
            return;
        }
        unsafe {
            let result = ndk_sys::ASensorEventQueue_enableSensor(self.event_queue, self.sensor);
            if result < 0 {
                warn!("SensorHeadTracker: failed to enable sensor: {}", result);
                return;
            }
            ndk_sys::ASensorEventQueue_setEventRate(self.event_queue, self.sensor, SENSOR_EVENT_PERIOD_US);
        }
        self.enabled = true;
    }

    fn disable(&mut self) {
        if !self.enabled {
            return;
        }
        unsafe {
            ndk_sys::ASensorEventQueue_disableSensor(self.event_queue, self.sensor);
        }
        self.enabled = false;
    }

    /// Drains pending events, keeping the newest rotation
    fn poll(&mut self) {
        if !self.enabled {
            return;
        }
        unsafe {
            let mut event: ndk_sys::ASensorEvent = std::mem::zeroed();
            while ndk_sys::ASensorEventQueue_getEvents(self.event_queue, &mut event, 1) > 0 {
                if event.type_ != ASENSOR_TYPE_GAME_ROTATION_VECTOR {
                    continue;
                }
                let data = event.__bindgen_anon_1.__bindgen_anon_1.data;
                self.device_to_world = rotation_vector_to_quat(data[0], data[1], data[2]);
            }
        }
    }

    fn world_to_head(&self, orientation: DisplayOrientation) -> Quat {
        world_to_head(self.device_to_world, orientation)
    }
}

/// Unit quaternion from the x/y/z rotation vector components; w is implied
fn rotation_vector_to_quat(x: f32, y: f32, z: f32) -> Quat {
    let w = (1.0 - x * x - y * y - z * z).max(0.0).sqrt();
    Quat::from_xyzw(x, y, z, w).normalize()
}

/// Rotation from the rendering world (y up, -z north) into screen space
/// (x right, y up, looking down -z) for the given display rotation.
fn world_to_head(device_to_world: Quat, orientation: DisplayOrientation) -> Quat {
    // Android world is z up, y north
    let render_to_android = Quat::from_rotation_x(FRAC_PI_2);
    let device_to_screen = match orientation {
        DisplayOrientation::LandscapeLeft => Quat::from_rotation_z(FRAC_PI_2),
        DisplayOrientation::LandscapeRight => Quat::from_rotation_z(-FRAC_PI_2),
        DisplayOrientation::Portrait => Quat::IDENTITY,
    };
    (device_to_screen * device_to_world.conjugate() * render_to_android).normalize()
}

/// Yaw (left positive) of the direction the head looks in
fn heading_yaw(world_to_head: Quat) -> f32 {
    let forward = world_to_head.conjugate() * Vec3::NEG_Z;
    (-forward.x).atan2(-forward.z)
}

impl HeadTracker for SensorHeadTracker {
    fn get_pose(&mut self, _timestamp_nanos: i64, orientation: DisplayOrientation) -> Pose {
        self.poll();
        Pose {
            orientation: (self.world_to_head(orientation) * self.yaw_offset).normalize(),
        }
    }

    fn pause(&mut self) {
        info!("SensorHeadTracker: pause");
        self.disable();
    }

    fn resume(&mut self) {
        info!("SensorHeadTracker: resume");
        self.enable();
    }

    fn recenter(&mut self) {
        let yaw = heading_yaw(self.world_to_head(DisplayOrientation::default()));
        self.yaw_offset = Quat::from_rotation_y(yaw);
        info!("SensorHeadTracker: recentered, heading was {:.1} deg", yaw.to_degrees());
    }
}

impl Drop for SensorHeadTracker {
    fn drop(&mut self) {
        self.disable();
        unsafe {
            if !self.event_queue.is_null() && !self.sensor_manager.is_null() {
                ndk_sys::ASensorManager_destroyEventQueue(self.sensor_manager, self.event_queue);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-5), "{:?} != {:?}", a, b);
    }

    /// Landscape with the top of the phone to the left, screen facing south
    fn upright_facing_north() -> Quat {
        // columns: device x -> up, device y -> west, device z -> south
        Quat::from_mat3(&glam::Mat3::from_cols(Vec3::Z, Vec3::NEG_X, Vec3::NEG_Y))
    }

    #[test]
    fn upright_landscape_looks_down_negative_z() {
        let q = world_to_head(upright_facing_north(), DisplayOrientation::LandscapeLeft);
        assert_vec_eq(q * Vec3::NEG_Z, Vec3::NEG_Z);
        assert_vec_eq(q * Vec3::Y, Vec3::Y);
    }

    #[test]
    fn heading_of_a_turned_head() {
        let q = (Quat::from_rotation_y(0.6) * Quat::from_rotation_x(0.2)).inverse();
        assert!((heading_yaw(q) - 0.6).abs() < 1e-5);
    }

    #[test]
    fn recenter_offset_cancels_heading() {
        let q = (Quat::from_rotation_y(-1.1)).inverse();
        let offset = Quat::from_rotation_y(heading_yaw(q));
        assert_vec_eq((q * offset) * Vec3::NEG_Z, Vec3::NEG_Z);
    }

    #[test]
    fn implied_w_is_normalized() {
        let q = rotation_vector_to_quat(0.0, 0.0, 0.0);
        assert_eq!(q, Quat::IDENTITY);
    }
}
