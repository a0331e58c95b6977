//! Shared controller state types.

/// Number of IMU subframes carried by one full telemetry frame.
pub const IMU_SUBFRAMES: usize = 3;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Euler orientation in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Orientation {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TouchState {
    /// Raw 10-bit X coordinate (0..=1023, usable range 0..=315).
    pub x: i32,
    /// Raw 10-bit Y coordinate.
    pub y: i32,
    pub button: bool,
}

/// One decoded + derived snapshot of the controller.
///
/// Exactly two live instances exist per connection: the adapter's "current"
/// and "previous" (for edge detection). Current is copied into previous at the
/// start of each full-frame decode.
#[derive(Debug, Clone, Copy)]
pub struct JoyState {
    /// Per-subframe sample counters from the device.
    pub sensor_time: [u32; IMU_SUBFRAMES],
    /// Accelerometer subframes in m/s², oldest first.
    pub accel: [Vec3; IMU_SUBFRAMES],
    /// Gyroscope subframes in rad/s, oldest first.
    pub gyro: [Vec3; IMU_SUBFRAMES],
    /// Magnetometer vector, raw counts.
    pub magno: Vec3,
    pub touchpad: TouchState,

    pub temperature: u8,
    pub trigger_button: bool,
    pub home_button: bool,
    pub back_button: bool,
    pub volume_up_button: bool,
    pub volume_down_button: bool,
    pub battery: u8,

    /// Fused orientation estimate.
    pub orient: Orientation,
    /// Reference orientation captured when pointer mode was last re-centered.
    pub reference: Orientation,
    /// Pointer source: true = touchpad deltas, false = orientation projection.
    pub use_pad: bool,

    pub update_counts: u32,
    /// Host-side monotonic timestamp of the last full frame, milliseconds.
    pub last_updated_ms: u32,
}

impl Default for JoyState {
    fn default() -> Self {
        Self {
            sensor_time: [0; IMU_SUBFRAMES],
            accel: [Vec3::default(); IMU_SUBFRAMES],
            gyro: [Vec3::default(); IMU_SUBFRAMES],
            magno: Vec3::default(),
            touchpad: TouchState::default(),
            temperature: 0,
            trigger_button: false,
            home_button: false,
            back_button: false,
            volume_up_button: false,
            volume_down_button: false,
            battery: 0,
            orient: Orientation::default(),
            reference: Orientation::default(),
            // The controller starts in touchpad mode; a center tap switches
            // to orientation pointing.
            use_pad: true,
            update_counts: 0,
            last_updated_ms: 0,
        }
    }
}

/// Virtual screen the orientation pointer is projected onto.
#[derive(Debug, Clone, Copy)]
pub struct PointerConfig {
    /// Distance from the user to the virtual screen, meters.
    pub screen_distance: f32,
    /// Virtual screen width, meters.
    pub screen_width: f32,
    /// Virtual screen height, meters.
    pub screen_height: f32,
    /// Pixel range the clamped projection is scaled to.
    pub pixel_range: f32,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            screen_distance: 0.5,
            screen_width: 0.6,
            screen_height: 0.35,
            pixel_range: 500.0,
        }
    }
}
