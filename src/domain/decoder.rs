//! Telemetry frame decoder.
//!
//! The controller pushes two kinds of notifications: short control frames
//! (opcode + optional tick counter, handled by the adapter) and full 60-byte
//! telemetry frames decoded here.
//!
//! Full frame layout (little-endian unless noted):
//!
//! ```text
//! [ 0..16]  IMU subframe 0: u32 sample counter, i16 accel x/y/z, i16 gyro x/y/z
//! [16..32]  IMU subframe 1 (same layout)
//! [32..48]  IMU subframe 2 (newest)
//! [48..54]  i16 magnetometer x/y/z, big-endian
//! [54..57]  10-bit touchpad X/Y packed across 3 bytes
//! [57]      temperature (u8)
//! [58]      button bitmask
//! [59]      battery (u8)
//! ```

use crate::domain::models::{JoyState, Vec3, IMU_SUBFRAMES};

/// Exact length of a full telemetry frame.
pub const FULL_FRAME_LEN: usize = 60;

/// Accelerometer LSBs per g.
pub const ACCEL_LSB_PER_G: f32 = 2048.0;
/// Gyroscope LSBs per degree/second.
pub const GYRO_LSB_PER_DPS: f32 = 14.285;
/// Standard gravity, m/s².
pub const G_TO_MS2: f32 = 9.80665;

/// Accelerometer scale: raw counts → m/s².
pub const ACCEL_SCALE: f32 = G_TO_MS2 / ACCEL_LSB_PER_G;
/// Gyroscope scale: raw counts → rad/s.
pub const GYRO_SCALE: f32 = core::f32::consts::PI / 180.0 / GYRO_LSB_PER_DPS;

pub const BTN_TRIGGER: u8 = 0x01;
pub const BTN_HOME: u8 = 0x02;
pub const BTN_BACK: u8 = 0x04;
pub const BTN_TOUCHPAD: u8 = 0x08;
pub const BTN_VOLUME_UP: u8 = 0x10;
pub const BTN_VOLUME_DOWN: u8 = 0x20;

/// Decode a full telemetry frame into `state`.
///
/// Only the decoded fields are overwritten; derived fields (orientation,
/// reference, pointer mode) are left for the fusion filter and synthesizer.
/// `now_ms` is the host-side monotonic receive time.
pub fn decode_into(state: &mut JoyState, frame: &[u8; FULL_FRAME_LEN], now_ms: u32) {
    for t in 0..IMU_SUBFRAMES {
        let base = t * 16;

        state.sensor_time[t] = u32::from_le_bytes([
            frame[base],
            frame[base + 1],
            frame[base + 2],
            frame[base + 3],
        ]);

        let ax = i16::from_le_bytes([frame[base + 4], frame[base + 5]]);
        let ay = i16::from_le_bytes([frame[base + 6], frame[base + 7]]);
        let az = i16::from_le_bytes([frame[base + 8], frame[base + 9]]);

        let gx = i16::from_le_bytes([frame[base + 10], frame[base + 11]]);
        let gy = i16::from_le_bytes([frame[base + 12], frame[base + 13]]);
        let gz = i16::from_le_bytes([frame[base + 14], frame[base + 15]]);

        state.accel[t] = Vec3::new(
            f32::from(ax) * ACCEL_SCALE,
            f32::from(ay) * ACCEL_SCALE,
            f32::from(az) * ACCEL_SCALE,
        );
        state.gyro[t] = Vec3::new(
            f32::from(gx) * GYRO_SCALE,
            f32::from(gy) * GYRO_SCALE,
            f32::from(gz) * GYRO_SCALE,
        );
    }

    // Magnetometer is the one big-endian field in the frame.
    state.magno = Vec3::new(
        f32::from(i16::from_be_bytes([frame[48], frame[49]])),
        f32::from(i16::from_be_bytes([frame[50], frame[51]])),
        f32::from(i16::from_be_bytes([frame[52], frame[53]])),
    );

    // Two 10-bit touchpad axes packed across bytes 54..57.
    state.touchpad.x =
        i32::from((u16::from(frame[54] & 0x0F) << 6) | (u16::from(frame[55] & 0xFC) >> 2)) & 0x3FF;
    state.touchpad.y = i32::from((u16::from(frame[55] & 0x03) << 8) | u16::from(frame[56])) & 0x3FF;

    state.temperature = frame[57];

    let buttons = frame[58];
    state.trigger_button = buttons & BTN_TRIGGER != 0;
    state.home_button = buttons & BTN_HOME != 0;
    state.back_button = buttons & BTN_BACK != 0;
    state.touchpad.button = buttons & BTN_TOUCHPAD != 0;
    state.volume_up_button = buttons & BTN_VOLUME_UP != 0;
    state.volume_down_button = buttons & BTN_VOLUME_DOWN != 0;

    state.battery = frame[59];

    state.update_counts = state.update_counts.wrapping_add(1);
    state.last_updated_ms = now_ms;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_subframe(frame: &mut [u8; FULL_FRAME_LEN], t: usize, counter: u32, imu: [i16; 6]) {
        let base = t * 16;
        frame[base..base + 4].copy_from_slice(&counter.to_le_bytes());
        for (i, v) in imu.iter().enumerate() {
            frame[base + 4 + i * 2..base + 6 + i * 2].copy_from_slice(&v.to_le_bytes());
        }
    }

    #[test]
    fn decodes_imu_subframes_with_scaling() {
        let mut frame = [0u8; FULL_FRAME_LEN];
        write_subframe(&mut frame, 0, 100, [2048, -2048, 0, 100, -100, 0]);
        write_subframe(&mut frame, 1, 200, [0, 0, 2048, 0, 0, 200]);
        write_subframe(&mut frame, 2, 300, [1024, 0, 0, 50, 0, 0]);

        let mut state = JoyState::default();
        decode_into(&mut state, &frame, 42);

        assert_eq!(state.sensor_time, [100, 200, 300]);
        assert!((state.accel[0].x - G_TO_MS2).abs() < 1e-4);
        assert!((state.accel[0].y + G_TO_MS2).abs() < 1e-4);
        assert!((state.accel[1].z - G_TO_MS2).abs() < 1e-4);
        assert!((state.gyro[0].x - 100.0 * GYRO_SCALE).abs() < 1e-6);
        assert!((state.gyro[2].x - 50.0 * GYRO_SCALE).abs() < 1e-6);
        assert_eq!(state.last_updated_ms, 42);
        assert_eq!(state.update_counts, 1);
    }

    #[test]
    fn magnetometer_decodes_big_endian() {
        let mut frame = [0u8; FULL_FRAME_LEN];
        frame[48] = 0x01;
        frame[49] = 0x02;

        let mut state = JoyState::default();
        decode_into(&mut state, &frame, 0);

        assert_eq!(state.magno.x, f32::from(0x0102i16));
        assert_ne!(state.magno.x, f32::from(0x0201i16));
    }

    #[test]
    fn magnetometer_decodes_negative_values() {
        let mut frame = [0u8; FULL_FRAME_LEN];
        let raw = (-1234i16).to_be_bytes();
        frame[50] = raw[0];
        frame[51] = raw[1];

        let mut state = JoyState::default();
        decode_into(&mut state, &frame, 0);

        assert_eq!(state.magno.y, -1234.0);
    }

    #[test]
    fn touchpad_unpacks_full_scale() {
        let mut frame = [0u8; FULL_FRAME_LEN];
        frame[54] = 0xFF;
        frame[55] = 0xFF;
        frame[56] = 0xFF;

        let mut state = JoyState::default();
        decode_into(&mut state, &frame, 0);

        assert_eq!(state.touchpad.x, 0x3FF);
        assert_eq!(state.touchpad.y, 0x3FF);
    }

    #[test]
    fn touchpad_unpacks_bit_positions() {
        let mut frame = [0u8; FULL_FRAME_LEN];
        // X = 0b0001_000000 = 64: bit 6 of X lives in byte 54's low nibble.
        frame[54] = 0x01;
        // Y = 0b01_00000001: high bits from byte 55, low byte from 56.
        frame[55] = 0x01;
        frame[56] = 0x01;

        let mut state = JoyState::default();
        decode_into(&mut state, &frame, 0);

        assert_eq!(state.touchpad.x, 64);
        assert_eq!(state.touchpad.y, 257);
    }

    #[test]
    fn button_bitmask_maps_each_bit() {
        let mut frame = [0u8; FULL_FRAME_LEN];
        frame[58] = BTN_TRIGGER | BTN_BACK | BTN_VOLUME_DOWN;
        frame[57] = 23;
        frame[59] = 87;

        let mut state = JoyState::default();
        decode_into(&mut state, &frame, 0);

        assert!(state.trigger_button);
        assert!(!state.home_button);
        assert!(state.back_button);
        assert!(!state.touchpad.button);
        assert!(!state.volume_up_button);
        assert!(state.volume_down_button);
        assert_eq!(state.temperature, 23);
        assert_eq!(state.battery, 87);
    }

    #[test]
    fn imu_scaling_is_invertible() {
        let mut frame = [0u8; FULL_FRAME_LEN];
        let imu = [[1234i16, -5678, 42, 900, -900, 14], [1, -1, 32767, -32768, 0, 7], [
            -2048, 2048, 512, -512, 100, -100,
        ]];
        for (t, sub) in imu.iter().enumerate() {
            write_subframe(&mut frame, t, t as u32, *sub);
        }

        let mut state = JoyState::default();
        decode_into(&mut state, &frame, 0);

        // Re-encode the scaled values and compare against the raw subframe bytes.
        for (t, sub) in imu.iter().enumerate() {
            let accel = state.accel[t];
            let gyro = state.gyro[t];
            let recovered = [
                (accel.x / ACCEL_SCALE).round() as i16,
                (accel.y / ACCEL_SCALE).round() as i16,
                (accel.z / ACCEL_SCALE).round() as i16,
                (gyro.x / GYRO_SCALE).round() as i16,
                (gyro.y / GYRO_SCALE).round() as i16,
                (gyro.z / GYRO_SCALE).round() as i16,
            ];
            assert_eq!(&recovered, sub, "subframe {t} does not round-trip");
        }
    }
}
