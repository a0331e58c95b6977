//! Motion fusion filter.
//!
//! Each full frame carries the three most recent IMU subframes. The filter
//! low-passes them with fixed weights, integrates the smoothed gyro into the
//! orientation estimate, and blends in accelerometer-derived roll/pitch with a
//! complementary filter so gyro drift stays bounded. Yaw is gyro-integration
//! only; the magnetometer is deliberately not used, so heading drifts.

use crate::domain::models::{JoyState, Vec3, IMU_SUBFRAMES};

/// Low-pass weights over the IMU subframes, oldest → newest. Sum to 1.0.
pub const SMOOTH_WEIGHTS: [f32; IMU_SUBFRAMES] = [0.1, 0.3, 0.6];

/// Complementary filter coefficient: 98% gyro, 2% accelerometer.
pub const COMPLEMENTARY_ALPHA: f32 = 0.98;

/// Assumed frame period when consecutive timestamps are not increasing.
pub const FALLBACK_FRAME_DT: f32 = 1.0 / 120.0;

/// Fixed-weight average of the three subframes, newest weighted heaviest.
pub fn weighted_average(samples: &[Vec3; IMU_SUBFRAMES]) -> Vec3 {
    let mut out = Vec3::default();
    for (sample, w) in samples.iter().zip(SMOOTH_WEIGHTS) {
        out.x += sample.x * w;
        out.y += sample.y * w;
        out.z += sample.z * w;
    }
    out
}

/// Advance the orientation estimate in `current` using the freshly decoded
/// subframes and the timestamp of the `previous` snapshot.
///
/// `current.orient` still holds the previous estimate at entry (the decoder
/// does not touch derived fields), so integration is in place.
pub fn update(current: &mut JoyState, previous: &JoyState) {
    let gyro = weighted_average(&current.gyro);
    let accel = weighted_average(&current.accel);

    // Guard against a stalled or wrapped timestamp.
    let dt = if current.last_updated_ms > previous.last_updated_ms {
        (current.last_updated_ms - previous.last_updated_ms) as f32 * 1e-3
    } else {
        FALLBACK_FRAME_DT
    };

    current.orient.roll += gyro.x * dt;
    current.orient.pitch += gyro.y * dt;
    current.orient.yaw += gyro.z * dt;

    // Gravity projection gives an absolute (drift-free) roll/pitch reading.
    let acc_roll = accel.y.atan2(accel.z);
    let acc_pitch = (-accel.x).atan2((accel.y * accel.y + accel.z * accel.z).sqrt());

    current.orient.roll =
        COMPLEMENTARY_ALPHA * current.orient.roll + (1.0 - COMPLEMENTARY_ALPHA) * acc_roll;
    current.orient.pitch =
        COMPLEMENTARY_ALPHA * current.orient.pitch + (1.0 - COMPLEMENTARY_ALPHA) * acc_pitch;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_one() {
        let sum: f32 = SMOOTH_WEIGHTS.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
    }

    #[test]
    fn weighted_average_favors_newest() {
        let samples = [
            Vec3::new(10.0, 0.0, 0.0),
            Vec3::new(20.0, 0.0, 0.0),
            Vec3::new(30.0, 0.0, 0.0),
        ];
        let avg = weighted_average(&samples);
        assert!((avg.x - 25.0).abs() < 1e-5);
    }

    #[test]
    fn single_update_is_gyro_dominated() {
        let mut current = JoyState::default();
        let previous = JoyState::default();

        // 1 rad/s around X in every subframe; level accelerometer.
        for t in 0..IMU_SUBFRAMES {
            current.gyro[t] = Vec3::new(1.0, 0.0, 0.0);
            current.accel[t] = Vec3::new(0.0, 0.0, 9.80665);
        }

        // Equal timestamps force the 120 Hz fallback period.
        update(&mut current, &previous);

        let expected = COMPLEMENTARY_ALPHA * FALLBACK_FRAME_DT;
        assert!((current.orient.roll - expected).abs() < 1e-6);
        assert_eq!(current.orient.pitch, 0.0);
    }

    #[test]
    fn level_accelerometer_pulls_tilt_back_to_zero() {
        let mut current = JoyState::default();
        current.orient.roll = 1.0;
        current.orient.pitch = -0.5;
        for t in 0..IMU_SUBFRAMES {
            current.accel[t] = Vec3::new(0.0, 0.0, 9.80665);
        }

        for i in 0..200u32 {
            let previous = current;
            current.last_updated_ms = (i + 1) * 8;
            update(&mut current, &previous);
        }

        // Pure gravity with no rotation: the 2% accel term decays the error.
        assert!(current.orient.roll.abs() < 0.02);
        assert!(current.orient.pitch.abs() < 0.02);
    }

    #[test]
    fn falls_back_to_fixed_period_on_stalled_timestamp() {
        let mut current = JoyState::default();
        let mut previous = JoyState::default();
        previous.last_updated_ms = 1000;
        current.last_updated_ms = 1000;
        for t in 0..IMU_SUBFRAMES {
            current.gyro[t] = Vec3::new(0.0, 0.0, 2.0);
        }

        update(&mut current, &previous);

        assert!((current.orient.yaw - 2.0 * FALLBACK_FRAME_DT).abs() < 1e-6);
    }

    #[test]
    fn yaw_is_never_accel_corrected() {
        let mut current = JoyState::default();
        current.orient.yaw = 3.0;
        for t in 0..IMU_SUBFRAMES {
            current.accel[t] = Vec3::new(0.0, 0.0, 9.80665);
        }
        let previous = JoyState::default();

        update(&mut current, &previous);

        // No gyro input: yaw must stay exactly where integration left it.
        assert_eq!(current.orient.yaw, 3.0);
    }
}
