// Differential-drive inverse kinematics for the two-wheel base
// Converts (forward mm/s, yaw deg/s) to raw servo velocity ticks.

/// Wheel configuration
pub const WHEEL_RADIUS_MM: f32 = 50.0;
pub const TRACK_WIDTH_MM: f32 = 250.0; // distance between wheel contact points

/// Motor resolution: 4096 steps per revolution
const STEPS_PER_DEG: f32 = 4096.0 / 360.0;

/// Maximum raw velocity command (safety limit)
pub const MAX_RAW: i16 = 3000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WheelVelocities {
    pub left: i16,
    pub right: i16,
}

impl WheelVelocities {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Convert body velocities to raw wheel commands
///
/// # Arguments
/// * `v` - Forward velocity in mm/s
/// * `omega` - Yaw rate in deg/s (positive = counter-clockwise)
pub fn body_to_wheel_raw(v: f32, omega: f32) -> WheelVelocities {
    body_to_wheel_raw_with_params(v, omega, WHEEL_RADIUS_MM, TRACK_WIDTH_MM, MAX_RAW)
}

pub fn body_to_wheel_raw_with_params(
    v: f32,
    omega: f32,
    wheel_radius: f32,
    track_width: f32,
    max_raw: i16,
) -> WheelVelocities {
    let half_track_speed = omega.to_radians() * track_width / 2.0;
    let linear = [v - half_track_speed, v + half_track_speed];

    // mm/s at the rim -> wheel deg/s -> servo steps/s
    let mut steps = linear.map(|mm_s| (mm_s / wheel_radius).to_degrees() * STEPS_PER_DEG);

    // Scale both wheels together so the turn radius is preserved
    let peak = steps.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > max_raw as f32 {
        let scale = max_raw as f32 / peak;
        for s in &mut steps {
            *s *= scale;
        }
    }

    let [left, right] = steps.map(|s| s.round().clamp(i16::MIN as f32, i16::MAX as f32) as i16);
    WheelVelocities { left, right }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_velocity() {
        assert_eq!(body_to_wheel_raw(0.0, 0.0), WheelVelocities::zero());
    }

    #[test]
    fn test_forward_motion() {
        let wheels = body_to_wheel_raw(100.0, 0.0);
        assert!(wheels.left > 0);
        assert_eq!(wheels.left, wheels.right);
        // 100 mm/s on a 50 mm wheel = 2 rad/s ~ 114.6 deg/s ~ 1304 steps/s
        assert!((wheels.left - 1304).abs() <= 1);
    }

    #[test]
    fn test_rotation_only() {
        let wheels = body_to_wheel_raw(0.0, 45.0);
        assert!(wheels.left < 0 && wheels.right > 0);
        assert_eq!(wheels.left, -wheels.right);
    }

    #[test]
    fn test_full_speed_is_scaled_to_limit() {
        // 1200 mm/s is far above the safety limit
        let wheels = body_to_wheel_raw(1200.0, 60.0);
        assert!(wheels.left.abs() <= MAX_RAW);
        assert_eq!(wheels.right, MAX_RAW);
        assert!(wheels.left < wheels.right);
    }

    #[test]
    fn test_reverse_is_symmetric() {
        let forward = body_to_wheel_raw(200.0, 10.0);
        let reverse = body_to_wheel_raw(-200.0, -10.0);
        assert_eq!(forward.left, -reverse.left);
        assert_eq!(forward.right, -reverse.right);
    }
}
