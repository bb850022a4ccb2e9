// Motor control for the two-wheel base
//
// Provides:
// - The actuation interface and its lock gate, plus a simulated base
// - Differential-drive inverse kinematics (body velocity -> wheel velocities)
// - Feetech STS serial protocol and the hardware-backed base

mod actuator;
mod base;
pub mod feetech;
pub mod kinematics;

pub use actuator::{Actuator, ActuatorCall, MotorGate, SimActuator, SIM_CALL_LOG};
pub use base::{spawn_sync_loop, FeetechBase, MOTOR_ID_LEFT, MOTOR_ID_RIGHT};
pub use feetech::{FeetechBus, FeetechError};
pub use kinematics::{body_to_wheel_raw, WheelVelocities};
