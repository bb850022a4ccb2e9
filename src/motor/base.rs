// Two-wheel Feetech base behind the actuation interface
//
// Velocity setters only update the setpoint; the base's own loop
// (`spawn_sync_loop`) pushes it to the wheels. `stop` writes zero right away.

use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::actuator::{Actuator, MotorGate};
use super::feetech::{FeetechBus, FeetechError, OperatingMode, Register};
use super::kinematics::{body_to_wheel_raw, WheelVelocities};
use crate::error::Result;

/// Motor IDs as configured in the servos
pub const MOTOR_ID_LEFT: u8 = 1;
pub const MOTOR_ID_RIGHT: u8 = 2;

/// Period of the base's own setpoint loop
pub const SYNC_PERIOD: Duration = Duration::from_millis(20);

pub struct FeetechBase {
    bus: FeetechBus,
    motor_ids: [u8; 2], // [left, right]
    translational: f32,
    rotational: f32,
}

impl FeetechBase {
    pub fn open(port: &str) -> std::result::Result<Self, FeetechError> {
        info!("Opening motor bus on {}", port);
        let bus = FeetechBus::open(port)?;
        Ok(Self {
            bus,
            motor_ids: [MOTOR_ID_LEFT, MOTOR_ID_RIGHT],
            translational: 0.0,
            rotational: 0.0,
        })
    }

    /// Write the current setpoint to the wheels
    pub fn sync(&mut self) -> std::result::Result<(), FeetechError> {
        let wheels = body_to_wheel_raw(self.translational, self.rotational);
        self.write_wheels(wheels)
    }

    fn write_wheels(&mut self, wheels: WheelVelocities) -> std::result::Result<(), FeetechError> {
        debug!("wheels: left={}, right={}", wheels.left, wheels.right);
        let data = [
            (self.motor_ids[0], wheels.left),
            (self.motor_ids[1], wheels.right),
        ];
        self.bus.sync_write_i16(Register::GoalVelocity, &data)
    }
}

impl Actuator for FeetechBase {
    fn enable_motors(&mut self) -> Result<()> {
        info!("Initializing motors {:?} for velocity control", self.motor_ids);
        for id in self.motor_ids {
            if !self.bus.ping(id)? {
                warn!("Motor {} not responding to ping", id);
                return Err(FeetechError::Timeout { id }.into());
            }
        }
        for id in self.motor_ids {
            self.bus.set_torque(id, false)?;
            self.bus.set_operating_mode(id, OperatingMode::Velocity)?;
            self.bus.set_torque(id, true)?;
        }
        info!("Motors enabled");
        Ok(())
    }

    fn set_translational_velocity(&mut self, v: f32) -> Result<()> {
        self.translational = v;
        Ok(())
    }

    fn set_rotational_velocity(&mut self, w: f32) -> Result<()> {
        self.rotational = w;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.translational = 0.0;
        self.rotational = 0.0;
        self.write_wheels(WheelVelocities::zero())?;
        Ok(())
    }
}

impl Drop for FeetechBase {
    fn drop(&mut self) {
        if let Err(e) = self.write_wheels(WheelVelocities::zero()) {
            warn!("Failed to stop motors on drop: {}", e);
        }
    }
}

/// Run the base's setpoint loop on its own thread until the gate is released
pub fn spawn_sync_loop(gate: &MotorGate<FeetechBase>) -> JoinHandle<()> {
    let weak = gate.downgrade();
    thread::spawn(move || {
        while let Some(shared) = weak.upgrade() {
            match shared.lock() {
                Ok(mut base) => {
                    if let Err(e) = base.sync() {
                        warn!("Motor sync failed: {}", e);
                    }
                }
                Err(_) => {
                    warn!("Motor gate poisoned, sync loop exiting");
                    return;
                }
            }
            drop(shared);
            thread::sleep(SYNC_PERIOD);
        }
        debug!("Motor sync loop finished");
    })
}
