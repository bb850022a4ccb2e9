// Actuation interface and its mutual-exclusion gate
//
// The hardware backend runs its own control loop, so every command goes
// through `MotorGate::with`, which holds the lock for exactly one closure.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, Weak};

use tracing::debug;

use crate::error::{Error, Result};

/// Motion commands understood by the robot base
pub trait Actuator {
    fn enable_motors(&mut self) -> Result<()>;

    /// Forward velocity in mm/s
    fn set_translational_velocity(&mut self, v: f32) -> Result<()>;

    /// Rotational velocity in deg/s (positive = counter-clockwise)
    fn set_rotational_velocity(&mut self, w: f32) -> Result<()>;

    fn stop(&mut self) -> Result<()>;
}

/// Shared, lock-guarded handle to an actuator
pub struct MotorGate<A> {
    inner: Arc<Mutex<A>>,
}

impl<A> Clone for MotorGate<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> MotorGate<A> {
    pub fn new(actuator: A) -> Self {
        Self {
            inner: Arc::new(Mutex::new(actuator)),
        }
    }

    /// Run `f` with the gate held; the lock is released when `f` returns,
    /// whether it succeeded or not.
    pub fn with<R>(&self, f: impl FnOnce(&mut A) -> Result<R>) -> Result<R> {
        let mut guard = self.inner.lock().map_err(|_| Error::GatePoisoned)?;
        f(&mut *guard)
    }

    /// Handle for background loops that must not keep the actuator alive
    pub fn downgrade(&self) -> Weak<Mutex<A>> {
        Arc::downgrade(&self.inner)
    }
}

/// Recorded call on a [`SimActuator`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActuatorCall {
    EnableMotors,
    Translational(f32),
    Rotational(f32),
    Stop,
}

// Calls kept by a [`SimActuator`]; older ones are discarded
pub const SIM_CALL_LOG: usize = 64;

/// In-memory base used with `--sim` and in tests
///
/// Holds the current setpoint, a stop counter and the most recent
/// [`SIM_CALL_LOG`] calls, so memory stays flat in a long sim run.
#[derive(Debug, Default)]
pub struct SimActuator {
    recent: VecDeque<ActuatorCall>,
    stops: usize,
    enabled: bool,
    translational: f32,
    rotational: f32,
}

impl SimActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Most recent calls, oldest first
    pub fn calls(&self) -> Vec<ActuatorCall> {
        self.recent.iter().copied().collect()
    }

    pub fn stop_count(&self) -> usize {
        self.stops
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Current (translational, rotational) setpoint
    pub fn velocity(&self) -> (f32, f32) {
        (self.translational, self.rotational)
    }

    fn record(&mut self, call: ActuatorCall) {
        if self.recent.len() == SIM_CALL_LOG {
            self.recent.pop_front();
        }
        self.recent.push_back(call);
    }
}

impl Actuator for SimActuator {
    fn enable_motors(&mut self) -> Result<()> {
        debug!("sim: motors enabled");
        self.enabled = true;
        self.record(ActuatorCall::EnableMotors);
        Ok(())
    }

    fn set_translational_velocity(&mut self, v: f32) -> Result<()> {
        debug!("sim: translational {:.1} mm/s", v);
        self.translational = v;
        self.record(ActuatorCall::Translational(v));
        Ok(())
    }

    fn set_rotational_velocity(&mut self, w: f32) -> Result<()> {
        debug!("sim: rotational {:.1} deg/s", w);
        self.rotational = w;
        self.record(ActuatorCall::Rotational(w));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        debug!("sim: stop");
        self.translational = 0.0;
        self.rotational = 0.0;
        self.stops += 1;
        self.record(ActuatorCall::Stop);
        Ok(())
    }
}
