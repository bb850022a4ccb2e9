// Control session: frames in, motor commands out, watchdog on the side
//
// One owner drives both `on_frame` and `on_tick`, so the history and the
// watchdog need no locking. Only the actuator sits behind a gate.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::FRAME_LEN;
use crate::error::Result;
use crate::frame::{self, FrameError};
use crate::history::SampleHistory;
use crate::messages::RuntimeHealth;
use crate::motor::{Actuator, MotorGate};
use crate::steering::{self, VelocityCommand};
use crate::watchdog::Watchdog;

/// What happened to one received frame
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// Drive frame accepted and forwarded
    Drive {
        model_code: u8,
        command: VelocityCommand,
    },
    /// Stop frame forwarded as `stop()`
    Stopped,
    /// Frame failed validation and was dropped
    Rejected(FrameError),
    /// Steering produced a non-finite command; nothing was forwarded
    Degenerate { model_code: u8 },
    /// Command computed but the actuator refused it
    ActuatorFailed,
}

pub struct Session<A: Actuator> {
    gate: MotorGate<A>,
    history: SampleHistory,
    watchdog: Watchdog,
}

impl<A: Actuator> Session<A> {
    pub fn new(gate: MotorGate<A>, cmd_timeout: Duration, now: Instant) -> Self {
        Self {
            gate,
            history: SampleHistory::new(),
            watchdog: Watchdog::with_timeout(now, cmd_timeout),
        }
    }

    /// Enable the motors; call once before feeding frames
    pub fn start(&mut self) -> Result<()> {
        self.gate.with(|base| base.enable_motors())
    }

    pub fn on_frame(&mut self, buffer: &[u8; FRAME_LEN], now: Instant) -> FrameOutcome {
        let sample = match frame::decode(buffer) {
            Ok(sample) => sample,
            Err(e) => {
                warn!("Dropping frame: {}", e);
                return FrameOutcome::Rejected(e);
            }
        };

        if !sample.drive {
            debug!("Stop frame received");
            return match self.gate.with(|base| base.stop()) {
                Ok(()) => FrameOutcome::Stopped,
                Err(e) => {
                    warn!("Failed to stop motors: {}", e);
                    FrameOutcome::ActuatorFailed
                }
            };
        }

        let model_code = sample.model_code;
        let command = steering::compute_velocity(model_code, &sample, &mut self.history, now);
        if !command.is_finite() {
            warn!(
                "Model {} produced a non-finite command for ({}, {}, {}), not forwarding",
                model_code, sample.x, sample.y, sample.z
            );
            return FrameOutcome::Degenerate { model_code };
        }

        debug!(
            "model {}: v={:.1} mm/s, w={:.2} deg/s",
            model_code, command.translational, command.rotational
        );
        let forwarded = self.gate.with(|base| {
            base.set_translational_velocity(command.translational)?;
            base.set_rotational_velocity(command.rotational)
        });
        match forwarded {
            Ok(()) => {
                self.watchdog.feed(now);
                FrameOutcome::Drive {
                    model_code,
                    command,
                }
            }
            Err(e) => {
                warn!("Failed to set velocity: {}", e);
                FrameOutcome::ActuatorFailed
            }
        }
    }

    /// Watchdog check; stops the motors on every stale tick
    pub fn on_tick(&mut self, now: Instant) -> RuntimeHealth {
        let previous = self.watchdog.health();
        let health = self.watchdog.check(now);
        if health == RuntimeHealth::CmdStale {
            if previous != RuntimeHealth::CmdStale {
                warn!(
                    "Command stale ({:?} old), stopping motors",
                    now.saturating_duration_since(self.watchdog.last_update())
                );
            }
            if let Err(e) = self.gate.with(|base| base.stop()) {
                warn!("Watchdog failed to stop motors: {}", e);
            }
        } else if previous == RuntimeHealth::CmdStale {
            info!("Commands resumed");
        }
        health
    }

    pub fn health(&self) -> RuntimeHealth {
        self.watchdog.health()
    }

    /// Stop the motors and release this session's handle on the actuator
    pub fn shutdown(self) -> Result<()> {
        info!("Stopping motors for shutdown");
        self.gate.with(|base| base.stop())
    }
}
