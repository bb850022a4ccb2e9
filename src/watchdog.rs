// Motor safety watchdog
// Without it, a handset that crashes or loses the link mid-drive would leave
// the base running on its last velocity command.
//
// The check is a level check: every stale tick asks for a stop, there is no
// latched tripped state. The next accepted drive command re-arms it by feeding.

use std::time::{Duration, Instant};

use crate::config::CMD_TIMEOUT;
use crate::messages::RuntimeHealth;

#[derive(Debug, Clone)]
pub struct Watchdog {
    last_update: Instant,
    timeout: Duration,
    health: RuntimeHealth,
}

impl Watchdog {
    pub fn new(now: Instant) -> Self {
        Self::with_timeout(now, CMD_TIMEOUT)
    }

    /// Starts armed from `now`, so the first check after `timeout` trips
    pub fn with_timeout(now: Instant, timeout: Duration) -> Self {
        Self {
            last_update: now,
            timeout,
            health: RuntimeHealth::Ok,
        }
    }

    /// Record an accepted drive command
    pub fn feed(&mut self, now: Instant) {
        self.last_update = now;
    }

    /// Evaluate staleness at `now`; returns the new health
    pub fn check(&mut self, now: Instant) -> RuntimeHealth {
        let age = now.saturating_duration_since(self.last_update);
        self.health = if age > self.timeout {
            RuntimeHealth::CmdStale
        } else {
            RuntimeHealth::Ok
        };
        self.health
    }

    /// Health as of the last check
    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn last_update(&self) -> Instant {
        self.last_update
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}
