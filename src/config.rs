// Timeouts, topics, steering and motor configuration
use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;

// Wire frame size in bytes
pub const FRAME_LEN: usize = 20;

// Watchdog: stop the motors if no drive command was accepted for this long
pub const CMD_TIMEOUT: Duration = Duration::from_millis(300);

// Watchdog check period
pub const WATCHDOG_PERIOD: Duration = Duration::from_millis(50);

// Orientation history shared by all steering models
pub const HISTORY_MAX_LEN: usize = 20;
pub const HISTORY_MAX_AGE: Duration = Duration::from_millis(1000);

// Wheel speed for |alpha - beta| == 1 (mm/s)
pub const V_MAX: f32 = 1200.0;

// TCP port the handset connects to
pub const DEFAULT_LISTEN: &str = "0.0.0.0:1024";

// Zenoh topics
pub const TOPIC_STEERING: &str = "tiltdrive/state/steering"; // per accepted drive frame
pub const TOPIC_HEALTH: &str = "tiltdrive/state/health"; // per watchdog tick

// Serial port for the Feetech motor controller
pub const MOTOR_PORT: &str = "/dev/ttyUSB0";

/// Command-line settings for the robot-side runtime
#[derive(Debug, Clone, Parser)]
#[command(name = "tilt-drive-runtime", about = "Accelerometer tilt teleoperation for a differential base")]
pub struct Settings {
    /// Address to accept handset connections on
    #[arg(long, default_value = DEFAULT_LISTEN)]
    pub listen: SocketAddr,

    /// Serial port of the Feetech motor bus
    #[arg(long, default_value = MOTOR_PORT)]
    pub motor_port: String,

    /// Drive a simulated base instead of the serial bus
    #[arg(long)]
    pub sim: bool,

    /// Publish steering reports and health over zenoh
    #[arg(long)]
    pub telemetry: bool,

    /// Watchdog timeout in milliseconds
    #[arg(
        long,
        default_value_t = CMD_TIMEOUT.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub timeout_ms: u64,

    /// Watchdog check period in milliseconds
    #[arg(
        long,
        default_value_t = WATCHDOG_PERIOD.as_millis() as u64,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub period_ms: u64,
}

impl Settings {
    pub fn cmd_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn watchdog_period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::parse_from(["tilt-drive-runtime"]);
        assert_eq!(settings.listen.port(), 1024);
        assert_eq!(settings.cmd_timeout(), CMD_TIMEOUT);
        assert_eq!(settings.watchdog_period(), WATCHDOG_PERIOD);
        assert!(!settings.sim);
        assert!(!settings.telemetry);
    }

    #[test]
    fn test_overrides() {
        let settings = Settings::parse_from([
            "tilt-drive-runtime",
            "--listen",
            "127.0.0.1:5000",
            "--sim",
            "--timeout-ms",
            "500",
        ]);
        assert_eq!(settings.listen.port(), 5000);
        assert!(settings.sim);
        assert_eq!(settings.cmd_timeout(), Duration::from_millis(500));
    }

    #[test]
    fn test_zero_period_is_rejected() {
        let result = Settings::try_parse_from(["tilt-drive-runtime", "--period-ms", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let result = Settings::try_parse_from(["tilt-drive-runtime", "--timeout-ms", "0"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_smallest_period_is_accepted() {
        let settings = Settings::try_parse_from(["tilt-drive-runtime", "--period-ms", "1"]).unwrap();
        assert_eq!(settings.watchdog_period(), Duration::from_millis(1));
    }
}
