//! Tilt teleoperation runtime for a differential-drive base.
//!
//! A handset streams 20-byte accelerometer frames over TCP; each valid drive
//! frame is turned into a translational/rotational velocity by one of the
//! steering models, and a watchdog stops the base when frames stop coming.

pub mod config;
pub mod error;
pub mod frame;
pub mod history;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod session;
pub mod steering;
pub mod watchdog;

pub use error::{Error, Result};
