// Crate-level error type for the runtime

use crate::motor::FeetechError;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Motor error: {0}")]
    Motor(#[from] FeetechError),

    #[error("Motor gate poisoned (hardware loop panicked)")]
    GatePoisoned,

    #[error("Telemetry error: {0}")]
    Telemetry(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
