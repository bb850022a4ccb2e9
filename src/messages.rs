// Telemetry message types published by the runtime

use serde::{Deserialize, Serialize};

use crate::steering::{Algorithm, Filter, SteeringModel, VelocityCommand};

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
}

// One report per accepted drive frame
#[derive(Debug, Clone, Serialize)]
pub struct SteeringReport {
    pub model_code: u8,
    pub algorithm: Algorithm,
    pub filter: Filter,
    pub translational: f32,
    pub rotational: f32,
}

impl SteeringReport {
    pub fn new(model_code: u8, command: &VelocityCommand) -> Self {
        let SteeringModel { algorithm, filter } = SteeringModel::from_code(model_code);
        Self {
            model_code,
            algorithm,
            filter,
            translational: command.translational,
            rotational: command.rotational,
        }
    }
}
