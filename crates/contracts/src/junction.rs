//! Junction program records

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::subscription::{require_i32, require_str};
use crate::{ContractError, SubscriptionResult, TrafficLightAttribute};

/// One light program of a junction, as enumerated at session start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramDefinition {
    pub program_id: String,

    /// Phase state strings, one character per link.
    pub phases: Vec<String>,

    /// Raw program parameters, `"linkSignalID:<index>" -> landmark`.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

/// Active program and phase of one junction at the current step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JunctionSnapshot {
    pub program_id: String,
    pub phase: usize,
}

impl TryFrom<&SubscriptionResult<TrafficLightAttribute>> for JunctionSnapshot {
    type Error = ContractError;

    fn try_from(bag: &SubscriptionResult<TrafficLightAttribute>) -> Result<Self, Self::Error> {
        let phase = require_i32(bag, TrafficLightAttribute::CurrentPhase)?;
        let phase = usize::try_from(phase).map_err(|_| {
            ContractError::malformed_result("CurrentPhase", format!("negative phase {phase}"))
        })?;

        Ok(Self {
            program_id: require_str(bag, TrafficLightAttribute::CurrentProgram)?.to_string(),
            phase,
        })
    }
}
