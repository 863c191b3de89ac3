//! TickReport - per-tick audit record
//!
//! Emitted by the session driver after each tick and fanned out to sinks, so
//! the lossy light translation can be inspected after a run.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::{ActorId, LandmarkId, LightState};

/// Monotonic step index and simulated time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCounters {
    pub step: u64,

    /// seconds
    pub sim_time: f64,
}

impl SessionCounters {
    /// Advance by one step. `sim_time` never moves backwards.
    pub fn advance(&mut self, sim_time: f64) {
        self.step += 1;
        if sim_time > self.sim_time {
            self.sim_time = sim_time;
        }
    }
}

/// One tick of bridge output
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickReport {
    pub step: u64,

    /// seconds
    pub sim_time: f64,

    /// Actors that entered the lane engine this step
    pub spawned: Vec<ActorId>,

    /// Actors that left the lane engine this step
    pub destroyed: Vec<ActorId>,

    /// Coarse light state per landmark after translation
    pub lights: BTreeMap<LandmarkId, LightState>,

    /// Landmarks whose translation failed, with the reason
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub translation_errors: BTreeMap<LandmarkId, String>,

    /// Wall time spent in the tick, milliseconds
    pub tick_duration_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_never_regress() {
        let mut counters = SessionCounters::default();
        counters.advance(0.05);
        counters.advance(0.01);
        assert_eq!(counters.step, 2);
        assert_eq!(counters.sim_time, 0.05);
    }

    #[test]
    fn report_omits_empty_errors() {
        let report = TickReport {
            step: 1,
            ..Default::default()
        };
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("translation_errors"));
    }
}
