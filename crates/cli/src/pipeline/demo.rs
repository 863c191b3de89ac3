//! Scripted in-process lane engine for `--engine mock`.

use contracts::{CosimConfig, ProgramDefinition};
use lane_client::{MockConfig, MockLaneEngine};

/// Steps between phase changes of the demo junction
const PHASE_STEPS: u64 = 40;
/// Steps between scripted departures
const DEPARTURE_STEPS: u64 = 15;
/// Steps a scripted vehicle stays in the network
const TRIP_STEPS: u64 = 120;
/// Scripted horizon, the mock stays quiet afterwards
const SCRIPT_STEPS: u64 = 2_000;

/// One signalised junction cycling green/yellow/red with a steady trickle of
/// vehicles.
pub fn demo_engine(config: &CosimConfig) -> MockLaneEngine {
    let engine = MockLaneEngine::with_config(MockConfig {
        step_length: config.lane.step_length,
        ..Default::default()
    });

    let phases = ["GGgrrrGGgrrr", "yyyrrryyyrrr", "rrrGGgrrrGGg", "rrryyyrrryyy"];
    engine.add_junction(
        "918",
        vec![ProgramDefinition {
            program_id: "0".to_string(),
            phases: phases.iter().map(|p| p.to_string()).collect(),
            parameters: [
                ("linkSignalID:0", "1032"),
                ("linkSignalID:1", "1032"),
                ("linkSignalID:3", "1034"),
                ("linkSignalID:4", "1034"),
                ("linkSignalID:5", "1034"),
                ("linkSignalID:6", "1036"),
                ("linkSignalID:7", "1036"),
                ("linkSignalID:8", "1036"),
            ]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        }],
    );

    for (n, step) in (PHASE_STEPS..SCRIPT_STEPS).step_by(PHASE_STEPS as usize).enumerate() {
        engine.schedule_phase(step, "918", "0", (n + 1) % phases.len());
    }
    for (n, step) in (1..SCRIPT_STEPS).step_by(DEPARTURE_STEPS as usize).enumerate() {
        let id = format!("flow.{n}");
        engine.schedule_departure(step, id.as_str(), "passenger");
        engine.schedule_arrival(step + TRIP_STEPS, id.as_str());
    }

    engine
}
