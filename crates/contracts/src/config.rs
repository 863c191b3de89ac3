//! CosimConfig - Config Loader output
//!
//! Describes one co-simulation run: where the lane engine lives, how traffic
//! lights and actors are bridged, and where tick reports go.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Config version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConfigVersion {
    #[default]
    V1,
}

/// Full co-simulation configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CosimConfig {
    #[serde(default)]
    pub version: ConfigVersion,

    #[serde(default)]
    pub lane: LaneConfig,

    #[serde(default)]
    pub traffic_lights: TrafficLightConfig,

    #[serde(default)]
    pub actors: ActorConfig,

    /// Tick report sinks
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

/// Lane engine connection and stepping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneConfig {
    #[serde(default = "default_lane_host")]
    pub host: String,

    #[serde(default = "default_lane_port")]
    pub port: u16,

    /// Position among the clients sharing one lane engine (1-based).
    #[serde(default = "default_client_order")]
    pub client_order: i32,

    /// Seconds of simulated time per tick, must be > 0
    #[serde(default = "default_step_length")]
    pub step_length: f64,
}

impl Default for LaneConfig {
    fn default() -> Self {
        Self {
            host: default_lane_host(),
            port: default_lane_port(),
            client_order: default_client_order(),
            step_length: default_step_length(),
        }
    }
}

fn default_lane_host() -> String {
    "localhost".to_string()
}

fn default_lane_port() -> u16 {
    8813
}

fn default_client_order() -> i32 {
    1
}

fn default_step_length() -> f64 {
    0.05
}

/// Traffic light bridging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficLightConfig {
    /// Program id the lane engine reports while a light is driven externally.
    /// Runtime updates carrying this id are ignored.
    #[serde(default = "default_external_program_id")]
    pub external_program_id: String,

    /// Translate lane-engine link states onto world landmarks every tick.
    #[serde(default = "default_true")]
    pub mirror: bool,
}

impl Default for TrafficLightConfig {
    fn default() -> Self {
        Self {
            external_program_id: default_external_program_id(),
            mirror: true,
        }
    }
}

fn default_external_program_id() -> String {
    "online".to_string()
}

fn default_true() -> bool {
    true
}

/// Actor bridging
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    /// Route every spawned actor is attached to.
    #[serde(default = "default_route_id")]
    pub placeholder_route_id: String,

    /// Prefix of spawned actor ids (`<prefix><seq>`).
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,

    #[serde(default)]
    pub tracking: TrackingMode,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            placeholder_route_id: default_route_id(),
            id_prefix: default_id_prefix(),
            tracking: TrackingMode::default(),
        }
    }
}

fn default_route_id() -> String {
    "carla_route".to_string()
}

fn default_id_prefix() -> String {
    "carla".to_string()
}

/// How spawned/destroyed actors are detected each tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// The lane engine's own departed/arrived lists
    #[default]
    EngineLists,
    /// Diff of the full vehicle id list against the previous tick
    SnapshotDiff,
}

/// Sink output config
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    pub name: String,

    pub sink_type: SinkType,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Type specific parameters
    #[serde(default)]
    pub params: HashMap<String, String>,
}

fn default_queue_capacity() -> usize {
    100
}

/// Sink type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SinkType {
    /// tracing output
    Log,
    /// JSON lines file
    File,
}
