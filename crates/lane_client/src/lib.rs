//! # Lane Client
//!
//! Client side of the lane engine (SUMO) connection.
//!
//! Responsibilities:
//! - Define the `LaneEngine` command surface used by the bridge
//! - Speak TraCI over TCP (`TraciClient`)
//! - Provide a scriptable in-memory engine for tests (`MockLaneEngine`)
//! - Cache per-step subscription results

pub mod client;
pub mod error;
pub mod mock_client;
pub mod traci;

pub use client::{LaneEngine, KEEP_ROUTE_FREE, NEXT_STEP};
pub use error::{LaneClientError, Result};
pub use mock_client::{LinkWrite, MockConfig, MockLaneEngine, MockPose, ONLINE_PROGRAM};
pub use traci::TraciClient;
