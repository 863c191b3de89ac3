//! # Contracts
//!
//! Frozen interface contracts shared by every crate in the bridge: ids, signal
//! vocabulary, engine snapshot records, configuration and the sink/world
//! traits. All business crates can only depend on this crate, reverse
//! dependencies are prohibited.
//!
//! ## Time Model
//! - Lane engine simulation time (seconds, f64) is the only clock
//! - `step` counts ticks and is used for ordering/diagnostics

mod actor;
mod config;
mod error;
mod ids;
mod junction;
mod report;
mod signal;
mod sink;
mod subscription;
mod world;

pub use actor::*;
pub use config::*;
pub use error::*;
pub use ids::{ActorId, JunctionId, LandmarkId};
pub use junction::*;
pub use report::*;
pub use signal::*;
pub use sink::*;
pub use subscription::{EngineValue, SubscriptionResult, TrafficLightAttribute, VehicleAttribute};
pub use world::*;
