//! Tick loop orchestration.

mod demo;
mod orchestrator;
mod stats;

pub use demo::demo_engine;
pub use orchestrator::{Pipeline, PipelineConfig};
pub use stats::PipelineStats;
