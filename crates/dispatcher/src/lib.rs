//! # Dispatcher
//!
//! Fans per-tick reports out to sinks.
//!
//! Responsibilities:
//! - Consume `TickReport`s from the session driver
//! - Fan-out to multiple sinks, each behind its own bounded queue
//! - Isolate slow or failing sinks so the tick loop never waits on them

pub mod dispatcher;
pub mod error;
pub mod handle;
pub mod metrics;
pub mod sinks;

pub use contracts::{DataSink, TickReport};
pub use dispatcher::{create_dispatcher, Dispatcher, DispatcherBuilder, DispatcherConfig};
pub use error::DispatcherError;
pub use handle::SinkHandle;
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{FileSink, LogSink};
