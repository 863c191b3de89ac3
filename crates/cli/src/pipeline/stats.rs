//! Statistics of one `run`.

use std::time::Duration;

use dispatcher::MetricsSnapshot;
use observability::TickMetricsAggregator;

#[derive(Debug, Clone, Default)]
pub struct PipelineStats {
    pub ticks: u64,

    /// Wall time of the whole run
    pub duration: Duration,

    /// Lane-engine vehicles at the end of the run
    pub active_actors: usize,

    /// Final counters per sink
    pub sinks: Vec<(String, MetricsSnapshot)>,

    pub tick_metrics: TickMetricsAggregator,
}

impl PipelineStats {
    /// Ticks per wall-clock second
    pub fn tick_rate(&self) -> f64 {
        if self.duration.as_secs_f64() > 0.0 {
            self.ticks as f64 / self.duration.as_secs_f64()
        } else {
            0.0
        }
    }

    pub fn print_summary(&self) {
        println!();
        print!("{}", self.tick_metrics.summary());
        println!("Wall time: {:.2}s ({:.1} ticks/s)", self.duration.as_secs_f64(), self.tick_rate());
        println!("Active actors at exit: {}", self.active_actors);

        if !self.sinks.is_empty() {
            println!("Sinks:");
            for (name, snapshot) in &self.sinks {
                println!("  {name}: {snapshot}");
            }
        }
        println!();
    }
}
