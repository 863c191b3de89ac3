//! Per-tick bridge metrics
//!
//! Exported through the `metrics` facade and aggregated in memory for the
//! end-of-run summary.

use std::collections::BTreeMap;
use std::fmt;

use contracts::{LightState, TickReport};
use metrics::{counter, gauge, histogram};

/// Record the exported metrics of one tick.
///
/// `active_actors` is the number of lane-engine vehicles after the tick.
pub fn record_tick_metrics(report: &TickReport, active_actors: usize) {
    counter!("cosim_ticks_total").increment(1);
    gauge!("cosim_sim_time_seconds").set(report.sim_time);
    histogram!("cosim_tick_duration_ms").record(report.tick_duration_ms);

    counter!("cosim_actors_spawned_total").increment(report.spawned.len() as u64);
    counter!("cosim_actors_destroyed_total").increment(report.destroyed.len() as u64);
    gauge!("cosim_active_actors").set(active_actors as f64);

    for state in [
        LightState::Red,
        LightState::Yellow,
        LightState::Green,
        LightState::Off,
        LightState::Unknown,
    ] {
        let count = report.lights.values().filter(|s| **s == state).count();
        gauge!("cosim_landmarks", "state" => state.to_string()).set(count as f64);
    }
}

/// In-memory aggregation of tick reports
#[derive(Debug, Clone, Default)]
pub struct TickMetricsAggregator {
    pub total_ticks: u64,
    pub total_spawned: u64,
    pub total_destroyed: u64,
    /// Ticks with at least one untranslated landmark
    pub ticks_with_failures: u64,
    pub last_sim_time: f64,
    pub tick_duration: RunningStats,
    /// Untranslated count per landmark
    pub failure_counts: BTreeMap<String, u64>,
    /// How often each light state was applied
    pub light_counts: BTreeMap<LightState, u64>,
}

impl TickMetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, report: &TickReport) {
        self.total_ticks += 1;
        self.total_spawned += report.spawned.len() as u64;
        self.total_destroyed += report.destroyed.len() as u64;
        self.last_sim_time = report.sim_time;
        self.tick_duration.push(report.tick_duration_ms);

        if !report.translation_errors.is_empty() {
            self.ticks_with_failures += 1;
            for landmark in report.translation_errors.keys() {
                *self.failure_counts.entry(landmark.to_string()).or_insert(0) += 1;
            }
        }
        for state in report.lights.values() {
            *self.light_counts.entry(*state).or_insert(0) += 1;
        }
    }

    pub fn summary(&self) -> MetricsSummary {
        MetricsSummary {
            total_ticks: self.total_ticks,
            sim_time: self.last_sim_time,
            total_spawned: self.total_spawned,
            total_destroyed: self.total_destroyed,
            ticks_with_failures: self.ticks_with_failures,
            failure_rate: if self.total_ticks > 0 {
                self.ticks_with_failures as f64 / self.total_ticks as f64 * 100.0
            } else {
                0.0
            },
            tick_duration_ms: StatsSummary::from(&self.tick_duration),
            failure_counts: self.failure_counts.clone(),
            light_counts: self.light_counts.clone(),
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// End-of-run summary
#[derive(Debug, Clone, Default)]
pub struct MetricsSummary {
    pub total_ticks: u64,
    pub sim_time: f64,
    pub total_spawned: u64,
    pub total_destroyed: u64,
    pub ticks_with_failures: u64,
    pub failure_rate: f64,
    pub tick_duration_ms: StatsSummary,
    pub failure_counts: BTreeMap<String, u64>,
    pub light_counts: BTreeMap<LightState, u64>,
}

impl fmt::Display for MetricsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Co-simulation Summary ===")?;
        writeln!(f, "Ticks: {} (sim time {:.2}s)", self.total_ticks, self.sim_time)?;
        writeln!(
            f,
            "Actors: {} spawned, {} destroyed",
            self.total_spawned, self.total_destroyed
        )?;
        writeln!(
            f,
            "Ticks with untranslated landmarks: {} ({:.2}%)",
            self.ticks_with_failures, self.failure_rate
        )?;
        writeln!(f, "Tick duration (ms): {}", self.tick_duration_ms)?;

        if !self.light_counts.is_empty() {
            let states: Vec<String> = self
                .light_counts
                .iter()
                .map(|(state, n)| format!("{state}={n}"))
                .collect();
            writeln!(f, "Light states applied: {}", states.join(", "))?;
        }
        if !self.failure_counts.is_empty() {
            writeln!(f, "Untranslated landmarks:")?;
            for (landmark, count) in &self.failure_counts {
                writeln!(f, "  {landmark}: {count}")?;
            }
        }
        Ok(())
    }
}

/// min / max / mean / std of a series
#[derive(Debug, Clone, Default)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.count == 0 {
            return write!(f, "N/A");
        }
        write!(
            f,
            "min={:.3}, max={:.3}, mean={:.3}, std={:.3} (n={})",
            self.min, self.max, self.mean, self.std_dev, self.count
        )
    }
}

/// Online mean and variance (Welford)
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    pub fn push(&mut self, value: f64) {
        self.count += 1;
        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }
        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// Sample variance
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }
}
