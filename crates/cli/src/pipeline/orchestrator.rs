//! Pipeline orchestrator - drives the session tick loop and feeds the
//! dispatcher.

use std::future::Future;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bridge::{CosimSession, LightBoard};
use contracts::{CosimConfig, TickReport};
use lane_client::LaneEngine;
use observability::record_tick_metrics;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::PipelineStats;

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub config: CosimConfig,

    /// Stop after this many ticks (None = until shutdown)
    pub max_steps: Option<u64>,

    /// Tick report channel size
    pub buffer_size: usize,

    /// Prometheus port (None = disabled)
    pub metrics_port: Option<u16>,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Run until `max_steps`, `shutdown` resolves, or a tick fails.
    ///
    /// The session is closed on every path once it has been opened.
    pub async fn run<E, S>(self, engine: E, shutdown: S) -> Result<PipelineStats>
    where
        E: LaneEngine,
        S: Future<Output = ()>,
    {
        let start_time = Instant::now();
        let config = &self.config.config;

        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
        }

        if config.sinks.is_empty() {
            warn!("No sinks configured - tick reports will only reach metrics");
        }
        let (report_tx, report_rx) = mpsc::channel::<TickReport>(self.config.buffer_size);
        let dispatcher = dispatcher::create_dispatcher(config.sinks.clone(), report_rx)
            .context("Failed to create dispatcher")?;
        let dispatcher_handle = dispatcher.spawn();
        info!(sinks = config.sinks.len(), "Dispatcher started");

        info!(
            host = %config.lane.host,
            port = config.lane.port,
            "Connecting to lane engine..."
        );
        let mut session = CosimSession::open(engine, config)
            .await
            .with_context(|| {
                format!(
                    "Failed to open co-simulation session at {}:{}",
                    config.lane.host, config.lane.port
                )
            })?;
        info!(
            landmarks = session.traffic_light_ids().len(),
            "Session open"
        );

        let mut stats = self
            .drive_and_close(&mut session, report_tx, shutdown)
            .await?;

        match tokio::time::timeout(Duration::from_secs(5), dispatcher_handle).await {
            Ok(Ok(sinks)) => stats.sinks = sinks,
            Ok(Err(e)) => warn!(error = %e, "Dispatcher task failed"),
            Err(_) => warn!("Dispatcher did not drain within 5s"),
        }
        stats.duration = start_time.elapsed();

        info!(
            ticks = stats.ticks,
            duration_secs = stats.duration.as_secs_f64(),
            "Pipeline shutdown complete"
        );
        Ok(stats)
    }

    /// Drive the tick loop, then close the session whatever the outcome.
    async fn drive_and_close<E, S>(
        &self,
        session: &mut CosimSession<E>,
        report_tx: mpsc::Sender<TickReport>,
        shutdown: S,
    ) -> Result<PipelineStats>
    where
        E: LaneEngine,
        S: Future<Output = ()>,
    {
        let mut world = LightBoard::new();
        let outcome = self.drive(session, &mut world, report_tx, shutdown).await;

        let active_actors = session.active_actors().len();
        if let Err(e) = session.close().await {
            warn!(error = %e, "Error closing session");
        }

        let mut stats = outcome?;
        stats.active_actors = active_actors;
        Ok(stats)
    }

    async fn drive<E, S>(
        &self,
        session: &mut CosimSession<E>,
        world: &mut LightBoard,
        report_tx: mpsc::Sender<TickReport>,
        shutdown: S,
    ) -> Result<PipelineStats>
    where
        E: LaneEngine,
        S: Future<Output = ()>,
    {
        let mirror = self.config.config.traffic_lights.mirror;
        let mut stats = PipelineStats::default();

        info!(max_steps = ?self.config.max_steps, mirror, "Tick loop running");
        tokio::pin!(shutdown);

        loop {
            if let Some(max) = self.config.max_steps {
                if stats.ticks >= max {
                    info!(ticks = stats.ticks, "Reached step limit");
                    break;
                }
            }

            let report = tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Received shutdown signal, stopping tick loop");
                    break;
                }
                report = step(session, world, mirror) => {
                    report.with_context(|| format!("Tick {} failed", stats.ticks + 1))?
                }
            };

            stats.ticks += 1;
            record_tick_metrics(&report, session.active_actors().len());
            stats.tick_metrics.update(&report);

            debug!(
                step = report.step,
                sim_time = report.sim_time,
                spawned = report.spawned.len(),
                destroyed = report.destroyed.len(),
                untranslated = report.translation_errors.len(),
                "Tick"
            );

            if report_tx.send(report).await.is_err() {
                warn!("Dispatcher channel closed");
                break;
            }
        }

        Ok(stats)
    }
}

/// One tick plus light translation when mirroring
async fn step<E: LaneEngine>(
    session: &mut CosimSession<E>,
    world: &mut LightBoard,
    mirror: bool,
) -> bridge::Result<TickReport> {
    let started = Instant::now();
    session.tick().await?;
    let translations = if mirror {
        session.translate_lights(world).await?
    } else {
        Vec::new()
    };
    Ok(session.report(&translations, started.elapsed()))
}
