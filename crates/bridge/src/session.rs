//! Co-simulation session
//!
//! Top-level tick driver. Owns the lane engine connection, the traffic light
//! manager and the actor registry. The scenario driver calls [`CosimSession::tick`]
//! once per synchronization step and applies the results to the world actors
//! it owns.

use std::collections::BTreeSet;
use std::time::Duration;

use contracts::{
    ActorId, Color, CosimConfig, LandmarkId, LaneActor, SessionCounters, SignalState, TickReport,
    TrackingMode, Transform, VehicleAttribute, VehicleSignals, WorldLights,
};
use lane_client::LaneEngine;
use tracing::{debug, info, instrument, warn};

use crate::error::{BridgeError, Result};
use crate::registry::ActorRegistry;
use crate::traffic_lights::{LandmarkTranslation, TrafficLightManager};

/// Co-simulation session
pub struct CosimSession<E: LaneEngine> {
    engine: E,
    lights: TrafficLightManager,
    registry: ActorRegistry,
    counters: SessionCounters,
    step_length: f64,
    tracking: TrackingMode,
    closed: bool,
}

impl<E: LaneEngine> CosimSession<E> {
    /// Connect and prepare the lane engine.
    ///
    /// Sets the client order, registers the placeholder route on the first
    /// edge and builds the traffic light manager. If anything after connecting
    /// fails, the connection is closed before the error is returned.
    #[instrument(
        name = "session_open",
        skip(engine, config),
        fields(host = %config.lane.host, port = config.lane.port)
    )]
    pub async fn open(mut engine: E, config: &CosimConfig) -> Result<Self> {
        engine
            .connect(&config.lane.host, config.lane.port)
            .await?;

        match Self::prepare(&mut engine, config).await {
            Ok((lights, sim_time)) => {
                info!(
                    junctions = lights.junction_count(),
                    sim_time, "co-simulation session opened"
                );
                Ok(Self {
                    engine,
                    lights,
                    registry: ActorRegistry::new(&config.actors),
                    counters: SessionCounters {
                        step: 0,
                        sim_time,
                    },
                    step_length: config.lane.step_length,
                    tracking: config.actors.tracking,
                    closed: false,
                })
            }
            Err(e) => {
                warn!(error = %e, "session setup failed, closing lane engine connection");
                if let Err(close_err) = engine.close().await {
                    warn!(error = %close_err, "close after failed setup");
                }
                Err(e)
            }
        }
    }

    async fn prepare(engine: &mut E, config: &CosimConfig) -> Result<(TrafficLightManager, f64)> {
        engine.set_order(config.lane.client_order).await?;

        let edges = engine.edge_ids().await?;
        let first = edges
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::setup("lane engine reports no edges"))?;
        engine
            .add_route(&config.actors.placeholder_route_id, &[first])
            .await?;

        let lights =
            TrafficLightManager::build(engine, config.traffic_lights.external_program_id.clone())
                .await?;
        let sim_time = engine.simulation_time().await?;
        Ok((lights, sim_time))
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(BridgeError::SessionClosed)
        } else {
            Ok(())
        }
    }

    /// Advance the lane engine by one step and refresh lights and actors.
    ///
    /// Once the engine has stepped, actor accounting and counters always
    /// advance; a malformed traffic light result is returned afterwards.
    #[instrument(name = "session_tick", skip(self), fields(step = self.counters.step + 1))]
    pub async fn tick(&mut self) -> Result<SessionCounters> {
        self.ensure_open()?;

        let target = self.counters.sim_time + self.step_length;
        self.engine.simulation_step(target).await?;
        let lights = self.lights.tick(&self.engine);

        match self.tracking {
            TrackingMode::EngineLists => {
                let departed = self.engine.departed_ids().await?;
                let arrived = self.engine.arrived_ids().await?;
                self.registry.record_step(departed, arrived);
            }
            TrackingMode::SnapshotDiff => {
                let current = self.engine.vehicle_ids().await?;
                self.registry.refresh(current);
            }
        }

        let sim_time = self.engine.simulation_time().await?;
        self.counters.advance(sim_time);

        debug!(
            sim_time = self.counters.sim_time,
            spawned = self.registry.spawned().len(),
            destroyed = self.registry.destroyed().len(),
            "tick complete"
        );
        lights?;
        Ok(self.counters)
    }

    pub fn counters(&self) -> SessionCounters {
        self.counters
    }

    pub fn spawned_this_step(&self) -> &BTreeSet<ActorId> {
        self.registry.spawned()
    }

    pub fn destroyed_this_step(&self) -> &BTreeSet<ActorId> {
        self.registry.destroyed()
    }

    pub fn active_actors(&self) -> &BTreeSet<ActorId> {
        self.registry.active()
    }

    /// Add a vehicle driven by the world side
    pub async fn spawn_actor(&mut self, type_id: &str, color: Option<Color>) -> Result<ActorId> {
        self.ensure_open()?;
        self.registry.spawn(&mut self.engine, type_id, color).await
    }

    pub async fn destroy_actor(&mut self, actor_id: &ActorId) -> Result<()> {
        self.ensure_open()?;
        self.registry.destroy(&mut self.engine, actor_id).await
    }

    /// Push a world pose (and optionally signals) into the lane engine
    pub async fn synchronize_vehicle(
        &mut self,
        actor_id: &ActorId,
        transform: &Transform,
        signals: Option<VehicleSignals>,
    ) -> Result<()> {
        self.ensure_open()?;
        self.registry
            .synchronize_pose(&mut self.engine, actor_id, transform, signals)
            .await
    }

    /// Subscribe to every vehicle attribute `get_actor` needs
    pub async fn subscribe(&mut self, actor_id: &ActorId) -> Result<()> {
        self.ensure_open()?;
        self.engine
            .subscribe_vehicle(actor_id, &VehicleAttribute::ALL)
            .await?;
        Ok(())
    }

    pub async fn unsubscribe(&mut self, actor_id: &ActorId) -> Result<()> {
        self.ensure_open()?;
        self.engine.unsubscribe_vehicle(actor_id).await?;
        Ok(())
    }

    /// Snapshot of a subscribed vehicle at the current step
    pub fn get_actor(&self, actor_id: &ActorId) -> Result<LaneActor> {
        let bag = self
            .engine
            .vehicle_subscription(actor_id)
            .ok_or_else(|| BridgeError::NotSubscribed {
                actor_id: actor_id.to_string(),
            })?;
        Ok(LaneActor::try_from(&bag)?)
    }

    /// Programmed lane state of a landmark, if it has any links
    pub fn traffic_light_state(&self, landmark: &LandmarkId) -> Option<SignalState> {
        self.lights.landmark_state(landmark)
    }

    /// Every landmark the lane engine controls
    pub fn traffic_light_ids(&self) -> BTreeSet<LandmarkId> {
        self.lights.all_landmarks()
    }

    /// Push a world light state into the lane engine
    pub async fn synchronize_traffic_light(
        &mut self,
        landmark: &LandmarkId,
        state: SignalState,
    ) -> Result<()> {
        self.ensure_open()?;
        self.lights
            .set_landmark_state(&mut self.engine, landmark, state)
            .await
    }

    pub async fn switch_off_traffic_lights(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.lights.switch_off(&mut self.engine).await
    }

    /// Translate every landmark's live lane state onto the world lights
    pub async fn translate_lights<W: WorldLights>(
        &mut self,
        world: &mut W,
    ) -> Result<Vec<LandmarkTranslation>> {
        self.ensure_open()?;
        self.lights.translate_and_apply(&mut self.engine, world).await
    }

    /// Audit record of the current step
    pub fn report(&self, translations: &[LandmarkTranslation], elapsed: Duration) -> TickReport {
        let mut report = TickReport {
            step: self.counters.step,
            sim_time: self.counters.sim_time,
            spawned: self.registry.spawned().iter().cloned().collect(),
            destroyed: self.registry.destroyed().iter().cloned().collect(),
            tick_duration_ms: elapsed.as_secs_f64() * 1000.0,
            ..Default::default()
        };
        for translation in translations {
            match &translation.outcome {
                Ok(state) => {
                    report.lights.insert(translation.landmark.clone(), *state);
                }
                Err(e) => {
                    report
                        .translation_errors
                        .insert(translation.landmark.clone(), e.to_string());
                }
            }
        }
        report
    }

    pub fn traffic_lights(&self) -> &TrafficLightManager {
        &self.lights
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the lane engine connection. Later calls do nothing.
    #[instrument(name = "session_close", skip(self), fields(step = self.counters.step))]
    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            debug!("session already closed");
            return Ok(());
        }
        self.closed = true;
        self.engine.close().await?;
        info!("co-simulation session closed");
        Ok(())
    }
}

impl<E: LaneEngine> Drop for CosimSession<E> {
    fn drop(&mut self) {
        if !self.closed {
            warn!(
                step = self.counters.step,
                "session dropped without close, lane engine connection left open"
            );
        }
    }
}
