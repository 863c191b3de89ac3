//! Actor registry
//!
//! Tracks which lane-engine vehicles exist from one step to the next and
//! issues the vehicle lifecycle commands for actors owned by the world side.

use std::collections::BTreeSet;

use contracts::{ActorConfig, ActorId, Color, Transform, VehicleSignals};
use lane_client::{LaneClientError, LaneEngine, KEEP_ROUTE_FREE};
use metrics::counter;
use tracing::{debug, error, instrument, warn};

use crate::error::{BridgeError, Result};

/// Actor registry
#[derive(Debug, Clone)]
pub struct ActorRegistry {
    previous: BTreeSet<ActorId>,
    spawned: BTreeSet<ActorId>,
    destroyed: BTreeSet<ActorId>,
    placeholder_route_id: String,
    id_prefix: String,
    sequence: u64,
}

impl ActorRegistry {
    pub fn new(config: &ActorConfig) -> Self {
        Self {
            previous: BTreeSet::new(),
            spawned: BTreeSet::new(),
            destroyed: BTreeSet::new(),
            placeholder_route_id: config.placeholder_route_id.clone(),
            id_prefix: config.id_prefix.clone(),
            sequence: 0,
        }
    }

    /// Diff the full id set of this step against the previous one.
    ///
    /// Call once per step before reading `spawned` / `destroyed`.
    pub fn refresh(&mut self, current: impl IntoIterator<Item = ActorId>) {
        let current: BTreeSet<ActorId> = current.into_iter().collect();
        self.spawned = current.difference(&self.previous).cloned().collect();
        self.destroyed = self.previous.difference(&current).cloned().collect();
        self.previous = current;
    }

    /// Take the engine's own departed/arrived accounting for this step.
    pub fn record_step(
        &mut self,
        departed: impl IntoIterator<Item = ActorId>,
        arrived: impl IntoIterator<Item = ActorId>,
    ) {
        self.spawned = departed.into_iter().collect();
        self.destroyed = arrived.into_iter().collect();
        // a vehicle may depart and arrive within one step
        self.previous.extend(self.spawned.iter().cloned());
        for id in &self.destroyed {
            self.previous.remove(id);
        }
    }

    /// Actors that entered the lane engine this step
    pub fn spawned(&self) -> &BTreeSet<ActorId> {
        &self.spawned
    }

    /// Actors that left the lane engine this step
    pub fn destroyed(&self) -> &BTreeSet<ActorId> {
        &self.destroyed
    }

    /// Actors known to be in the lane engine after the last step
    pub fn active(&self) -> &BTreeSet<ActorId> {
        &self.previous
    }

    /// Id the next successful spawn will get
    pub fn next_id(&self) -> ActorId {
        ActorId::from(format!("{}{}", self.id_prefix, self.sequence))
    }

    /// Add a vehicle on the placeholder route.
    ///
    /// # Errors
    ///
    /// `SpawnRejected` when the engine refuses the vehicle; the sequence does
    /// not advance. Other engine failures are passed through. If coloring
    /// fails the vehicle is removed again before the error is returned.
    #[instrument(name = "registry_spawn", skip(self, engine, color))]
    pub async fn spawn<E: LaneEngine>(
        &mut self,
        engine: &mut E,
        type_id: &str,
        color: Option<Color>,
    ) -> Result<ActorId> {
        let actor_id = self.next_id();

        match engine
            .add_vehicle(&actor_id, &self.placeholder_route_id, type_id)
            .await
        {
            Ok(()) => {}
            Err(LaneClientError::CommandRejected { message, .. }) => {
                error!(actor_id = %actor_id, error = %message, "lane engine rejected spawn");
                counter!("cosim_spawn_failures_total").increment(1);
                return Err(BridgeError::SpawnRejected {
                    actor_id: actor_id.to_string(),
                    message,
                });
            }
            Err(e) => return Err(e.into()),
        }
        self.sequence += 1;

        if let Some(color) = color {
            if let Err(e) = engine.set_vehicle_color(&actor_id, color).await {
                warn!(actor_id = %actor_id, error = %e, "coloring failed, removing spawned vehicle");
                if let Err(remove_err) = engine.remove_vehicle(&actor_id).await {
                    warn!(actor_id = %actor_id, error = %remove_err, "remove after failed coloring");
                }
                return Err(e.into());
            }
        }

        debug!(actor_id = %actor_id, "actor spawned");
        Ok(actor_id)
    }

    /// Remove a vehicle. Unknown ids come back as the engine's error.
    #[instrument(name = "registry_destroy", skip(self, engine), fields(actor_id = %actor_id))]
    pub async fn destroy<E: LaneEngine>(&mut self, engine: &mut E, actor_id: &ActorId) -> Result<()> {
        engine.remove_vehicle(actor_id).await?;
        debug!("actor destroyed");
        Ok(())
    }

    /// Push a world pose into the lane engine.
    ///
    /// The engine snaps the position onto its own road graph, so the pose read
    /// back next step is not exact.
    pub async fn synchronize_pose<E: LaneEngine>(
        &self,
        engine: &mut E,
        actor_id: &ActorId,
        transform: &Transform,
        signals: Option<VehicleSignals>,
    ) -> Result<()> {
        engine
            .move_to_xy(
                actor_id,
                "",
                0,
                transform.location.x,
                transform.location.y,
                transform.rotation.yaw,
                KEEP_ROUTE_FREE,
            )
            .await?;
        if let Some(signals) = signals {
            engine.set_vehicle_signals(actor_id, signals).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{Location, Rotation};
    use lane_client::{MockConfig, MockLaneEngine, NEXT_STEP};

    fn ids(items: &[&str]) -> Vec<ActorId> {
        items.iter().map(|s| ActorId::from(*s)).collect()
    }

    fn set(items: &[&str]) -> BTreeSet<ActorId> {
        ids(items).into_iter().collect()
    }

    async fn engine(config: MockConfig) -> MockLaneEngine {
        let mut engine = MockLaneEngine::with_config(config);
        engine.connect("localhost", 8813).await.unwrap();
        engine
            .add_route("carla_route", &["edge_0".to_string()])
            .await
            .unwrap();
        engine
    }

    #[test]
    fn test_refresh_diff() {
        let mut registry = ActorRegistry::new(&ActorConfig::default());
        registry.refresh(ids(&["a", "b", "c"]));
        registry.refresh(ids(&["a", "c", "d"]));

        assert_eq!(registry.spawned(), &set(&["d"]));
        assert_eq!(registry.destroyed(), &set(&["b"]));
        assert_eq!(registry.active(), &set(&["a", "c", "d"]));
    }

    #[test]
    fn test_record_step_keeps_active_set() {
        let mut registry = ActorRegistry::new(&ActorConfig::default());
        registry.record_step(ids(&["a", "b"]), ids(&[]));
        registry.record_step(ids(&["c"]), ids(&["a"]));

        assert_eq!(registry.spawned(), &set(&["c"]));
        assert_eq!(registry.destroyed(), &set(&["a"]));
        assert_eq!(registry.active(), &set(&["b", "c"]));
    }

    #[test]
    fn test_depart_and_arrive_in_one_step() {
        let mut registry = ActorRegistry::new(&ActorConfig::default());
        registry.record_step(ids(&["x"]), ids(&["x"]));
        assert_eq!(registry.spawned(), &set(&["x"]));
        assert_eq!(registry.destroyed(), &set(&["x"]));
        assert!(registry.active().is_empty());

        registry.record_step(ids(&[]), ids(&[]));
        assert!(registry.active().is_empty());
    }

    #[tokio::test]
    async fn test_spawn_sequence() {
        let mut engine = engine(MockConfig::default()).await;
        let mut registry = ActorRegistry::new(&ActorConfig::default());

        let first = registry
            .spawn(&mut engine, "vehicle.audi", Some(Color::rgb(10, 20, 30)))
            .await
            .unwrap();
        let second = registry.spawn(&mut engine, "vehicle.audi", None).await.unwrap();

        assert_eq!(first, "carla0");
        assert_eq!(second, "carla1");
        assert_eq!(engine.vehicle_color("carla0"), Some(Color::rgb(10, 20, 30)));
    }

    #[tokio::test]
    async fn test_rejected_spawn_does_not_advance_sequence() {
        let mut engine = engine(MockConfig {
            fail_spawn_types: vec!["bogus".into()],
            ..Default::default()
        })
        .await;
        let mut registry = ActorRegistry::new(&ActorConfig::default());

        let err = registry.spawn(&mut engine, "bogus", None).await.unwrap_err();
        assert!(matches!(err, BridgeError::SpawnRejected { .. }));
        assert_eq!(registry.next_id(), "carla0");

        let id = registry.spawn(&mut engine, "vehicle.audi", None).await.unwrap();
        assert_eq!(id, "carla0");
    }

    #[tokio::test]
    async fn test_failed_coloring_removes_vehicle() {
        let mut engine = engine(MockConfig {
            fail_color: true,
            ..Default::default()
        })
        .await;
        let mut registry = ActorRegistry::new(&ActorConfig::default());

        let err = registry
            .spawn(&mut engine, "vehicle.audi", Some(Color::rgb(1, 2, 3)))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Lane(LaneClientError::CommandRejected { .. })
        ));
        assert!(!engine.has_vehicle("carla0"));

        engine.simulation_step(NEXT_STEP).await.unwrap();
        assert!(engine.departed_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_destroy_absent_actor_surfaces_error() {
        let mut engine = engine(MockConfig::default()).await;
        let mut registry = ActorRegistry::new(&ActorConfig::default());

        let err = registry
            .destroy(&mut engine, &"ghost".into())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Lane(LaneClientError::CommandRejected { .. })
        ));
    }

    #[tokio::test]
    async fn test_synchronize_pose_uses_free_keep_route() {
        let mut engine = engine(MockConfig::default()).await;
        let mut registry = ActorRegistry::new(&ActorConfig::default());
        let id = registry.spawn(&mut engine, "vehicle.audi", None).await.unwrap();
        engine.simulation_step(NEXT_STEP).await.unwrap();

        let transform = Transform {
            location: Location {
                x: 12.5,
                y: -3.0,
                z: 0.2,
            },
            rotation: Rotation {
                pitch: 0.0,
                yaw: 90.0,
                roll: 0.0,
            },
        };
        registry
            .synchronize_pose(
                &mut engine,
                &id,
                &transform,
                Some(VehicleSignals::BRAKE_LIGHT),
            )
            .await
            .unwrap();

        let pose = engine.vehicle_pose("carla0").unwrap();
        assert_eq!((pose.x, pose.y, pose.angle), (12.5, -3.0, 90.0));
        assert_eq!(pose.keep_route, KEEP_ROUTE_FREE);
        assert_eq!(
            engine.vehicle_signals("carla0"),
            Some(VehicleSignals::BRAKE_LIGHT)
        );
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn id_set() -> impl Strategy<Value = BTreeSet<String>> {
            prop::collection::btree_set("[a-e][0-3]", 0..12)
        }

        proptest! {
            #[test]
            fn refresh_is_a_pure_diff(previous in id_set(), current in id_set()) {
                let mut registry = ActorRegistry::new(&ActorConfig::default());
                registry.refresh(previous.iter().map(|s| ActorId::from(s.as_str())));
                registry.refresh(current.iter().map(|s| ActorId::from(s.as_str())));

                prop_assert!(registry.spawned().is_disjoint(registry.destroyed()));
                for id in registry.destroyed() {
                    prop_assert!(previous.contains(id.as_str()));
                    prop_assert!(!current.contains(id.as_str()));
                }
                for id in registry.spawned() {
                    prop_assert!(current.contains(id.as_str()));
                    prop_assert!(!previous.contains(id.as_str()));
                }
                let active: BTreeSet<String> =
                    registry.active().iter().map(|id| id.to_string()).collect();
                prop_assert_eq!(active, current);
            }
        }
    }
}
