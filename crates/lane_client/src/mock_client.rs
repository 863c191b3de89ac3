//! Mock lane engine
//!
//! In-memory stand-in for tests and dry runs. Behaves like the real engine
//! where the bridge depends on it:
//! - vehicles added by a client depart on the next step
//! - removed vehicles are reported as arrived on the next step
//! - overriding a link switches the junction to the `online` program
//!
//! Departures, arrivals and phase changes of engine-internal origin can be
//! scripted per step, and failures injected through [`MockConfig`].

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};

use contracts::{
    ActorId, Color, EngineValue, JunctionId, ProgramDefinition, SignalState, SubscriptionResult,
    TrafficLightAttribute, VehicleAttribute, VehicleSignals,
};
use tracing::instrument;

use crate::client::LaneEngine;
use crate::error::{LaneClientError, Result};

/// Program id the engine reports once a client overrides link states.
pub const ONLINE_PROGRAM: &str = "online";

/// Mock engine configuration (failure injection)
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Seconds per step when stepping with `NEXT_STEP`
    pub step_length: f64,
    /// `connect` fails
    pub fail_connect: bool,
    /// `add_vehicle` is rejected for these vehicle types
    pub fail_spawn_types: Vec<String>,
    /// `set_vehicle_color` is rejected
    pub fail_color: bool,
    /// Edges reported by `edge_ids`
    pub edges: Vec<String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            step_length: 0.05,
            fail_connect: false,
            fail_spawn_types: Vec::new(),
            fail_color: false,
            edges: vec!["edge_0".to_string()],
        }
    }
}

/// A link override recorded by the mock
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkWrite {
    pub junction: JunctionId,
    pub link_index: usize,
    pub state: SignalState,
}

/// Pose pushed through `move_to_xy`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MockPose {
    pub x: f64,
    pub y: f64,
    pub angle: f64,
    pub keep_route: u8,
}

#[derive(Debug, Clone)]
struct MockVehicle {
    type_id: String,
    color: Color,
    pose: MockPose,
    signals: VehicleSignals,
}

impl MockVehicle {
    fn new(type_id: &str) -> Self {
        Self {
            type_id: type_id.to_string(),
            color: Color::rgb(255, 255, 0),
            pose: MockPose {
                x: 0.0,
                y: 0.0,
                angle: 0.0,
                keep_route: 0,
            },
            signals: VehicleSignals::NONE,
        }
    }

    fn attribute(&self, attribute: VehicleAttribute) -> EngineValue {
        match attribute {
            VehicleAttribute::TypeId => EngineValue::String(self.type_id.clone()),
            VehicleAttribute::VehicleClass => EngineValue::String("passenger".to_string()),
            VehicleAttribute::Color => {
                EngineValue::Color([self.color.r, self.color.g, self.color.b, self.color.a])
            }
            VehicleAttribute::Length => EngineValue::Double(4.5),
            VehicleAttribute::Width => EngineValue::Double(1.8),
            VehicleAttribute::Height => EngineValue::Double(1.5),
            VehicleAttribute::Position => {
                EngineValue::Position3D([self.pose.x, self.pose.y, 0.0])
            }
            VehicleAttribute::Angle => EngineValue::Double(self.pose.angle),
            VehicleAttribute::Slope => EngineValue::Double(0.0),
            VehicleAttribute::Speed | VehicleAttribute::LateralSpeed => EngineValue::Double(0.0),
            VehicleAttribute::Signals => EngineValue::Int(self.signals.bits() as i32),
        }
    }
}

#[derive(Debug, Clone)]
struct MockJunction {
    programs: Vec<ProgramDefinition>,
    current_program: String,
    current_phase: usize,
    /// Live state after a client override
    override_state: Option<String>,
}

impl MockJunction {
    fn live_state(&self) -> String {
        if let Some(state) = &self.override_state {
            return state.clone();
        }
        self.programs
            .iter()
            .find(|p| p.program_id == self.current_program)
            .and_then(|p| p.phases.get(self.current_phase))
            .cloned()
            .unwrap_or_default()
    }
}

#[derive(Debug, Default)]
struct MockState {
    connected: bool,
    closed: bool,
    order: Option<i32>,
    time: f64,
    step: u64,
    routes: HashMap<String, Vec<String>>,
    vehicles: BTreeMap<ActorId, MockVehicle>,
    pending_added: Vec<ActorId>,
    pending_vehicles: HashMap<ActorId, MockVehicle>,
    pending_removed: Vec<ActorId>,
    departed: Vec<ActorId>,
    arrived: Vec<ActorId>,
    scripted_departures: BTreeMap<u64, Vec<(ActorId, String)>>,
    scripted_arrivals: BTreeMap<u64, Vec<ActorId>>,
    scripted_phases: BTreeMap<u64, Vec<(JunctionId, String, usize)>>,
    scripted_malformed_tl: BTreeMap<u64, Vec<JunctionId>>,
    junctions: BTreeMap<JunctionId, MockJunction>,
    vehicle_subs: HashMap<ActorId, Vec<VehicleAttribute>>,
    tl_subs: HashMap<JunctionId, Vec<TrafficLightAttribute>>,
    vehicle_results: HashMap<ActorId, SubscriptionResult<VehicleAttribute>>,
    tl_results: HashMap<JunctionId, SubscriptionResult<TrafficLightAttribute>>,
    link_writes: Vec<LinkWrite>,
}

impl MockState {
    fn ensure_connected(&self) -> Result<()> {
        if self.connected && !self.closed {
            Ok(())
        } else {
            Err(LaneClientError::NotConnected)
        }
    }

    fn junction_mut(&mut self, command: &str, junction: &JunctionId) -> Result<&mut MockJunction> {
        self.junctions.get_mut(junction).ok_or_else(|| {
            LaneClientError::rejected(command, format!("traffic light '{junction}' is not known"))
        })
    }

    fn vehicle_mut(&mut self, command: &str, vehicle_id: &ActorId) -> Result<&mut MockVehicle> {
        if let Some(vehicle) = self.vehicles.get_mut(vehicle_id) {
            return Ok(vehicle);
        }
        self.pending_vehicles.get_mut(vehicle_id).ok_or_else(|| {
            LaneClientError::rejected(command, format!("vehicle '{vehicle_id}' is not known"))
        })
    }

    fn vehicle_bag(&self, vehicle_id: &ActorId) -> Option<SubscriptionResult<VehicleAttribute>> {
        let vehicle = self.vehicles.get(vehicle_id)?;
        let attributes = self.vehicle_subs.get(vehicle_id)?;
        Some(
            attributes
                .iter()
                .map(|a| (*a, vehicle.attribute(*a)))
                .collect(),
        )
    }

    fn tl_bag(&self, junction: &JunctionId) -> Option<SubscriptionResult<TrafficLightAttribute>> {
        let state = self.junctions.get(junction)?;
        let attributes = self.tl_subs.get(junction)?;
        Some(
            attributes
                .iter()
                .map(|a| {
                    let value = match a {
                        TrafficLightAttribute::CurrentProgram => {
                            EngineValue::String(state.current_program.clone())
                        }
                        TrafficLightAttribute::CurrentPhase => {
                            EngineValue::Int(state.current_phase as i32)
                        }
                    };
                    (*a, value)
                })
                .collect(),
        )
    }

    fn refresh_subscriptions(&mut self) {
        let vehicles = &self.vehicles;
        self.vehicle_subs.retain(|id, _| vehicles.contains_key(id));

        let vehicle_ids: Vec<ActorId> = self.vehicle_subs.keys().cloned().collect();
        self.vehicle_results = vehicle_ids
            .into_iter()
            .filter_map(|id| self.vehicle_bag(&id).map(|bag| (id, bag)))
            .collect();

        let junction_ids: Vec<JunctionId> = self.tl_subs.keys().cloned().collect();
        self.tl_results = junction_ids
            .into_iter()
            .filter_map(|id| self.tl_bag(&id).map(|bag| (id, bag)))
            .collect();

        if let Some(junctions) = self.scripted_malformed_tl.get(&self.step) {
            for junction in junctions {
                if let Some(bag) = self.tl_results.get_mut(junction) {
                    bag.remove(&TrafficLightAttribute::CurrentProgram);
                }
            }
        }
    }

    fn advance(&mut self, target_time: f64, step_length: f64) {
        self.step += 1;
        self.time = if target_time > self.time {
            target_time
        } else {
            self.time + step_length
        };

        self.departed.clear();
        self.arrived.clear();

        for id in std::mem::take(&mut self.pending_removed) {
            self.arrived.push(id);
        }
        if let Some(arrivals) = self.scripted_arrivals.remove(&self.step) {
            for id in arrivals {
                if self.vehicles.remove(&id).is_some() {
                    self.arrived.push(id);
                }
            }
        }

        for id in std::mem::take(&mut self.pending_added) {
            if let Some(vehicle) = self.pending_vehicles.remove(&id) {
                self.vehicles.insert(id.clone(), vehicle);
                self.departed.push(id);
            }
        }
        if let Some(departures) = self.scripted_departures.remove(&self.step) {
            for (id, type_id) in departures {
                self.vehicles.insert(id.clone(), MockVehicle::new(&type_id));
                self.departed.push(id);
            }
        }

        if let Some(changes) = self.scripted_phases.remove(&self.step) {
            for (junction, program, phase) in changes {
                if let Some(state) = self.junctions.get_mut(&junction) {
                    state.current_program = program;
                    state.current_phase = phase;
                    state.override_state = None;
                }
            }
        }

        self.refresh_subscriptions();
    }
}

/// Mock lane engine
pub struct MockLaneEngine {
    config: MockConfig,
    state: Mutex<MockState>,
}

impl MockLaneEngine {
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ===== Scripting =====

    /// Register a signalised junction. The first program is active, phase 0.
    pub fn add_junction(&self, junction: impl Into<JunctionId>, programs: Vec<ProgramDefinition>) {
        let current_program = programs
            .first()
            .map(|p| p.program_id.clone())
            .unwrap_or_default();
        self.state().junctions.insert(
            junction.into(),
            MockJunction {
                programs,
                current_program,
                current_phase: 0,
                override_state: None,
            },
        );
    }

    /// A vehicle of engine-internal origin departs at `step` (1-based).
    pub fn schedule_departure(&self, step: u64, vehicle_id: impl Into<ActorId>, type_id: &str) {
        self.state()
            .scripted_departures
            .entry(step)
            .or_default()
            .push((vehicle_id.into(), type_id.to_string()));
    }

    /// A vehicle reaches its destination at `step`.
    pub fn schedule_arrival(&self, step: u64, vehicle_id: impl Into<ActorId>) {
        self.state()
            .scripted_arrivals
            .entry(step)
            .or_default()
            .push(vehicle_id.into());
    }

    /// The engine switches a junction to `(program, phase)` at `step`.
    pub fn schedule_phase(
        &self,
        step: u64,
        junction: impl Into<JunctionId>,
        program: &str,
        phase: usize,
    ) {
        self.state()
            .scripted_phases
            .entry(step)
            .or_default()
            .push((junction.into(), program.to_string(), phase));
    }

    /// The subscription result of `junction` lacks its program at `step`.
    pub fn schedule_malformed_tl_result(&self, step: u64, junction: impl Into<JunctionId>) {
        self.state()
            .scripted_malformed_tl
            .entry(step)
            .or_default()
            .push(junction.into());
    }

    // ===== Inspection =====

    pub fn link_writes(&self) -> Vec<LinkWrite> {
        self.state().link_writes.clone()
    }

    pub fn vehicle_count(&self) -> usize {
        self.state().vehicles.len()
    }

    pub fn has_vehicle(&self, vehicle_id: &str) -> bool {
        let state = self.state();
        state.vehicles.contains_key(vehicle_id) || state.pending_vehicles.contains_key(vehicle_id)
    }

    pub fn vehicle_pose(&self, vehicle_id: &str) -> Option<MockPose> {
        let state = self.state();
        state
            .vehicles
            .get(vehicle_id)
            .or_else(|| state.pending_vehicles.get(vehicle_id))
            .map(|v| v.pose)
    }

    pub fn vehicle_signals(&self, vehicle_id: &str) -> Option<VehicleSignals> {
        self.state().vehicles.get(vehicle_id).map(|v| v.signals)
    }

    pub fn vehicle_color(&self, vehicle_id: &str) -> Option<Color> {
        let state = self.state();
        state
            .vehicles
            .get(vehicle_id)
            .or_else(|| state.pending_vehicles.get(vehicle_id))
            .map(|v| v.color)
    }

    pub fn route(&self, route_id: &str) -> Option<Vec<String>> {
        self.state().routes.get(route_id).cloned()
    }

    pub fn client_order(&self) -> Option<i32> {
        self.state().order
    }

    pub fn step_count(&self) -> u64 {
        self.state().step
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

impl Default for MockLaneEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl LaneEngine for MockLaneEngine {
    #[instrument(name = "mock_lane_connect", skip(self), fields(host = %host, port))]
    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        if self.config.fail_connect {
            return Err(LaneClientError::ConnectionFailed {
                message: format!("mock refused {host}:{port}"),
            });
        }
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.connected = true;
        state.closed = false;
        Ok(())
    }

    async fn set_order(&mut self, order: i32) -> Result<()> {
        let mut state = self.state();
        state.ensure_connected()?;
        state.order = Some(order);
        Ok(())
    }

    #[instrument(name = "mock_lane_step", skip(self))]
    async fn simulation_step(&mut self, target_time: f64) -> Result<()> {
        let step_length = self.config.step_length;
        let mut state = self.state();
        state.ensure_connected()?;
        state.advance(target_time, step_length);
        Ok(())
    }

    async fn simulation_time(&mut self) -> Result<f64> {
        let state = self.state();
        state.ensure_connected()?;
        Ok(state.time)
    }

    async fn departed_ids(&mut self) -> Result<Vec<ActorId>> {
        let state = self.state();
        state.ensure_connected()?;
        Ok(state.departed.clone())
    }

    async fn arrived_ids(&mut self) -> Result<Vec<ActorId>> {
        let state = self.state();
        state.ensure_connected()?;
        Ok(state.arrived.clone())
    }

    async fn vehicle_ids(&mut self) -> Result<Vec<ActorId>> {
        let state = self.state();
        state.ensure_connected()?;
        Ok(state.vehicles.keys().cloned().collect())
    }

    async fn edge_ids(&mut self) -> Result<Vec<String>> {
        self.state().ensure_connected()?;
        Ok(self.config.edges.clone())
    }

    async fn add_route(&mut self, route_id: &str, edges: &[String]) -> Result<()> {
        let mut state = self.state();
        state.ensure_connected()?;
        if state.routes.contains_key(route_id) {
            return Err(LaneClientError::rejected(
                "route.add",
                format!("could not add route '{route_id}'"),
            ));
        }
        state.routes.insert(route_id.to_string(), edges.to_vec());
        Ok(())
    }

    #[instrument(name = "mock_lane_add_vehicle", skip(self), fields(vehicle_id = %vehicle_id))]
    async fn add_vehicle(&mut self, vehicle_id: &ActorId, route_id: &str, type_id: &str) -> Result<()> {
        let mut state = self.state();
        state.ensure_connected()?;

        if self.config.fail_spawn_types.iter().any(|t| t == type_id) {
            return Err(LaneClientError::rejected(
                "vehicle.add",
                format!("invalid type '{type_id}' for vehicle '{vehicle_id}'"),
            ));
        }
        if !state.routes.contains_key(route_id) {
            return Err(LaneClientError::rejected(
                "vehicle.add",
                format!("invalid route '{route_id}' for vehicle '{vehicle_id}'"),
            ));
        }
        if state.vehicles.contains_key(vehicle_id) || state.pending_vehicles.contains_key(vehicle_id)
        {
            return Err(LaneClientError::rejected(
                "vehicle.add",
                format!("vehicle '{vehicle_id}' to add already exists"),
            ));
        }

        state
            .pending_vehicles
            .insert(vehicle_id.clone(), MockVehicle::new(type_id));
        state.pending_added.push(vehicle_id.clone());
        Ok(())
    }

    async fn set_vehicle_color(&mut self, vehicle_id: &ActorId, color: Color) -> Result<()> {
        let mut state = self.state();
        state.ensure_connected()?;
        if self.config.fail_color {
            return Err(LaneClientError::rejected(
                "vehicle.setColor",
                format!("color of '{vehicle_id}' cannot be changed"),
            ));
        }
        state.vehicle_mut("vehicle.setColor", vehicle_id)?.color = color;
        Ok(())
    }

    #[instrument(name = "mock_lane_remove_vehicle", skip(self), fields(vehicle_id = %vehicle_id))]
    async fn remove_vehicle(&mut self, vehicle_id: &ActorId) -> Result<()> {
        let mut state = self.state();
        state.ensure_connected()?;

        if state.pending_vehicles.remove(vehicle_id).is_some() {
            state.pending_added.retain(|id| id != vehicle_id);
            return Ok(());
        }
        if state.vehicles.remove(vehicle_id).is_none() {
            return Err(LaneClientError::rejected(
                "vehicle.remove",
                format!("vehicle '{vehicle_id}' is not known"),
            ));
        }
        state.vehicle_subs.remove(vehicle_id);
        state.vehicle_results.remove(vehicle_id);
        state.pending_removed.push(vehicle_id.clone());
        Ok(())
    }

    async fn move_to_xy(
        &mut self,
        vehicle_id: &ActorId,
        _edge_id: &str,
        _lane: i32,
        x: f64,
        y: f64,
        angle: f64,
        keep_route: u8,
    ) -> Result<()> {
        let mut state = self.state();
        state.ensure_connected()?;
        state.vehicle_mut("vehicle.moveToXY", vehicle_id)?.pose = MockPose {
            x,
            y,
            angle,
            keep_route,
        };
        Ok(())
    }

    async fn set_vehicle_signals(
        &mut self,
        vehicle_id: &ActorId,
        signals: VehicleSignals,
    ) -> Result<()> {
        let mut state = self.state();
        state.ensure_connected()?;
        state.vehicle_mut("vehicle.setSignals", vehicle_id)?.signals = signals;
        Ok(())
    }

    async fn subscribe_vehicle(
        &mut self,
        vehicle_id: &ActorId,
        attributes: &[VehicleAttribute],
    ) -> Result<()> {
        let mut state = self.state();
        state.ensure_connected()?;
        if !state.vehicles.contains_key(vehicle_id) {
            return Err(LaneClientError::rejected(
                "vehicle.subscribe",
                format!("vehicle '{vehicle_id}' is not known"),
            ));
        }
        state
            .vehicle_subs
            .insert(vehicle_id.clone(), attributes.to_vec());
        if let Some(bag) = state.vehicle_bag(vehicle_id) {
            state.vehicle_results.insert(vehicle_id.clone(), bag);
        }
        Ok(())
    }

    async fn unsubscribe_vehicle(&mut self, vehicle_id: &ActorId) -> Result<()> {
        let mut state = self.state();
        state.ensure_connected()?;
        state.vehicle_subs.remove(vehicle_id);
        state.vehicle_results.remove(vehicle_id);
        Ok(())
    }

    fn vehicle_subscription(
        &self,
        vehicle_id: &ActorId,
    ) -> Option<SubscriptionResult<VehicleAttribute>> {
        self.state().vehicle_results.get(vehicle_id).cloned()
    }

    async fn traffic_light_ids(&mut self) -> Result<Vec<JunctionId>> {
        let state = self.state();
        state.ensure_connected()?;
        Ok(state.junctions.keys().cloned().collect())
    }

    async fn program_definitions(&mut self, junction: &JunctionId) -> Result<Vec<ProgramDefinition>> {
        let mut state = self.state();
        state.ensure_connected()?;
        Ok(state
            .junction_mut("trafficlight.getAllProgramLogics", junction)?
            .programs
            .clone())
    }

    async fn current_program(&mut self, junction: &JunctionId) -> Result<String> {
        let mut state = self.state();
        state.ensure_connected()?;
        Ok(state
            .junction_mut("trafficlight.getProgram", junction)?
            .current_program
            .clone())
    }

    async fn current_phase(&mut self, junction: &JunctionId) -> Result<usize> {
        let mut state = self.state();
        state.ensure_connected()?;
        Ok(state
            .junction_mut("trafficlight.getPhase", junction)?
            .current_phase)
    }

    async fn subscribe_traffic_light(
        &mut self,
        junction: &JunctionId,
        attributes: &[TrafficLightAttribute],
    ) -> Result<()> {
        let mut state = self.state();
        state.ensure_connected()?;
        state.junction_mut("trafficlight.subscribe", junction)?;
        state.tl_subs.insert(junction.clone(), attributes.to_vec());
        if let Some(bag) = state.tl_bag(junction) {
            state.tl_results.insert(junction.clone(), bag);
        }
        Ok(())
    }

    fn traffic_light_subscription(
        &self,
        junction: &JunctionId,
    ) -> Option<SubscriptionResult<TrafficLightAttribute>> {
        self.state().tl_results.get(junction).cloned()
    }

    async fn red_yellow_green_state(&mut self, junction: &JunctionId) -> Result<String> {
        let mut state = self.state();
        state.ensure_connected()?;
        Ok(state
            .junction_mut("trafficlight.getRedYellowGreenState", junction)?
            .live_state())
    }

    async fn set_link_state(
        &mut self,
        junction: &JunctionId,
        link_index: usize,
        signal: SignalState,
    ) -> Result<()> {
        let mut state = self.state();
        state.ensure_connected()?;

        let tl = state.junction_mut("trafficlight.setLinkState", junction)?;
        let mut live: Vec<char> = tl.live_state().chars().collect();
        let Some(slot) = live.get_mut(link_index) else {
            return Err(LaneClientError::rejected(
                "trafficlight.setLinkState",
                format!(
                    "link index {link_index} out of range for '{junction}' ({} links)",
                    live.len()
                ),
            ));
        };
        *slot = signal.as_char();
        tl.override_state = Some(live.into_iter().collect());
        tl.current_program = ONLINE_PROGRAM.to_string();

        state.link_writes.push(LinkWrite {
            junction: junction.clone(),
            link_index,
            state: signal,
        });
        Ok(())
    }

    async fn close(&mut self) -> Result<()> {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        state.ensure_connected()?;
        state.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::NEXT_STEP;
    use std::collections::BTreeMap;

    fn program(id: &str, phases: &[&str]) -> ProgramDefinition {
        ProgramDefinition {
            program_id: id.into(),
            phases: phases.iter().map(|p| p.to_string()).collect(),
            parameters: BTreeMap::new(),
        }
    }

    async fn connected() -> MockLaneEngine {
        let mut engine = MockLaneEngine::new();
        engine.connect("localhost", 8813).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_requires_connection() {
        let mut engine = MockLaneEngine::new();
        let err = engine.simulation_step(NEXT_STEP).await.unwrap_err();
        assert!(matches!(err, LaneClientError::NotConnected));
    }

    #[tokio::test]
    async fn test_fail_connect() {
        let mut engine = MockLaneEngine::with_config(MockConfig {
            fail_connect: true,
            ..Default::default()
        });
        let err = engine.connect("localhost", 8813).await.unwrap_err();
        assert!(matches!(err, LaneClientError::ConnectionFailed { .. }));
    }

    #[tokio::test]
    async fn test_added_vehicle_departs_next_step() {
        let mut engine = connected().await;
        engine.add_route("r", &["edge_0".into()]).await.unwrap();
        engine
            .add_vehicle(&"carla0".into(), "r", "vehicle.audi.a2")
            .await
            .unwrap();
        assert!(engine.vehicle_ids().await.unwrap().is_empty());

        engine.simulation_step(NEXT_STEP).await.unwrap();
        assert_eq!(engine.departed_ids().await.unwrap(), vec![ActorId::from("carla0")]);
        assert_eq!(engine.vehicle_count(), 1);

        engine.remove_vehicle(&"carla0".into()).await.unwrap();
        engine.simulation_step(NEXT_STEP).await.unwrap();
        assert_eq!(engine.arrived_ids().await.unwrap(), vec![ActorId::from("carla0")]);
        assert!(engine.departed_ids().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_vehicle_rejections() {
        let mut engine = MockLaneEngine::with_config(MockConfig {
            fail_spawn_types: vec!["bad".into()],
            ..Default::default()
        });
        engine.connect("localhost", 8813).await.unwrap();
        engine.add_route("r", &["edge_0".into()]).await.unwrap();

        assert!(engine.add_vehicle(&"a".into(), "missing", "t").await.is_err());
        assert!(engine.add_vehicle(&"a".into(), "r", "bad").await.is_err());
        engine.add_vehicle(&"a".into(), "r", "t").await.unwrap();
        assert!(engine.add_vehicle(&"a".into(), "r", "t").await.is_err());
    }

    #[tokio::test]
    async fn test_remove_unknown_vehicle_rejected() {
        let mut engine = connected().await;
        let err = engine.remove_vehicle(&"ghost".into()).await.unwrap_err();
        assert!(matches!(err, LaneClientError::CommandRejected { .. }));
    }

    #[tokio::test]
    async fn test_scripted_phase_and_subscription() {
        let mut engine = connected().await;
        engine.add_junction("918", vec![program("0", &["GGrr", "rrGG"])]);
        engine.schedule_phase(2, "918", "0", 1);
        engine
            .subscribe_traffic_light(&"918".into(), &TrafficLightAttribute::ALL)
            .await
            .unwrap();

        engine.simulation_step(NEXT_STEP).await.unwrap();
        let bag = engine.traffic_light_subscription(&"918".into()).unwrap();
        assert_eq!(bag[&TrafficLightAttribute::CurrentPhase], EngineValue::Int(0));

        engine.simulation_step(NEXT_STEP).await.unwrap();
        let bag = engine.traffic_light_subscription(&"918".into()).unwrap();
        assert_eq!(bag[&TrafficLightAttribute::CurrentPhase], EngineValue::Int(1));
        assert_eq!(
            engine.red_yellow_green_state(&"918".into()).await.unwrap(),
            "rrGG"
        );
    }

    #[tokio::test]
    async fn test_set_link_state_switches_to_online() {
        let mut engine = connected().await;
        engine.add_junction("918", vec![program("0", &["GGrr"])]);

        engine
            .set_link_state(&"918".into(), 1, SignalState::Red)
            .await
            .unwrap();
        assert_eq!(
            engine.red_yellow_green_state(&"918".into()).await.unwrap(),
            "Grrr"
        );
        assert_eq!(
            engine.current_program(&"918".into()).await.unwrap(),
            ONLINE_PROGRAM
        );
        assert_eq!(engine.link_writes().len(), 1);

        let err = engine
            .set_link_state(&"918".into(), 9, SignalState::Red)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[tokio::test]
    async fn test_time_advances_by_step_or_target() {
        let mut engine = connected().await;
        engine.simulation_step(NEXT_STEP).await.unwrap();
        assert!((engine.simulation_time().await.unwrap() - 0.05).abs() < 1e-9);
        engine.simulation_step(1.0).await.unwrap();
        assert_eq!(engine.simulation_time().await.unwrap(), 1.0);
    }

    #[tokio::test]
    async fn test_close_then_calls_fail() {
        let mut engine = connected().await;
        engine.close().await.unwrap();
        assert!(engine.is_closed());
        assert!(engine.vehicle_ids().await.is_err());
        assert!(engine.close().await.is_err());
    }
}
