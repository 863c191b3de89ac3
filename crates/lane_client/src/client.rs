//! Lane engine client abstraction
//!
//! Defines the command surface the bridge needs from the lane engine, so the
//! TraCI client and the in-memory mock are interchangeable.

use std::future::Future;

use contracts::{
    ActorId, Color, JunctionId, ProgramDefinition, SignalState, SubscriptionResult,
    TrafficLightAttribute, VehicleAttribute, VehicleSignals,
};

use crate::error::Result;

/// `keepRoute` mode for [`LaneEngine::move_to_xy`]: the vehicle may leave its
/// route and is mapped onto the nearest lane of the road graph.
pub const KEEP_ROUTE_FREE: u8 = 2;

/// Target time meaning "advance exactly one engine step".
pub const NEXT_STEP: f64 = 0.0;

/// Lane engine client trait
///
/// All calls are request/response against a single external process. Methods
/// take `&mut self`: no two commands (and in particular no two steps) can be in
/// flight at once.
pub trait LaneEngine: Send {
    /// Connect to a running lane engine
    fn connect(&mut self, host: &str, port: u16) -> impl Future<Output = Result<()>> + Send;

    /// Declare this client's position among clients sharing the engine
    fn set_order(&mut self, order: i32) -> impl Future<Output = Result<()>> + Send;

    /// Advance the simulation until `target_time` seconds, or by one step when
    /// `target_time` is [`NEXT_STEP`]. Refreshes all subscription results.
    fn simulation_step(&mut self, target_time: f64) -> impl Future<Output = Result<()>> + Send;

    /// Current simulation time, seconds
    fn simulation_time(&mut self) -> impl Future<Output = Result<f64>> + Send;

    /// Vehicles that entered the network during the last step
    fn departed_ids(&mut self) -> impl Future<Output = Result<Vec<ActorId>>> + Send;

    /// Vehicles that left the network during the last step
    fn arrived_ids(&mut self) -> impl Future<Output = Result<Vec<ActorId>>> + Send;

    /// All vehicles currently in the network
    fn vehicle_ids(&mut self) -> impl Future<Output = Result<Vec<ActorId>>> + Send;

    fn edge_ids(&mut self) -> impl Future<Output = Result<Vec<String>>> + Send;

    fn add_route(
        &mut self,
        route_id: &str,
        edges: &[String],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Insert a vehicle on `route_id`, departing now
    fn add_vehicle(
        &mut self,
        vehicle_id: &ActorId,
        route_id: &str,
        type_id: &str,
    ) -> impl Future<Output = Result<()>> + Send;

    fn set_vehicle_color(
        &mut self,
        vehicle_id: &ActorId,
        color: Color,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove a vehicle. Unknown ids are rejected by the engine.
    fn remove_vehicle(&mut self, vehicle_id: &ActorId) -> impl Future<Output = Result<()>> + Send;

    /// Place a vehicle at `(x, y)` with heading `angle` (degrees)
    ///
    /// `edge_id` may be empty to let the engine pick the edge.
    fn move_to_xy(
        &mut self,
        vehicle_id: &ActorId,
        edge_id: &str,
        lane: i32,
        x: f64,
        y: f64,
        angle: f64,
        keep_route: u8,
    ) -> impl Future<Output = Result<()>> + Send;

    fn set_vehicle_signals(
        &mut self,
        vehicle_id: &ActorId,
        signals: VehicleSignals,
    ) -> impl Future<Output = Result<()>> + Send;

    fn subscribe_vehicle(
        &mut self,
        vehicle_id: &ActorId,
        attributes: &[VehicleAttribute],
    ) -> impl Future<Output = Result<()>> + Send;

    fn unsubscribe_vehicle(&mut self, vehicle_id: &ActorId)
        -> impl Future<Output = Result<()>> + Send;

    /// Latest subscription result for a vehicle, if subscribed
    fn vehicle_subscription(
        &self,
        vehicle_id: &ActorId,
    ) -> Option<SubscriptionResult<VehicleAttribute>>;

    fn traffic_light_ids(&mut self) -> impl Future<Output = Result<Vec<JunctionId>>> + Send;

    /// Every program defined for a junction
    fn program_definitions(
        &mut self,
        junction: &JunctionId,
    ) -> impl Future<Output = Result<Vec<ProgramDefinition>>> + Send;

    fn current_program(&mut self, junction: &JunctionId)
        -> impl Future<Output = Result<String>> + Send;

    fn current_phase(&mut self, junction: &JunctionId) -> impl Future<Output = Result<usize>> + Send;

    fn subscribe_traffic_light(
        &mut self,
        junction: &JunctionId,
        attributes: &[TrafficLightAttribute],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Latest subscription result for a junction, if subscribed
    fn traffic_light_subscription(
        &self,
        junction: &JunctionId,
    ) -> Option<SubscriptionResult<TrafficLightAttribute>>;

    /// Live state string of a junction, one character per link
    fn red_yellow_green_state(
        &mut self,
        junction: &JunctionId,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Override the state of a single link
    fn set_link_state(
        &mut self,
        junction: &JunctionId,
        link_index: usize,
        state: SignalState,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Release the connection. Further calls fail with `NotConnected`.
    fn close(&mut self) -> impl Future<Output = Result<()>> + Send;
}
