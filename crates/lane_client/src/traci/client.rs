//! TraCI client over TCP

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use contracts::{
    ActorId, Color, JunctionId, ProgramDefinition, SignalState, SubscriptionResult,
    TrafficLightAttribute, VehicleAttribute, VehicleSignals,
};

use super::codec::{self, Reader, SubscriptionBlock, Value};
use super::constants::*;
use crate::client::LaneEngine;
use crate::error::{LaneClientError, Result};

/// Largest reply accepted from the engine, length prefix included
pub const MAX_MESSAGE_LEN: usize = 64 * 1024 * 1024;

/// Lane engine client speaking TraCI
///
/// Subscription results arrive with every simulation step and are cached
/// until the next one.
#[derive(Default)]
pub struct TraciClient {
    stream: Option<TcpStream>,
    vehicle_results: HashMap<ActorId, SubscriptionResult<VehicleAttribute>>,
    tl_results: HashMap<JunctionId, SubscriptionResult<TrafficLightAttribute>>,
}

impl TraciClient {
    /// Create new client (disconnected state)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// API level and engine version string
    pub async fn version(&mut self) -> Result<(i32, String)> {
        let mut reader = self
            .exchange(CMD_GETVERSION, BytesMut::new(), "getVersion")
            .await?;
        let (cmd, mut body) = reader.read_command()?;
        if cmd != CMD_GETVERSION {
            return Err(LaneClientError::protocol(format!(
                "version response 0x{cmd:02x}"
            )));
        }
        Ok((body.read_i32()?, body.read_string()?))
    }

    async fn roundtrip(&mut self, command: BytesMut) -> Result<Reader> {
        let stream = self.stream.as_mut().ok_or(LaneClientError::NotConnected)?;

        stream.write_all(&codec::encode_message(&[command])).await?;

        let len = stream.read_u32().await? as usize;
        if len < 4 {
            return Err(LaneClientError::protocol(format!(
                "message length {len} too short"
            )));
        }
        if len > MAX_MESSAGE_LEN {
            return Err(LaneClientError::protocol(format!(
                "message length {len} exceeds {MAX_MESSAGE_LEN}"
            )));
        }
        let mut body = vec![0u8; len - 4];
        stream.read_exact(&mut body).await?;
        Ok(Reader::new(Bytes::from(body)))
    }

    /// Send one command and check its status; the reader is positioned after it.
    async fn exchange(&mut self, cmd: u8, content: BytesMut, name: &str) -> Result<Reader> {
        debug!(command = name, "traci command");
        let mut reader = self.roundtrip(codec::encode_command(cmd, &content)).await?;
        reader.read_status(cmd, name)?;
        Ok(reader)
    }

    async fn get(&mut self, cmd: u8, variable: u8, object_id: &str, name: &str) -> Result<Value> {
        let mut reader = self
            .exchange(cmd, codec::get_variable(variable, object_id), name)
            .await?;
        let (response, mut body) = reader.read_command()?;
        if response != cmd + RESPONSE_GET_OFFSET {
            return Err(LaneClientError::protocol(format!(
                "{name}: response 0x{response:02x}"
            )));
        }
        let returned = body.read_u8()?;
        if returned != variable {
            return Err(LaneClientError::protocol(format!(
                "{name}: variable 0x{returned:02x}, expected 0x{variable:02x}"
            )));
        }
        let _object_id = body.read_string()?;
        body.read_value()
    }

    async fn get_ids<T: From<String>>(&mut self, cmd: u8, name: &str) -> Result<Vec<T>> {
        Ok(self
            .get(cmd, ID_LIST, "", name)
            .await?
            .into_string_list()?
            .into_iter()
            .map(T::from)
            .collect())
    }

    async fn sim_ids(&mut self, variable: u8, name: &str) -> Result<Vec<ActorId>> {
        Ok(self
            .get(CMD_GET_SIM_VARIABLE, variable, "", name)
            .await?
            .into_string_list()?
            .into_iter()
            .map(ActorId::from)
            .collect())
    }

    fn absorb_subscriptions(&mut self, reader: &mut Reader) -> Result<()> {
        while !reader.is_empty() {
            let (response, mut body) = reader.read_command()?;
            let block = SubscriptionBlock::read(response, &mut body)?;
            self.store_block(block);
        }
        Ok(())
    }

    fn store_block(&mut self, block: SubscriptionBlock) {
        match block.response {
            RESPONSE_SUBSCRIBE_VEHICLE_VARIABLE => {
                let bag = block
                    .values
                    .into_iter()
                    .filter_map(|(var, value)| Some((vehicle_attribute(var)?, value.into_engine_value()?)))
                    .collect();
                self.vehicle_results.insert(block.object_id.into(), bag);
            }
            RESPONSE_SUBSCRIBE_TL_VARIABLE => {
                let bag = block
                    .values
                    .into_iter()
                    .filter_map(|(var, value)| {
                        Some((traffic_light_attribute(var)?, value.into_engine_value()?))
                    })
                    .collect();
                self.tl_results.insert(block.object_id.into(), bag);
            }
            other => debug!(
                response = other,
                object_id = %block.object_id,
                "ignoring subscription response"
            ),
        }
    }
}

impl LaneEngine for TraciClient {
    #[instrument(name = "traci_connect", skip(self))]
    async fn connect(&mut self, host: &str, port: u16) -> Result<()> {
        let stream = TcpStream::connect((host, port))
            .await
            .map_err(|e| LaneClientError::ConnectionFailed {
                message: format!("{host}:{port}: {e}"),
            })?;
        stream.set_nodelay(true)?;
        self.stream = Some(stream);

        let (api, version) = self.version().await?;
        info!(api_level = api, engine = %version, "connected to lane engine");
        Ok(())
    }

    async fn set_order(&mut self, order: i32) -> Result<()> {
        let mut content = BytesMut::new();
        bytes::BufMut::put_i32(&mut content, order);
        self.exchange(CMD_SETORDER, content, "setOrder").await?;
        Ok(())
    }

    #[instrument(name = "traci_step", skip(self))]
    async fn simulation_step(&mut self, target_time: f64) -> Result<()> {
        let mut content = BytesMut::new();
        bytes::BufMut::put_f64(&mut content, target_time);
        let mut reader = self
            .exchange(CMD_SIMSTEP, content, "simulationStep")
            .await?;

        self.vehicle_results.clear();
        self.tl_results.clear();

        let count = reader.read_i32()?;
        debug!(subscriptions = count, "step response");
        self.absorb_subscriptions(&mut reader)
    }

    async fn simulation_time(&mut self) -> Result<f64> {
        self.get(CMD_GET_SIM_VARIABLE, VAR_TIME, "", "simulation.getTime")
            .await?
            .into_double()
    }

    async fn departed_ids(&mut self) -> Result<Vec<ActorId>> {
        self.sim_ids(VAR_DEPARTED_VEHICLES_IDS, "simulation.getDepartedIDList")
            .await
    }

    async fn arrived_ids(&mut self) -> Result<Vec<ActorId>> {
        self.sim_ids(VAR_ARRIVED_VEHICLES_IDS, "simulation.getArrivedIDList")
            .await
    }

    async fn vehicle_ids(&mut self) -> Result<Vec<ActorId>> {
        self.get_ids(CMD_GET_VEHICLE_VARIABLE, "vehicle.getIDList")
            .await
    }

    async fn edge_ids(&mut self) -> Result<Vec<String>> {
        self.get_ids(CMD_GET_EDGE_VARIABLE, "edge.getIDList").await
    }

    async fn add_route(&mut self, route_id: &str, edges: &[String]) -> Result<()> {
        let mut content = codec::set_variable(ADD, route_id);
        codec::put_typed_string_list(&mut content, edges);
        self.exchange(CMD_SET_ROUTE_VARIABLE, content, "route.add")
            .await?;
        Ok(())
    }

    #[instrument(name = "traci_add_vehicle", skip(self), fields(vehicle_id = %vehicle_id))]
    async fn add_vehicle(&mut self, vehicle_id: &ActorId, route_id: &str, type_id: &str) -> Result<()> {
        let mut content = codec::set_variable(ADD_FULL, vehicle_id);
        codec::put_compound_header(&mut content, 14);
        for field in [
            route_id, type_id, "now", "first", "base", "0", "current", "max", "current", "", "",
            "",
        ] {
            codec::put_typed_string(&mut content, field);
        }
        // person capacity, person number
        codec::put_typed_int(&mut content, 0);
        codec::put_typed_int(&mut content, 0);

        self.exchange(CMD_SET_VEHICLE_VARIABLE, content, "vehicle.add")
            .await?;
        Ok(())
    }

    async fn set_vehicle_color(&mut self, vehicle_id: &ActorId, color: Color) -> Result<()> {
        let mut content = codec::set_variable(VAR_COLOR, vehicle_id);
        codec::put_typed_color(&mut content, [color.r, color.g, color.b, color.a]);
        self.exchange(CMD_SET_VEHICLE_VARIABLE, content, "vehicle.setColor")
            .await?;
        Ok(())
    }

    #[instrument(name = "traci_remove_vehicle", skip(self), fields(vehicle_id = %vehicle_id))]
    async fn remove_vehicle(&mut self, vehicle_id: &ActorId) -> Result<()> {
        let mut content = codec::set_variable(REMOVE, vehicle_id);
        codec::put_typed_byte(&mut content, REMOVE_VAPORIZED);
        self.exchange(CMD_SET_VEHICLE_VARIABLE, content, "vehicle.remove")
            .await?;
        self.vehicle_results.remove(vehicle_id);
        Ok(())
    }

    async fn move_to_xy(
        &mut self,
        vehicle_id: &ActorId,
        edge_id: &str,
        lane: i32,
        x: f64,
        y: f64,
        angle: f64,
        keep_route: u8,
    ) -> Result<()> {
        let mut content = codec::set_variable(MOVE_TO_XY, vehicle_id);
        codec::put_compound_header(&mut content, 6);
        codec::put_typed_string(&mut content, edge_id);
        codec::put_typed_int(&mut content, lane);
        codec::put_typed_double(&mut content, x);
        codec::put_typed_double(&mut content, y);
        codec::put_typed_double(&mut content, angle);
        codec::put_typed_byte(&mut content, keep_route as i8);
        self.exchange(CMD_SET_VEHICLE_VARIABLE, content, "vehicle.moveToXY")
            .await?;
        Ok(())
    }

    async fn set_vehicle_signals(
        &mut self,
        vehicle_id: &ActorId,
        signals: VehicleSignals,
    ) -> Result<()> {
        let mut content = codec::set_variable(VAR_SIGNALS, vehicle_id);
        codec::put_typed_int(&mut content, signals.bits() as i32);
        self.exchange(CMD_SET_VEHICLE_VARIABLE, content, "vehicle.setSignals")
            .await?;
        Ok(())
    }

    async fn subscribe_vehicle(
        &mut self,
        vehicle_id: &ActorId,
        attributes: &[VehicleAttribute],
    ) -> Result<()> {
        let variables: Vec<u8> = attributes.iter().map(|a| vehicle_variable(*a)).collect();
        let mut reader = self
            .exchange(
                CMD_SUBSCRIBE_VEHICLE_VARIABLE,
                codec::subscribe(vehicle_id, &variables),
                "vehicle.subscribe",
            )
            .await?;
        self.absorb_subscriptions(&mut reader)
    }

    async fn unsubscribe_vehicle(&mut self, vehicle_id: &ActorId) -> Result<()> {
        self.exchange(
            CMD_SUBSCRIBE_VEHICLE_VARIABLE,
            codec::subscribe(vehicle_id, &[]),
            "vehicle.unsubscribe",
        )
        .await?;
        self.vehicle_results.remove(vehicle_id);
        Ok(())
    }

    fn vehicle_subscription(
        &self,
        vehicle_id: &ActorId,
    ) -> Option<SubscriptionResult<VehicleAttribute>> {
        self.vehicle_results.get(vehicle_id).cloned()
    }

    async fn traffic_light_ids(&mut self) -> Result<Vec<JunctionId>> {
        self.get_ids(CMD_GET_TL_VARIABLE, "trafficlight.getIDList")
            .await
    }

    async fn program_definitions(&mut self, junction: &JunctionId) -> Result<Vec<ProgramDefinition>> {
        let value = self
            .get(
                CMD_GET_TL_VARIABLE,
                TL_COMPLETE_DEFINITION_RYG,
                junction,
                "trafficlight.getAllProgramLogics",
            )
            .await?;
        codec::decode_program_logics(value)
    }

    async fn current_program(&mut self, junction: &JunctionId) -> Result<String> {
        self.get(
            CMD_GET_TL_VARIABLE,
            TL_CURRENT_PROGRAM,
            junction,
            "trafficlight.getProgram",
        )
        .await?
        .into_string()
    }

    async fn current_phase(&mut self, junction: &JunctionId) -> Result<usize> {
        let phase = self
            .get(
                CMD_GET_TL_VARIABLE,
                TL_CURRENT_PHASE,
                junction,
                "trafficlight.getPhase",
            )
            .await?
            .into_int()?;
        usize::try_from(phase)
            .map_err(|_| LaneClientError::protocol(format!("negative phase {phase}")))
    }

    async fn subscribe_traffic_light(
        &mut self,
        junction: &JunctionId,
        attributes: &[TrafficLightAttribute],
    ) -> Result<()> {
        let variables: Vec<u8> = attributes
            .iter()
            .map(|a| traffic_light_variable(*a))
            .collect();
        let mut reader = self
            .exchange(
                CMD_SUBSCRIBE_TL_VARIABLE,
                codec::subscribe(junction, &variables),
                "trafficlight.subscribe",
            )
            .await?;
        self.absorb_subscriptions(&mut reader)
    }

    fn traffic_light_subscription(
        &self,
        junction: &JunctionId,
    ) -> Option<SubscriptionResult<TrafficLightAttribute>> {
        self.tl_results.get(junction).cloned()
    }

    async fn red_yellow_green_state(&mut self, junction: &JunctionId) -> Result<String> {
        self.get(
            CMD_GET_TL_VARIABLE,
            TL_RED_YELLOW_GREEN_STATE,
            junction,
            "trafficlight.getRedYellowGreenState",
        )
        .await?
        .into_string()
    }

    /// Read the full state string, replace one character, write it back.
    async fn set_link_state(
        &mut self,
        junction: &JunctionId,
        link_index: usize,
        state: SignalState,
    ) -> Result<()> {
        let current = self.red_yellow_green_state(junction).await?;
        let mut links: Vec<char> = current.chars().collect();
        let Some(slot) = links.get_mut(link_index) else {
            return Err(LaneClientError::rejected(
                "trafficlight.setLinkState",
                format!(
                    "link index {link_index} out of range for '{junction}' ({} links)",
                    links.len()
                ),
            ));
        };
        *slot = state.as_char();
        let updated: String = links.into_iter().collect();

        let mut content = codec::set_variable(TL_RED_YELLOW_GREEN_STATE, junction);
        codec::put_typed_string(&mut content, &updated);
        self.exchange(CMD_SET_TL_VARIABLE, content, "trafficlight.setLinkState")
            .await?;
        Ok(())
    }

    #[instrument(name = "traci_close", skip(self))]
    async fn close(&mut self) -> Result<()> {
        let result = self.exchange(CMD_CLOSE, BytesMut::new(), "close").await;
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
        self.vehicle_results.clear();
        self.tl_results.clear();
        result.map(|_| ())
    }
}
