//! TraCI protocol constants

use contracts::{TrafficLightAttribute, VehicleAttribute};

// ===== Commands =====
pub const CMD_GETVERSION: u8 = 0x00;
pub const CMD_SIMSTEP: u8 = 0x02;
pub const CMD_SETORDER: u8 = 0x03;
pub const CMD_CLOSE: u8 = 0x7f;

pub const CMD_GET_TL_VARIABLE: u8 = 0xa2;
pub const CMD_SET_TL_VARIABLE: u8 = 0xc2;
pub const CMD_SUBSCRIBE_TL_VARIABLE: u8 = 0xd2;
pub const RESPONSE_SUBSCRIBE_TL_VARIABLE: u8 = 0xe2;

pub const CMD_GET_VEHICLE_VARIABLE: u8 = 0xa4;
pub const CMD_SET_VEHICLE_VARIABLE: u8 = 0xc4;
pub const CMD_SUBSCRIBE_VEHICLE_VARIABLE: u8 = 0xd4;
pub const RESPONSE_SUBSCRIBE_VEHICLE_VARIABLE: u8 = 0xe4;

pub const CMD_SET_ROUTE_VARIABLE: u8 = 0xc6;
pub const CMD_GET_EDGE_VARIABLE: u8 = 0xaa;
pub const CMD_GET_SIM_VARIABLE: u8 = 0xab;

/// Get responses carry the command id plus this offset.
pub const RESPONSE_GET_OFFSET: u8 = 0x10;

// ===== Status =====
pub const RTYPE_OK: u8 = 0x00;
pub const RTYPE_NOTIMPLEMENTED: u8 = 0x01;
pub const RTYPE_ERR: u8 = 0xff;

// ===== Data types =====
pub const POSITION_LON_LAT: u8 = 0x00;
pub const POSITION_2D: u8 = 0x01;
pub const POSITION_LON_LAT_ALT: u8 = 0x02;
pub const POSITION_3D: u8 = 0x03;
pub const POSITION_ROADMAP: u8 = 0x04;
pub const TYPE_POLYGON: u8 = 0x06;
pub const TYPE_UBYTE: u8 = 0x07;
pub const TYPE_BYTE: u8 = 0x08;
pub const TYPE_INTEGER: u8 = 0x09;
pub const TYPE_DOUBLE: u8 = 0x0b;
pub const TYPE_STRING: u8 = 0x0c;
pub const TYPE_STRINGLIST: u8 = 0x0e;
pub const TYPE_COMPOUND: u8 = 0x0f;
pub const TYPE_DOUBLELIST: u8 = 0x10;
pub const TYPE_COLOR: u8 = 0x11;

// ===== Variables =====
pub const ID_LIST: u8 = 0x00;

pub const TL_RED_YELLOW_GREEN_STATE: u8 = 0x20;
pub const TL_CURRENT_PHASE: u8 = 0x28;
pub const TL_CURRENT_PROGRAM: u8 = 0x29;
pub const TL_COMPLETE_DEFINITION_RYG: u8 = 0x2b;

pub const VAR_TIME: u8 = 0x66;
pub const VAR_DEPARTED_VEHICLES_IDS: u8 = 0x74;
pub const VAR_ARRIVED_VEHICLES_IDS: u8 = 0x7a;

pub const VAR_SPEED_LAT: u8 = 0x32;
pub const VAR_SLOPE: u8 = 0x36;
pub const VAR_POSITION3D: u8 = 0x39;
pub const VAR_SPEED: u8 = 0x40;
pub const VAR_ANGLE: u8 = 0x43;
pub const VAR_LENGTH: u8 = 0x44;
pub const VAR_COLOR: u8 = 0x45;
pub const VAR_VEHICLECLASS: u8 = 0x49;
pub const VAR_WIDTH: u8 = 0x4d;
pub const VAR_TYPE: u8 = 0x4f;
pub const VAR_SIGNALS: u8 = 0x5b;
pub const VAR_HEIGHT: u8 = 0xbc;

pub const ADD: u8 = 0x80;
pub const REMOVE: u8 = 0x81;
pub const ADD_FULL: u8 = 0x85;
pub const MOVE_TO_XY: u8 = 0xb4;

/// `vehicle.remove` reason: vaporized
pub const REMOVE_VAPORIZED: i8 = 2;

/// Subscription window covering the whole simulation.
pub const SUBSCRIBE_BEGIN: f64 = -1_073_741_824.0;
pub const SUBSCRIBE_END: f64 = 1_073_741_824.0;

pub fn vehicle_variable(attribute: VehicleAttribute) -> u8 {
    match attribute {
        VehicleAttribute::TypeId => VAR_TYPE,
        VehicleAttribute::VehicleClass => VAR_VEHICLECLASS,
        VehicleAttribute::Color => VAR_COLOR,
        VehicleAttribute::Length => VAR_LENGTH,
        VehicleAttribute::Width => VAR_WIDTH,
        VehicleAttribute::Height => VAR_HEIGHT,
        VehicleAttribute::Position => VAR_POSITION3D,
        VehicleAttribute::Angle => VAR_ANGLE,
        VehicleAttribute::Slope => VAR_SLOPE,
        VehicleAttribute::Speed => VAR_SPEED,
        VehicleAttribute::LateralSpeed => VAR_SPEED_LAT,
        VehicleAttribute::Signals => VAR_SIGNALS,
    }
}

pub fn vehicle_attribute(variable: u8) -> Option<VehicleAttribute> {
    VehicleAttribute::ALL
        .into_iter()
        .find(|a| vehicle_variable(*a) == variable)
}

pub fn traffic_light_variable(attribute: TrafficLightAttribute) -> u8 {
    match attribute {
        TrafficLightAttribute::CurrentProgram => TL_CURRENT_PROGRAM,
        TrafficLightAttribute::CurrentPhase => TL_CURRENT_PHASE,
    }
}

pub fn traffic_light_attribute(variable: u8) -> Option<TrafficLightAttribute> {
    TrafficLightAttribute::ALL
        .into_iter()
        .find(|a| traffic_light_variable(*a) == variable)
}
