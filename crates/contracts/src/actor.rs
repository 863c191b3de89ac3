//! Lane-engine actor snapshot
//!
//! [`LaneActor`] is the fixed-shape record built from a vehicle subscription
//! result. Building it checks that every attribute is present and typed as
//! expected; a malformed bag is rejected here instead of failing deep inside
//! the bridge.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::subscription::{require, require_f64, require_i32, require_str};
use crate::{ContractError, EngineValue, SubscriptionResult, VehicleAttribute, VehicleSignals};

/// 3D transform: location + rotation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// metres
    pub location: Location,

    /// degrees
    pub rotation: Rotation,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub pitch: f64,
    pub yaw: f64,
    pub roll: f64,
}

/// Half-size bounding box, metres.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.r, self.g, self.b, self.a)
    }
}

/// Parses the world engine's `"r,g,b"` / `"r,g,b,a"` attribute format.
impl FromStr for Color {
    type Err = ContractError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts = s
            .split(',')
            .map(|p| p.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ContractError::config_parse(format!("invalid color '{s}': {e}")))?;

        match parts.as_slice() {
            [r, g, b] => Ok(Self::rgb(*r, *g, *b)),
            [r, g, b, a] => Ok(Self {
                r: *r,
                g: *g,
                b: *b,
                a: *a,
            }),
            _ => Err(ContractError::config_parse(format!(
                "invalid color '{s}': expected 3 or 4 components"
            ))),
        }
    }
}

/// Abstract vehicle classes known to the lane engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorClass {
    Ignoring,
    Private,
    Emergency,
    Authority,
    Army,
    Vip,
    Pedestrian,
    Passenger,
    Hov,
    Taxi,
    Bus,
    Coach,
    Delivery,
    Truck,
    Trailer,
    Motorcycle,
    Moped,
    Bicycle,
    Evehicle,
    Tram,
    RailUrban,
    Rail,
    RailElectric,
    Ship,
    Custom1,
    Custom2,
    Unknown,
}

impl ActorClass {
    /// Map the lane engine's class string; unrecognised names become `Unknown`.
    pub fn from_engine_str(s: &str) -> Self {
        match s {
            "ignoring" => Self::Ignoring,
            "private" => Self::Private,
            "emergency" => Self::Emergency,
            "authority" => Self::Authority,
            "army" => Self::Army,
            "vip" => Self::Vip,
            "pedestrian" => Self::Pedestrian,
            "passenger" => Self::Passenger,
            "hov" => Self::Hov,
            "taxi" => Self::Taxi,
            "bus" => Self::Bus,
            "coach" => Self::Coach,
            "delivery" => Self::Delivery,
            "truck" => Self::Truck,
            "trailer" => Self::Trailer,
            "motorcycle" => Self::Motorcycle,
            "moped" => Self::Moped,
            "bicycle" => Self::Bicycle,
            "evehicle" => Self::Evehicle,
            "tram" => Self::Tram,
            "rail_urban" => Self::RailUrban,
            "rail" => Self::Rail,
            "rail_electric" => Self::RailElectric,
            "ship" => Self::Ship,
            "custom1" => Self::Custom1,
            "custom2" => Self::Custom2,
            _ => Self::Unknown,
        }
    }
}

/// Snapshot of one lane-engine vehicle at the current step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneActor {
    pub type_id: String,
    pub class: ActorClass,
    pub color: Color,
    pub extent: Extent,
    /// Lane-engine frame: yaw is the heading angle, pitch the slope.
    pub transform: Transform,
    /// m/s
    pub speed: f64,
    /// m/s
    pub lateral_speed: f64,
    pub signals: VehicleSignals,
}

impl TryFrom<&SubscriptionResult<VehicleAttribute>> for LaneActor {
    type Error = ContractError;

    fn try_from(bag: &SubscriptionResult<VehicleAttribute>) -> Result<Self, Self::Error> {
        let color = match require(bag, VehicleAttribute::Color)? {
            EngineValue::Color([r, g, b, a]) => Color {
                r: *r,
                g: *g,
                b: *b,
                a: *a,
            },
            other => {
                return Err(ContractError::malformed_result(
                    "Color",
                    format!("expected color, got {}", other.kind()),
                ))
            }
        };

        let [x, y, z] = match require(bag, VehicleAttribute::Position)? {
            EngineValue::Position3D(p) => *p,
            EngineValue::Position2D([x, y]) => [*x, *y, 0.0],
            other => {
                return Err(ContractError::malformed_result(
                    "Position",
                    format!("expected position, got {}", other.kind()),
                ))
            }
        };

        let signals = require_i32(bag, VehicleAttribute::Signals)?;
        let signals = u32::try_from(signals).map_err(|_| {
            ContractError::malformed_result("Signals", format!("negative bitmask {signals}"))
        })?;

        Ok(Self {
            type_id: require_str(bag, VehicleAttribute::TypeId)?.to_string(),
            class: ActorClass::from_engine_str(require_str(bag, VehicleAttribute::VehicleClass)?),
            color,
            extent: Extent {
                x: require_f64(bag, VehicleAttribute::Length)? / 2.0,
                y: require_f64(bag, VehicleAttribute::Width)? / 2.0,
                z: require_f64(bag, VehicleAttribute::Height)? / 2.0,
            },
            transform: Transform {
                location: Location { x, y, z },
                rotation: Rotation {
                    pitch: require_f64(bag, VehicleAttribute::Slope)?,
                    yaw: require_f64(bag, VehicleAttribute::Angle)?,
                    roll: 0.0,
                },
            },
            speed: require_f64(bag, VehicleAttribute::Speed)?,
            lateral_speed: require_f64(bag, VehicleAttribute::LateralSpeed)?,
            signals: VehicleSignals(signals),
        })
    }
}
