//! Loosely typed subscription results
//!
//! The lane engine answers subscriptions with a bag of `attribute -> value`
//! pairs. Bags stay at the client boundary; the bridge only sees the
//! fixed-shape records built from them ([`crate::LaneActor`],
//! [`crate::JunctionSnapshot`]).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;

use crate::ContractError;

/// A single typed value as returned by the lane engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum EngineValue {
    Ubyte(u8),
    Byte(i8),
    Int(i32),
    Double(f64),
    String(String),
    StringList(Vec<String>),
    Color([u8; 4]),
    Position2D([f64; 2]),
    Position3D([f64; 3]),
}

impl EngineValue {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ubyte(_) => "ubyte",
            Self::Byte(_) => "byte",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::StringList(_) => "string_list",
            Self::Color(_) => "color",
            Self::Position2D(_) => "position_2d",
            Self::Position3D(_) => "position_3d",
        }
    }
}

/// Vehicle attributes the bridge subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleAttribute {
    TypeId,
    VehicleClass,
    Color,
    Length,
    Width,
    Height,
    Position,
    Angle,
    Slope,
    Speed,
    LateralSpeed,
    Signals,
}

impl VehicleAttribute {
    /// Everything needed to build a [`crate::LaneActor`].
    pub const ALL: [VehicleAttribute; 12] = [
        Self::TypeId,
        Self::VehicleClass,
        Self::Color,
        Self::Length,
        Self::Width,
        Self::Height,
        Self::Position,
        Self::Angle,
        Self::Slope,
        Self::Speed,
        Self::LateralSpeed,
        Self::Signals,
    ];
}

/// Traffic light attributes the bridge subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficLightAttribute {
    CurrentProgram,
    CurrentPhase,
}

impl TrafficLightAttribute {
    pub const ALL: [TrafficLightAttribute; 2] = [Self::CurrentProgram, Self::CurrentPhase];
}

/// Attribute bag for one subscribed object.
pub type SubscriptionResult<K> = HashMap<K, EngineValue>;

// Typed accessors with presence checks, used by the boundary conversions.

pub(crate) fn require<K>(bag: &SubscriptionResult<K>, key: K) -> Result<&EngineValue, ContractError>
where
    K: Hash + Eq + Debug,
{
    bag.get(&key)
        .ok_or_else(|| ContractError::malformed_result(format!("{key:?}"), "missing"))
}

pub(crate) fn require_f64<K>(bag: &SubscriptionResult<K>, key: K) -> Result<f64, ContractError>
where
    K: Hash + Eq + Debug + Copy,
{
    match require(bag, key)? {
        EngineValue::Double(v) => Ok(*v),
        EngineValue::Int(v) => Ok(f64::from(*v)),
        other => Err(wrong_type(key, "double", other)),
    }
}

pub(crate) fn require_i32<K>(bag: &SubscriptionResult<K>, key: K) -> Result<i32, ContractError>
where
    K: Hash + Eq + Debug + Copy,
{
    match require(bag, key)? {
        EngineValue::Int(v) => Ok(*v),
        EngineValue::Ubyte(v) => Ok(i32::from(*v)),
        EngineValue::Byte(v) => Ok(i32::from(*v)),
        other => Err(wrong_type(key, "int", other)),
    }
}

pub(crate) fn require_str<K>(bag: &SubscriptionResult<K>, key: K) -> Result<&str, ContractError>
where
    K: Hash + Eq + Debug + Copy,
{
    match require(bag, key)? {
        EngineValue::String(v) => Ok(v),
        other => Err(wrong_type(key, "string", other)),
    }
}

fn wrong_type<K: Debug>(key: K, expected: &str, got: &EngineValue) -> ContractError {
    ContractError::malformed_result(
        format!("{key:?}"),
        format!("expected {expected}, got {}", got.kind()),
    )
}
