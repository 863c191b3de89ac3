//! Signal vocabulary of both engines.
//!
//! - [`SignalState`]: one character of a lane-engine phase string
//! - [`LightState`]: the coarse state a world-engine light asset can show
//! - [`SignalLink`]: one controllable link inside a junction program
//! - [`VehicleSignals`]: lane-engine vehicle signal bitmask

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::JunctionId;

/// One link's state character in a lane-engine phase string.
///
/// Unrecognised characters are kept in [`SignalState::Unknown`] rather than
/// rejected, so a phase string always decodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalState {
    /// `r`
    Red,
    /// `y`
    Yellow,
    /// `G`
    Green,
    /// `g`
    GreenWithoutPriority,
    /// `s`
    GreenRightTurn,
    /// `u`
    RedYellow,
    /// `o`
    OffBlinking,
    /// `O`
    Off,
    Unknown(char),
}

impl SignalState {
    pub fn from_char(c: char) -> Self {
        match c {
            'r' => Self::Red,
            'y' => Self::Yellow,
            'G' => Self::Green,
            'g' => Self::GreenWithoutPriority,
            's' => Self::GreenRightTurn,
            'u' => Self::RedYellow,
            'o' => Self::OffBlinking,
            'O' => Self::Off,
            other => Self::Unknown(other),
        }
    }

    pub fn as_char(self) -> char {
        match self {
            Self::Red => 'r',
            Self::Yellow => 'y',
            Self::Green => 'G',
            Self::GreenWithoutPriority => 'g',
            Self::GreenRightTurn => 's',
            Self::RedYellow => 'u',
            Self::OffBlinking => 'o',
            Self::Off => 'O',
            Self::Unknown(c) => c,
        }
    }

    /// Decode a whole phase string, one state per link.
    pub fn parse_phase(phase: &str) -> Vec<SignalState> {
        phase.chars().map(Self::from_char).collect()
    }
}

impl From<char> for SignalState {
    fn from(c: char) -> Self {
        Self::from_char(c)
    }
}

impl fmt::Display for SignalState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl Serialize for SignalState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.as_char())
    }
}

impl<'de> Deserialize<'de> for SignalState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        char::deserialize(deserializer).map(Self::from_char)
    }
}

/// Coarse world-engine light state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightState {
    Red,
    Yellow,
    Green,
    Off,
    Unknown,
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
            Self::Off => "off",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One controllable signal inside a junction program.
///
/// Ordering is by junction, then link index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignalLink {
    pub junction: JunctionId,
    pub link_index: usize,
}

impl SignalLink {
    pub fn new(junction: impl Into<JunctionId>, link_index: usize) -> Self {
        Self {
            junction: junction.into(),
            link_index,
        }
    }
}

impl fmt::Display for SignalLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.junction, self.link_index)
    }
}

/// Lane-engine vehicle signal bitmask.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleSignals(pub u32);

impl VehicleSignals {
    pub const NONE: Self = Self(0);
    pub const BLINKER_RIGHT: Self = Self(1 << 0);
    pub const BLINKER_LEFT: Self = Self(1 << 1);
    pub const BLINKER_EMERGENCY: Self = Self(1 << 2);
    pub const BRAKE_LIGHT: Self = Self(1 << 3);
    pub const FRONT_LIGHT: Self = Self(1 << 4);
    pub const FOG_LIGHT: Self = Self(1 << 5);
    pub const HIGH_BEAM: Self = Self(1 << 6);
    pub const BACK_DRIVE: Self = Self(1 << 7);
    pub const WIPER: Self = Self(1 << 8);
    pub const DOOR_OPEN_LEFT: Self = Self(1 << 9);
    pub const DOOR_OPEN_RIGHT: Self = Self(1 << 10);
    pub const EMERGENCY_BLUE: Self = Self(1 << 11);
    pub const EMERGENCY_RED: Self = Self(1 << 12);
    pub const EMERGENCY_YELLOW: Self = Self(1 << 13);

    #[inline]
    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl std::ops::BitOr for VehicleSignals {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_roundtrip_for_known_states() {
        for c in ['r', 'y', 'G', 'g', 's', 'u', 'o', 'O'] {
            let state = SignalState::from_char(c);
            assert!(!matches!(state, SignalState::Unknown(_)));
            assert_eq!(state.as_char(), c);
        }
    }

    #[test]
    fn test_unmatched_char_is_unknown() {
        assert_eq!(SignalState::from_char('x'), SignalState::Unknown('x'));
        assert_eq!(SignalState::Unknown('x').as_char(), 'x');
    }

    #[test]
    fn test_parse_phase() {
        let states = SignalState::parse_phase("GgrO");
        assert_eq!(
            states,
            vec![
                SignalState::Green,
                SignalState::GreenWithoutPriority,
                SignalState::Red,
                SignalState::Off
            ]
        );
    }

    #[test]
    fn test_link_ordering() {
        let mut links = vec![
            SignalLink::new("918", 5),
            SignalLink::new("918", 0),
            SignalLink::new("12", 9),
        ];
        links.sort();
        assert_eq!(links[0], SignalLink::new("12", 9));
        assert_eq!(links[1].link_index, 0);
        assert_eq!(links[2].to_string(), "918#5");
    }

    #[test]
    fn test_vehicle_signals() {
        let mut signals = VehicleSignals::BLINKER_LEFT | VehicleSignals::BRAKE_LIGHT;
        assert_eq!(signals.bits(), 0b1010);
        assert!(signals.contains(VehicleSignals::BRAKE_LIGHT));
        signals.remove(VehicleSignals::BRAKE_LIGHT);
        assert!(!signals.contains(VehicleSignals::BRAKE_LIGHT));
        signals.insert(VehicleSignals::EMERGENCY_YELLOW);
        assert_eq!(signals.bits(), (1 << 1) | (1 << 13));
    }

    #[test]
    fn test_signal_state_serde_as_char() {
        let json = serde_json::to_string(&SignalState::GreenWithoutPriority).unwrap();
        assert_eq!(json, "\"g\"");
        let back: SignalState = serde_json::from_str("\"u\"").unwrap();
        assert_eq!(back, SignalState::RedYellow);
    }
}
