//! Lane signal states to world light states
//!
//! Lossy: a landmark shows one coarse state for several directions of
//! travel.

use contracts::{LandmarkId, LightState, SignalState};

use crate::error::{BridgeError, Result};

/// Translate one signal character to a coarse light state.
pub fn to_light_state(state: SignalState) -> LightState {
    match state {
        SignalState::Red | SignalState::RedYellow => LightState::Red,
        SignalState::Yellow => LightState::Yellow,
        SignalState::Green | SignalState::GreenWithoutPriority => LightState::Green,
        SignalState::Off => LightState::Off,
        SignalState::GreenRightTurn | SignalState::OffBlinking | SignalState::Unknown(_) => {
            LightState::Unknown
        }
    }
}

/// Merge the states of a landmark's directions, ordered by link index.
///
/// - 3 directions: the middle (straight) one decides
/// - 2 directions: red if either is `r`, otherwise the first one decides
///
/// # Errors
///
/// `UnsupportedDirectionCount` for any other count.
pub fn merge_directions(landmark: &LandmarkId, directions: &[SignalState]) -> Result<LightState> {
    match directions {
        [_, straight, _] => Ok(to_light_state(*straight)),
        [first, second] => {
            if *first == SignalState::Red || *second == SignalState::Red {
                Ok(LightState::Red)
            } else {
                Ok(to_light_state(*first))
            }
        }
        other => Err(BridgeError::unsupported_directions(
            landmark.as_str(),
            other.len(),
        )),
    }
}
