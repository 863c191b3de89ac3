//! World engine light interface
//!
//! The bridge never owns world-engine actors. The scenario driver hands it a
//! resolver that maps a landmark to the light asset it controls.

use crate::{LandmarkId, LightState};

/// Resolves landmarks to world-engine lights and sets their state.
pub trait WorldLights {
    /// Set the coarse state of the light behind `landmark`.
    ///
    /// Returns `false` when the landmark does not resolve to a light.
    fn set_light_state(&mut self, landmark: &LandmarkId, state: LightState) -> bool;
}
