//! In-memory world lights
//!
//! Stands in for the world engine when the bridge runs headless: records the
//! last state applied to each landmark.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{LandmarkId, LightState, WorldLights};

#[derive(Debug, Clone, Default)]
pub struct LightBoard {
    lights: BTreeMap<LandmarkId, LightState>,
    /// Landmarks that resolve; `None` accepts any
    known: Option<BTreeSet<LandmarkId>>,
}

impl LightBoard {
    /// Board that resolves every landmark
    pub fn new() -> Self {
        Self::default()
    }

    /// Board that resolves only the given landmarks
    pub fn with_landmarks(landmarks: impl IntoIterator<Item = LandmarkId>) -> Self {
        Self {
            lights: BTreeMap::new(),
            known: Some(landmarks.into_iter().collect()),
        }
    }

    pub fn state(&self, landmark: &LandmarkId) -> Option<LightState> {
        self.lights.get(landmark).copied()
    }

    pub fn states(&self) -> &BTreeMap<LandmarkId, LightState> {
        &self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }
}

impl WorldLights for LightBoard {
    fn set_light_state(&mut self, landmark: &LandmarkId, state: LightState) -> bool {
        if let Some(known) = &self.known {
            if !known.contains(landmark) {
                return false;
            }
        }
        self.lights.insert(landmark.clone(), state);
        true
    }
}
