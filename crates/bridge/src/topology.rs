//! Signal topology index
//!
//! Maps the fine-grained signal links of one junction program onto the
//! coarse landmarks of the world engine, in both directions. Built once from
//! the program parameters; never mutated afterwards.

use std::collections::{BTreeMap, BTreeSet};

use contracts::{JunctionId, LandmarkId, ProgramDefinition, SignalLink, SignalState};

use crate::error::{BridgeError, Result};

/// Key prefix of the link parameters: `"linkSignalID:<index>"`.
pub const LINK_PARAMETER_PREFIX: &str = "linkSignalID";

/// One parsed light program of a junction
#[derive(Debug, Clone, PartialEq)]
pub struct ProgramLogic {
    junction: JunctionId,
    program_id: String,
    phases: Vec<Vec<SignalState>>,
    landmark_to_links: BTreeMap<LandmarkId, BTreeSet<SignalLink>>,
    link_to_landmark: BTreeMap<SignalLink, LandmarkId>,
}

impl ProgramLogic {
    /// Parse a program definition.
    ///
    /// # Errors
    ///
    /// - a parameter key is not `linkSignalID:<non-negative integer>`
    /// - two keys name the same link index
    /// - a landmark id is empty
    /// - phase strings differ in width, or a link index is outside it
    pub fn parse(junction: JunctionId, definition: &ProgramDefinition) -> Result<Self> {
        let phases: Vec<Vec<SignalState>> = definition
            .phases
            .iter()
            .map(|phase| SignalState::parse_phase(phase))
            .collect();

        let width = phases.first().map_or(0, Vec::len);
        if let Some(bad) = phases.iter().position(|p| p.len() != width) {
            return Err(BridgeError::topology(
                junction.as_str(),
                format!(
                    "program '{}': phase {bad} has {} links, phase 0 has {width}",
                    definition.program_id,
                    phases[bad].len()
                ),
            ));
        }

        let mut landmark_to_links: BTreeMap<LandmarkId, BTreeSet<SignalLink>> = BTreeMap::new();
        let mut link_to_landmark = BTreeMap::new();

        for (key, landmark) in &definition.parameters {
            let link_index = parse_link_key(&junction, key)?;
            if landmark.is_empty() {
                return Err(BridgeError::topology(
                    junction.as_str(),
                    format!("parameter '{key}' names an empty landmark"),
                ));
            }
            if !phases.is_empty() && link_index >= width {
                return Err(BridgeError::topology(
                    junction.as_str(),
                    format!("parameter '{key}': link {link_index} outside {width} signals"),
                ));
            }

            let link = SignalLink::new(junction.clone(), link_index);
            if let Some(existing) = link_to_landmark.get(&link) {
                return Err(BridgeError::topology(
                    junction.as_str(),
                    format!("parameter '{key}': link {link_index} already mapped to '{existing}'"),
                ));
            }
            let landmark = LandmarkId::from(landmark.as_str());
            landmark_to_links
                .entry(landmark.clone())
                .or_default()
                .insert(link.clone());
            link_to_landmark.insert(link, landmark);
        }

        Ok(Self {
            junction,
            program_id: definition.program_id.clone(),
            phases,
            landmark_to_links,
            link_to_landmark,
        })
    }

    pub fn junction(&self) -> &JunctionId {
        &self.junction
    }

    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// Width of every phase string (0 for a program without phases)
    pub fn number_signals(&self) -> usize {
        self.phases.first().map_or(0, Vec::len)
    }

    /// Every link of the program, in index order
    pub fn all_signals(&self) -> impl Iterator<Item = SignalLink> + '_ {
        (0..self.number_signals()).map(|i| SignalLink::new(self.junction.clone(), i))
    }

    pub fn all_landmarks(&self) -> impl Iterator<Item = &LandmarkId> {
        self.landmark_to_links.keys()
    }

    /// Links under a landmark, sorted by link index. Unknown landmarks yield
    /// nothing.
    pub fn links_for(&self, landmark: &LandmarkId) -> impl Iterator<Item = &SignalLink> {
        self.landmark_to_links.get(landmark).into_iter().flatten()
    }

    pub fn landmark_for(&self, link: &SignalLink) -> Option<&LandmarkId> {
        self.link_to_landmark.get(link)
    }

    /// Programmed state of one link in one phase
    pub fn phase_state(&self, phase: usize, link_index: usize) -> Option<SignalState> {
        self.phases.get(phase)?.get(link_index).copied()
    }
}

fn parse_link_key(junction: &JunctionId, key: &str) -> Result<usize> {
    let malformed = |reason: &str| {
        BridgeError::topology(
            junction.as_str(),
            format!("parameter key '{key}': {reason}"),
        )
    };

    let (prefix, index) = key
        .split_once(':')
        .ok_or_else(|| malformed("expected 'linkSignalID:<index>'"))?;
    if prefix != LINK_PARAMETER_PREFIX {
        return Err(malformed("unknown prefix"));
    }
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return Err(malformed("link index is not a non-negative integer"));
    }
    index
        .parse::<usize>()
        .map_err(|_| malformed("link index out of range"))
}
