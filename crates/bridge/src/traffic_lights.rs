//! Traffic light manager
//!
//! Owns the parsed programs of every signalised junction and tracks which
//! program and phase each one is in. Phases only change through the lane
//! engine's per-step subscription results.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use contracts::{
    JunctionId, JunctionSnapshot, LandmarkId, LightState, ProgramDefinition, SignalLink,
    SignalState, TrafficLightAttribute, WorldLights,
};
use lane_client::LaneEngine;
use metrics::counter;
use tracing::{debug, info, instrument, warn};

use crate::error::{BridgeError, Result};
use crate::topology::ProgramLogic;
use crate::translate::merge_directions;

/// Outcome of translating one landmark
#[derive(Debug)]
pub struct LandmarkTranslation {
    pub junction: JunctionId,
    pub program_id: String,
    pub landmark: LandmarkId,
    pub outcome: Result<LightState>,
}

/// Traffic light manager
#[derive(Debug)]
pub struct TrafficLightManager {
    /// junction -> program id -> logic
    programs: BTreeMap<JunctionId, BTreeMap<String, ProgramLogic>>,
    runtime: BTreeMap<JunctionId, JunctionSnapshot>,
    /// Program id the engine reports while a client drives the links
    external_program_id: String,
    off: bool,
}

impl TrafficLightManager {
    /// Empty manager
    pub fn new(external_program_id: impl Into<String>) -> Self {
        Self {
            programs: BTreeMap::new(),
            runtime: BTreeMap::new(),
            external_program_id: external_program_id.into(),
            off: false,
        }
    }

    /// Enumerate every junction and program the lane engine reports,
    /// subscribe to their program/phase and read the current status.
    ///
    /// # Errors
    ///
    /// Any topology error is fatal: the manager is not built.
    #[instrument(name = "traffic_lights_build", skip(engine, external_program_id))]
    pub async fn build<E: LaneEngine>(
        engine: &mut E,
        external_program_id: impl Into<String>,
    ) -> Result<Self> {
        let mut manager = Self::new(external_program_id);

        for junction in engine.traffic_light_ids().await? {
            engine
                .subscribe_traffic_light(&junction, &TrafficLightAttribute::ALL)
                .await?;
            let definitions = engine.program_definitions(&junction).await?;
            let current = JunctionSnapshot {
                program_id: engine.current_program(&junction).await?,
                phase: engine.current_phase(&junction).await?,
            };
            manager.insert_junction(junction, &definitions, current)?;
        }

        info!(
            junctions = manager.programs.len(),
            landmarks = manager.all_landmarks().len(),
            "traffic light manager ready"
        );
        Ok(manager)
    }

    /// Register one junction with its programs and current status.
    pub fn insert_junction(
        &mut self,
        junction: JunctionId,
        definitions: &[ProgramDefinition],
        current: JunctionSnapshot,
    ) -> Result<()> {
        let mut programs = BTreeMap::new();
        for definition in definitions {
            let logic = ProgramLogic::parse(junction.clone(), definition)?;
            programs.insert(definition.program_id.clone(), logic);
        }
        debug!(junction = %junction, programs = programs.len(), "junction registered");

        self.runtime.insert(junction.clone(), current);
        self.programs.insert(junction, programs);
        Ok(())
    }

    pub fn junction_count(&self) -> usize {
        self.programs.len()
    }

    pub fn is_off(&self) -> bool {
        self.off
    }

    /// Current program and phase of a junction
    pub fn runtime_state(&self, junction: &JunctionId) -> Option<&JunctionSnapshot> {
        self.runtime.get(junction)
    }

    /// All programs of a junction, by program id
    pub fn programs(&self, junction: &JunctionId) -> Option<&BTreeMap<String, ProgramLogic>> {
        self.programs.get(junction)
    }

    /// Logic of the program a junction is currently running
    fn active_logics(&self) -> impl Iterator<Item = (&JunctionSnapshot, &ProgramLogic)> {
        self.runtime.iter().filter_map(|(junction, current)| {
            let logic = self.programs.get(junction)?.get(&current.program_id)?;
            Some((current, logic))
        })
    }

    /// Every link of every junction's active program
    pub fn all_signals(&self) -> BTreeSet<SignalLink> {
        self.active_logics()
            .flat_map(|(_, logic)| logic.all_signals())
            .collect()
    }

    /// Every landmark of every junction's active program
    pub fn all_landmarks(&self) -> BTreeSet<LandmarkId> {
        self.active_logics()
            .flat_map(|(_, logic)| logic.all_landmarks().cloned())
            .collect()
    }

    /// Links under a landmark across all active programs
    pub fn associated_signals(&self, landmark: &LandmarkId) -> BTreeSet<SignalLink> {
        self.active_logics()
            .flat_map(|(_, logic)| logic.links_for(landmark).cloned())
            .collect()
    }

    /// Programmed state of a landmark at the current phase.
    ///
    /// Links that disagree resolve to red with a warning. `None` when no link
    /// resolves. Once switched off every known landmark reads `Off`.
    pub fn landmark_state(&self, landmark: &LandmarkId) -> Option<SignalState> {
        let mut states = HashSet::new();
        for (current, logic) in self.active_logics() {
            for link in logic.links_for(landmark) {
                if self.off {
                    states.insert(SignalState::Off);
                } else if let Some(state) = logic.phase_state(current.phase, link.link_index) {
                    states.insert(state);
                }
            }
        }

        match states.len() {
            0 => None,
            1 => states.into_iter().next(),
            n => {
                warn!(
                    landmark = %landmark,
                    distinct_states = n,
                    "landmark links disagree, reporting red"
                );
                counter!("cosim_landmark_ambiguity_total").increment(1);
                Some(SignalState::Red)
            }
        }
    }

    /// Push `state` to every link under the landmark.
    pub async fn set_landmark_state<E: LaneEngine>(
        &self,
        engine: &mut E,
        landmark: &LandmarkId,
        state: SignalState,
    ) -> Result<()> {
        for link in self.associated_signals(landmark) {
            engine
                .set_link_state(&link.junction, link.link_index, state)
                .await?;
        }
        Ok(())
    }

    /// Force every link off. Sticky: later ticks no longer track the engine.
    /// A second call does nothing.
    #[instrument(name = "traffic_lights_switch_off", skip(self, engine))]
    pub async fn switch_off<E: LaneEngine>(&mut self, engine: &mut E) -> Result<()> {
        if self.off {
            debug!("traffic lights already off");
            return Ok(());
        }
        let signals = self.all_signals();
        for link in &signals {
            engine
                .set_link_state(&link.junction, link.link_index, SignalState::Off)
                .await?;
        }
        self.off = true;
        info!(signals = signals.len(), "traffic lights switched off");
        Ok(())
    }

    /// Pull each junction's subscribed program and phase.
    ///
    /// Junctions reporting the external program id keep their last state.
    /// Does nothing once switched off.
    pub fn tick<E: LaneEngine>(&mut self, engine: &E) -> Result<()> {
        if self.off {
            return Ok(());
        }
        for (junction, current) in self.runtime.iter_mut() {
            let Some(bag) = engine.traffic_light_subscription(junction) else {
                debug!(junction = %junction, "no subscription result this step");
                continue;
            };
            let snapshot = JunctionSnapshot::try_from(&bag)?;
            if snapshot.program_id != self.external_program_id {
                *current = snapshot;
            }
        }
        Ok(())
    }

    /// Translate the live lane state of every landmark to a world light and
    /// apply it.
    ///
    /// Reads each junction's live state string, then for every program and
    /// landmark merges its directions in link index order. A failing landmark
    /// does not stop the others; its error is in the returned outcome.
    ///
    /// # Errors
    ///
    /// Only lane engine failures abort the whole pass.
    #[instrument(name = "traffic_lights_translate", skip_all)]
    pub async fn translate_and_apply<E: LaneEngine, W: WorldLights>(
        &self,
        engine: &mut E,
        world: &mut W,
    ) -> Result<Vec<LandmarkTranslation>> {
        let mut translations = Vec::new();

        for (junction, programs) in &self.programs {
            let live = SignalState::parse_phase(&engine.red_yellow_green_state(junction).await?);

            for (program_id, logic) in programs {
                for landmark in logic.all_landmarks() {
                    let outcome = translate_landmark(logic, landmark, &live).and_then(|state| {
                        if world.set_light_state(landmark, state) {
                            Ok(state)
                        } else {
                            Err(BridgeError::UnresolvedLandmark {
                                landmark: landmark.to_string(),
                            })
                        }
                    });

                    if let Err(e) = &outcome {
                        warn!(
                            junction = %junction,
                            landmark = %landmark,
                            error = %e,
                            "landmark translation failed"
                        );
                        counter!("cosim_translation_failures_total").increment(1);
                    }

                    translations.push(LandmarkTranslation {
                        junction: junction.clone(),
                        program_id: program_id.clone(),
                        landmark: landmark.clone(),
                        outcome,
                    });
                }
            }
        }

        Ok(translations)
    }
}

fn translate_landmark(
    logic: &ProgramLogic,
    landmark: &LandmarkId,
    live: &[SignalState],
) -> Result<LightState> {
    // links_for yields link index order
    let directions = logic
        .links_for(landmark)
        .map(|link| {
            live.get(link.link_index)
                .copied()
                .ok_or_else(|| BridgeError::LinkOutOfRange {
                    landmark: landmark.to_string(),
                    junction: link.junction.to_string(),
                    link_index: link.link_index,
                    width: live.len(),
                })
        })
        .collect::<Result<Vec<_>>>()?;

    merge_directions(landmark, &directions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::light_board::LightBoard;
    use lane_client::{LaneEngine, MockLaneEngine, NEXT_STEP, ONLINE_PROGRAM};

    fn program(id: &str, phases: &[&str], params: &[(&str, &str)]) -> ProgramDefinition {
        ProgramDefinition {
            program_id: id.into(),
            phases: phases.iter().map(|p| p.to_string()).collect(),
            parameters: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Junction 918: landmark 1032 on links 0-1, 1034 on links 3-5
    fn junction_918() -> Vec<ProgramDefinition> {
        vec![program(
            "0",
            &["GGgrrrGGgrrr", "yyyrrryyyrrr", "rrrGGgrrrGGg"],
            &[
                ("linkSignalID:0", "1032"),
                ("linkSignalID:1", "1032"),
                ("linkSignalID:3", "1034"),
                ("linkSignalID:4", "1034"),
                ("linkSignalID:5", "1034"),
            ],
        )]
    }

    async fn engine_with(junction: &str, programs: Vec<ProgramDefinition>) -> MockLaneEngine {
        let mut engine = MockLaneEngine::new();
        engine.add_junction(junction, programs);
        engine.connect("localhost", 8813).await.unwrap();
        engine
    }

    #[tokio::test]
    async fn test_landmark_state_reads_current_phase() {
        let mut engine = engine_with("918", junction_918()).await;
        let manager = TrafficLightManager::build(&mut engine, ONLINE_PROGRAM)
            .await
            .unwrap();

        assert_eq!(
            manager.landmark_state(&"1032".into()),
            Some(SignalState::Green)
        );
        assert_eq!(manager.landmark_state(&"unknown".into()), None);
        assert_eq!(manager.all_signals().len(), 12);
        assert_eq!(
            manager.associated_signals(&"1034".into()).len(),
            3
        );
    }

    #[tokio::test]
    async fn test_disagreeing_links_report_red() {
        // link 2 is 'g', link 3 is 'r'
        let programs = vec![program(
            "0",
            &["GGgrrr"],
            &[("linkSignalID:2", "7"), ("linkSignalID:3", "7")],
        )];
        let mut engine = engine_with("1", programs).await;
        let manager = TrafficLightManager::build(&mut engine, ONLINE_PROGRAM)
            .await
            .unwrap();
        assert_eq!(manager.landmark_state(&"7".into()), Some(SignalState::Red));
    }

    #[tokio::test]
    async fn test_tick_follows_phase_but_not_external_program() {
        let mut engine = engine_with("918", junction_918()).await;
        let mut manager = TrafficLightManager::build(&mut engine, ONLINE_PROGRAM)
            .await
            .unwrap();

        engine.schedule_phase(1, "918", "0", 1);
        engine.simulation_step(NEXT_STEP).await.unwrap();
        manager.tick(&engine).unwrap();
        assert_eq!(
            manager.landmark_state(&"1032".into()),
            Some(SignalState::Yellow)
        );

        // overriding a link moves the engine onto the external program
        engine
            .set_link_state(&"918".into(), 0, SignalState::Red)
            .await
            .unwrap();
        engine.simulation_step(NEXT_STEP).await.unwrap();
        manager.tick(&engine).unwrap();
        assert_eq!(
            manager.runtime_state(&"918".into()).unwrap().phase,
            1
        );
    }

    #[tokio::test]
    async fn test_set_landmark_state_writes_every_link() {
        let mut engine = engine_with("918", junction_918()).await;
        let manager = TrafficLightManager::build(&mut engine, ONLINE_PROGRAM)
            .await
            .unwrap();

        manager
            .set_landmark_state(&mut engine, &"1034".into(), SignalState::Yellow)
            .await
            .unwrap();

        let writes = engine.link_writes();
        let indices: Vec<_> = writes.iter().map(|w| w.link_index).collect();
        assert_eq!(indices, vec![3, 4, 5]);
        assert!(writes.iter().all(|w| w.state == SignalState::Yellow));
    }

    #[tokio::test]
    async fn test_switch_off_twice_is_noop() {
        let mut engine = engine_with("918", junction_918()).await;
        let mut manager = TrafficLightManager::build(&mut engine, ONLINE_PROGRAM)
            .await
            .unwrap();

        manager.switch_off(&mut engine).await.unwrap();
        let writes_after_first = engine.link_writes().len();
        assert_eq!(writes_after_first, 12);

        manager.switch_off(&mut engine).await.unwrap();
        assert_eq!(engine.link_writes().len(), writes_after_first);
        assert!(manager.is_off());

        let mut board = LightBoard::new();
        let translations = manager
            .translate_and_apply(&mut engine, &mut board)
            .await
            .unwrap();
        assert!(translations
            .iter()
            .all(|t| matches!(t.outcome, Ok(LightState::Off))));
        for landmark in manager.all_landmarks() {
            assert_eq!(manager.landmark_state(&landmark), Some(SignalState::Off));
        }
    }

    #[tokio::test]
    async fn test_tick_ignored_after_switch_off() {
        let mut engine = engine_with("918", junction_918()).await;
        let mut manager = TrafficLightManager::build(&mut engine, ONLINE_PROGRAM)
            .await
            .unwrap();
        manager.switch_off(&mut engine).await.unwrap();

        engine.schedule_phase(1, "918", "0", 2);
        engine.simulation_step(NEXT_STEP).await.unwrap();
        manager.tick(&engine).unwrap();
        assert_eq!(manager.runtime_state(&"918".into()).unwrap().phase, 0);
    }

    #[tokio::test]
    async fn test_translate_two_and_three_directions() {
        let mut engine = engine_with("918", junction_918()).await;
        let manager = TrafficLightManager::build(&mut engine, ONLINE_PROGRAM)
            .await
            .unwrap();

        let mut board = LightBoard::new();
        manager
            .translate_and_apply(&mut engine, &mut board)
            .await
            .unwrap();

        // 1032: 'G','G' -> first direction
        assert_eq!(board.state(&"1032".into()), Some(LightState::Green));
        // 1034: 'r','r','r' -> middle
        assert_eq!(board.state(&"1034".into()), Some(LightState::Red));
    }

    #[tokio::test]
    async fn test_two_directions_with_red_is_red() {
        let programs = vec![program(
            "0",
            &["rG"],
            &[("linkSignalID:0", "9"), ("linkSignalID:1", "9")],
        )];
        let mut engine = engine_with("2", programs).await;
        let manager = TrafficLightManager::build(&mut engine, ONLINE_PROGRAM)
            .await
            .unwrap();

        let mut board = LightBoard::new();
        manager
            .translate_and_apply(&mut engine, &mut board)
            .await
            .unwrap();
        assert_eq!(board.state(&"9".into()), Some(LightState::Red));
    }

    #[tokio::test]
    async fn test_four_directions_abort_only_that_landmark() {
        let programs = vec![program(
            "0",
            &["GGGGrrG"],
            &[
                ("linkSignalID:0", "wide"),
                ("linkSignalID:1", "wide"),
                ("linkSignalID:2", "wide"),
                ("linkSignalID:3", "wide"),
                ("linkSignalID:4", "narrow"),
                ("linkSignalID:5", "narrow"),
            ],
        )];
        let mut engine = engine_with("3", programs).await;
        let manager = TrafficLightManager::build(&mut engine, ONLINE_PROGRAM)
            .await
            .unwrap();

        let mut board = LightBoard::new();
        let translations = manager
            .translate_and_apply(&mut engine, &mut board)
            .await
            .unwrap();

        let wide = translations.iter().find(|t| t.landmark == "wide").unwrap();
        assert!(matches!(
            wide.outcome,
            Err(BridgeError::UnsupportedDirectionCount { count: 4, .. })
        ));
        assert_eq!(board.state(&"wide".into()), None);
        assert_eq!(board.state(&"narrow".into()), Some(LightState::Red));
    }

    #[tokio::test]
    async fn test_unresolved_landmark_is_reported() {
        let mut engine = engine_with("918", junction_918()).await;
        let manager = TrafficLightManager::build(&mut engine, ONLINE_PROGRAM)
            .await
            .unwrap();

        let mut board = LightBoard::with_landmarks(["1032".into()]);
        let translations = manager
            .translate_and_apply(&mut engine, &mut board)
            .await
            .unwrap();
        let missing = translations.iter().find(|t| t.landmark == "1034").unwrap();
        assert!(matches!(
            missing.outcome,
            Err(BridgeError::UnresolvedLandmark { .. })
        ));
    }

    #[tokio::test]
    async fn test_malformed_parameters_abort_build() {
        let programs = vec![program("0", &["GG"], &[("linkSignal:0", "1")])];
        let mut engine = engine_with("4", programs).await;
        let err = TrafficLightManager::build(&mut engine, ONLINE_PROGRAM)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Topology { .. }));
    }

    #[test]
    fn test_uniform_width_per_junction() {
        let mut manager = TrafficLightManager::new(ONLINE_PROGRAM);
        manager
            .insert_junction(
                "918".into(),
                &junction_918(),
                JunctionSnapshot {
                    program_id: "0".into(),
                    phase: 0,
                },
            )
            .unwrap();
        for logic in manager.programs(&"918".into()).unwrap().values() {
            assert_eq!(logic.number_signals(), 12);
        }
    }
}
