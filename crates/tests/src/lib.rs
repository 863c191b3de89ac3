//! # Integration Tests
//!
//! Cross-crate end-to-end tests against the mock lane engine: config loading,
//! session ticks, light translation, and tick-report dispatch.

#[cfg(test)]
mod contract_tests {
    #[test]
    fn test_contracts_compile() {
        let _ = contracts::ConfigVersion::V1;
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::collections::BTreeMap;
    use std::time::Instant;

    use bridge::{CosimSession, LightBoard};
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ActorId, Color, CosimConfig, LightState, ProgramDefinition, SignalState, TickReport,
        TrackingMode,
    };
    use dispatcher::create_dispatcher;
    use lane_client::{MockLaneEngine, ONLINE_PROGRAM};
    use observability::TickMetricsAggregator;
    use tokio::sync::mpsc;

    const TICKS: u64 = 8;

    /// Junction 918: 1032 on links 0-1, 1034 on links 3-5, and 1040 spread
    /// over four links, which cannot be translated.
    fn scripted_engine() -> MockLaneEngine {
        let engine = MockLaneEngine::new();
        engine.add_junction(
            "918",
            vec![ProgramDefinition {
                program_id: "0".to_string(),
                phases: vec!["GGgrrrGGgrrr".to_string(), "rrrGGgrrrGGg".to_string()],
                parameters: [
                    ("linkSignalID:0", "1032"),
                    ("linkSignalID:1", "1032"),
                    ("linkSignalID:3", "1034"),
                    ("linkSignalID:4", "1034"),
                    ("linkSignalID:5", "1034"),
                    ("linkSignalID:8", "1040"),
                    ("linkSignalID:9", "1040"),
                    ("linkSignalID:10", "1040"),
                    ("linkSignalID:11", "1040"),
                ]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            }],
        );
        engine.schedule_phase(5, "918", "0", 1);
        engine.schedule_departure(2, "flow.0", "passenger");
        engine.schedule_arrival(6, "flow.0");
        engine
    }

    fn landmark(id: &str) -> contracts::LandmarkId {
        id.into()
    }

    /// End-to-end: TOML config -> session ticks -> translation -> file sink
    #[tokio::test]
    async fn test_e2e_mock_session_to_file_sink() {
        let dir = tempfile::tempdir().unwrap();
        let trace = dir.path().join("ticks.jsonl");
        let toml = format!(
            r#"
[lane]
step_length = 0.05

[[sinks]]
name = "trace"
sink_type = "file"

[sinks.params]
path = '{}'

[[sinks]]
name = "log"
sink_type = "log"
"#,
            trace.display()
        );
        let config = ConfigLoader::load_from_str(&toml, ConfigFormat::Toml).unwrap();

        let (report_tx, report_rx) = mpsc::channel::<TickReport>(32);
        let dispatcher_handle = create_dispatcher(config.sinks.clone(), report_rx)
            .unwrap()
            .spawn();

        let mut session = CosimSession::open(scripted_engine(), &config).await.unwrap();
        let mut world = LightBoard::new();
        let mut aggregator = TickMetricsAggregator::new();

        for _ in 0..TICKS {
            let started = Instant::now();
            session.tick().await.unwrap();
            let translations = session.translate_lights(&mut world).await.unwrap();
            let report = session.report(&translations, started.elapsed());
            aggregator.update(&report);
            report_tx.send(report).await.unwrap();
        }
        session.close().await.unwrap();
        drop(report_tx);

        let finals = dispatcher_handle.await.unwrap();
        assert_eq!(finals.len(), 2);
        for (name, snapshot) in &finals {
            assert_eq!(snapshot.write_count, TICKS, "sink {name}");
            assert_eq!(snapshot.last_step, TICKS, "sink {name}");
        }

        let reports: Vec<TickReport> = std::fs::read_to_string(&trace)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(reports.len() as u64, TICKS);
        assert!(reports.windows(2).all(|w| w[1].step == w[0].step + 1));
        assert!(reports.windows(2).all(|w| w[1].sim_time >= w[0].sim_time));

        let first = &reports[0];
        assert_eq!(first.lights.get(&landmark("1032")), Some(&LightState::Green));
        assert_eq!(first.lights.get(&landmark("1034")), Some(&LightState::Red));
        assert!(first.translation_errors.contains_key(&landmark("1040")));

        let last = &reports[TICKS as usize - 1];
        assert_eq!(last.lights.get(&landmark("1032")), Some(&LightState::Red));
        assert_eq!(last.lights.get(&landmark("1034")), Some(&LightState::Green));

        let flow = ActorId::from("flow.0");
        let spawned_at: Vec<u64> = reports
            .iter()
            .filter(|r| r.spawned.contains(&flow))
            .map(|r| r.step)
            .collect();
        let destroyed_at: Vec<u64> = reports
            .iter()
            .filter(|r| r.destroyed.contains(&flow))
            .map(|r| r.step)
            .collect();
        assert_eq!(spawned_at, vec![2]);
        assert_eq!(destroyed_at, vec![6]);

        let summary = aggregator.summary();
        assert_eq!(summary.total_ticks, TICKS);
        assert_eq!(summary.ticks_with_failures, TICKS);
        assert_eq!(summary.failure_counts.get("1040"), Some(&TICKS));
        assert_eq!(summary.total_spawned, 1);
        assert_eq!(summary.total_destroyed, 1);
    }

    /// Both tracking modes see the same actors come and go
    #[tokio::test]
    async fn test_tracking_modes_agree() {
        async fn trace(tracking: TrackingMode) -> Vec<(Vec<ActorId>, Vec<ActorId>)> {
            let mut config = CosimConfig::default();
            config.actors.tracking = tracking;
            let mut session = CosimSession::open(scripted_engine(), &config).await.unwrap();

            let mut steps = Vec::new();
            for _ in 0..TICKS {
                session.tick().await.unwrap();
                steps.push((
                    session.spawned_this_step().iter().cloned().collect(),
                    session.destroyed_this_step().iter().cloned().collect(),
                ));
            }
            session.close().await.unwrap();
            steps
        }

        let lists = trace(TrackingMode::EngineLists).await;
        let diff = trace(TrackingMode::SnapshotDiff).await;
        assert_eq!(lists, diff);
        assert!(lists.iter().any(|(spawned, _)| !spawned.is_empty()));
    }

    /// World writes reach the lane engine and come back through translation
    #[tokio::test]
    async fn test_world_to_lane_round_trip() {
        let config = CosimConfig::default();
        let mut session = CosimSession::open(scripted_engine(), &config).await.unwrap();
        let mut world = LightBoard::new();

        session.tick().await.unwrap();
        session
            .synchronize_traffic_light(&landmark("1034"), SignalState::Green)
            .await
            .unwrap();

        let written: BTreeMap<usize, SignalState> = session
            .engine()
            .link_writes()
            .into_iter()
            .map(|w| (w.link_index, w.state))
            .collect();
        assert_eq!(
            written,
            BTreeMap::from([
                (3, SignalState::Green),
                (4, SignalState::Green),
                (5, SignalState::Green),
            ])
        );

        session.tick().await.unwrap();
        session.translate_lights(&mut world).await.unwrap();
        assert_eq!(world.state(&landmark("1034")), Some(LightState::Green));
        assert_eq!(world.state(&landmark("1032")), Some(LightState::Green));
        assert_ne!(
            session.traffic_lights().runtime_state(&"918".into()).map(|s| s.program_id.as_str()),
            Some(ONLINE_PROGRAM)
        );

        session.close().await.unwrap();
    }

    /// Actors added from the world side depart and leave like engine vehicles
    #[tokio::test]
    async fn test_world_actor_lifecycle() {
        let config = CosimConfig::default();
        let mut session = CosimSession::open(MockLaneEngine::new(), &config).await.unwrap();

        let id = session
            .spawn_actor("vehicle.tesla.model3", Some(Color::rgb(200, 20, 20)))
            .await
            .unwrap();
        assert_eq!(id, "carla0");

        session.tick().await.unwrap();
        assert!(session.spawned_this_step().contains(&id));
        assert!(session.active_actors().contains(&id));

        session.destroy_actor(&id).await.unwrap();
        session.tick().await.unwrap();
        assert!(session.destroyed_this_step().contains(&id));
        assert!(session.active_actors().is_empty());

        session.close().await.unwrap();
        assert!(session.tick().await.is_err());
    }
}
