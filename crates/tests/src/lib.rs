//! # Integration Tests
//!
//! Cross-crate scenarios against the mock simulator (no CARLA required):
//! - full capture of a log under several conditions
//! - input validation failing before the simulator is touched
//! - bounded flush fan-out
//! - chunked batch lifecycle and pedestrian pairing

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::path::Path;
    use std::time::Duration;

    use actor_factory::{MockCarlaClient, MockConfig, MockEvent, MockSensorConfig};
    use capture::{ScenarioRunner, Shutdown};
    use config_loader::ConfigLoader;
    use contracts::{CaptureSettings, CaptureTuning, OutputSettings};

    const CAMERAS: &str = "# name x y z yaw\nfront 1.5 0 2.4 0\nrear -1.5 0 2.4 180\n";

    fn settings(root: &Path) -> CaptureSettings {
        CaptureSettings {
            capture: CaptureTuning {
                fixed_delta_seconds: 0.1,
                settle_pause_ms: 0,
                trailing_margin_frames: 0,
                ..Default::default()
            },
            output: OutputSettings {
                root: root.display().to_string(),
                align_after_run: true,
            },
            ground_truth: Vec::new(),
            ..Default::default()
        }
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// Two cameras, one condition, a ten second log at 0.1s per tick:
    /// both camera folders hold exactly 000000.png ..= 000099.png.
    #[tokio::test]
    async fn test_e2e_two_cameras_hundred_frames() {
        let dir = tempfile::tempdir().unwrap();
        let cameras = ConfigLoader::cameras_from_str(CAMERAS, "rig.cam").unwrap();
        let conditions =
            ConfigLoader::conditions_from_str("ClearNoon,0,0,0,10,0,0,0,60,45,0\n", "weather.csv")
                .unwrap();

        let client = MockCarlaClient::connected(MockConfig {
            recorder_duration_secs: 10.0,
            sensor: MockSensorConfig {
                delivery_delay: Some(Duration::from_micros(200)),
                ..Default::default()
            },
            ..Default::default()
        });
        let runner = ScenarioRunner::new(client.clone(), settings(dir.path()), Shutdown::never());

        let report = runner
            .run("/recordings/town03_run.log", &cameras, &conditions)
            .await
            .unwrap();

        assert_eq!(report.log_frames, 100);
        assert_eq!(report.sessions.len(), 1);
        assert_eq!(report.sessions[0].frames_captured, 100);
        assert_eq!(report.summary.files_written, 200);

        let expected: Vec<String> = (0..100).map(|i| format!("{i:06}.png")).collect();
        for camera in ["front", "rear"] {
            let folder = dir.path().join("town03_run").join("ClearNoon").join(camera);
            assert_eq!(file_names(&folder), expected, "{camera}");
        }

        // Lockstep released and every sensor destroyed
        assert!(!client.simulation_mode().is_synchronous());
        assert!(client
            .events()
            .iter()
            .any(|e| matches!(e, MockEvent::WeatherSet(_))));
        assert_eq!(report.alignment.unwrap().removed, 0);
    }

    /// Conditions run in file order and each gets its own folder
    #[tokio::test]
    async fn test_e2e_conditions_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let cameras = ConfigLoader::cameras_from_str("front 0 0 2 0\n", "rig.cam").unwrap();
        let conditions = ConfigLoader::conditions_from_str(
            "WetSunset,60,40,40,20,10,0,80,90,5,1\nClearNoon,0,0,0,10,0,0,0,60,45,0\n",
            "weather.csv",
        )
        .unwrap();

        let client = MockCarlaClient::connected(MockConfig {
            recorder_duration_secs: 1.0,
            ..Default::default()
        });
        let runner = ScenarioRunner::new(client.clone(), settings(dir.path()), Shutdown::never());
        let report = runner.run("/recordings/short.log", &cameras, &conditions).await.unwrap();

        let order: Vec<_> = report.sessions.iter().map(|s| s.condition.as_str()).collect();
        assert_eq!(order, vec!["WetSunset", "ClearNoon"]);

        let weather: Vec<_> = client
            .events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::WeatherSet(params) => Some(params.precipitation),
                _ => None,
            })
            .collect();
        assert_eq!(weather, vec![40.0, 0.0]);

        for condition in ["WetSunset", "ClearNoon"] {
            let folder = dir.path().join("short").join(condition).join("front");
            assert_eq!(file_names(&folder).len(), 10, "{condition}");
        }
    }

    /// A single out-of-range scalar rejects the whole weather file, so no
    /// replay is ever started
    #[tokio::test]
    async fn test_e2e_invalid_weather_aborts_before_replay() {
        let dir = tempfile::tempdir().unwrap();
        let client = MockCarlaClient::connected(MockConfig::default());

        let err = ConfigLoader::conditions_from_str(
            "ClearNoon,0,0,0,10,0,0,0,60,45,0\nRainy,50,120,50,10,0,0,0,180,45,0\n",
            "weather.csv",
        )
        .unwrap_err();
        assert!(err.to_string().contains("weather.csv:2.precipitation"), "{err}");

        assert!(client.events().is_empty());
        assert!(fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    /// An operator interrupt mid-capture still releases lockstep and removes
    /// every sensor
    #[tokio::test]
    async fn test_e2e_interrupt_tears_down() {
        let dir = tempfile::tempdir().unwrap();
        let cameras = ConfigLoader::cameras_from_str(CAMERAS, "rig.cam").unwrap();
        let conditions =
            ConfigLoader::conditions_from_str("ClearNoon,0,0,0,10,0,0,0,60,45,0\n", "weather.csv")
                .unwrap();

        let client = MockCarlaClient::connected(MockConfig {
            recorder_duration_secs: 600.0,
            sensor: MockSensorConfig {
                delivery_delay: Some(Duration::from_millis(1)),
                ..Default::default()
            },
            ..Default::default()
        });
        let (trigger, shutdown) = Shutdown::channel();
        let runner = ScenarioRunner::new(client.clone(), settings(dir.path()), shutdown);

        let capture = tokio::spawn(async move {
            runner.run("/recordings/long.log", &cameras, &conditions).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.trigger();

        let err = tokio::time::timeout(Duration::from_secs(5), capture)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert!(err.is_interrupted());
        assert!(!client.simulation_mode().is_synchronous());

        // Only the replayed vehicles remain
        let sensors_alive = client
            .events()
            .iter()
            .filter_map(|e| match e {
                MockEvent::SensorSpawned { actor_id, .. } => Some(*actor_id),
                _ => None,
            })
            .filter(|id| client.contains_actor(*id))
            .count();
        assert_eq!(sensors_alive, 0);
    }
}

#[cfg(test)]
mod flush_tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use capture::{FlushScheduler, FlushTarget, Shutdown};

    struct SlowTarget {
        name: String,
        in_flight: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
        flushed: AtomicUsize,
    }

    impl FlushTarget for SlowTarget {
        fn label(&self) -> &str {
            &self.name
        }

        async fn flush_frame(&self, _frame_index: u64) -> capture::Result<()> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.flushed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Five sensors with two workers: groups of 2, 2, 1 and never more
    /// than two flushes in flight
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_five_sensors_two_workers() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let targets: Vec<_> = (0..5)
            .map(|i| {
                Arc::new(SlowTarget {
                    name: format!("cam{i}"),
                    in_flight: in_flight.clone(),
                    peak: peak.clone(),
                    flushed: AtomicUsize::new(0),
                })
            })
            .collect();

        let scheduler = FlushScheduler::new(2, Shutdown::never());
        for frame in 0..3 {
            let report = scheduler.flush_all(&targets, frame).await.unwrap();
            assert_eq!(report.group_sizes, vec![2, 2, 1]);
        }

        assert!(peak.load(Ordering::SeqCst) <= 2);
        assert!(targets.iter().all(|t| t.flushed.load(Ordering::SeqCst) == 3));
    }
}

#[cfg(test)]
mod fleet_tests {
    use actor_factory::{BatchLifecycleManager, MockCarlaClient, MockConfig, MockEvent, WalkerSpawn};
    use contracts::{BatchCommand, Transform};

    fn batch_sizes(client: &MockCarlaClient) -> Vec<usize> {
        client
            .events()
            .into_iter()
            .filter_map(|e| match e {
                MockEvent::Batch { size } => Some(size),
                _ => None,
            })
            .collect()
    }

    /// M commands with chunk size C take ceil(M / C) calls, each within the
    /// server limit, with outcomes in request order
    #[tokio::test]
    async fn test_chunked_create_respects_limit_and_order() {
        let client = MockCarlaClient::connected(MockConfig {
            max_batch_size: Some(9),
            fail_blueprints: vec!["vehicle.broken".into()],
            ..Default::default()
        });
        let manager = BatchLifecycleManager::new(client.clone(), 9);

        let commands: Vec<_> = (0..20)
            .map(|i| {
                let blueprint = if i == 13 { "vehicle.broken" } else { "vehicle.tesla.model3" };
                BatchCommand::spawn(blueprint, Transform::default())
            })
            .collect();
        let outcomes = manager.create_many(&commands).await.unwrap();

        assert_eq!(batch_sizes(&client), vec![9, 9, 2]);
        assert_eq!(outcomes.len(), 20);
        assert!(outcomes[13].is_err());

        let ids: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok().copied()).collect();
        assert_eq!(ids.len(), 19);
        assert!(ids.windows(2).all(|w| w[0] < w[1]));

        manager.destroy_many(&ids).await.unwrap();
        assert_eq!(client.actor_count(), 0);
    }

    /// Without chunking the same request exceeds the server limit
    #[tokio::test]
    async fn test_oversized_batch_fails_whole_call() {
        let client = MockCarlaClient::connected(MockConfig {
            max_batch_size: Some(9),
            ..Default::default()
        });
        let manager = BatchLifecycleManager::new(client.clone(), 20);

        let commands = vec![BatchCommand::spawn("vehicle.tesla.model3", Transform::default()); 12];
        assert!(manager.create_many(&commands).await.is_err());
        assert_eq!(client.actor_count(), 0);
    }

    /// A pedestrian whose controller failed is kept for cleanup but never
    /// forms a unit
    #[tokio::test]
    async fn test_pairing_drops_failed_controller() {
        let client = MockCarlaClient::connected(MockConfig {
            // Third walker spawned below
            fail_parents: vec![1002],
            ..Default::default()
        });
        let manager = BatchLifecycleManager::new(client.clone(), 2);

        let walker_commands = vec![
            BatchCommand::spawn("walker.pedestrian.0001", Transform::default()),
            BatchCommand::spawn("walker.pedestrian.0002", Transform::default()),
            BatchCommand::spawn("walker.pedestrian.0003", Transform::default()),
            BatchCommand::spawn("walker.pedestrian.0004", Transform::default()),
        ];
        let walkers: Vec<_> = manager
            .create_many(&walker_commands)
            .await
            .unwrap()
            .into_iter()
            .map(|outcome| WalkerSpawn {
                outcome,
                max_speed: 1.4,
            })
            .collect();

        let pairing = manager
            .pair_walkers_with_controllers(&walkers, |walker| {
                BatchCommand::spawn("controller.ai.walker", Transform::default())
                    .attached_to(walker)
            })
            .await
            .unwrap();

        assert_eq!(pairing.walkers, vec![1000, 1001, 1002, 1003]);
        assert_eq!(pairing.controllers.len(), 3);
        let paired: Vec<_> = pairing.units.iter().map(|u| u.walker).collect();
        assert_eq!(paired, vec![1000, 1001, 1003]);
        assert_eq!(pairing.unpaired_walkers().collect::<Vec<_>>(), vec![1002]);
        assert!(pairing.units.iter().all(|u| u.controller >= 1004));
    }
}
