//! Free-driving log generation
//!
//! Populates a map with an autopilot fleet and pedestrians, records for a
//! fixed time and tears everything down again. Every batch goes through the
//! chunked `BatchLifecycleManager`.

use std::time::{Duration, Instant};

use actor_factory::fleet::succeeded;
use actor_factory::{BatchLifecycleManager, CarlaClient, WalkerSpawn};
use contracts::{ActorId, BatchCommand, BlueprintCatalog, FleetRoster, FleetSettings, Transform};
use rand::rngs::StdRng;
use rand::seq::{IndexedRandom, SliceRandom};
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{CaptureError, Result};
use crate::shutdown::Shutdown;

/// Hero spawn command: role attribute plus autopilot
pub fn hero_command(catalog: &BlueprintCatalog, role_name: &str, at: Transform) -> BatchCommand {
    BatchCommand::spawn(catalog.hero.clone(), at)
        .with_attribute("role_name", role_name)
        .with_autopilot()
}

/// Spawn a single autopilot hero at the first recommended spawn point
#[instrument(name = "spawn_hero", skip(manager, catalog))]
pub async fn spawn_hero<C: CarlaClient>(
    manager: &BatchLifecycleManager<C>,
    catalog: &BlueprintCatalog,
    role_name: &str,
) -> Result<ActorId> {
    let points = manager.client().spawn_points().await?;
    let at = points.first().copied().ok_or_else(|| {
        CaptureError::attach(role_name, "map has no recommended spawn points")
    })?;

    let outcomes = manager
        .create_many(&[hero_command(catalog, role_name, at)])
        .await?;
    match outcomes.into_iter().next() {
        Some(Ok(id)) => {
            info!(hero_id = id, blueprint = %catalog.hero, "hero spawned");
            Ok(id)
        }
        Some(Err(e)) => Err(CaptureError::attach(role_name, e.message)),
        None => Err(CaptureError::attach(role_name, "empty batch response")),
    }
}

/// What a recording run produced
#[derive(Debug, Clone, Serialize)]
pub struct FleetReport {
    pub map: String,
    pub recorder_path: String,
    pub vehicles_requested: usize,
    pub walkers_requested: usize,
    pub controllers_started: usize,
    pub roster: FleetRoster,
    pub recorded_secs: f64,
    /// Recording was cut short by an operator interrupt
    pub interrupted: bool,
}

/// Spawns a fleet, records it and cleans up
pub struct FleetRecorder<C: CarlaClient> {
    manager: BatchLifecycleManager<C>,
    settings: FleetSettings,
    hero_role_name: String,
    shutdown: Shutdown,
    rng: StdRng,
}

impl<C: CarlaClient> FleetRecorder<C> {
    pub fn new(
        client: C,
        settings: FleetSettings,
        hero_role_name: impl Into<String>,
        shutdown: Shutdown,
    ) -> Self {
        let rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            manager: BatchLifecycleManager::new(client, settings.chunk_size),
            settings,
            hero_role_name: hero_role_name.into(),
            shutdown,
            rng,
        }
    }

    pub fn manager(&self) -> &BatchLifecycleManager<C> {
        &self.manager
    }

    /// Populate, record to `recorder_path`, tear down
    ///
    /// Teardown runs on every path once the map is loaded. An interrupt
    /// during the recording wait stops the recorder early and still returns a
    /// report.
    #[instrument(name = "fleet_record", skip(self), fields(map = %self.settings.map))]
    pub async fn record(&mut self, recorder_path: &str) -> Result<FleetReport> {
        let client = self.manager.client();
        client.load_world(&self.settings.map).await?;

        let mut roster = FleetRoster::new();
        let mut report = FleetReport {
            map: self.settings.map.clone(),
            recorder_path: recorder_path.to_string(),
            vehicles_requested: 0,
            walkers_requested: 0,
            controllers_started: 0,
            roster: FleetRoster::new(),
            recorded_secs: 0.0,
            interrupted: false,
        };

        let outcome = self
            .populate_and_record(recorder_path, &mut roster, &mut report)
            .await;
        let teardown = self.teardown(&roster).await;
        report.roster = roster;

        match (outcome, teardown) {
            (Ok(()), Ok(())) => Ok(report),
            (Err(e), Ok(())) | (Ok(()), Err(e)) => Err(e),
            (Err(e), Err(teardown_err)) => {
                warn!(error = %teardown_err, "teardown failed after recording error");
                Err(e)
            }
        }
    }

    async fn populate_and_record(
        &mut self,
        recorder_path: &str,
        roster: &mut FleetRoster,
        report: &mut FleetReport,
    ) -> Result<()> {
        self.spawn_vehicles(roster, report).await?;
        self.spawn_pedestrians(roster, report).await?;
        self.manager.client().wait_for_tick().await?;
        report.controllers_started = self.start_controllers(roster).await?;

        let client = self.manager.client();
        client.start_recorder(recorder_path).await?;
        info!(
            path = recorder_path,
            seconds = self.settings.recorder_seconds,
            "recording"
        );

        let started = Instant::now();
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(self.settings.recorder_seconds)) => {}
            _ = self.shutdown.triggered() => {
                warn!("recording interrupted");
                report.interrupted = true;
            }
        }
        report.recorded_secs = started.elapsed().as_secs_f64();

        client.stop_recorder().await?;
        info!(path = recorder_path, recorded_secs = report.recorded_secs, "recorder stopped");
        Ok(())
    }

    /// Hero at the first shuffled spawn point, then cars, motorbikes, bicycles
    async fn spawn_vehicles(
        &mut self,
        roster: &mut FleetRoster,
        report: &mut FleetReport,
    ) -> Result<()> {
        let mut points = self.manager.client().spawn_points().await?;
        points.shuffle(&mut self.rng);

        let catalog = &self.settings.catalog;
        let mut commands = Vec::new();
        let mut points = points.into_iter();
        match points.next() {
            Some(at) => commands.push(hero_command(catalog, &self.hero_role_name, at)),
            None => return Err(CaptureError::attach(&self.hero_role_name, "map has no spawn points")),
        }

        let groups = [
            (&catalog.cars, self.settings.cars),
            (&catalog.motorbikes, self.settings.motorbikes),
            (&catalog.bicycles, self.settings.bicycles),
        ];
        for (blueprints, count) in groups {
            for _ in 0..count {
                let Some(at) = points.next() else {
                    warn!(spawned = commands.len(), "ran out of spawn points");
                    break;
                };
                let Some(blueprint) = blueprints.choose(&mut self.rng) else {
                    break;
                };
                commands.push(BatchCommand::spawn(blueprint.clone(), at).with_autopilot());
            }
        }

        report.vehicles_requested = commands.len();
        let outcomes = match self.manager.create_many(&commands).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                roster.vehicles = succeeded(e.applied_outcomes());
                return Err(e.into());
            }
        };
        roster.hero = outcomes.first().and_then(|o| o.as_ref().ok().copied());
        roster.vehicles = succeeded(&outcomes);
        if roster.hero.is_none() {
            warn!("hero vehicle failed to spawn");
        }
        info!(
            requested = commands.len(),
            spawned = roster.vehicles.len(),
            "vehicles spawned"
        );
        Ok(())
    }

    async fn spawn_pedestrians(
        &mut self,
        roster: &mut FleetRoster,
        report: &mut FleetReport,
    ) -> Result<()> {
        if self.settings.walkers == 0 {
            return Ok(());
        }
        let client = self.manager.client();
        let catalog = &self.settings.catalog;

        let blueprints = client.blueprint_ids(&catalog.walker_filter).await?;
        if blueprints.is_empty() {
            warn!(filter = %catalog.walker_filter, "no pedestrian blueprints, skipping walkers");
            return Ok(());
        }

        let mut commands = Vec::with_capacity(self.settings.walkers);
        let mut speeds = Vec::with_capacity(self.settings.walkers);
        for _ in 0..self.settings.walkers {
            let Some(location) = client.random_navigation_location().await? else {
                continue;
            };
            let Some(blueprint) = blueprints.choose(&mut self.rng) else {
                continue;
            };
            let running = self.rng.random::<f64>() < self.settings.running_fraction;
            speeds.push(if running {
                catalog.running_speed
            } else {
                catalog.walking_speed
            });
            commands.push(
                BatchCommand::spawn(blueprint.clone(), Transform::at(location))
                    .with_attribute("is_invincible", "false"),
            );
        }
        report.walkers_requested = commands.len();

        let outcomes = match self.manager.create_many(&commands).await {
            Ok(outcomes) => outcomes,
            Err(e) => {
                roster.walkers = succeeded(e.applied_outcomes());
                return Err(e.into());
            }
        };
        // Recorded before pairing so a failed controller batch still tears them down
        roster.walkers = succeeded(&outcomes);
        let walkers: Vec<WalkerSpawn> = outcomes
            .into_iter()
            .zip(speeds)
            .map(|(outcome, max_speed)| WalkerSpawn { outcome, max_speed })
            .collect();

        let controller = catalog.walker_controller.clone();
        let pairing = match self
            .manager
            .pair_walkers_with_controllers(&walkers, |walker| {
                BatchCommand::spawn(controller.clone(), Transform::default()).attached_to(walker)
            })
            .await
        {
            Ok(pairing) => pairing,
            Err(e) => {
                roster.controllers = succeeded(e.applied_outcomes());
                return Err(e.into());
            }
        };

        info!(
            requested = walkers.len(),
            walkers = pairing.walkers.len(),
            paired = pairing.units.len(),
            "pedestrians spawned"
        );
        roster.walkers = pairing.walkers;
        roster.controllers = pairing.controllers;
        roster.units = pairing.units;
        Ok(())
    }

    /// Start each paired controller towards a random target at its speed
    async fn start_controllers(&self, roster: &FleetRoster) -> Result<usize> {
        if roster.units.is_empty() {
            return Ok(0);
        }
        let client = self.manager.client();
        client
            .set_pedestrians_cross_factor(self.settings.crossing_fraction as f32)
            .await?;

        let mut started = 0;
        for unit in &roster.units {
            let Some(target) = client.random_navigation_location().await? else {
                warn!(controller = unit.controller, "no navigation target");
                continue;
            };
            match client
                .start_walker_controller(unit.controller, target, unit.max_speed)
                .await
            {
                Ok(()) => started += 1,
                Err(e) => warn!(controller = unit.controller, error = %e, "controller start failed"),
            }
        }
        debug!(started, "controllers started");
        Ok(started)
    }

    /// Destroy vehicles, stop paired controllers, destroy every pedestrian id
    #[instrument(name = "fleet_teardown", skip_all, fields(vehicles = roster.vehicles.len(), walkers = roster.walkers.len()))]
    async fn teardown(&self, roster: &FleetRoster) -> Result<()> {
        let client = self.manager.client();
        let mut first_error = None;

        if let Err(e) = client.stop_recorder().await {
            warn!(error = %e, "stop recorder during teardown failed");
        }

        if !roster.vehicles.is_empty() {
            if let Err(e) = self.manager.destroy_many(&roster.vehicles).await {
                first_error.get_or_insert(CaptureError::from(e));
            }
        }

        for controller in roster.paired_controllers() {
            if let Err(e) = client.stop_walker_controller(controller).await {
                warn!(controller, error = %e, "controller stop failed");
            }
        }

        let pedestrians = roster.pedestrian_actor_ids();
        if !pedestrians.is_empty() {
            if let Err(e) = self.manager.destroy_many(&pedestrians).await {
                first_error.get_or_insert(CaptureError::from(e));
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => {
                info!("fleet destroyed");
                Ok(())
            }
        }
    }
}
