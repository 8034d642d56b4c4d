//! CaptureSettings - run configuration
//!
//! Loaded from TOML/JSON by `config_loader`. Every section carries serde
//! defaults, so an empty document is a valid configuration.

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Complete run configuration
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CaptureSettings {
    /// CARLA endpoint
    #[serde(default)]
    #[validate(nested)]
    pub carla: CarlaEndpoint,

    /// Lockstep capture tuning
    #[serde(default)]
    #[validate(nested)]
    pub capture: CaptureTuning,

    /// Output tree
    #[serde(default)]
    pub output: OutputSettings,

    /// Ground-truth passes run before the weather passes, in order
    #[serde(default = "default_ground_truth")]
    pub ground_truth: Vec<GroundTruthPass>,

    /// Free-driving log generation
    #[serde(default)]
    #[validate(nested)]
    pub fleet: FleetSettings,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            carla: CarlaEndpoint::default(),
            capture: CaptureTuning::default(),
            output: OutputSettings::default(),
            ground_truth: default_ground_truth(),
            fleet: FleetSettings::default(),
        }
    }
}

/// CARLA server address
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CarlaEndpoint {
    #[serde(default = "default_carla_host")]
    #[validate(length(min = 1))]
    pub host: String,

    #[serde(default = "default_carla_port")]
    pub port: u16,

    /// Client RPC timeout
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1))]
    pub timeout_secs: u64,
}

impl Default for CarlaEndpoint {
    fn default() -> Self {
        Self {
            host: default_carla_host(),
            port: default_carla_port(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_carla_host() -> String {
    "127.0.0.1".to_string()
}

fn default_carla_port() -> u16 {
    2000
}

fn default_timeout_secs() -> u64 {
    100
}

/// Lockstep capture tuning
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct CaptureTuning {
    /// Simulation step while in synchronous mode (seconds)
    #[serde(default = "default_fixed_delta")]
    #[validate(range(min = 0.001, max = 1.0))]
    pub fixed_delta_seconds: f64,

    /// Ticks issued after replay start before looking for the hero
    #[serde(default = "default_spawn_ticks")]
    #[validate(range(min = 1))]
    pub spawn_ticks: u32,

    /// Ticks issued and discarded after attaching sensors
    #[serde(default = "default_warmup_ticks")]
    pub warmup_ticks: u32,

    /// Real-time pause after warm-up before stale samples are discarded
    #[serde(default = "default_settle_pause_ms")]
    pub settle_pause_ms: u64,

    /// Frames dropped from the end of the log (scripted teardown animation)
    #[serde(default = "default_trailing_margin")]
    pub trailing_margin_frames: u64,

    /// Maximum concurrent drain+persist tasks per flush group
    #[serde(default = "default_max_workers")]
    #[validate(range(min = 1, max = 256))]
    pub max_workers: usize,

    /// `role_name` attribute of the vehicle carrying the rig
    #[serde(default = "default_hero_role")]
    #[validate(length(min = 1))]
    pub hero_role_name: String,

    /// Actor filter used to look for the hero and to set light state
    #[serde(default = "default_hero_filter")]
    pub hero_filter: String,

    #[serde(default = "default_image_width")]
    #[validate(range(min = 1))]
    pub image_width: u32,

    #[serde(default = "default_image_height")]
    #[validate(range(min = 1))]
    pub image_height: u32,

    #[serde(default = "default_fov")]
    #[validate(range(min = 1.0, max = 180.0))]
    pub fov: f64,
}

impl Default for CaptureTuning {
    fn default() -> Self {
        Self {
            fixed_delta_seconds: default_fixed_delta(),
            spawn_ticks: default_spawn_ticks(),
            warmup_ticks: default_warmup_ticks(),
            settle_pause_ms: default_settle_pause_ms(),
            trailing_margin_frames: default_trailing_margin(),
            max_workers: default_max_workers(),
            hero_role_name: default_hero_role(),
            hero_filter: default_hero_filter(),
            image_width: default_image_width(),
            image_height: default_image_height(),
            fov: default_fov(),
        }
    }
}

fn default_fixed_delta() -> f64 {
    0.1
}

fn default_spawn_ticks() -> u32 {
    1
}

fn default_warmup_ticks() -> u32 {
    10
}

fn default_settle_pause_ms() -> u64 {
    500
}

fn default_trailing_margin() -> u64 {
    10
}

fn default_max_workers() -> usize {
    4
}

fn default_hero_role() -> String {
    "hero".to_string()
}

fn default_hero_filter() -> String {
    "vehicle.*".to_string()
}

fn default_image_width() -> u32 {
    1280
}

fn default_image_height() -> u32 {
    720
}

fn default_fov() -> f64 {
    90.0
}

/// Output tree settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSettings {
    /// Root of `{root}/{log}/{condition}/{sensor}/`
    #[serde(default = "default_output_root")]
    pub root: String,

    /// Run the renumber/truncate pass after a complete scenario
    #[serde(default = "default_true")]
    pub align_after_run: bool,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            root: default_output_root(),
            align_after_run: true,
        }
    }
}

fn default_output_root() -> String {
    "./output".to_string()
}

fn default_true() -> bool {
    true
}

/// Ground-truth pass kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroundTruthPass {
    Segmentation,
    Depth,
    /// IMU + GNSS pair written to the `GPS` folder
    Telemetry,
}

fn default_ground_truth() -> Vec<GroundTruthPass> {
    vec![
        GroundTruthPass::Segmentation,
        GroundTruthPass::Depth,
        GroundTruthPass::Telemetry,
    ]
}

/// Free-driving log generation settings
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct FleetSettings {
    /// Map loaded before spawning
    #[serde(default = "default_map")]
    pub map: String,

    /// Commands per batch call
    #[serde(default = "default_chunk_size")]
    #[validate(range(min = 1))]
    pub chunk_size: usize,

    #[serde(default = "default_cars")]
    pub cars: usize,

    #[serde(default = "default_motorbikes")]
    pub motorbikes: usize,

    #[serde(default = "default_bicycles")]
    pub bicycles: usize,

    #[serde(default = "default_walkers")]
    pub walkers: usize,

    /// Share of pedestrians that run instead of walk
    #[serde(default = "default_running_fraction")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub running_fraction: f64,

    /// Share of pedestrians allowed to cross roads
    #[serde(default = "default_crossing_fraction")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub crossing_fraction: f64,

    /// How long the recorder runs
    #[serde(default = "default_recorder_seconds")]
    pub recorder_seconds: u64,

    /// RNG seed for spawn point shuffling and blueprint choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    #[serde(default)]
    pub catalog: BlueprintCatalog,
}

impl Default for FleetSettings {
    fn default() -> Self {
        Self {
            map: default_map(),
            chunk_size: default_chunk_size(),
            cars: default_cars(),
            motorbikes: default_motorbikes(),
            bicycles: default_bicycles(),
            walkers: default_walkers(),
            running_fraction: default_running_fraction(),
            crossing_fraction: default_crossing_fraction(),
            recorder_seconds: default_recorder_seconds(),
            seed: None,
            catalog: BlueprintCatalog::default(),
        }
    }
}

fn default_map() -> String {
    "Town03".to_string()
}

fn default_chunk_size() -> usize {
    9
}

fn default_cars() -> usize {
    89
}

fn default_motorbikes() -> usize {
    14
}

fn default_bicycles() -> usize {
    4
}

fn default_walkers() -> usize {
    60
}

fn default_running_fraction() -> f64 {
    0.1
}

fn default_crossing_fraction() -> f64 {
    0.2
}

fn default_recorder_seconds() -> u64 {
    180
}

/// Blueprint ids the fleet draws from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintCatalog {
    #[serde(default = "default_hero_blueprint")]
    pub hero: String,

    #[serde(default = "default_car_blueprints")]
    pub cars: Vec<String>,

    #[serde(default = "default_motorbike_blueprints")]
    pub motorbikes: Vec<String>,

    #[serde(default = "default_bicycle_blueprints")]
    pub bicycles: Vec<String>,

    /// Filter for pedestrian blueprints
    #[serde(default = "default_walker_filter")]
    pub walker_filter: String,

    #[serde(default = "default_walker_controller")]
    pub walker_controller: String,

    /// Walking speed (m/s)
    #[serde(default = "default_walking_speed")]
    pub walking_speed: f32,

    /// Running speed (m/s)
    #[serde(default = "default_running_speed")]
    pub running_speed: f32,
}

impl Default for BlueprintCatalog {
    fn default() -> Self {
        Self {
            hero: default_hero_blueprint(),
            cars: default_car_blueprints(),
            motorbikes: default_motorbike_blueprints(),
            bicycles: default_bicycle_blueprints(),
            walker_filter: default_walker_filter(),
            walker_controller: default_walker_controller(),
            walking_speed: default_walking_speed(),
            running_speed: default_running_speed(),
        }
    }
}

fn default_hero_blueprint() -> String {
    "vehicle.audi.tt".to_string()
}

fn default_car_blueprints() -> Vec<String> {
    [
        "vehicle.audi.tt",
        "vehicle.chevrolet.impala",
        "vehicle.dodge_charger.police",
        "vehicle.audi.etron",
        "vehicle.lincoln.mkz2017",
        "vehicle.mustang.mustang",
        "vehicle.tesla.model3",
        "vehicle.volkswagen.t2",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_motorbike_blueprints() -> Vec<String> {
    ["vehicle.harley-davidson.low_rider", "vehicle.yamaha.yzf"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_bicycle_blueprints() -> Vec<String> {
    [
        "vehicle.gazelle.omafiets",
        "vehicle.diamondback.century",
        "vehicle.bh.crossbike",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_walker_filter() -> String {
    "walker.pedestrian.*".to_string()
}

fn default_walker_controller() -> String {
    "controller.ai.walker".to_string()
}

fn default_walking_speed() -> f32 {
    1.4
}

fn default_running_speed() -> f32 {
    3.0
}
