//! CLI argument definitions using clap.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// CARLA Capture - replay a recorded scenario under many conditions
#[derive(Parser, Debug)]
#[command(
    name = "carla-capture",
    author,
    version,
    about = "Multi-condition sensor capture from CARLA recorder logs",
    long_about = "Replays a CARLA recorder log once per pass (ground truth, then one pass \n\
                  per weather condition), drives the simulator in lockstep and writes \n\
                  every sensor's output with frame-aligned file names."
)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true, env = "CARLA_CAPTURE_VERBOSE")]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(
        long,
        value_enum,
        default_value = "pretty",
        global = true,
        env = "CARLA_CAPTURE_LOG_FORMAT"
    )]
    pub log_format: LogFormat,

    /// Prometheus metrics port (0 = disabled)
    #[arg(long, default_value = "0", global = true, env = "CARLA_CAPTURE_METRICS_PORT")]
    pub metrics_port: u16,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture every pass of one recorder log
    Capture(CaptureArgs),

    /// Validate camera, weather and settings files without a simulator
    Validate(ValidateArgs),

    /// Show map, duration and frame count of a recorder log
    Info(InfoArgs),

    /// Record a free-driving log with a spawned fleet
    Record(RecordArgs),

    /// Spawn one autopilot hero vehicle
    SpawnHero(SpawnHeroArgs),

    /// Renumber and truncate a captured log directory
    Align(AlignArgs),
}

/// Settings file and simulator endpoint overrides
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Settings file (TOML or JSON); built-in defaults when omitted
    #[arg(short, long, env = "CARLA_CAPTURE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override CARLA server host
    #[arg(long, env = "CARLA_CAPTURE_HOST")]
    pub host: Option<String>,

    /// Override CARLA server port
    #[arg(long, env = "CARLA_CAPTURE_PORT")]
    pub port: Option<u16>,
}

/// Arguments for the `capture` command
#[derive(Args, Debug, Clone)]
pub struct CaptureArgs {
    /// Recorder log path, as seen by the simulator
    pub log: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Camera-definition file
    #[arg(long, default_value = "cameras.cam", env = "CARLA_CAPTURE_CAMERAS")]
    pub cameras: PathBuf,

    /// Weather-condition file
    #[arg(long, default_value = "weather.csv", env = "CARLA_CAPTURE_CONDITIONS")]
    pub conditions: PathBuf,

    /// Override output root directory
    #[arg(short, long, env = "CARLA_CAPTURE_OUTPUT")]
    pub output: Option<PathBuf>,

    /// Override the number of sensors flushed concurrently
    #[arg(long, env = "CARLA_CAPTURE_MAX_WORKERS")]
    pub max_workers: Option<usize>,

    /// Override the frames left uncaptured at the end of the log
    #[arg(long, env = "CARLA_CAPTURE_TRAILING_MARGIN")]
    pub trailing_margin: Option<u64>,

    /// Skip the alignment pass after capture
    #[arg(long)]
    pub no_align: bool,
}

/// Arguments for the `validate` command
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Camera-definition file
    #[arg(long, default_value = "cameras.cam")]
    pub cameras: PathBuf,

    /// Weather-condition file
    #[arg(long, default_value = "weather.csv")]
    pub conditions: PathBuf,

    /// Settings file to validate as well
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output validation result as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `info` command
#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Recorder log path, as seen by the simulator
    pub log: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `record` command
#[derive(Args, Debug)]
pub struct RecordArgs {
    /// Recorder output path, as seen by the simulator
    pub recorder_path: String,

    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Override map to load
    #[arg(long)]
    pub map: Option<String>,

    /// Override recording length in seconds
    #[arg(long)]
    pub seconds: Option<u64>,

    /// Seed for spawn point and blueprint selection
    #[arg(long, env = "CARLA_CAPTURE_SEED")]
    pub seed: Option<u64>,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the `spawn-hero` command
#[derive(Args, Debug)]
pub struct SpawnHeroArgs {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Override the hero role name
    #[arg(long)]
    pub role_name: Option<String>,
}

/// Arguments for the `align` command
#[derive(Args, Debug)]
pub struct AlignArgs {
    /// Captured log directory (`<output root>/<log name>`)
    pub dir: PathBuf,

    /// Output the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Log output format
#[derive(ValueEnum, Clone, Copy, Debug, Default)]
pub enum LogFormat {
    /// JSON structured logging
    Json,
    /// Human-readable pretty format
    #[default]
    Pretty,
    /// Compact single-line format
    Compact,
}

impl From<LogFormat> for observability::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_capture_overrides_parse() {
        let cli = Cli::try_parse_from([
            "carla-capture",
            "-vv",
            "capture",
            "/logs/run_01.log",
            "--host",
            "10.0.0.2",
            "--max-workers",
            "2",
            "--trailing-margin",
            "0",
            "--no-align",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        let Commands::Capture(args) = cli.command else {
            panic!("expected capture command");
        };
        assert_eq!(args.log, "/logs/run_01.log");
        assert_eq!(args.connection.host.as_deref(), Some("10.0.0.2"));
        assert_eq!(args.max_workers, Some(2));
        assert_eq!(args.trailing_margin, Some(0));
        assert!(args.no_align);
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        let result = Cli::try_parse_from(["carla-capture", "-q", "-v", "align", "out/run_01"]);
        assert!(result.is_err());
    }
}
