//! Shared plumbing for the simulator-facing commands.

mod settings;
mod signal;
mod simulator;
mod stats;

pub use settings::load_settings;
pub use signal::install_shutdown_handler;
pub use simulator::{connect, Simulator};
pub use stats::{print_fleet_report, print_scenario_report};
