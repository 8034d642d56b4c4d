//! Command implementations.

mod align;
mod capture;
mod info;
mod record;
mod spawn_hero;
mod validate;

pub use align::run_align;
pub use capture::run_capture;
pub use info::run_info;
pub use record::run_record;
pub use spawn_hero::run_spawn_hero;
pub use validate::run_validate;
