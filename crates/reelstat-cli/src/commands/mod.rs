pub mod config;
pub mod import;
pub mod refresh;
pub mod status;
pub mod titles;

pub use import::run_import;
pub use refresh::{run_refresh, run_schedule, set_paused};
pub use status::show_status;
