//! Schedule tracker application: configuration, durable record store and
//! the run/purge entry points behind the `schedule_tracker` binary.
mod config;
mod persistence;
mod run;
mod terminals;

pub use config::{load_config, parse_config, Config, ConfigError, PDF_DIR_ENV};
pub use persistence::RonRecordStore;
pub use run::{purge, run};
pub use terminals::{load_terminals, parse_terminals};
