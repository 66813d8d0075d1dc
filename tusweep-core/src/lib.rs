mod cli;
mod config;
mod launch;
mod sweep;

pub use cli::run;
pub use config::LaunchConfig;
pub use launch::{run_sweep, JobOutcome, OnFailure, Output, RunReport, TrainCommand, DEVICE_ENV};
pub use sweep::{SweepGrid, TrainJob};
