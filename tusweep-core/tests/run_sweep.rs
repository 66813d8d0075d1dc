//! Sweep execution against real child processes.

#![cfg(unix)]

use std::path::PathBuf;
use tusweep_core::{run_sweep, LaunchConfig, OnFailure, SweepGrid};

fn stock_grid(cfg: &LaunchConfig) -> SweepGrid {
    SweepGrid::new(
        cfg.datasets.clone(),
        cfg.batch_sizes.clone(),
        cfg.dim_hiddens.clone(),
    )
    .unwrap()
}

#[test]
fn successful_sweep_runs_every_job() {
    let cfg = LaunchConfig {
        trainer: PathBuf::from("true"),
        ..LaunchConfig::default()
    };
    let grid = stock_grid(&cfg);

    let report = run_sweep(&cfg, &grid, 0, OnFailure::Continue);
    assert_eq!(report.len(), 2);
    assert!(report.succeeded());
    assert_eq!(report.failed(), 0);
}

#[test]
fn default_policy_continues_past_failures() {
    let cfg = LaunchConfig {
        trainer: PathBuf::from("false"),
        ..LaunchConfig::default()
    };
    let grid = stock_grid(&cfg);

    let report = run_sweep(&cfg, &grid, 0, OnFailure::Continue);
    assert_eq!(report.len(), 2, "second dataset should still run");
    assert_eq!(report.failed(), 2);
    assert!(!report.succeeded());
}

#[test]
fn abort_policy_stops_after_first_failure() {
    let cfg = LaunchConfig {
        trainer: PathBuf::from("false"),
        ..LaunchConfig::default()
    };
    let grid = stock_grid(&cfg);

    let report = run_sweep(&cfg, &grid, 0, OnFailure::Abort);
    assert_eq!(report.len(), 1);
    assert!(!report.succeeded());
}

#[test]
fn missing_trainer_is_a_recorded_outcome() {
    let cfg = LaunchConfig {
        trainer: PathBuf::from("/definitely/not/a/trainer"),
        ..LaunchConfig::default()
    };
    let grid = stock_grid(&cfg);

    let report = run_sweep(&cfg, &grid, 0, OnFailure::Continue);
    assert_eq!(report.len(), 2);
    assert!(report.outcomes.iter().all(|o| o.error.is_some()));
    assert!(!report.succeeded());
}

#[test]
fn report_serializes_one_entry_per_job() {
    let cfg = LaunchConfig {
        trainer: PathBuf::from("true"),
        ..LaunchConfig::default()
    };
    let grid = stock_grid(&cfg);

    let report = run_sweep(&cfg, &grid, 2, OnFailure::Continue);
    let value = serde_json::to_value(&report).unwrap();
    let outcomes = value["outcomes"].as_array().unwrap();
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0]["job"]["dataset"], "DD");
    assert_eq!(outcomes[1]["job"]["dataset"], "ENZYMES");
}
