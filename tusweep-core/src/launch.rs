use crate::{
    config::LaunchConfig,
    sweep::{SweepGrid, TrainJob},
};
use anyhow::Result;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use std::time::Instant;
use tracing::{debug, warn};

/// Device selection is bound on each spawned trainer, never exported into
/// the launcher's own environment.
pub const DEVICE_ENV: &str = "CUDA_VISIBLE_DEVICES";

/// What to do when a training run fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
pub enum OnFailure {
    /// Record the failure and move on to the remaining jobs.
    #[default]
    Continue,
    /// Stop the sweep after the first failing job.
    Abort,
}

/// Method to output the run report.
#[derive(Debug, Clone, Copy, Default, ValueEnum, Serialize, Deserialize)]
pub enum Output {
    #[default]
    Tty,
    Json,
}

/// A fully resolved trainer invocation for one job.
#[derive(Debug, Clone, Serialize)]
pub struct TrainCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub envs: Vec<(String, String)>,
}

impl TrainCommand {
    pub fn new(cfg: &LaunchConfig, job: &TrainJob, device: u32) -> Self {
        let mut args = vec![cfg.script.display().to_string()];
        args.push("--dataset".into());
        args.push(job.dataset.clone());
        args.push("--batch-size".into());
        args.push(job.batch_size.to_string());
        args.push("--dim-hidden".into());
        args.push(job.dim_hidden.to_string());
        if let Some(seed) = cfg.seed {
            args.push("--seed".into());
            args.push(seed.to_string());
        }
        if let Some(epochs) = cfg.epochs {
            args.push("--epochs".into());
            args.push(epochs.to_string());
        }
        if let Some(outdir) = &cfg.outdir {
            args.push("--outdir".into());
            args.push(outdir.display().to_string());
        }
        if !cfg.extract_node_feature {
            // flag name is owned by the trainer's argparse surface
            args.push("--not_extract_node_feature".into());
        }
        args.extend(cfg.extra_args.iter().cloned());
        Self {
            program: cfg.trainer.clone(),
            args,
            envs: vec![(DEVICE_ENV.to_string(), device.to_string())],
        }
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, val) in &self.envs {
            cmd.env(key, val);
        }
        cmd
    }

    /// Shell-style rendering for dry runs and progress lines.
    pub fn render(&self) -> String {
        let mut parts: Vec<String> = self
            .envs
            .iter()
            .map(|(key, val)| format!("{key}={val}"))
            .collect();
        parts.push(self.program.display().to_string());
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job: TrainJob,
    /// Exit code of the trainer; `None` when it was killed by a signal or
    /// never spawned.
    pub exit_code: Option<i32>,
    /// Spawn error, when the trainer could not be started at all.
    pub error: Option<String>,
    pub seconds: f64,
}

impl JobOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    pub outcomes: Vec<JobOutcome>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.outcomes.iter().all(JobOutcome::success)
    }

    pub fn failed(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.success()).count()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn render(&self, output: Output) -> Result<()> {
        match output {
            Output::Tty => {
                for outcome in &self.outcomes {
                    let state = match (&outcome.error, outcome.exit_code) {
                        (Some(err), _) => format!("spawn failed: {err}"),
                        (None, Some(0)) => "ok".to_string(),
                        (None, Some(code)) => format!("exit {code}"),
                        (None, None) => "killed".to_string(),
                    };
                    println!(
                        "{} batch={} dim={}: {} ({:.1}s)",
                        outcome.job.dataset,
                        outcome.job.batch_size,
                        outcome.job.dim_hidden,
                        state,
                        outcome.seconds,
                    );
                }
                println!(
                    "{} succeeded, {} failed",
                    self.len() - self.failed(),
                    self.failed()
                );
            }
            Output::Json => {
                serde_json::to_writer_pretty(std::io::stdout(), self)?;
                println!();
            }
        }
        Ok(())
    }
}

/// Run every job in the grid strictly sequentially, blocking on each child
/// until it exits. Failures are outcomes, not errors: the policy decides
/// whether the sweep keeps going, and the report carries what happened.
pub fn run_sweep(
    cfg: &LaunchConfig,
    grid: &SweepGrid,
    device: u32,
    policy: OnFailure,
) -> RunReport {
    let total = grid.len();
    let mut report = RunReport::default();
    for (idx, job) in grid.jobs().enumerate() {
        let train = TrainCommand::new(cfg, &job, device);
        println!("[{}/{}] {}", idx + 1, total, train.render());
        let start = Instant::now();
        let outcome = match train.command().status() {
            Ok(status) => {
                debug!(?status, dataset = %job.dataset, "trainer finished");
                JobOutcome {
                    job,
                    exit_code: status.code(),
                    error: None,
                    seconds: start.elapsed().as_secs_f64(),
                }
            }
            Err(err) => JobOutcome {
                job,
                exit_code: None,
                error: Some(err.to_string()),
                seconds: start.elapsed().as_secs_f64(),
            },
        };
        let ok = outcome.success();
        if !ok {
            warn!(
                dataset = %outcome.job.dataset,
                exit_code = ?outcome.exit_code,
                "training run failed"
            );
        }
        report.outcomes.push(outcome);
        if !ok && policy == OnFailure::Abort {
            break;
        }
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job() -> TrainJob {
        TrainJob {
            dataset: "DD".to_string(),
            batch_size: 128,
            dim_hidden: 128,
        }
    }

    fn arg_pair(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn command_carries_sweep_flags_and_device_binding() {
        let cfg = LaunchConfig::default();
        let cmd = TrainCommand::new(&cfg, &job(), 2);
        assert_eq!(cmd.program, PathBuf::from("python"));
        assert_eq!(cmd.args[0], "experiments/train_TUs.py");
        assert_eq!(arg_pair(&cmd.args, "--dataset").as_deref(), Some("DD"));
        assert_eq!(arg_pair(&cmd.args, "--batch-size").as_deref(), Some("128"));
        assert_eq!(arg_pair(&cmd.args, "--dim-hidden").as_deref(), Some("128"));
        assert_eq!(cmd.envs, [(DEVICE_ENV.to_string(), "2".to_string())]);
    }

    #[test]
    fn node_feature_extraction_is_disabled_by_default() {
        let mut cfg = LaunchConfig::default();
        let cmd = TrainCommand::new(&cfg, &job(), 0);
        assert!(cmd.args.iter().any(|a| a == "--not_extract_node_feature"));

        cfg.extract_node_feature = true;
        let cmd = TrainCommand::new(&cfg, &job(), 0);
        assert!(!cmd.args.iter().any(|a| a == "--not_extract_node_feature"));
    }

    #[test]
    fn passthrough_flags_only_appear_when_set() {
        let mut cfg = LaunchConfig::default();
        let cmd = TrainCommand::new(&cfg, &job(), 0);
        assert!(!cmd.args.iter().any(|a| a == "--seed"));
        assert!(!cmd.args.iter().any(|a| a == "--epochs"));
        assert!(!cmd.args.iter().any(|a| a == "--outdir"));

        cfg.seed = Some(0);
        cfg.epochs = Some(200);
        cfg.outdir = Some(PathBuf::from("logs/dd"));
        cfg.extra_args = vec!["--layer-norm".to_string()];
        let cmd = TrainCommand::new(&cfg, &job(), 0);
        assert_eq!(arg_pair(&cmd.args, "--seed").as_deref(), Some("0"));
        assert_eq!(arg_pair(&cmd.args, "--epochs").as_deref(), Some("200"));
        assert_eq!(arg_pair(&cmd.args, "--outdir").as_deref(), Some("logs/dd"));
        assert_eq!(cmd.args.last().map(String::as_str), Some("--layer-norm"));
    }

    #[test]
    fn render_prefixes_the_device_binding() {
        let cfg = LaunchConfig::default();
        let rendered = TrainCommand::new(&cfg, &job(), 3).render();
        assert!(rendered.starts_with("CUDA_VISIBLE_DEVICES=3 python "));
        assert!(rendered.contains("--dataset DD"));
    }

    #[test]
    fn report_counts_failures() {
        let mut report = RunReport::default();
        report.outcomes.push(JobOutcome {
            job: job(),
            exit_code: Some(0),
            error: None,
            seconds: 1.0,
        });
        assert!(report.succeeded());
        report.outcomes.push(JobOutcome {
            job: job(),
            exit_code: Some(1),
            error: None,
            seconds: 1.0,
        });
        assert!(!report.succeeded());
        assert_eq!(report.failed(), 1);
        assert_eq!(report.len(), 2);
    }
}
