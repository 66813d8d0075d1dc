use crate::{
    config::LaunchConfig,
    launch::{run_sweep, OnFailure, Output, TrainCommand},
    sweep::SweepGrid,
};
use anyhow::{bail, Result};
use clap::{CommandFactory as _, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    /// Verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
    #[clap(subcommand)]
    subcmd: SubCmd,
}

#[derive(Debug, Subcommand)]
enum SubCmd {
    /// Run the training sweep sequentially on one device
    Run {
        /// CUDA device index; defaults to 0 when omitted
        device: Option<u32>,
        /// Path to a TOML config file (default: $TUSWEEP_CONFIG, then ./tusweep.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Program that runs the trainer
        #[arg(short, long)]
        trainer: Option<PathBuf>,
        /// Training script handed to the trainer
        #[arg(short, long)]
        script: Option<PathBuf>,
        /// Dataset to sweep over (repeatable)
        #[arg(short, long = "dataset")]
        datasets: Vec<String>,
        /// Batch size to sweep over (repeatable)
        #[arg(short, long = "batch-size")]
        batch_sizes: Vec<usize>,
        /// Hidden dimension to sweep over (repeatable)
        #[arg(long = "dim-hidden")]
        dim_hiddens: Vec<usize>,
        /// Random seed forwarded to the trainer
        #[arg(long)]
        seed: Option<u64>,
        /// Number of epochs forwarded to the trainer
        #[arg(long)]
        epochs: Option<usize>,
        /// Output directory forwarded to the trainer
        #[arg(long)]
        outdir: Option<PathBuf>,
        /// Let the trainer extract node features instead of disabling extraction
        #[arg(long)]
        extract_node_feature: bool,
        /// What to do when a training run fails
        #[arg(long, value_enum, default_value_t = OnFailure::Continue)]
        on_failure: OnFailure,
        /// Print each trainer command without running anything
        #[arg(long)]
        dry_run: bool,
        /// Method to output the run report
        #[arg(short, long, value_enum, default_value_t = Output::Tty)]
        output: Output,
        /// Extra arguments appended verbatim to every trainer invocation
        #[arg(last = true)]
        extra_args: Vec<String>,
    },
    /// generate auto completion script
    GenCompletion {
        /// shell name
        shell: Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    match cli.subcmd {
        SubCmd::Run {
            device,
            config,
            trainer,
            script,
            datasets,
            batch_sizes,
            dim_hiddens,
            seed,
            epochs,
            outdir,
            extract_node_feature,
            on_failure,
            dry_run,
            output,
            extra_args,
        } => {
            let mut cfg = LaunchConfig::load(config.as_deref())?;
            if let Some(trainer) = trainer {
                cfg.trainer = trainer;
            }
            if let Some(script) = script {
                cfg.script = script;
            }
            if !datasets.is_empty() {
                cfg.datasets = datasets;
            }
            if !batch_sizes.is_empty() {
                cfg.batch_sizes = batch_sizes;
            }
            if !dim_hiddens.is_empty() {
                cfg.dim_hiddens = dim_hiddens;
            }
            if seed.is_some() {
                cfg.seed = seed;
            }
            if epochs.is_some() {
                cfg.epochs = epochs;
            }
            if outdir.is_some() {
                cfg.outdir = outdir;
            }
            if extract_node_feature {
                cfg.extract_node_feature = true;
            }
            if !extra_args.is_empty() {
                cfg.extra_args = extra_args;
            }

            let device = match device {
                Some(device) => device,
                None => {
                    println!("no device index given, defaulting to device 0");
                    0
                }
            };

            let grid = SweepGrid::new(
                cfg.datasets.clone(),
                cfg.batch_sizes.clone(),
                cfg.dim_hiddens.clone(),
            )?;

            if dry_run {
                for job in grid.jobs() {
                    println!("{}", TrainCommand::new(&cfg, &job, device).render());
                }
                return Ok(());
            }

            let report = run_sweep(&cfg, &grid, device, on_failure);
            report.render(output)?;
            if !report.succeeded() {
                bail!(
                    "{} of {} training runs failed",
                    report.failed(),
                    report.len()
                );
            }
        }
        SubCmd::GenCompletion { shell } => {
            generate(shell, &mut Cli::command(), "tusweep", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
