use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_NAME: &str = "tusweep.toml";
const CONFIG_ENV: &str = "TUSWEEP_CONFIG";

/// Resolved launcher configuration: defaults, overlaid by an optional TOML
/// file, overlaid by command-line flags (done in `cli`).
#[derive(Debug, Clone)]
pub struct LaunchConfig {
    /// Program that runs the trainer, usually a Python interpreter.
    pub trainer: PathBuf,
    /// Training script handed to the trainer as its first argument.
    pub script: PathBuf,
    pub datasets: Vec<String>,
    pub batch_sizes: Vec<usize>,
    pub dim_hiddens: Vec<usize>,
    /// Forwarded to the trainer only when set.
    pub seed: Option<u64>,
    pub epochs: Option<usize>,
    pub outdir: Option<PathBuf>,
    /// The trainer extracts node features from edges unless told not to;
    /// the sweep disables extraction by default.
    pub extract_node_feature: bool,
    /// Appended verbatim to every invocation.
    pub extra_args: Vec<String>,
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self {
            trainer: PathBuf::from("python"),
            script: PathBuf::from("experiments/train_TUs.py"),
            datasets: vec!["DD".to_string(), "ENZYMES".to_string()],
            batch_sizes: vec![128],
            dim_hiddens: vec![128],
            seed: None,
            epochs: None,
            outdir: None,
            extract_node_feature: false,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct ConfigFile {
    trainer: Option<PathBuf>,
    script: Option<PathBuf>,
    sweep: Option<SweepSection>,
    passthrough: Option<PassthroughSection>,
}

#[derive(Debug, Deserialize, Default)]
struct SweepSection {
    datasets: Option<Vec<String>>,
    batch_sizes: Option<Vec<usize>>,
    dim_hiddens: Option<Vec<usize>>,
}

#[derive(Debug, Deserialize, Default)]
struct PassthroughSection {
    seed: Option<u64>,
    epochs: Option<usize>,
    outdir: Option<PathBuf>,
    extract_node_feature: Option<bool>,
    extra_args: Option<Vec<String>>,
}

impl LaunchConfig {
    /// Load configuration. An explicitly requested file must exist and parse;
    /// the implicit candidates (`TUSWEEP_CONFIG`, then `tusweep.toml` in the
    /// working directory) are skipped silently when absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_path(path);
        }
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::from_path(Path::new(&path));
        }
        let default = Path::new(DEFAULT_CONFIG_NAME);
        if default.exists() {
            return Self::from_path(default);
        }
        Ok(Self::default())
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let file: ConfigFile = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(Self::from_file(file))
    }

    fn from_file(file: ConfigFile) -> Self {
        let mut cfg = Self::default();
        if let Some(trainer) = file.trainer {
            cfg.trainer = trainer;
        }
        if let Some(script) = file.script {
            cfg.script = script;
        }
        if let Some(sweep) = file.sweep {
            if let Some(datasets) = sweep.datasets {
                cfg.datasets = datasets;
            }
            if let Some(batch_sizes) = sweep.batch_sizes {
                cfg.batch_sizes = batch_sizes;
            }
            if let Some(dim_hiddens) = sweep.dim_hiddens {
                cfg.dim_hiddens = dim_hiddens;
            }
        }
        if let Some(passthrough) = file.passthrough {
            cfg.seed = passthrough.seed;
            cfg.epochs = passthrough.epochs;
            cfg.outdir = passthrough.outdir;
            if let Some(extract) = passthrough.extract_node_feature {
                cfg.extract_node_feature = extract;
            }
            cfg.extra_args = passthrough.extra_args.unwrap_or_default();
        }
        cfg
    }
}
