use anyhow::{bail, Result};
use serde::Serialize;

/// One trainer invocation's worth of sweep values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrainJob {
    pub dataset: String,
    pub batch_size: usize,
    pub dim_hidden: usize,
}

/// The cartesian grid of sweep values. Jobs enumerate dataset-major, then
/// batch size, then hidden dimension, so a full pass over one dataset
/// finishes before the next dataset starts.
#[derive(Debug, Clone)]
pub struct SweepGrid {
    datasets: Vec<String>,
    batch_sizes: Vec<usize>,
    dim_hiddens: Vec<usize>,
}

impl SweepGrid {
    pub fn new(
        datasets: Vec<String>,
        batch_sizes: Vec<usize>,
        dim_hiddens: Vec<usize>,
    ) -> Result<Self> {
        if datasets.is_empty() {
            bail!("sweep has no datasets");
        }
        if batch_sizes.is_empty() {
            bail!("sweep has no batch sizes");
        }
        if dim_hiddens.is_empty() {
            bail!("sweep has no hidden dimensions");
        }
        Ok(Self {
            datasets,
            batch_sizes,
            dim_hiddens,
        })
    }

    pub fn len(&self) -> usize {
        self.datasets.len() * self.batch_sizes.len() * self.dim_hiddens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn jobs(&self) -> impl Iterator<Item = TrainJob> + '_ {
        self.datasets.iter().flat_map(move |dataset| {
            self.batch_sizes.iter().flat_map(move |&batch_size| {
                self.dim_hiddens.iter().map(move |&dim_hidden| TrainJob {
                    dataset: dataset.clone(),
                    batch_size,
                    dim_hidden,
                })
            })
        })
    }
}
