//! Parameter space expansion
//!
//! A base algorithm config plus a grid over the learning rate, repeated
//! `num_samples` times.

use crate::rl::algorithms::{AlgorithmConfig, TrainingOverrides};

#[derive(Debug, Clone)]
pub struct ParamSpace {
    pub base: AlgorithmConfig,
    /// Grid-searched learning rates (empty = keep the base lr)
    pub lr_grid: Vec<f64>,
    /// Repeats of the whole grid
    pub num_samples: usize,
}

impl ParamSpace {
    pub fn new(base: AlgorithmConfig) -> Self {
        Self {
            base,
            lr_grid: Vec::new(),
            num_samples: 1,
        }
    }

    pub fn with_lr_grid(mut self, lr_grid: Vec<f64>) -> Self {
        self.lr_grid = lr_grid;
        self
    }

    pub fn with_num_samples(mut self, num_samples: usize) -> Self {
        self.num_samples = num_samples;
        self
    }

    /// One config per trial
    ///
    /// Seeded configs get the trial index added to the seed so repeated
    /// samples differ.
    pub fn expand(&self) -> Vec<AlgorithmConfig> {
        let lrs: Vec<Option<f64>> = if self.lr_grid.is_empty() {
            vec![None]
        } else {
            self.lr_grid.iter().copied().map(Some).collect()
        };

        let mut trials = Vec::with_capacity(self.num_samples.max(1) * lrs.len());
        for _ in 0..self.num_samples.max(1) {
            for lr in &lrs {
                let mut config = self.base.clone();
                if let Some(lr) = lr {
                    config = config.training(TrainingOverrides::new().with_lr(*lr));
                }
                if let Some(seed) = config.rollouts.seed {
                    config.rollouts.seed = Some(seed.wrapping_add(trials.len() as u64));
                }
                trials.push(config);
            }
        }
        trials
    }
}

impl From<AlgorithmConfig> for ParamSpace {
    fn from(base: AlgorithmConfig) -> Self {
        Self::new(base)
    }
}
