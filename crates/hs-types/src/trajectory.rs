use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::errors::DataError;
use crate::hyperparams::RunKey;

/// Reward sequence of a single training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RewardTrajectory {
    rewards: Vec<f64>,
}

impl RewardTrajectory {
    pub fn new(rewards: Vec<f64>) -> Self {
        Self { rewards }
    }

    pub fn rewards(&self) -> &[f64] {
        &self.rewards
    }

    pub fn len(&self) -> usize {
        self.rewards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rewards.is_empty()
    }

    /// Leading `len` rewards (all of them if the run is shorter).
    pub fn head(&self, len: usize) -> &[f64] {
        &self.rewards[..len.min(self.rewards.len())]
    }
}

impl From<Vec<f64>> for RewardTrajectory {
    fn from(rewards: Vec<f64>) -> Self {
        Self::new(rewards)
    }
}

/// Every run recorded for one (config, env, alg) log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSet {
    pub key: RunKey,
    pub runs: Vec<RewardTrajectory>,
}

impl RunSet {
    pub fn new(key: RunKey, runs: Vec<RewardTrajectory>) -> Self {
        Self { key, runs }
    }

    /// Shortest non-empty run length, `None` when there is no such run.
    pub fn min_len(&self) -> Option<usize> {
        self.runs.iter().map(|r| r.len()).filter(|l| *l > 0).min()
    }

    /// All non-zero reward values across every run.
    pub fn nonzero_rewards(&self) -> impl Iterator<Item = f64> + '_ {
        self.runs
            .iter()
            .flat_map(|r| r.rewards().iter().copied())
            .filter(|r| *r != 0.0)
    }
}

/// Every loaded log, kept in a stable order (sorted by key) so downstream
/// iteration never depends on directory listing order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    sets: Vec<RunSet>,
}

impl Dataset {
    pub fn new(mut sets: Vec<RunSet>) -> Self {
        sets.sort_by(|a, b| a.key.cmp(&b.key));
        Self { sets }
    }

    pub fn sets(&self) -> &[RunSet] {
        &self.sets
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// Distinct environments, sorted.
    pub fn envs(&self) -> Vec<String> {
        let mut envs: Vec<String> = self.sets.iter().map(|s| s.key.env.clone()).collect();
        envs.sort();
        envs.dedup();
        envs
    }

    /// Distinct algorithms, sorted.
    pub fn algorithms(&self) -> Vec<String> {
        let mut algs: Vec<String> = self.sets.iter().map(|s| s.key.alg.clone()).collect();
        algs.sort();
        algs.dedup();
        algs
    }

    /// All logs of one environment, across algorithms.
    pub fn for_env<'a>(&'a self, env: &'a str) -> impl Iterator<Item = &'a RunSet> + 'a {
        self.sets.iter().filter(move |s| s.key.env == env)
    }

    pub fn for_alg_env<'a>(
        &'a self,
        alg: &'a str,
        env: &'a str,
    ) -> impl Iterator<Item = &'a RunSet> + 'a {
        self.sets
            .iter()
            .filter(move |s| s.key.alg == alg && s.key.env == env)
    }
}

/// Dense reward log shaped `(experiments, steps, substeps, envs)` in
/// row-major order, as written by vectorized training loops.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardTensor {
    shape: [usize; 4],
    data: Vec<f64>,
}

impl RewardTensor {
    pub fn new(shape: [usize; 4], data: Vec<f64>) -> Result<Self, DataError> {
        let expected = shape.iter().product::<usize>();
        if expected != data.len() {
            return Err(DataError::InvalidShape {
                shape,
                len: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> [usize; 4] {
        self.shape
    }

    /// Flatten each experiment into one run.
    ///
    /// Zero entries are padding. A finished episode's return is repeated in
    /// every slot until the next episode ends, so each value is kept once,
    /// in first-seen order.
    pub fn to_runs(&self) -> Vec<RewardTrajectory> {
        let per_experiment = self.shape[1] * self.shape[2] * self.shape[3];
        (0..self.shape[0])
            .map(|exp| {
                let slice = &self.data[exp * per_experiment..(exp + 1) * per_experiment];
                let mut seen = HashSet::new();
                let mut rewards = Vec::new();
                for &r in slice {
                    if r == 0.0 || r.is_nan() {
                        continue;
                    }
                    if seen.insert(r.to_bits()) {
                        rewards.push(r);
                    }
                }
                RewardTrajectory::new(rewards)
            })
            .collect()
    }
}
