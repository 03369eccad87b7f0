//! Metric kinds, release levels and the derived artifacts that flow
//! between pipeline stages.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::{AnalysisError, HsError};
use crate::hyperparams::{Hyperparameter, HyperparameterConfig};

/// Whether a metric is better when larger or smaller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectiveDirection {
    Maximize,
    Minimize,
}

impl ObjectiveDirection {
    /// True when `candidate` is strictly better than `incumbent`.
    pub fn improves(&self, candidate: f64, incumbent: f64) -> bool {
        match self {
            Self::Maximize => candidate > incumbent,
            Self::Minimize => candidate < incumbent,
        }
    }

    /// The best of `values` in this direction, `None` for an empty input.
    pub fn best_of(&self, values: impl IntoIterator<Item = f64>) -> Option<f64> {
        values.into_iter().fold(None, |best, v| match best {
            Some(b) if !self.improves(v, b) => Some(b),
            _ => Some(v),
        })
    }
}

/// The per-configuration metrics the pipeline knows how to rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    /// Mean over runs of the summed normalized reward, rescaled by `3^N`.
    NormalizedAuc,
    /// First step at which the run-averaged reward reaches p90.
    StepToP90,
    /// First step at which the run-averaged reward reaches p95.
    StepToP95,
    /// 5th-smallest per-run p95 crossing, rescaled by `3^N`.
    TrajectoryMetric,
}

impl MetricKind {
    pub const ALL: [MetricKind; 4] = [
        MetricKind::NormalizedAuc,
        MetricKind::StepToP90,
        MetricKind::StepToP95,
        MetricKind::TrajectoryMetric,
    ];

    pub fn direction(&self) -> ObjectiveDirection {
        match self {
            Self::NormalizedAuc => ObjectiveDirection::Maximize,
            Self::StepToP90 | Self::StepToP95 | Self::TrajectoryMetric => {
                ObjectiveDirection::Minimize
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NormalizedAuc => "normalized_auc",
            Self::StepToP90 => "step_to_p90",
            Self::StepToP95 => "step_to_p95",
            Self::TrajectoryMetric => "trajectory_metric",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = HsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|m| m.name() == s)
            .ok_or_else(|| HsError::Validation(format!("unknown metric: {s}")))
    }
}

/// Number of released hyperparameters, `N` in `0..=4`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ReleaseLevel(u8);

impl ReleaseLevel {
    pub const FULL_GRID: ReleaseLevel = ReleaseLevel(4);

    pub fn new(level: u8) -> Result<Self, AnalysisError> {
        if level as usize > Hyperparameter::ALL.len() {
            return Err(AnalysisError::InvalidLevel { level });
        }
        Ok(Self(level))
    }

    pub fn all() -> impl Iterator<Item = ReleaseLevel> {
        (0..=Hyperparameter::ALL.len() as u8).map(ReleaseLevel)
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// `grid_base^N`: how many grid points the released dimensions span.
    /// `None` when the power does not fit in `usize`.
    pub fn multiplicity(&self, grid_base: usize) -> Option<usize> {
        grid_base.checked_pow(self.0 as u32)
    }

    /// Per-configuration truncation window `min_t / grid_base^N`, 0 when
    /// the multiplicity overflows.
    pub fn window(&self, min_t: usize, grid_base: usize) -> usize {
        self.multiplicity(grid_base).map_or(0, |m| min_t / m)
    }
}

impl TryFrom<u8> for ReleaseLevel {
    type Error = AnalysisError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Self::new(level)
    }
}

impl From<ReleaseLevel> for u8 {
    fn from(level: ReleaseLevel) -> Self {
        level.0
    }
}

impl fmt::Display for ReleaseLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N={}", self.0)
    }
}

/// One metric value for a (config, environment) pair. `None` means the
/// metric is undefined and must stay excluded from aggregates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    pub config: HyperparameterConfig,
    pub env: String,
    pub value: Option<f64>,
}

impl MetricRecord {
    pub fn new(config: HyperparameterConfig, env: impl Into<String>, value: Option<f64>) -> Self {
        Self {
            config,
            env: env.into(),
            value,
        }
    }
}

/// Order in which hyperparameters are released from the global best.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseOrder {
    order: Vec<Hyperparameter>,
}

impl ReleaseOrder {
    /// Build from a full permutation of the four hyperparameters.
    pub fn new(order: Vec<Hyperparameter>) -> Result<Self, HsError> {
        let mut seen = order.clone();
        seen.sort();
        seen.dedup();
        if order.len() != Hyperparameter::ALL.len() || seen.len() != order.len() {
            return Err(HsError::Validation(format!(
                "release order must be a permutation of all hyperparameters, got {order:?}"
            )));
        }
        Ok(Self { order })
    }

    pub fn as_slice(&self) -> &[Hyperparameter] {
        &self.order
    }

    /// Hyperparameters released at `level`.
    pub fn released(&self, level: ReleaseLevel) -> &[Hyperparameter] {
        &self.order[..level.get() as usize]
    }

    /// Hyperparameters still pinned at `level`, in canonical order.
    pub fn fixed(&self, level: ReleaseLevel) -> Vec<Hyperparameter> {
        let released = self.released(level);
        Hyperparameter::ALL
            .iter()
            .copied()
            .filter(|hp| !released.contains(hp))
            .collect()
    }
}

impl fmt::Display for ReleaseOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.order.iter().map(|hp| hp.name()).collect();
        write!(f, "[{}]", names.join(", "))
    }
}

/// The configuration all non-released hyperparameters are pinned to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlobalBestConfig {
    pub config: HyperparameterConfig,
    /// Aggregate cross-environment score that selected it.
    pub score: f64,
}
