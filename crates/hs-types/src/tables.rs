//! Flat row types for the tabular outputs consumed by plotting scripts.
//!
//! Rows are flat on purpose: the CSV serializer cannot write nested
//! structs, so every hyperparameter gets its own column.

use serde::{Deserialize, Serialize};

use crate::hyperparams::{Hyperparameter, HyperparameterConfig};
use crate::metrics::{MetricKind, ReleaseLevel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileRow {
    pub env: String,
    pub p5: f64,
    pub p90: f64,
    pub p95: f64,
    pub min_t: usize,
}

/// Full-grid (N=4) metrics of one log file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub actorlr: f64,
    pub criticlr: f64,
    pub entcoef: f64,
    pub gaelambda: f64,
    pub env: String,
    pub alg: String,
    pub trajectory_count: Option<usize>,
    pub trajectory_metric: Option<f64>,
    pub normalized_auc: Option<f64>,
    pub step_to_p90: Option<usize>,
    pub step_to_p95: Option<usize>,
}

impl SummaryRow {
    pub fn config(&self) -> HyperparameterConfig {
        HyperparameterConfig::new(self.actorlr, self.criticlr, self.entcoef, self.gaelambda)
    }

    /// Value of `metric` as a plain float, `None` when undefined.
    pub fn metric(&self, metric: MetricKind) -> Option<f64> {
        match metric {
            MetricKind::NormalizedAuc => self.normalized_auc,
            MetricKind::StepToP90 => self.step_to_p90.map(|s| s as f64),
            MetricKind::StepToP95 => self.step_to_p95.map(|s| s as f64),
            MetricKind::TrajectoryMetric => self.trajectory_metric,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlobalBestRow {
    pub alg: String,
    pub metric: MetricKind,
    pub actorlr: f64,
    pub criticlr: f64,
    pub entcoef: f64,
    pub gaelambda: f64,
    pub score: f64,
}

impl GlobalBestRow {
    pub fn new(alg: &str, metric: MetricKind, config: &HyperparameterConfig, score: f64) -> Self {
        Self {
            alg: alg.to_string(),
            metric,
            actorlr: config.actorlr,
            criticlr: config.criticlr,
            entcoef: config.entcoef,
            gaelambda: config.gaelambda,
            score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseOrderRow {
    pub alg: String,
    pub metric: MetricKind,
    /// 1-based position in the release order.
    pub rank: usize,
    pub hyperparameter: Hyperparameter,
    /// Cross-environment average of the per-environment best group value
    /// when this hyperparameter was selected.
    pub avg_cost: f64,
}

/// One configuration visible at release level `n`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LevelRow {
    pub alg: String,
    pub env: String,
    pub metric: MetricKind,
    pub n: ReleaseLevel,
    pub actorlr: f64,
    pub criticlr: f64,
    pub entcoef: f64,
    pub gaelambda: f64,
    pub value: Option<f64>,
}

impl LevelRow {
    pub fn new(
        alg: &str,
        env: &str,
        metric: MetricKind,
        n: ReleaseLevel,
        config: &HyperparameterConfig,
        value: Option<f64>,
    ) -> Self {
        Self {
            alg: alg.to_string(),
            env: env.to_string(),
            metric,
            n,
            actorlr: config.actorlr,
            criticlr: config.criticlr,
            entcoef: config.entcoef,
            gaelambda: config.gaelambda,
            value,
        }
    }

    pub fn config(&self) -> HyperparameterConfig {
        HyperparameterConfig::new(self.actorlr, self.criticlr, self.entcoef, self.gaelambda)
    }
}
