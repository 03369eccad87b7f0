//! Missing-data handling.
//!
//! Every aggregation path goes through [`PenaltyPolicy`] so that means and
//! minima only ever see finite values. [`ScopeNormalizer`] then rescales a
//! filled environment scope into the [`EnvTable`] the release solver and the
//! level tables consume.

use hs_types::{HyperparameterConfig, MetricKind, NormalizationError, ObjectiveDirection};

use crate::quantile::{percentile_sorted, sorted_finite, AucAnchor};

/// Finite stand-in for undefined metric values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PenaltyPolicy {
    pub factor: f64,
}

impl Default for PenaltyPolicy {
    fn default() -> Self {
        Self { factor: 10.0 }
    }
}

/// A scope after undefined entries were replaced by the penalty.
#[derive(Debug, Clone, PartialEq)]
pub struct PenalizedScope {
    pub values: Vec<f64>,
    pub penalty: f64,
    /// How many entries were filled.
    pub filled: usize,
}

impl PenaltyPolicy {
    pub fn new(factor: f64) -> Self {
        Self { factor }
    }

    /// Penalty for a scope whose defined values are `valid`.
    ///
    /// The result is strictly worse than every valid value in `direction`
    /// (for `factor > 1`). `None` when there is nothing to penalize against.
    pub fn penalty(&self, valid: &[f64], direction: ObjectiveDirection) -> Option<f64> {
        let max = valid.iter().copied().reduce(f64::max)?;
        let max_abs = valid.iter().map(|v| v.abs()).fold(0.0, f64::max);
        let magnitude = if max_abs == 0.0 { 1.0 } else { max_abs };

        Some(match direction {
            ObjectiveDirection::Minimize if max > 0.0 => self.factor * max,
            ObjectiveDirection::Minimize => self.factor * magnitude,
            ObjectiveDirection::Maximize => -self.factor * magnitude,
        })
    }

    /// Replace every undefined entry of `values` with the scope's penalty.
    /// A scope without any defined value is dropped with a warning.
    pub fn fill(
        &self,
        scope: &str,
        values: &[Option<f64>],
        direction: ObjectiveDirection,
    ) -> Option<PenalizedScope> {
        let valid: Vec<f64> = values.iter().flatten().copied().filter(|v| v.is_finite()).collect();
        let Some(penalty) = self.penalty(&valid, direction) else {
            tracing::warn!("No valid values in scope {}, dropping it", scope);
            return None;
        };

        let mut filled = 0;
        let values = values
            .iter()
            .map(|v| match v {
                Some(v) if v.is_finite() => *v,
                _ => {
                    filled += 1;
                    penalty
                }
            })
            .collect();
        if filled > 0 {
            tracing::debug!("Filled {} missing values in {} with {}", filled, scope, penalty);
        }

        Some(PenalizedScope {
            values,
            penalty,
            filled,
        })
    }
}

/// Maps a filled metric value onto the cross-environment scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScopeScale {
    /// `value / baseline`, the baseline being p5 of the filled scope.
    Ratio { baseline: f64 },
    /// `(value - q5) / (q95 - q5)` over the scope's defined values.
    Range(AucAnchor),
}

impl ScopeScale {
    pub fn apply(&self, value: f64) -> f64 {
        match self {
            Self::Ratio { baseline } => value / baseline,
            Self::Range(anchor) => anchor.rescale(value),
        }
    }

    /// Pick the scale for `metric`. Ratios need a positive baseline.
    pub fn for_metric(
        metric: MetricKind,
        scope: &PenalizedScope,
        valid: &[f64],
    ) -> Result<Self, NormalizationError> {
        match metric {
            MetricKind::NormalizedAuc => Ok(Self::Range(AucAnchor::from_values(valid.iter().copied())?)),
            MetricKind::StepToP90 | MetricKind::StepToP95 | MetricKind::TrajectoryMetric => {
                let sorted = sorted_finite(scope.values.iter().copied());
                let baseline = percentile_sorted(&sorted, 5.0)?;
                if !(baseline.is_finite() && baseline > 0.0) {
                    return Err(NormalizationError::NonPositiveBaseline { baseline });
                }
                Ok(Self::Ratio { baseline })
            }
        }
    }
}

/// One environment's normalized, penalty-filled metric values.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvTable {
    pub env: String,
    pub rows: Vec<(HyperparameterConfig, f64)>,
    /// Cost of a value combination with no rows: the penalty on this
    /// table's scale.
    pub missing_cost: f64,
    pub scale: ScopeScale,
}

/// Builds [`EnvTable`]s with one shared [`PenaltyPolicy`].
#[derive(Debug, Clone, Default)]
pub struct ScopeNormalizer {
    pub policy: PenaltyPolicy,
}

impl ScopeNormalizer {
    pub fn new(policy: PenaltyPolicy) -> Self {
        Self { policy }
    }

    /// Fill and rescale one environment's records. Returns `None` (after a
    /// warning) when the scope has no defined value or cannot be rescaled.
    pub fn env_table(
        &self,
        env: &str,
        metric: MetricKind,
        records: &[(HyperparameterConfig, Option<f64>)],
    ) -> Option<EnvTable> {
        let label = format!("{env}/{metric}");
        let raw: Vec<Option<f64>> = records.iter().map(|(_, v)| *v).collect();
        let scope = self.policy.fill(&label, &raw, metric.direction())?;

        let valid: Vec<f64> = raw.iter().flatten().copied().filter(|v| v.is_finite()).collect();
        let scale = match ScopeScale::for_metric(metric, &scope, &valid) {
            Ok(scale) => scale,
            Err(e) => {
                tracing::warn!("Cannot normalize {}: {}, skipping", label, e);
                return None;
            }
        };

        let rows = records
            .iter()
            .zip(&scope.values)
            .map(|((config, _), v)| (*config, scale.apply(*v)))
            .collect();

        Some(EnvTable {
            env: env.to_string(),
            rows,
            missing_cost: scale.apply(scope.penalty),
            scale,
        })
    }
}
