//! Empirical quantile anchors.
//!
//! [`QuantileEstimator`] pools every non-zero reward of one environment and
//! produces the `(p5, p90, p95)` [`QuantileAnchor`] used to put rewards from
//! different environments on a common scale.

use serde::{Deserialize, Serialize};

use hs_types::{Dataset, NormalizationError};

/// Sort finite values ascending; NaN and infinities are dropped.
pub fn sorted_finite(values: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

/// Percentile `q` (0–100) of an ascending slice with linear interpolation
/// between the two closest ranks.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> Result<f64, NormalizationError> {
    if !(0.0..=100.0).contains(&q) {
        return Err(NormalizationError::InvalidPercentile { q });
    }
    let Some(first) = sorted.first() else {
        return Err(NormalizationError::EmptyPool { env: String::new() });
    };
    if sorted.len() == 1 {
        return Ok(*first);
    }

    let pos = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}

/// Which anchor a step-to-threshold metric compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Threshold {
    P90,
    P95,
}

/// Per-environment normalization anchors. `p95 > p5` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuantileAnchor {
    pub env: String,
    pub p5: f64,
    pub p90: f64,
    pub p95: f64,
}

impl QuantileAnchor {
    pub fn new(env: impl Into<String>, p5: f64, p90: f64, p95: f64) -> Result<Self, NormalizationError> {
        if !(p5.is_finite() && p95.is_finite() && p95 > p5) {
            return Err(NormalizationError::DegenerateAnchor { p5, p95 });
        }
        Ok(Self {
            env: env.into(),
            p5,
            p90,
            p95,
        })
    }

    /// `(r - p5) / (p95 - p5)`.
    pub fn normalize_value(&self, r: f64) -> f64 {
        (r - self.p5) / (self.p95 - self.p5)
    }

    pub fn threshold(&self, which: Threshold) -> f64 {
        match which {
            Threshold::P90 => self.p90,
            Threshold::P95 => self.p95,
        }
    }
}

/// Computes [`QuantileAnchor`]s from pooled rewards.
#[derive(Debug, Clone, Default)]
pub struct QuantileEstimator;

impl QuantileEstimator {
    pub fn new() -> Self {
        Self
    }

    /// Anchor from an explicit pool. Zero rewards are padding and are
    /// ignored.
    pub fn anchor(
        &self,
        env: &str,
        pool: impl IntoIterator<Item = f64>,
    ) -> Result<QuantileAnchor, NormalizationError> {
        let sorted = sorted_finite(pool.into_iter().filter(|r| *r != 0.0));
        if sorted.is_empty() {
            return Err(NormalizationError::EmptyPool { env: env.to_string() });
        }
        let p5 = percentile_sorted(&sorted, 5.0)?;
        let p90 = percentile_sorted(&sorted, 90.0)?;
        let p95 = percentile_sorted(&sorted, 95.0)?;
        QuantileAnchor::new(env, p5, p90, p95)
    }

    /// Anchor from every run of every configuration and algorithm in `env`.
    pub fn anchor_for_env(&self, dataset: &Dataset, env: &str) -> Result<QuantileAnchor, NormalizationError> {
        let pool = dataset.for_env(env).flat_map(|set| set.nonzero_rewards());
        let anchor = self.anchor(env, pool)?;
        tracing::info!(
            "Anchors for {}: p5 = {:.4}, p90 = {:.4}, p95 = {:.4}",
            env,
            anchor.p5,
            anchor.p90,
            anchor.p95
        );
        Ok(anchor)
    }
}

/// Second-stage anchors over per-configuration AUC values of one scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AucAnchor {
    pub q5: f64,
    pub q95: f64,
}

impl AucAnchor {
    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Result<Self, NormalizationError> {
        let sorted = sorted_finite(values);
        let q5 = percentile_sorted(&sorted, 5.0)?;
        let q95 = percentile_sorted(&sorted, 95.0)?;
        if q95 <= q5 {
            return Err(NormalizationError::DegenerateAnchor { p5: q5, p95: q95 });
        }
        Ok(Self { q5, q95 })
    }

    pub fn rescale(&self, auc: f64) -> f64 {
        (auc - self.q5) / (self.q95 - self.q5)
    }
}
