//! Per-configuration metric extraction.
//!
//! All metrics are computed from raw runs and the environment's
//! [`QuantileAnchor`]. Undefined values are `None` and stay `None`.

use hs_types::{ReleaseLevel, RewardTrajectory, RunSet, SummaryRow};

use crate::normalize::mean_trajectory;
use crate::quantile::{QuantileAnchor, Threshold};

/// First 1-based index where `rewards` reaches `threshold`.
pub fn first_crossing(rewards: &[f64], threshold: f64) -> Option<usize> {
    rewards.iter().position(|r| *r >= threshold).map(|i| i + 1)
}

/// Stateless metric calculator parameterized by the grid shape and the
/// trajectory-count statistic.
#[derive(Debug, Clone)]
pub struct MetricExtractor {
    pub grid_base: usize,
    /// Runs that must cross p95 before the trajectory count is defined.
    pub min_crossing_runs: usize,
    /// 1-based rank of the crossing step reported as the count.
    pub crossing_rank: usize,
}

impl Default for MetricExtractor {
    fn default() -> Self {
        Self {
            grid_base: 3,
            min_crossing_runs: 5,
            crossing_rank: 5,
        }
    }
}

impl MetricExtractor {
    pub fn new(grid_base: usize, min_crossing_runs: usize, crossing_rank: usize) -> Self {
        Self {
            grid_base,
            min_crossing_runs,
            crossing_rank,
        }
    }

    /// Normalized area under the curve at release level `level`.
    ///
    /// Each run is cut to `min_t / grid_base^N` rewards; runs shorter than
    /// the window are left out. The mean over runs is scaled back up by
    /// `grid_base^N`.
    pub fn auc(
        &self,
        runs: &[RewardTrajectory],
        anchor: &QuantileAnchor,
        min_t: usize,
        level: ReleaseLevel,
    ) -> Option<f64> {
        let window = level.window(min_t, self.grid_base);
        if window == 0 {
            return None;
        }

        let sums: Vec<f64> = runs
            .iter()
            .filter(|run| run.len() >= window)
            .map(|run| run.head(window).iter().map(|r| anchor.normalize_value(*r)).sum())
            .collect();
        if sums.is_empty() {
            return None;
        }

        let mean = sums.iter().sum::<f64>() / sums.len() as f64;
        Some(mean * level.multiplicity(self.grid_base)? as f64)
    }

    /// Steps until the run-averaged reward, cut to `min_t`, reaches the
    /// threshold.
    pub fn step_to_threshold(
        &self,
        runs: &[RewardTrajectory],
        anchor: &QuantileAnchor,
        which: Threshold,
        min_t: usize,
    ) -> Option<usize> {
        let mean = mean_trajectory(runs)?;
        let cut = &mean[..min_t.min(mean.len())];
        first_crossing(cut, anchor.threshold(which))
    }

    /// The `crossing_rank`-th smallest per-run p95 crossing step.
    pub fn trajectory_count(&self, runs: &[RewardTrajectory], anchor: &QuantileAnchor) -> Option<usize> {
        let mut crossings: Vec<usize> = runs
            .iter()
            .filter_map(|run| first_crossing(run.rewards(), anchor.p95))
            .collect();
        if crossings.len() < self.min_crossing_runs.max(self.crossing_rank) {
            return None;
        }
        crossings.sort_unstable();
        crossings.get(self.crossing_rank.checked_sub(1)?).copied()
    }

    /// Trajectory count scaled by `grid_base^N`, undefined on overflow.
    pub fn trajectory_metric(&self, count: Option<usize>, level: ReleaseLevel) -> Option<f64> {
        let scaled = count?.checked_mul(level.multiplicity(self.grid_base)?)?;
        Some(scaled as f64)
    }

    /// Full-grid metrics of one log file.
    pub fn summarize(&self, set: &RunSet, anchor: &QuantileAnchor, min_t: usize) -> SummaryRow {
        let config = set.key.config;
        let full = ReleaseLevel::FULL_GRID;
        let trajectory_count = self.trajectory_count(&set.runs, anchor);

        let row = SummaryRow {
            actorlr: config.actorlr,
            criticlr: config.criticlr,
            entcoef: config.entcoef,
            gaelambda: config.gaelambda,
            env: set.key.env.clone(),
            alg: set.key.alg.clone(),
            trajectory_count,
            trajectory_metric: self.trajectory_metric(trajectory_count, full),
            normalized_auc: self.auc(&set.runs, anchor, min_t, full),
            step_to_p90: self.step_to_threshold(&set.runs, anchor, Threshold::P90, min_t),
            step_to_p95: self.step_to_threshold(&set.runs, anchor, Threshold::P95, min_t),
        };
        tracing::debug!(
            "{}: auc={:?} p90={:?} p95={:?} count={:?}",
            set.key,
            row.normalized_auc,
            row.step_to_p90,
            row.step_to_p95,
            row.trajectory_count
        );
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_types::{HyperparameterConfig, RunKey};

    fn anchor() -> QuantileAnchor {
        QuantileAnchor::new("ant", 1.0, 4.0, 5.0).unwrap()
    }

    fn runs(rows: &[&[f64]]) -> Vec<RewardTrajectory> {
        rows.iter().map(|r| RewardTrajectory::new(r.to_vec())).collect()
    }

    fn level(n: u8) -> ReleaseLevel {
        ReleaseLevel::new(n).unwrap()
    }

    #[test]
    fn first_crossing_is_one_based() {
        assert_eq!(first_crossing(&[1.0, 3.0, 5.0], 3.0), Some(2));
        assert_eq!(first_crossing(&[1.0, 2.0], 3.0), None);
        assert_eq!(first_crossing(&[], 0.0), None);
    }

    #[test]
    fn auc_at_level_zero_sums_full_window() {
        let ex = MetricExtractor::default();
        let r = runs(&[&[1.0, 2.0, 3.0, 4.0, 5.0], &[1.0, 2.0, 3.0]]);
        // window 3: both runs give 0 + 0.25 + 0.5
        assert_eq!(ex.auc(&r, &anchor(), 3, level(0)), Some(0.75));
    }

    #[test]
    fn auc_scales_by_multiplicity_and_skips_short_runs() {
        let ex = MetricExtractor::default();
        let r = runs(&[&[5.0; 10], &[5.0; 2]]);
        // window 9 / 3 = 3, only the first run qualifies, sum 3.0, times 3
        assert_eq!(ex.auc(&r, &anchor(), 9, level(1)), Some(9.0));
        assert_eq!(ex.auc(&r, &anchor(), 9, level(2)), Some(9.0));
        assert_eq!(ex.auc(&r, &anchor(), 9, level(3)), None);
    }

    #[test]
    fn auc_without_long_enough_runs_is_undefined() {
        let ex = MetricExtractor::default();
        let r = runs(&[&[5.0, 5.0]]);
        assert_eq!(ex.auc(&r, &anchor(), 4, level(0)), None);
    }

    #[test]
    fn step_to_threshold_uses_mean_and_min_t() {
        let ex = MetricExtractor::default();
        let r = runs(&[&[1.0, 3.0, 5.0, 5.0], &[1.0, 5.0, 3.0, 5.0]]);
        // mean = [1, 4, 4, 5]
        assert_eq!(ex.step_to_threshold(&r, &anchor(), Threshold::P90, 4), Some(2));
        assert_eq!(ex.step_to_threshold(&r, &anchor(), Threshold::P95, 4), Some(4));
        assert_eq!(ex.step_to_threshold(&r, &anchor(), Threshold::P95, 3), None);
    }

    #[test]
    fn trajectory_count_needs_enough_crossing_runs() {
        let ex = MetricExtractor::default();
        let crossing: Vec<&[f64]> = vec![
            &[5.0],
            &[1.0, 1.0, 1.0, 5.0],
            &[1.0, 5.0],
            &[1.0, 1.0, 5.0],
            &[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 5.0],
            &[1.0, 1.0, 1.0, 1.0, 5.0],
        ];
        let r = runs(&crossing);
        // crossings 1, 4, 2, 3, 7, 5 -> sorted 1, 2, 3, 4, 5, 7
        assert_eq!(ex.trajectory_count(&r, &anchor()), Some(5));
        assert_eq!(ex.trajectory_metric(Some(5), level(4)), Some(405.0));
        assert_eq!(ex.trajectory_metric(None, level(4)), None);

        let few = runs(&crossing[..4]);
        assert_eq!(ex.trajectory_count(&few, &anchor()), None);
    }

    #[test]
    fn overflowing_scale_leaves_metrics_undefined() {
        let huge = MetricExtractor::new(usize::MAX, 5, 5);
        assert_eq!(huge.trajectory_metric(Some(2), level(0)), Some(2.0));
        assert_eq!(huge.trajectory_metric(Some(2), level(1)), None);
        assert_eq!(huge.trajectory_metric(Some(1), level(4)), None);
        let r = runs(&[&[5.0; 10]]);
        assert_eq!(huge.auc(&r, &anchor(), 10, level(2)), None);

        let ex = MetricExtractor::new(1 << 20, 5, 5);
        assert_eq!(ex.trajectory_metric(Some(usize::MAX), level(1)), None);
    }

    #[test]
    fn summary_leaves_undefined_metrics_empty() {
        let ex = MetricExtractor::default();
        let key = RunKey::new(HyperparameterConfig::new(0.1, 0.2, 0.3, 0.4), "ant", "ppo");
        let ramp: &[f64] = &[1.0, 2.0, 3.0];
        let set = RunSet::new(key, runs(&[ramp, ramp, ramp]));
        let row = ex.summarize(&set, &anchor(), 3);
        assert_eq!(row.config(), set.key.config);
        assert_eq!(row.normalized_auc, None);
        assert_eq!(row.step_to_p90, None);
        assert_eq!(row.trajectory_count, None);
        assert_eq!(row.trajectory_metric, None);
    }
}
