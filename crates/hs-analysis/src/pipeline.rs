//! Sequential orchestration of every analysis stage.
//!
//! anchors -> full-grid summaries -> normalized environment tables ->
//! global best -> release order -> level tables

use std::collections::BTreeMap;

use hs_types::{
    AnalysisError, Dataset, GlobalBestConfig, GlobalBestRow, HsResult, HyperparameterConfig,
    LevelRow, MetricKind, MetricRecord, QuantileRow, ReleaseLevel, ReleaseOrderRow, SummaryRow,
};

use crate::aggregate::GridAggregator;
use crate::config::PipelineConfig;
use crate::extract::MetricExtractor;
use crate::levels::build_level_rows;
use crate::normalize::common_length;
use crate::penalty::{EnvTable, PenaltyPolicy, ScopeNormalizer};
use crate::quantile::{QuantileAnchor, QuantileEstimator};
use crate::release::{ReleaseSearch, ReleaseSolver};

/// Anchors and comparison window of one usable environment.
#[derive(Debug, Clone, PartialEq)]
pub struct EnvContext {
    pub anchor: QuantileAnchor,
    pub min_t: usize,
}

/// Ranking result of one (algorithm, metric).
#[derive(Debug, Clone, PartialEq)]
pub struct AlgorithmOutcome {
    pub alg: String,
    pub metric: MetricKind,
    /// Environments that contributed a table.
    pub envs: Vec<String>,
    pub global_best: GlobalBestConfig,
    pub search: ReleaseSearch,
}

#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub quantiles: Vec<QuantileRow>,
    /// Full-grid metrics, per algorithm.
    pub summaries: BTreeMap<String, Vec<SummaryRow>>,
    pub global_best: Vec<GlobalBestRow>,
    pub release_orders: Vec<ReleaseOrderRow>,
    pub levels: BTreeMap<(String, MetricKind), Vec<LevelRow>>,
    pub outcomes: Vec<AlgorithmOutcome>,
    /// Environments dropped for missing data or degenerate anchors.
    pub skipped_envs: Vec<String>,
}

pub struct Pipeline {
    config: PipelineConfig,
    estimator: QuantileEstimator,
    extractor: MetricExtractor,
    normalizer: ScopeNormalizer,
    aggregator: GridAggregator,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> HsResult<Self> {
        config.validate()?;
        Ok(Self {
            estimator: QuantileEstimator::new(),
            extractor: MetricExtractor::new(
                config.grid_base,
                config.min_crossing_runs,
                config.crossing_rank,
            ),
            normalizer: ScopeNormalizer::new(PenaltyPolicy::new(config.penalty_factor)),
            aggregator: GridAggregator::new(config.global_best_summary, config.require_full_coverage),
            config,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(&self, dataset: &Dataset) -> HsResult<PipelineReport> {
        let mut report = PipelineReport::default();
        if dataset.is_empty() {
            tracing::warn!("No reward logs to analyse");
            return Ok(report);
        }

        let envs = select("environment", &self.config.environments, dataset.envs());
        let contexts = self.env_contexts(dataset, &envs, &mut report);

        for alg in select("algorithm", &self.config.algorithms, dataset.algorithms()) {
            let summaries = self.summarize(dataset, &alg, &contexts);
            if summaries.is_empty() {
                return Err(AnalysisError::NoValidEnvironment {
                    alg,
                    metric: "any".to_string(),
                }
                .into());
            }

            let mut ranked = 0;
            for metric in &self.config.metrics {
                let Some((outcome, levels)) = self.rank(dataset, &alg, *metric, &summaries, &contexts)? else {
                    continue;
                };
                report.global_best.push(GlobalBestRow::new(
                    &alg,
                    *metric,
                    &outcome.global_best.config,
                    outcome.global_best.score,
                ));
                for (rank, (hp, cost)) in outcome
                    .search
                    .order
                    .as_slice()
                    .iter()
                    .zip(&outcome.search.selected_costs)
                    .enumerate()
                {
                    report.release_orders.push(ReleaseOrderRow {
                        alg: alg.clone(),
                        metric: *metric,
                        rank: rank + 1,
                        hyperparameter: *hp,
                        avg_cost: *cost,
                    });
                }
                report.levels.insert((alg.clone(), *metric), levels);
                report.outcomes.push(outcome);
                ranked += 1;
            }
            if ranked == 0 {
                return Err(AnalysisError::NoValidEnvironment {
                    alg,
                    metric: "any".to_string(),
                }
                .into());
            }

            report.summaries.insert(alg, summaries);
        }

        tracing::info!(
            "Pipeline finished: {} environments, {} rankings",
            contexts.len(),
            report.outcomes.len()
        );
        Ok(report)
    }

    /// Anchors and `min_t` per environment, pooled across algorithms.
    fn env_contexts(
        &self,
        dataset: &Dataset,
        envs: &[String],
        report: &mut PipelineReport,
    ) -> BTreeMap<String, EnvContext> {
        let mut contexts = BTreeMap::new();
        for env in envs {
            let anchor = match self.estimator.anchor_for_env(dataset, env) {
                Ok(anchor) => anchor,
                Err(e) => {
                    tracing::warn!("Skipping environment {}: {}", env, e);
                    report.skipped_envs.push(env.clone());
                    continue;
                }
            };
            let Some(min_t) = common_length(dataset.for_env(env).flat_map(|s| s.runs.iter())) else {
                tracing::warn!("Skipping environment {}: every run is empty", env);
                report.skipped_envs.push(env.clone());
                continue;
            };

            report.quantiles.push(QuantileRow {
                env: env.clone(),
                p5: anchor.p5,
                p90: anchor.p90,
                p95: anchor.p95,
                min_t,
            });
            contexts.insert(env.clone(), EnvContext { anchor, min_t });
        }
        contexts
    }

    fn summarize(&self, dataset: &Dataset, alg: &str, contexts: &BTreeMap<String, EnvContext>) -> Vec<SummaryRow> {
        let mut rows = Vec::new();
        for (env, ctx) in contexts {
            let before = rows.len();
            rows.extend(
                dataset
                    .for_alg_env(alg, env)
                    .map(|set| self.extractor.summarize(set, &ctx.anchor, ctx.min_t)),
            );
            if rows.len() == before {
                tracing::warn!("No logs for {} in {}", alg, env);
            }
        }
        tracing::info!("{}: summarized {} configurations", alg, rows.len());
        rows
    }

    fn tables(&self, alg: &str, metric: MetricKind, summaries: &[SummaryRow]) -> Vec<EnvTable> {
        let mut by_env: BTreeMap<&str, Vec<(HyperparameterConfig, Option<f64>)>> = BTreeMap::new();
        for row in summaries {
            by_env
                .entry(row.env.as_str())
                .or_default()
                .push((row.config(), row.metric(metric)));
        }
        by_env
            .into_iter()
            .filter_map(|(env, records)| {
                let table = self.normalizer.env_table(env, metric, &records);
                if table.is_none() {
                    tracing::warn!("{}/{}: environment {} dropped", alg, metric, env);
                }
                table
            })
            .collect()
    }

    fn rank(
        &self,
        dataset: &Dataset,
        alg: &str,
        metric: MetricKind,
        summaries: &[SummaryRow],
        contexts: &BTreeMap<String, EnvContext>,
    ) -> HsResult<Option<(AlgorithmOutcome, Vec<LevelRow>)>> {
        let tables = self.tables(alg, metric, summaries);
        if tables.is_empty() {
            tracing::warn!("{}/{}: no environment has a defined value, skipping", alg, metric);
            return Ok(None);
        }

        let records: Vec<MetricRecord> = tables
            .iter()
            .flat_map(|t| t.rows.iter().map(|(c, v)| MetricRecord::new(*c, t.env.clone(), Some(*v))))
            .collect();
        let global_best = self
            .aggregator
            .global_best(&records, metric.direction(), tables.len())
            .ok_or_else(|| AnalysisError::NoGlobalBest {
                alg: alg.to_string(),
                metric: metric.to_string(),
            })?;

        let search = ReleaseSolver::new(&tables, global_best, metric.direction()).solve(alg, metric.name())?;
        tracing::info!("{}/{}: release order {}", alg, metric, search.order);

        let envs: Vec<(String, Vec<HyperparameterConfig>)> = tables
            .iter()
            .map(|t| (t.env.clone(), t.rows.iter().map(|(c, _)| *c).collect()))
            .collect();
        let levels = build_level_rows(alg, metric, &envs, &search.order, &global_best, |env, config, level| {
            self.level_value(dataset, alg, metric, &tables, summaries, contexts, env, config, level)
        });

        let outcome = AlgorithmOutcome {
            alg: alg.to_string(),
            metric,
            envs: envs.into_iter().map(|(env, _)| env).collect(),
            global_best,
            search,
        };
        Ok(Some((outcome, levels)))
    }

    /// Metric of `config` at `level`. AUC is recomputed over the level's
    /// window, step metrics keep their normalized full-grid value and the
    /// trajectory metric is rescaled by the level's multiplicity.
    #[allow(clippy::too_many_arguments)]
    fn level_value(
        &self,
        dataset: &Dataset,
        alg: &str,
        metric: MetricKind,
        tables: &[EnvTable],
        summaries: &[SummaryRow],
        contexts: &BTreeMap<String, EnvContext>,
        env: &str,
        config: &HyperparameterConfig,
        level: ReleaseLevel,
    ) -> Option<f64> {
        let table = tables.iter().find(|t| t.env == env)?;
        match metric {
            MetricKind::NormalizedAuc => {
                let ctx = contexts.get(env)?;
                let set = dataset.for_alg_env(alg, env).find(|s| s.key.config == *config)?;
                self.extractor
                    .auc(&set.runs, &ctx.anchor, ctx.min_t, level)
                    .map(|auc| table.scale.apply(auc))
            }
            MetricKind::StepToP90 | MetricKind::StepToP95 => {
                table.rows.iter().find(|(c, _)| c == config).map(|(_, v)| *v)
            }
            MetricKind::TrajectoryMetric => {
                let row = summaries.iter().find(|r| r.env == env && r.config() == *config)?;
                self.extractor.trajectory_metric(row.trajectory_count, level)
            }
        }
    }
}

/// Configured names that are present in the data, or everything found
/// when nothing is configured.
fn select(what: &str, configured: &[String], found: Vec<String>) -> Vec<String> {
    if configured.is_empty() {
        return found;
    }
    configured
        .iter()
        .filter(|name| {
            let present = found.contains(name);
            if !present {
                tracing::warn!("Configured {} {} has no reward logs", what, name);
            }
            present
        })
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_types::{RewardTrajectory, RunKey, RunSet};

    fn set(env: &str, alg: &str, lr: f64, runs: Vec<Vec<f64>>) -> RunSet {
        RunSet::new(
            RunKey::new(HyperparameterConfig::new(lr, 0.1, 0.1, 0.1), env, alg),
            runs.into_iter().map(RewardTrajectory::new).collect(),
        )
    }

    #[test]
    fn select_keeps_configured_order_and_drops_absent() {
        let found = vec!["ant".to_string(), "hopper".to_string()];
        assert_eq!(select("environment", &[], found.clone()), found);
        assert_eq!(
            select(
                "environment",
                &["hopper".to_string(), "pong".to_string(), "ant".to_string()],
                found
            ),
            vec!["hopper".to_string(), "ant".to_string()]
        );
    }

    #[test]
    fn empty_dataset_gives_empty_report() {
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let report = pipeline.run(&Dataset::default()).unwrap();
        assert!(report.quantiles.is_empty());
        assert!(report.outcomes.is_empty());
    }

    #[test]
    fn degenerate_environment_is_skipped() {
        let dataset = Dataset::new(vec![
            set("flat", "ppo", 0.1, vec![vec![2.0; 4]]),
            set("ant", "ppo", 0.1, vec![vec![1.0, 2.0, 3.0, 4.0]]),
        ]);
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let report = pipeline.run(&dataset).unwrap();
        assert_eq!(report.skipped_envs, vec!["flat".to_string()]);
        assert_eq!(report.quantiles.len(), 1);
        assert_eq!(report.summaries["ppo"].len(), 1);
    }

    #[test]
    fn algorithm_without_valid_environment_is_fatal() {
        let dataset = Dataset::new(vec![
            set("flat", "ppo", 0.1, vec![vec![2.0; 4]]),
            set("ant", "sac", 0.1, vec![vec![1.0, 2.0, 3.0, 4.0]]),
        ]);
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let err = pipeline.run(&dataset).unwrap_err();
        assert!(err.to_string().contains("ppo"));
    }

    #[test]
    fn algorithm_that_never_reaches_the_anchors_is_fatal() {
        let strong: Vec<f64> = (1..=10).map(|i| 10.0 * i as f64).collect();
        let weak: Vec<f64> = (1..=10).map(|i| 0.1 * i as f64).collect();
        let dataset = Dataset::new(vec![
            set("ant", "strong", 0.1, vec![strong.clone(); 3]),
            set("ant", "strong", 0.2, vec![strong; 3]),
            set("ant", "weak", 0.1, vec![weak.clone(); 3]),
            set("ant", "weak", 0.2, vec![weak; 3]),
        ]);
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let err = pipeline.run(&dataset).unwrap_err();
        assert!(matches!(
            err,
            hs_types::HsError::Analysis(AnalysisError::NoValidEnvironment { ref alg, .. }) if alg == "weak"
        ));
    }
}
