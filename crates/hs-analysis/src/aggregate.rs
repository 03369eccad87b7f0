use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use hs_types::{GlobalBestConfig, HyperparameterConfig, MetricRecord, ObjectiveDirection};

/// Statistic used to combine one configuration's values across environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Summary {
    Mean,
    Sum,
}

/// Per-(config, env) mean of the defined values, in key order.
fn per_env_means(records: &[MetricRecord]) -> BTreeMap<(HyperparameterConfig, &str), f64> {
    let mut acc: BTreeMap<(HyperparameterConfig, &str), (f64, usize)> = BTreeMap::new();
    for record in records {
        let Some(value) = record.value.filter(|v| v.is_finite()) else {
            continue;
        };
        let entry = acc.entry((record.config, record.env.as_str())).or_insert((0.0, 0));
        entry.0 += value;
        entry.1 += 1;
    }
    acc.into_iter()
        .map(|(key, (sum, count))| (key, sum / count as f64))
        .collect()
}

/// Combine each configuration's values across environments.
///
/// Undefined values and missing (config, env) pairs are excluded; a
/// configuration with no defined value does not appear in the result.
pub fn aggregate(records: &[MetricRecord], summary: Summary) -> BTreeMap<HyperparameterConfig, f64> {
    let mut per_config: BTreeMap<HyperparameterConfig, Vec<f64>> = BTreeMap::new();
    for ((config, _), value) in per_env_means(records) {
        per_config.entry(config).or_default().push(value);
    }

    per_config
        .into_iter()
        .map(|(config, values)| {
            let sum: f64 = values.iter().sum();
            let stat = match summary {
                Summary::Sum => sum,
                Summary::Mean => sum / values.len() as f64,
            };
            (config, stat)
        })
        .collect()
}

/// Number of environments with a defined value, per configuration.
pub fn coverage(records: &[MetricRecord]) -> BTreeMap<HyperparameterConfig, usize> {
    let mut envs: BTreeMap<HyperparameterConfig, BTreeSet<&str>> = BTreeMap::new();
    for ((config, env), _) in per_env_means(records) {
        envs.entry(config).or_default().insert(env);
    }
    envs.into_iter().map(|(config, set)| (config, set.len())).collect()
}

/// Best aggregate in `direction`; ties keep the first configuration in
/// map order.
pub fn find_global_best(
    summaries: &BTreeMap<HyperparameterConfig, f64>,
    direction: ObjectiveDirection,
) -> Option<GlobalBestConfig> {
    let mut best: Option<GlobalBestConfig> = None;
    for (config, score) in summaries {
        let improves = match &best {
            None => true,
            Some(current) => direction.improves(*score, current.score),
        };
        if improves {
            best = Some(GlobalBestConfig {
                config: *config,
                score: *score,
            });
        }
    }
    best
}

/// Chooses the configuration every non-released hyperparameter is pinned
/// to.
#[derive(Debug, Clone)]
pub struct GridAggregator {
    pub summary: Summary,
    /// Only rank configurations that have a value in every environment.
    pub require_full_coverage: bool,
}

impl Default for GridAggregator {
    fn default() -> Self {
        Self {
            summary: Summary::Sum,
            require_full_coverage: true,
        }
    }
}

impl GridAggregator {
    pub fn new(summary: Summary, require_full_coverage: bool) -> Self {
        Self {
            summary,
            require_full_coverage,
        }
    }

    pub fn global_best(
        &self,
        records: &[MetricRecord],
        direction: ObjectiveDirection,
        n_envs: usize,
    ) -> Option<GlobalBestConfig> {
        let mut summaries = aggregate(records, self.summary);

        if self.require_full_coverage {
            let coverage = coverage(records);
            let covered: BTreeMap<HyperparameterConfig, f64> = summaries
                .iter()
                .filter(|(config, _)| coverage.get(*config).copied().unwrap_or(0) >= n_envs)
                .map(|(config, score)| (*config, *score))
                .collect();

            if covered.is_empty() {
                tracing::warn!(
                    "No configuration covers all {} environments, ranking all {} configurations",
                    n_envs,
                    summaries.len()
                );
            } else {
                summaries = covered;
            }
        }

        let best = find_global_best(&summaries, direction)?;
        tracing::info!("Global best {} with score {:.4}", best.config, best.score);
        Some(best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(v: f64) -> HyperparameterConfig {
        HyperparameterConfig::new(v, 0.001, 0.01, 0.9)
    }

    #[test]
    fn missing_environments_are_excluded_not_zeroed() {
        let records = vec![
            MetricRecord::new(config(0.1), "A", Some(0.2)),
            MetricRecord::new(config(0.1), "B", None),
        ];
        let mean = aggregate(&records, Summary::Mean);
        assert_eq!(mean[&config(0.1)], 0.2);
        assert_eq!(coverage(&records)[&config(0.1)], 1);
    }

    #[test]
    fn all_undefined_config_is_absent() {
        let records = vec![MetricRecord::new(config(0.1), "A", None)];
        assert!(aggregate(&records, Summary::Sum).is_empty());
    }

    #[test]
    fn sum_and_mean_across_envs() {
        let records = vec![
            MetricRecord::new(config(0.1), "A", Some(1.0)),
            MetricRecord::new(config(0.1), "B", Some(3.0)),
            MetricRecord::new(config(0.2), "A", Some(5.0)),
        ];
        assert_eq!(aggregate(&records, Summary::Sum)[&config(0.1)], 4.0);
        assert_eq!(aggregate(&records, Summary::Mean)[&config(0.1)], 2.0);
    }

    #[test]
    fn global_best_respects_direction_and_ties() {
        let mut summaries = BTreeMap::new();
        summaries.insert(config(0.3), 1.0);
        summaries.insert(config(0.1), 1.0);
        summaries.insert(config(0.2), 5.0);

        let min = find_global_best(&summaries, ObjectiveDirection::Minimize).unwrap();
        assert_eq!(min.config, config(0.1));
        let max = find_global_best(&summaries, ObjectiveDirection::Maximize).unwrap();
        assert_eq!(max.config, config(0.2));
        assert!(find_global_best(&BTreeMap::new(), ObjectiveDirection::Minimize).is_none());
    }

    #[test]
    fn partial_coverage_cannot_win() {
        let records = vec![
            MetricRecord::new(config(0.1), "A", Some(1.0)),
            MetricRecord::new(config(0.1), "B", Some(1.0)),
            MetricRecord::new(config(0.2), "A", Some(0.1)),
        ];
        let best = GridAggregator::default()
            .global_best(&records, ObjectiveDirection::Minimize, 2)
            .unwrap();
        assert_eq!(best.config, config(0.1));
        assert_eq!(best.score, 2.0);

        let loose = GridAggregator::new(Summary::Sum, false)
            .global_best(&records, ObjectiveDirection::Minimize, 2)
            .unwrap();
        assert_eq!(loose.config, config(0.2));
    }
}
