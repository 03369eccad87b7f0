use hs_types::{
    GlobalBestConfig, HyperparameterConfig, LevelRow, MetricKind, ReleaseLevel, ReleaseOrder,
};

/// Configurations of one environment visible at `level`: every fixed
/// hyperparameter equals the global best.
pub fn visible_configs<'c>(
    configs: &'c [HyperparameterConfig],
    order: &ReleaseOrder,
    best: &GlobalBestConfig,
    level: ReleaseLevel,
) -> Vec<&'c HyperparameterConfig> {
    let fixed = order.fixed(level);
    configs
        .iter()
        .filter(|config| config.agrees_on(&best.config, &fixed))
        .collect()
}

/// Level tables for one (algorithm, metric).
///
/// `envs` lists each environment with its configurations; `value` supplies
/// the metric of a configuration at a level.
pub fn build_level_rows<F>(
    alg: &str,
    metric: MetricKind,
    envs: &[(String, Vec<HyperparameterConfig>)],
    order: &ReleaseOrder,
    best: &GlobalBestConfig,
    mut value: F,
) -> Vec<LevelRow>
where
    F: FnMut(&str, &HyperparameterConfig, ReleaseLevel) -> Option<f64>,
{
    let mut rows = Vec::new();
    for level in ReleaseLevel::all() {
        for (env, configs) in envs {
            let visible = visible_configs(configs, order, best, level);
            if visible.is_empty() {
                tracing::warn!(
                    "{}/{}: no configuration of {} matches the global best at {}",
                    alg,
                    metric,
                    env,
                    level
                );
            }
            for config in visible {
                rows.push(LevelRow::new(alg, env, metric, level, config, value(env, config, level)));
            }
        }
    }
    tracing::info!("{}/{}: {} level rows", alg, metric, rows.len());
    rows
}
