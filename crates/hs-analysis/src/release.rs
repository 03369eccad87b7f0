//! Greedy forward selection of the hyperparameter release order.
//!
//! Starting with every hyperparameter pinned to the global best, each step
//! releases the candidate whose release gives the best cross-environment
//! average of the per-environment best group value. The search never
//! backtracks; candidates are tried in canonical order and a later
//! candidate only wins when it is strictly better.

use hs_types::{
    value_key, AnalysisError, GlobalBestConfig, HsResult, Hyperparameter, HyperparameterConfig,
    ObjectiveDirection, ReleaseOrder,
};

use crate::penalty::EnvTable;

/// One candidate evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseStep {
    /// 1-based step of the greedy search.
    pub step: usize,
    pub candidate: Hyperparameter,
    pub avg_cost: f64,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReleaseSearch {
    pub order: ReleaseOrder,
    /// Average cost of each selected hyperparameter, in release order.
    pub selected_costs: Vec<f64>,
    pub trace: Vec<ReleaseStep>,
}

pub struct ReleaseSolver<'a> {
    tables: &'a [EnvTable],
    best: GlobalBestConfig,
    direction: ObjectiveDirection,
}

impl<'a> ReleaseSolver<'a> {
    pub fn new(tables: &'a [EnvTable], best: GlobalBestConfig, direction: ObjectiveDirection) -> Self {
        Self {
            tables,
            best,
            direction,
        }
    }

    pub fn solve(&self, alg: &str, metric: &str) -> HsResult<ReleaseSearch> {
        if self.tables.is_empty() {
            return Err(AnalysisError::NoValidEnvironment {
                alg: alg.to_string(),
                metric: metric.to_string(),
            }
            .into());
        }

        let mut released: Vec<Hyperparameter> = Vec::new();
        let mut remaining: Vec<Hyperparameter> = Hyperparameter::ALL.to_vec();
        let mut selected_costs = Vec::new();
        let mut trace = Vec::new();

        while !remaining.is_empty() {
            let step = released.len() + 1;
            let mut winner: Option<(usize, f64)> = None;

            for (idx, candidate) in remaining.iter().enumerate() {
                let avg_cost = self.evaluate(&released, *candidate);
                tracing::debug!("{}/{} step {}: {} -> {:.4}", alg, metric, step, candidate, avg_cost);
                trace.push(ReleaseStep {
                    step,
                    candidate: *candidate,
                    avg_cost,
                    selected: false,
                });

                let better = match winner {
                    None => true,
                    Some((_, current)) => self.direction.improves(avg_cost, current),
                };
                if better {
                    winner = Some((idx, avg_cost));
                }
            }

            let Some((idx, avg_cost)) = winner else {
                break;
            };
            let chosen = remaining.remove(idx);
            if let Some(entry) = trace
                .iter_mut()
                .rev()
                .find(|s| s.step == step && s.candidate == chosen)
            {
                entry.selected = true;
            }
            tracing::info!("{}/{}: release #{} is {} (avg {:.4})", alg, metric, step, chosen, avg_cost);
            released.push(chosen);
            selected_costs.push(avg_cost);
        }

        Ok(ReleaseSearch {
            order: ReleaseOrder::new(released)?,
            selected_costs,
            trace,
        })
    }

    /// Cross-environment average of the best group value when `candidate`
    /// is released on top of `released`.
    pub fn evaluate(&self, released: &[Hyperparameter], candidate: Hyperparameter) -> f64 {
        let free: Vec<Hyperparameter> = released.iter().copied().chain([candidate]).collect();
        let total: f64 = self.tables.iter().map(|t| self.env_best(t, &free)).sum();
        total / self.tables.len() as f64
    }

    fn env_best(&self, table: &EnvTable, free: &[Hyperparameter]) -> f64 {
        let pinned: Vec<Hyperparameter> = Hyperparameter::ALL
            .iter()
            .copied()
            .filter(|hp| !free.contains(hp))
            .collect();
        let axes: Vec<Vec<f64>> = free.iter().map(|hp| distinct_values(table, *hp)).collect();

        let groups = combinations(&axes).into_iter().map(|combo| {
            let target = free
                .iter()
                .zip(&combo)
                .fold(self.best.config, |cfg, (hp, v)| cfg.with(*hp, *v));
            group_mean(table, &target, free, &pinned).unwrap_or(table.missing_cost)
        });

        self.direction.best_of(groups).unwrap_or(table.missing_cost)
    }
}

/// Distinct values of `hp` in first-seen row order.
fn distinct_values(table: &EnvTable, hp: Hyperparameter) -> Vec<f64> {
    let mut seen: Vec<u64> = Vec::new();
    let mut values = Vec::new();
    for (config, _) in &table.rows {
        let v = config.get(hp);
        if !seen.contains(&value_key(v)) {
            seen.push(value_key(v));
            values.push(v);
        }
    }
    values
}

/// Cartesian product, first axis varying slowest.
fn combinations(axes: &[Vec<f64>]) -> Vec<Vec<f64>> {
    axes.iter().fold(vec![Vec::new()], |acc, axis| {
        acc.iter()
            .flat_map(|prefix| {
                axis.iter().map(move |v| {
                    let mut next = prefix.clone();
                    next.push(*v);
                    next
                })
            })
            .collect()
    })
}

fn group_mean(
    table: &EnvTable,
    target: &HyperparameterConfig,
    free: &[Hyperparameter],
    pinned: &[Hyperparameter],
) -> Option<f64> {
    let matching: Vec<f64> = table
        .rows
        .iter()
        .filter(|(config, _)| config.agrees_on(target, free) && config.agrees_on(target, pinned))
        .map(|(_, v)| *v)
        .collect();
    if matching.is_empty() {
        return None;
    }
    Some(matching.iter().sum::<f64>() / matching.len() as f64)
}
