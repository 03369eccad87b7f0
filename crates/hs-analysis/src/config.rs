use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use hs_types::{config_error, HsResult, MetricKind, ReleaseLevel};

use crate::aggregate::Summary;

/// Everything a pipeline run needs besides the data itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Folder holding the per-(config, env, alg) reward logs.
    pub input_dir: PathBuf,

    /// Folder the output tables are written to.
    pub output_dir: PathBuf,

    /// Environments to analyse. Empty means every environment found.
    pub environments: Vec<String>,

    /// Algorithms to analyse. Empty means every algorithm found.
    pub algorithms: Vec<String>,

    /// Metrics to rank, each gets its own release order.
    pub metrics: Vec<MetricKind>,

    /// Multiplier applied to the worst valid value to obtain the penalty.
    pub penalty_factor: f64,

    /// Runs that must cross p95 before the trajectory count is defined.
    pub min_crossing_runs: usize,

    /// Which crossing step (1-based, ascending) is reported.
    pub crossing_rank: usize,

    /// Grid points per hyperparameter.
    pub grid_base: usize,

    /// Statistic used to pick the global best across environments.
    pub global_best_summary: Summary,

    /// Only configurations present in every environment may be the global best.
    pub require_full_coverage: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            environments: Vec::new(),
            algorithms: Vec::new(),
            metrics: MetricKind::ALL.to_vec(),
            penalty_factor: 10.0,
            min_crossing_runs: 5,
            crossing_rank: 5,
            grid_base: 3,
            global_best_summary: Summary::Sum,
            require_full_coverage: true,
        }
    }
}

impl PipelineConfig {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(input_dir: P, output_dir: Q) -> Self {
        Self {
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            ..Self::default()
        }
    }

    /// Load from a JSON file; absent fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> HsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_error!("cannot read config file {}: {}", path.display(), e))?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_environments(mut self, envs: Vec<String>) -> Self {
        self.environments = envs;
        self
    }

    pub fn with_algorithms(mut self, algs: Vec<String>) -> Self {
        self.algorithms = algs;
        self
    }

    pub fn with_metrics(mut self, metrics: Vec<MetricKind>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_penalty_factor(mut self, factor: f64) -> Self {
        self.penalty_factor = factor;
        self
    }

    pub fn with_crossing(mut self, min_runs: usize, rank: usize) -> Self {
        self.min_crossing_runs = min_runs;
        self.crossing_rank = rank;
        self
    }

    pub fn with_grid_base(mut self, base: usize) -> Self {
        self.grid_base = base;
        self
    }

    pub fn with_global_best(mut self, summary: Summary, require_full_coverage: bool) -> Self {
        self.global_best_summary = summary;
        self.require_full_coverage = require_full_coverage;
        self
    }

    pub fn validate(&self) -> HsResult<()> {
        if !(self.penalty_factor.is_finite() && self.penalty_factor > 1.0) {
            return Err(config_error!(
                "penalty_factor must be a finite value above 1, got {}",
                self.penalty_factor
            ));
        }
        if self.crossing_rank == 0 || self.crossing_rank > self.min_crossing_runs {
            return Err(config_error!(
                "crossing_rank must be in 1..={}, got {}",
                self.min_crossing_runs,
                self.crossing_rank
            ));
        }
        if self.grid_base < 2 {
            return Err(config_error!("grid_base must be at least 2, got {}", self.grid_base));
        }
        if ReleaseLevel::FULL_GRID.multiplicity(self.grid_base).is_none() {
            return Err(config_error!(
                "grid_base {} overflows at the full grid",
                self.grid_base
            ));
        }
        if self.metrics.is_empty() {
            return Err(config_error!("at least one metric must be enabled"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.metrics.len(), 4);
        assert_eq!(config.penalty_factor, 10.0);
    }

    #[test]
    fn builder_overrides() {
        let config = PipelineConfig::new("in", "out")
            .with_algorithms(vec!["lambda_ac".into()])
            .with_metrics(vec![MetricKind::StepToP90])
            .with_crossing(3, 3)
            .with_penalty_factor(5.0);
        assert!(config.validate().is_ok());
        assert_eq!(config.input_dir, PathBuf::from("in"));
        assert_eq!(config.crossing_rank, 3);
    }

    #[test]
    fn invalid_settings_are_rejected() {
        assert!(PipelineConfig::default().with_penalty_factor(1.0).validate().is_err());
        assert!(PipelineConfig::default().with_crossing(5, 6).validate().is_err());
        assert!(PipelineConfig::default().with_grid_base(1).validate().is_err());
        assert!(PipelineConfig::default().with_grid_base(usize::MAX).validate().is_err());
        assert!(PipelineConfig::default().with_grid_base(1 << 20).validate().is_err());
        assert!(PipelineConfig::default().with_grid_base(10).validate().is_ok());
        assert!(PipelineConfig::default().with_metrics(vec![]).validate().is_err());
    }

    #[test]
    fn json_file_fills_in_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hs.json");
        std::fs::write(
            &path,
            r#"{"input_dir": "runs", "metrics": ["normalized_auc", "step_to_p95"], "global_best_summary": "mean"}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_json_file(&path).unwrap();
        assert_eq!(config.input_dir, PathBuf::from("runs"));
        assert_eq!(config.metrics, vec![MetricKind::NormalizedAuc, MetricKind::StepToP95]);
        assert_eq!(config.global_best_summary, Summary::Mean);
        assert_eq!(config.grid_base, 3);

        assert!(PipelineConfig::from_json_file(dir.path().join("missing.json")).is_err());
    }
}
