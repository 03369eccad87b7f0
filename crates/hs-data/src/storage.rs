use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hs_types::{
    GlobalBestRow, HsResult, LevelRow, MetricKind, QuantileRow, ReleaseOrderRow, SummaryRow,
};

/// Provenance record written next to the output tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    pub environments: Vec<String>,
    pub algorithms: Vec<String>,
    pub files_loaded: usize,
    pub files_skipped: usize,
    /// Opaque echo of the configuration that produced this run.
    pub config: serde_json::Value,
}

impl RunManifest {
    pub fn new(input_dir: PathBuf, output_dir: PathBuf, config: serde_json::Value) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            generated_at: Utc::now(),
            input_dir,
            output_dir,
            environments: Vec::new(),
            algorithms: Vec::new(),
            files_loaded: 0,
            files_skipped: 0,
            config,
        }
    }
}

/// Writes the pipeline's output tables. Every call overwrites its file.
#[derive(Debug)]
pub struct OutputWriter {
    pub output_root: PathBuf,
}

impl OutputWriter {
    pub fn new<P: AsRef<Path>>(output_root: P) -> HsResult<Self> {
        let output_root = output_root.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_root)?;

        Ok(Self { output_root })
    }

    pub fn path_for(&self, file_name: &str) -> PathBuf {
        self.output_root.join(file_name)
    }

    /// Serialize `rows` to `file_name` with a header line.
    pub fn write_rows<T: Serialize>(&self, file_name: &str, rows: &[T]) -> HsResult<PathBuf> {
        let path = self.path_for(file_name);
        let mut wtr = csv::Writer::from_path(&path)?;
        for row in rows {
            wtr.serialize(row)?;
        }
        wtr.flush()?;
        tracing::debug!("Wrote {} rows to {}", rows.len(), path.display());
        Ok(path)
    }

    pub fn write_quantiles(&self, rows: &[QuantileRow]) -> HsResult<PathBuf> {
        self.write_rows("quantiles.csv", rows)
    }

    pub fn write_summary(&self, alg: &str, rows: &[SummaryRow]) -> HsResult<PathBuf> {
        self.write_rows(&format!("summary_{alg}.csv"), rows)
    }

    pub fn write_global_best(&self, rows: &[GlobalBestRow]) -> HsResult<PathBuf> {
        self.write_rows("global_best.csv", rows)
    }

    pub fn write_release_orders(&self, rows: &[ReleaseOrderRow]) -> HsResult<PathBuf> {
        self.write_rows("release_order.csv", rows)
    }

    pub fn write_levels(&self, alg: &str, metric: MetricKind, rows: &[LevelRow]) -> HsResult<PathBuf> {
        self.write_rows(&format!("levels_{alg}_{metric}.csv"), rows)
    }

    pub fn write_manifest(&self, manifest: &RunManifest) -> HsResult<PathBuf> {
        let path = self.path_for("manifest.json");
        let json = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&path, json)?;
        Ok(path)
    }
}

/// Read a table written by [`OutputWriter::write_rows`].
pub fn read_rows<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> HsResult<Vec<T>> {
    let mut rdr = csv::Reader::from_path(path.as_ref())?;
    let mut rows = Vec::new();
    for row in rdr.deserialize() {
        rows.push(row?);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hs_types::{HyperparameterConfig, ReleaseLevel};
    use tempfile::TempDir;

    #[test]
    fn summary_rows_keep_undefined_values_empty() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path().join("out")).unwrap();
        let rows = vec![SummaryRow {
            actorlr: 0.0001,
            criticlr: 0.001,
            entcoef: 0.01,
            gaelambda: 0.5,
            env: "hopper".into(),
            alg: "lambda_ac".into(),
            trajectory_count: None,
            trajectory_metric: None,
            normalized_auc: Some(12.5),
            step_to_p90: Some(3),
            step_to_p95: None,
        }];
        let path = writer.write_summary("lambda_ac", &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("actorlr,criticlr,entcoef,gaelambda,env,alg"));
        assert!(text.contains("hopper,lambda_ac,,,12.5,3,"));

        let back: Vec<SummaryRow> = read_rows(&path).unwrap();
        assert_eq!(back, rows);
    }

    #[test]
    fn level_rows_round_trip_through_csv() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path()).unwrap();
        let config = HyperparameterConfig::new(3e-05, 1e-05, 0.001, 0.7);
        let rows = vec![LevelRow::new(
            "ppo",
            "ant",
            MetricKind::StepToP90,
            ReleaseLevel::new(2).unwrap(),
            &config,
            Some(1.25),
        )];
        let path = writer.write_levels("ppo", MetricKind::StepToP90, &rows).unwrap();
        assert!(path.ends_with("levels_ppo_step_to_p90.csv"));

        let back: Vec<LevelRow> = read_rows(&path).unwrap();
        assert_eq!(back, rows);
        assert_eq!(back[0].config(), config);
    }

    #[test]
    fn manifest_is_json() {
        let dir = TempDir::new().unwrap();
        let writer = OutputWriter::new(dir.path()).unwrap();
        let manifest = RunManifest::new(
            PathBuf::from("in"),
            dir.path().to_path_buf(),
            serde_json::json!({"penalty_factor": 10.0}),
        );
        let path = writer.write_manifest(&manifest).unwrap();
        let back: RunManifest =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(back.run_id, manifest.run_id);
    }
}
