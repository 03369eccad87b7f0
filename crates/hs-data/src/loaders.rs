use std::path::Path;

use hs_types::{DataError, HsResult, RewardTrajectory, RunKey, RunSet};

/// Loader for reward logs written one run per line.
#[derive(Debug, Clone)]
pub struct TrajectoryLoader {
    /// Skip lines that fail to parse instead of failing the whole file.
    skip_malformed: bool,
}

impl TrajectoryLoader {
    pub fn new() -> Self {
        Self {
            skip_malformed: true,
        }
    }

    pub fn strict() -> Self {
        Self {
            skip_malformed: false,
        }
    }

    /// Load every run from a CSV file whose lines are comma-separated rewards
    /// of varying length.
    pub fn load_csv_file<P: AsRef<Path>>(&self, file_path: P) -> HsResult<Vec<RewardTrajectory>> {
        use csv::ReaderBuilder;

        let path = file_path.as_ref();
        tracing::debug!("Loading reward runs from: {}", path.display());

        if !path.exists() {
            return Err(DataError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }

        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| DataError::ParseError {
                message: format!("Failed to open CSV file {}: {}", path.display(), e),
            })?;

        let mut runs = Vec::new();

        for (line_num, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| DataError::ParseError {
                message: format!("Failed to read CSV record at line {}: {}", line_num + 1, e),
            })?;

            match Self::parse_record(&record) {
                Ok(rewards) if rewards.is_empty() => continue,
                Ok(rewards) => runs.push(RewardTrajectory::new(rewards)),
                Err(e) if self.skip_malformed => {
                    tracing::warn!(
                        "Skipping malformed line {} in {}: {}",
                        line_num + 1,
                        path.display(),
                        e
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!("Loaded {} runs from {}", runs.len(), path.display());
        Ok(runs)
    }

    /// Load a log file and recover its key from the filename.
    pub fn load_run_set<P: AsRef<Path>>(&self, file_path: P) -> HsResult<RunSet> {
        let path = file_path.as_ref();
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DataError::InvalidFilename {
                filename: path.display().to_string(),
                message: "not valid UTF-8".to_string(),
            })?;
        let key = RunKey::parse(filename)?;
        let runs = self.load_csv_file(path)?;
        if runs.is_empty() {
            return Err(DataError::EmptyFile {
                path: path.display().to_string(),
            }
            .into());
        }
        Ok(RunSet::new(key, runs))
    }

    fn parse_record(record: &csv::StringRecord) -> Result<Vec<f64>, DataError> {
        record
            .iter()
            .filter(|field| !field.is_empty())
            .map(|field| {
                field.parse::<f64>().map_err(|e| DataError::ParseError {
                    message: format!("invalid reward {field:?}: {e}"),
                })
            })
            .collect()
    }
}

impl Default for TrajectoryLoader {
    fn default() -> Self {
        Self::new()
    }
}
