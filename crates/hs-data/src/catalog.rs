use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use hs_types::{DataError, Dataset, HsResult, RunKey};

use crate::loaders::TrajectoryLoader;

/// Restricts discovery to known environments and algorithms. Empty sets
/// accept everything.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub envs: BTreeSet<String>,
    pub algorithms: BTreeSet<String>,
}

impl CatalogFilter {
    pub fn new(envs: &[String], algorithms: &[String]) -> Self {
        Self {
            envs: envs.iter().cloned().collect(),
            algorithms: algorithms.iter().cloned().collect(),
        }
    }

    fn accepts(&self, key: &RunKey) -> bool {
        (self.envs.is_empty() || self.envs.contains(&key.env))
            && (self.algorithms.is_empty() || self.algorithms.contains(&key.alg))
    }
}

/// A discovered reward log.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub key: RunKey,
    pub path: PathBuf,
}

/// Index of the reward logs in one folder, keyed by the filename convention.
#[derive(Debug, Clone, Default)]
pub struct RunCatalog {
    entries: Vec<CatalogEntry>,
    skipped: usize,
}

impl RunCatalog {
    /// Scan `dir` (non-recursive) for `*.csv` logs whose names encode a run key.
    pub fn scan<P: AsRef<Path>>(dir: P, filter: &CatalogFilter) -> HsResult<Self> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(DataError::FolderNotFound {
                path: dir.display().to_string(),
            }
            .into());
        }

        let mut entries = Vec::new();
        let mut skipped = 0;

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            // Output tables and other CSVs live next to the logs.
            if !filename.starts_with("actorlr_") {
                continue;
            }

            match RunKey::parse(filename) {
                Ok(key) if filter.accepts(&key) => entries.push(CatalogEntry { key, path }),
                Ok(key) => {
                    tracing::warn!(
                        "File {} has env {} / alg {} outside the configured set, skipping",
                        filename,
                        key.env,
                        key.alg
                    );
                    skipped += 1;
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", filename, e);
                    skipped += 1;
                }
            }
        }

        if entries.is_empty() {
            tracing::warn!("No reward logs found in {}", dir.display());
        }

        entries.sort_by(|a, b| a.key.cmp(&b.key).then_with(|| a.path.cmp(&b.path)));
        tracing::info!(
            "Catalogued {} reward logs in {} ({} skipped)",
            entries.len(),
            dir.display(),
            skipped
        );

        Ok(Self { entries, skipped })
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Files rejected during the scan.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Distinct environments among the catalogued logs.
    pub fn envs(&self) -> Vec<String> {
        let envs: BTreeSet<String> = self.entries.iter().map(|e| e.key.env.clone()).collect();
        envs.into_iter().collect()
    }

    /// Load every catalogued log. Files that fail to load are reported and
    /// left out; the returned count is how many were dropped.
    pub fn load(&self, loader: &TrajectoryLoader) -> (Dataset, usize) {
        let mut sets = Vec::with_capacity(self.entries.len());
        let mut failed = 0;

        for entry in &self.entries {
            match loader.load_run_set(&entry.path) {
                Ok(set) => sets.push(set),
                Err(e) => {
                    tracing::warn!("Failed to load {}: {}", entry.path.display(), e);
                    failed += 1;
                }
            }
        }

        (Dataset::new(sets), failed)
    }
}
