//! The fixed four-dimensional hyperparameter space and the filename
//! convention that carries a grid point between pipeline stages.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use crate::errors::DataError;

/// One tunable dimension of the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hyperparameter {
    ActorLr,
    CriticLr,
    EntCoef,
    GaeLambda,
}

impl Hyperparameter {
    /// Canonical iteration order. The release-order search walks candidates
    /// in this order, so it must never change between runs.
    pub const ALL: [Hyperparameter; 4] = [
        Hyperparameter::ActorLr,
        Hyperparameter::CriticLr,
        Hyperparameter::EntCoef,
        Hyperparameter::GaeLambda,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::ActorLr => "actorlr",
            Self::CriticLr => "criticlr",
            Self::EntCoef => "entcoef",
            Self::GaeLambda => "gaelambda",
        }
    }
}

impl fmt::Display for Hyperparameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hyperparameter {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|hp| hp.name() == s)
            .ok_or_else(|| DataError::UnknownHyperparameter { name: s.to_string() })
    }
}

/// A single grid point.
///
/// Equality, hashing and ordering are numeric on the exact `f64` bits (with
/// `-0.0` folded into `0.0`), so two configs parsed from `1e-05` and
/// `0.00001` are the same key.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct HyperparameterConfig {
    pub actorlr: f64,
    pub criticlr: f64,
    pub entcoef: f64,
    pub gaelambda: f64,
}

impl HyperparameterConfig {
    pub fn new(actorlr: f64, criticlr: f64, entcoef: f64, gaelambda: f64) -> Self {
        Self {
            actorlr,
            criticlr,
            entcoef,
            gaelambda,
        }
    }

    pub fn get(&self, hp: Hyperparameter) -> f64 {
        match hp {
            Hyperparameter::ActorLr => self.actorlr,
            Hyperparameter::CriticLr => self.criticlr,
            Hyperparameter::EntCoef => self.entcoef,
            Hyperparameter::GaeLambda => self.gaelambda,
        }
    }

    pub fn with(mut self, hp: Hyperparameter, value: f64) -> Self {
        match hp {
            Hyperparameter::ActorLr => self.actorlr = value,
            Hyperparameter::CriticLr => self.criticlr = value,
            Hyperparameter::EntCoef => self.entcoef = value,
            Hyperparameter::GaeLambda => self.gaelambda = value,
        }
        self
    }

    /// True when `self` and `other` hold the same value on every listed
    /// hyperparameter.
    pub fn agrees_on(&self, other: &Self, hps: &[Hyperparameter]) -> bool {
        hps.iter()
            .all(|hp| value_key(self.get(*hp)) == value_key(other.get(*hp)))
    }

    pub fn values(&self) -> [f64; 4] {
        [self.actorlr, self.criticlr, self.entcoef, self.gaelambda]
    }

    pub fn is_finite(&self) -> bool {
        self.values().iter().all(|v| v.is_finite())
    }

    fn key(&self) -> [u64; 4] {
        self.values().map(value_key)
    }
}

/// Bit pattern used for equality on a single hyperparameter value.
pub fn value_key(v: f64) -> u64 {
    if v == 0.0 {
        0.0f64.to_bits()
    } else {
        v.to_bits()
    }
}

impl PartialEq for HyperparameterConfig {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for HyperparameterConfig {}

impl Hash for HyperparameterConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for HyperparameterConfig {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HyperparameterConfig {
    fn cmp(&self, other: &Self) -> Ordering {
        let fold = |v: f64| if v == 0.0 { 0.0 } else { v };
        self.values()
            .iter()
            .zip(other.values().iter())
            .map(|(a, b)| fold(*a).total_cmp(&fold(*b)))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for HyperparameterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "actorlr={} criticlr={} entcoef={} gaelambda={}",
            self.actorlr, self.criticlr, self.entcoef, self.gaelambda
        )
    }
}

// ---------------------------------------------------------------------------
// Filename codec
// ---------------------------------------------------------------------------

/// Suffixes appended by intermediate stages (run averaging, normalization).
const STAGE_SUFFIXES: [&str; 2] = ["_normalized", "_avg"];
const EXTENSIONS: [&str; 2] = [".csv", ".npy"];

/// Identity of one reward log: grid point, environment and algorithm.
///
/// Encoded as
/// `actorlr_<v>_criticlr_<v>_entcoef_<v>_gaelambda_<v>_env_<env>_alg_<alg>`.
/// The environment is a single non-empty `_`-free token; the algorithm takes
/// the rest of the stem and may contain underscores. `file_name` refuses keys
/// that would not parse back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RunKey {
    pub config: HyperparameterConfig,
    pub env: String,
    pub alg: String,
}

impl RunKey {
    pub fn new(config: HyperparameterConfig, env: impl Into<String>, alg: impl Into<String>) -> Self {
        Self {
            config,
            env: env.into(),
            alg: alg.into(),
        }
    }

    /// Filename stem without extension.
    pub fn file_stem(&self) -> String {
        let mut stem = String::new();
        for hp in Hyperparameter::ALL {
            stem.push_str(&format!("{}_{}_", hp.name(), self.config.get(hp)));
        }
        stem.push_str(&format!("env_{}_alg_{}", self.env, self.alg));
        stem
    }

    /// Check that the key survives an encode/parse cycle.
    pub fn validate(&self) -> Result<(), DataError> {
        let message = if self.env.is_empty() {
            "environment name is empty"
        } else if self.env.contains('_') {
            "environment name must not contain '_'"
        } else if self.alg.is_empty() {
            "algorithm name is empty"
        } else {
            return Ok(());
        };
        Err(DataError::InvalidFilename {
            filename: self.file_stem(),
            message: message.to_string(),
        })
    }

    pub fn file_name(&self) -> Result<String, DataError> {
        self.validate()?;
        Ok(format!("{}.csv", self.file_stem()))
    }

    /// Parse a filename (with or without extension and stage suffixes).
    pub fn parse(filename: &str) -> Result<Self, DataError> {
        let invalid = |message: &str| DataError::InvalidFilename {
            filename: filename.to_string(),
            message: message.to_string(),
        };

        let mut stem = filename;
        for ext in EXTENSIONS {
            if let Some(s) = stem.strip_suffix(ext) {
                stem = s;
                break;
            }
        }
        loop {
            let before = stem;
            for suffix in STAGE_SUFFIXES {
                if let Some(s) = stem.strip_suffix(suffix) {
                    stem = s;
                }
            }
            if before == stem {
                break;
            }
        }

        let parts: Vec<&str> = stem.split('_').collect();
        let mut values: [Option<f64>; 4] = [None; 4];
        let mut env = None;
        let mut alg = None;

        let mut i = 0;
        while i < parts.len() {
            let key = parts[i];
            if let Ok(hp) = key.parse::<Hyperparameter>() {
                let raw = parts
                    .get(i + 1)
                    .ok_or_else(|| invalid(&format!("missing value for {key}")))?;
                let value: f64 = raw
                    .parse()
                    .map_err(|_| invalid(&format!("value {raw:?} for {key} is not a number")))?;
                if !value.is_finite() {
                    return Err(invalid(&format!("value {raw:?} for {key} is not finite")));
                }
                values[hp as usize] = Some(value);
                i += 2;
            } else if key == "env" {
                let raw = parts.get(i + 1).ok_or_else(|| invalid("missing env value"))?;
                env = Some(raw.to_string());
                i += 2;
            } else if key == "alg" {
                if i + 1 >= parts.len() {
                    return Err(invalid("missing alg value"));
                }
                alg = Some(parts[i + 1..].join("_"));
                break;
            } else {
                i += 1;
            }
        }

        let mut resolved = [0.0; 4];
        for hp in Hyperparameter::ALL {
            resolved[hp as usize] =
                values[hp as usize].ok_or_else(|| invalid(&format!("missing {hp}")))?;
        }

        Ok(Self {
            config: HyperparameterConfig::new(resolved[0], resolved[1], resolved[2], resolved[3]),
            env: env.ok_or_else(|| invalid("missing env"))?,
            alg: alg.ok_or_else(|| invalid("missing alg"))?,
        })
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_stem())
    }
}
