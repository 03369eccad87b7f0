use thiserror::Error;

/// Main error type for the hpsens pipeline
#[derive(Error, Debug)]
pub enum HsError {
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    #[error("Normalization error: {0}")]
    Normalization(#[from] NormalizationError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Errors raised while discovering or reading reward logs
#[derive(Error, Debug)]
pub enum DataError {
    #[error("Input folder not found: {path}")]
    FolderNotFound { path: String },

    #[error("Reward file not found: {path}")]
    FileNotFound { path: String },

    #[error("Invalid filename {filename}: {message}")]
    InvalidFilename { filename: String, message: String },

    #[error("Unknown hyperparameter: {name}")]
    UnknownHyperparameter { name: String },

    #[error("No usable runs in {path}")]
    EmptyFile { path: String },

    #[error("Data parsing error: {message}")]
    ParseError { message: String },

    #[error("Invalid tensor shape {shape:?} for {len} values")]
    InvalidShape { shape: [usize; 4], len: usize },
}

/// Errors raised while deriving quantile anchors or normalizing rewards
#[derive(Error, Debug, Clone, PartialEq)]
pub enum NormalizationError {
    #[error("No reward values pooled for environment {env}")]
    EmptyPool { env: String },

    #[error("Degenerate anchors: p5 = {p5}, p95 = {p95}")]
    DegenerateAnchor { p5: f64, p95: f64 },

    #[error("Percentile {q} outside [0, 100]")]
    InvalidPercentile { q: f64 },

    #[error("Baseline {baseline} is not a positive finite value")]
    NonPositiveBaseline { baseline: f64 },
}

/// Errors raised by aggregation and release-order search
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Algorithm {alg} has no valid environment for metric {metric}")]
    NoValidEnvironment { alg: String, metric: String },

    #[error("No global best configuration for {alg}, metric {metric}")]
    NoGlobalBest { alg: String, metric: String },

    #[error("Release level {level} outside 0..=4")]
    InvalidLevel { level: u8 },
}

/// Result type alias for hpsens operations
pub type HsResult<T> = Result<T, HsError>;

/// Macro for creating validation errors
#[macro_export]
macro_rules! validation_error {
    ($($arg:tt)*) => {
        $crate::HsError::Validation(format!($($arg)*))
    };
}

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::HsError::Config(format!($($arg)*))
    };
}
