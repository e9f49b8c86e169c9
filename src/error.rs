use std::path::PathBuf;
use thiserror::Error;

/// Failures of the on-disk dataset: missing paths, schema conflicts, I/O.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("dataset not found at {0}")]
    NotFound(PathBuf),

    #[error("dataset already exists at {0}")]
    AlreadyExists(PathBuf),

    #[error("column '{0}' is already declared with a different layout")]
    SchemaConflict(String),

    #[error("column '{0}' is not part of the dataset schema")]
    UnknownColumn(String),

    #[error("record {index} is out of range (dataset has {len} records)")]
    IndexOutOfRange { index: u64, len: u64 },

    #[error("write to record {index} is missing output field '{column}'")]
    MissingField { index: u64, column: String },

    #[error("field '{column}' expects {expected}, got {actual}")]
    FieldMismatch {
        column: String,
        expected: String,
        actual: String,
    },

    #[error("column file {path} has {actual} bytes, expected {expected}")]
    Corrupt {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },

    #[error("malformed record on line {line}: {source}")]
    MalformedRecord {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures raised while turning one batch into embeddings.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to decode frames from {source_file}: {message}")]
    Decode { source_file: String, message: String },

    #[error("decoder returned {actual} frames for {source_file}, expected {expected}")]
    FrameCount {
        source_file: String,
        expected: usize,
        actual: usize,
    },

    #[error("encoder failed: {0}")]
    Model(String),

    #[error("{output} has shape {actual:?}, expected {expected:?}")]
    OutputShape {
        output: &'static str,
        expected: Vec<usize>,
        actual: Vec<usize>,
    },

    #[error("encoder panicked: {0}")]
    Panicked(String),

    #[error("no encoder registered under '{0}'")]
    UnknownEncoder(String),
}

/// Invalid run parameters, detected before any queue is populated.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("num_parallel_workers must be at least 1, got {0}")]
    InvalidWorkerCount(usize),

    #[error("batch_size must be at least 1, got {0}")]
    InvalidBatchSize(usize),

    #[error("accelerator_fraction_per_worker must be in (0, 1], got {0}")]
    InvalidAcceleratorFraction(f64),

    #[error("{0} must not be empty")]
    MissingPath(&'static str),

    #[error("invalid value '{value}' for {var}")]
    InvalidEnv { var: String, value: String },

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Assembly found nothing to do. Callers decide whether that is success.
#[derive(Debug, Error)]
#[error("zero pending work: {scanned} records scanned, {already_done} already processed")]
pub struct EmptyWorkError {
    pub scanned: u64,
    pub already_done: u64,
}

/// Top-level error of a run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    EmptyWork(#[from] EmptyWorkError),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("pool task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("invalid pool state transition: {from} -> {to}")]
    InvalidTransition { from: &'static str, to: &'static str },
}
