//! Run parameters.
//!
//! Loaded from an optional JSON file, then overridden by `CLIPQUEUE_*`
//! environment variables, then validated before any queue is built.

use crate::dataset::OutputShape;
use crate::engine::FlushPolicy;
use crate::error::ConfigurationError;
use crate::resilience::FailurePolicy;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "CLIPQUEUE_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub num_parallel_workers: usize,
    pub batch_size: usize,
    pub accelerator_fraction_per_worker: f64,
    pub num_accelerators: usize,
    pub dataset_input_path: PathBuf,
    pub dataset_output_path: PathBuf,
    /// Skip records whose embedding is already present
    pub resume_mode: bool,
    pub flush_every_records: usize,
    pub flush_interval_secs: u64,
    /// Extra attempts for a failed batch; 0 logs and drops it
    pub batch_retries: u32,
    /// Name looked up in the encoder registry
    pub encoder: String,
    /// Treat "nothing to do" as a failure exit
    pub fail_on_empty: bool,
    pub schema: OutputShape,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            num_parallel_workers: 2,
            batch_size: 40,
            accelerator_fraction_per_worker: 1.0,
            num_accelerators: 1,
            dataset_input_path: PathBuf::new(),
            dataset_output_path: PathBuf::new(),
            resume_mode: true,
            flush_every_records: 256,
            flush_interval_secs: 30,
            batch_retries: 0,
            encoder: "synthetic".to_string(),
            fail_on_empty: false,
            schema: OutputShape::default(),
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigurationError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigurationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self, ConfigurationError> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigurationError> {
        self.apply_vars(std::env::vars())
    }

    /// Applies `CLIPQUEUE_*` overrides from `vars`. Unknown names are ignored.
    pub fn apply_vars<I>(&mut self, vars: I) -> Result<(), ConfigurationError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (var, value) in vars {
            let Some(key) = var.strip_prefix(ENV_PREFIX) else {
                continue;
            };
            match key {
                "NUM_PARALLEL_WORKERS" => self.num_parallel_workers = parse(&var, &value)?,
                "BATCH_SIZE" => self.batch_size = parse(&var, &value)?,
                "ACCELERATOR_FRACTION_PER_WORKER" => {
                    self.accelerator_fraction_per_worker = parse(&var, &value)?
                }
                "NUM_ACCELERATORS" => self.num_accelerators = parse(&var, &value)?,
                "DATASET_INPUT_PATH" => self.dataset_input_path = PathBuf::from(value.trim()),
                "DATASET_OUTPUT_PATH" => self.dataset_output_path = PathBuf::from(value.trim()),
                "RESUME_MODE" => self.resume_mode = parse_bool(&var, &value)?,
                "FLUSH_EVERY_RECORDS" => self.flush_every_records = parse(&var, &value)?,
                "FLUSH_INTERVAL_SECS" => self.flush_interval_secs = parse(&var, &value)?,
                "BATCH_RETRIES" => self.batch_retries = parse(&var, &value)?,
                "ENCODER" => self.encoder = value.trim().to_string(),
                "FAIL_ON_EMPTY" => self.fail_on_empty = parse_bool(&var, &value)?,
                "EMBEDDING_DIM" => self.schema.embedding_dim = parse(&var, &value)?,
                "HIDDEN_LEN" => self.schema.hidden_len = parse(&var, &value)?,
                "FRAME_HEIGHT" => self.schema.frame_height = parse(&var, &value)?,
                "FRAME_WIDTH" => self.schema.frame_width = parse(&var, &value)?,
                _ => {}
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.num_parallel_workers == 0 {
            return Err(ConfigurationError::InvalidWorkerCount(self.num_parallel_workers));
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError::InvalidBatchSize(self.batch_size));
        }
        let fraction = self.accelerator_fraction_per_worker;
        if !fraction.is_finite() || fraction <= 0.0 || fraction > 1.0 {
            return Err(ConfigurationError::InvalidAcceleratorFraction(fraction));
        }
        if self.dataset_output_path.as_os_str().is_empty() {
            return Err(ConfigurationError::MissingPath("dataset_output_path"));
        }
        Ok(())
    }

    pub fn flush_policy(&self) -> FlushPolicy {
        FlushPolicy {
            every_records: self.flush_every_records.max(1),
            interval: Duration::from_secs(self.flush_interval_secs.max(1)),
        }
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        FailurePolicy::from_retries(self.batch_retries)
    }
}

fn parse<T: FromStr>(var: &str, value: &str) -> Result<T, ConfigurationError> {
    value
        .trim()
        .parse::<T>()
        .map_err(|_| ConfigurationError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        })
}

fn parse_bool(var: &str, value: &str) -> Result<bool, ConfigurationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(ConfigurationError::InvalidEnv {
            var: var.to_string(),
            value: value.to_string(),
        }),
    }
}
