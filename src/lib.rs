#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod config;
pub mod core;
pub mod dataset;
pub mod encoder;
pub mod engine;
pub mod error;
pub mod ingest;
pub mod logging;
pub mod observability;
pub mod resilience;

pub use config::PipelineConfig;
pub use dataset::{Dataset, OutputShape, Schema};
pub use encoder::{EncoderFactory, EncoderRegistry};
pub use engine::{BatchAssembler, PoolCoordinator, RunSummary};
pub use error::{
    ConfigurationError, EmptyWorkError, EncodeError, PipelineError, StorageError,
};
