use anyhow::{bail, Context, Result};
use clipqueue::engine::BatchAssembler;
use clipqueue::{
    logging, ConfigurationError, Dataset, EncoderRegistry, PipelineConfig, PoolCoordinator,
};
use std::process::ExitCode;
use tracing::{error, info, warn};

const EXIT_EMPTY_WORK: u8 = 2;
const EXIT_INCOMPLETE: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    logging::init_tracing();

    match run().await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<ExitCode> {
    let config = load_config()?;
    config.validate()?;

    let registry = EncoderRegistry::with_builtin();
    let factory = registry
        .create(&config.encoder, &config.schema)
        .with_context(|| format!("available encoders: {:?}", registry.list()))?;

    let dataset = open_output(&config)?;
    let assembly = BatchAssembler::new(config.batch_size, config.resume_mode)?.assemble(&dataset);
    let batches = match assembly.require_work() {
        Ok(batches) => batches,
        Err(empty) => {
            warn!("{}", empty);
            if config.fail_on_empty {
                return Ok(ExitCode::from(EXIT_EMPTY_WORK));
            }
            return Ok(ExitCode::SUCCESS);
        }
    };

    let mut coordinator = PoolCoordinator::new(config, factory)?;
    let (_dataset, summary) = coordinator.run(dataset, batches).await?;

    if summary.is_complete() {
        info!(records = summary.records_written, "all batches written");
        Ok(ExitCode::SUCCESS)
    } else {
        warn!(
            failed = summary.batches_failed,
            unclaimed = summary.batches_unclaimed,
            dropped = summary.results_dropped,
            "run incomplete, rerun with resume_mode to pick up pending records"
        );
        Ok(ExitCode::from(EXIT_INCOMPLETE))
    }
}

/// JSON file named by `CLIPQUEUE_CONFIG` (if set), then `CLIPQUEUE_*` overrides
fn load_config() -> Result<PipelineConfig> {
    let mut config = match std::env::var_os("CLIPQUEUE_CONFIG") {
        Some(path) => PipelineConfig::from_json_file(&path)
            .with_context(|| format!("loading config from {}", path.to_string_lossy()))?,
        None => PipelineConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

/// Loads the output dataset, creating it from the input on first run
fn open_output(config: &PipelineConfig) -> Result<Dataset> {
    let output = &config.dataset_output_path;
    let schema = config.schema.schema();

    if Dataset::exists(output) {
        info!(path = %output.display(), "loading existing output dataset");
        return Dataset::open_with_schema(output, schema)
            .with_context(|| format!("opening {}", output.display()));
    }

    let input = &config.dataset_input_path;
    if input.as_os_str().is_empty() {
        bail!(ConfigurationError::MissingPath("dataset_input_path"));
    }
    info!(
        input = %input.display(),
        output = %output.display(),
        "creating output dataset with zero-filled columns"
    );
    Dataset::create_from(input, output, schema)
        .with_context(|| format!("creating {} from {}", output.display(), input.display()))
}
