use clipqueue::{ConfigurationError, PipelineConfig};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_json_then_env_overrides() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.json");
    fs::write(
        &path,
        r#"{
            "num_parallel_workers": 8,
            "batch_size": 64,
            "accelerator_fraction_per_worker": 0.25,
            "dataset_input_path": "/data/segments",
            "dataset_output_path": "/data/segments_clip"
        }"#,
    )
    .unwrap();

    let mut config = PipelineConfig::from_json_file(&path).unwrap();
    assert_eq!(config.num_parallel_workers, 8);
    assert_eq!(config.batch_size, 64);
    assert_eq!(config.encoder, "synthetic");

    config
        .apply_vars([("CLIPQUEUE_BATCH_SIZE".to_string(), "16".to_string())])
        .unwrap();
    assert_eq!(config.batch_size, 16);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_config_file() {
    let dir = TempDir::new().unwrap();
    let err = PipelineConfig::from_json_file(dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, ConfigurationError::Read { .. }));
}

#[test]
fn test_malformed_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pipeline.json");
    fs::write(&path, r#"{"batch_size": "many"}"#).unwrap();

    let err = PipelineConfig::from_json_file(&path).unwrap_err();
    assert!(matches!(err, ConfigurationError::Parse(_)));
}
