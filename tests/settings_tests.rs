use std::io::Write;

use tiledet::core::config::settings::{
    ENV_BATCH_SIZE, ENV_CPU_WORKERS, ENV_DEVICE, ENV_DISABLE_PARALLEL, ENV_QUEUE_CAPACITY,
};
use tiledet::core::{ConfigError, DEFAULT_CUDA_BATCH_SIZE};
use tiledet::prelude::*;

fn write_json(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

#[test]
fn test_json_file_overrides_only_named_fields() {
    let file = write_json(
        r#"{
            "device": "cuda",
            "input_size": [640, 480],
            "queue_capacity": 2,
            "geometry": { "text_threshold": 0.8 }
        }"#,
    );

    let settings = DetectorSettings::from_json_file(file.path()).unwrap();
    assert_eq!(settings.device, DeviceKind::Cuda);
    assert_eq!(settings.input_size, (640, 480));
    assert_eq!(settings.queue_capacity, 2);
    assert_eq!(settings.effective_batch_size(), DEFAULT_CUDA_BATCH_SIZE);
    assert_eq!(settings.geometry.text_threshold, 0.8);

    let defaults = DetectorSettings::default();
    assert_eq!(settings.heatmap_count, defaults.heatmap_count);
    assert_eq!(settings.parallel, defaults.parallel);
    assert_eq!(settings.geometry.low_text, defaults.geometry.low_text);
}

#[test]
fn test_json_file_with_invalid_values_is_rejected() {
    let file = write_json(r#"{ "queue_capacity": 0 }"#);
    let err = DetectorSettings::from_json_file(file.path()).unwrap_err();
    assert!(matches!(err, PipelineError::ConfigError { .. }));

    let file = write_json(r#"{ "geometry": { "text_threshold": 0.2, "low_text": 0.5 } }"#);
    assert!(DetectorSettings::from_json_file(file.path()).is_err());
}

#[test]
fn test_malformed_or_missing_json_file() {
    let file = write_json("{ not json");
    let err = DetectorSettings::from_json_file(file.path()).unwrap_err();
    assert!(matches!(err, PipelineError::Json(_)));

    let dir = tempfile::tempdir().unwrap();
    let err = DetectorSettings::from_json_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, PipelineError::Io(_)));
}

#[test]
fn test_env_overrides_apply_on_top_of_file() {
    let file = write_json(r#"{ "device": "mps", "batch_size": 12 }"#);
    let settings = DetectorSettings::from_json_file(file.path())
        .unwrap()
        .with_env_overrides([
            (ENV_DEVICE, "cuda"),
            (ENV_CPU_WORKERS, "2"),
            (ENV_DISABLE_PARALLEL, "true"),
            ("UNRELATED_VARIABLE", "ignored"),
        ])
        .unwrap();

    assert_eq!(settings.device, DeviceKind::Cuda);
    // The explicit batch size from the file still wins over the device default.
    assert_eq!(settings.effective_batch_size(), 12);
    assert_eq!(settings.parallel.cpu_workers, 2);
    assert!(!settings.parallel.parallel_postprocess_allowed);
}

#[test]
fn test_env_overrides_reject_bad_values() {
    for (key, value) in [
        (ENV_BATCH_SIZE, "many"),
        (ENV_BATCH_SIZE, "0"),
        (ENV_DEVICE, "tpu"),
        (ENV_QUEUE_CAPACITY, "0"),
        (ENV_DISABLE_PARALLEL, "maybe"),
    ] {
        let result = DetectorSettings::default().with_env_overrides([(key, value)]);
        assert!(result.is_err(), "{key}={value} should be rejected");
    }
}

#[test]
fn test_config_error_converts_into_pipeline_error() {
    let err: PipelineError = ConfigError::InvalidConfig {
        message: "bad".to_string(),
    }
    .into();
    assert!(err.to_string().contains("bad"));
}
