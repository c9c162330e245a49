use std::io::Write;
use std::sync::Arc;

use proctor_core::config::{MAX_INTERVIEW_SECS, MAX_PERSIST_RETRIES};
use proctor_core::{MemoryOutcomeStore, ProctorConfig, ProctorError, SessionController};

const FULL: &str = r#"
[timing]
sample_interval_ms = 50
evaluation_interval_ms = 1000

[interview]
duration_secs = 1800
policy = "live_interview"

[enrollment]
progress_step = 5

[rubric]
entries = [
    { points = 10, min_length = 20, label = "Reverse a linked list." },
    { points = 5, min_length = 10 },
]

[rubric.tiers]
lower_fraction = 0.5
upper_fraction = 0.9
upper_length = 80

[persistence]
max_retries = 1
backoff_base_ms = 50
"#;

#[test]
fn test_load_full_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FULL.as_bytes()).unwrap();

    let config = ProctorConfig::load(file.path()).unwrap();
    assert_eq!(config.timing.sample_interval_ms, 50);
    assert_eq!(config.timing.countdown_interval_ms, 1000);
    assert_eq!(config.interview.duration_secs, 1800);
    assert_eq!(config.enrollment.progress_step, 5);
    assert_eq!(config.enrollment.policy, "enrollment");
    assert_eq!(config.rubric.len(), 2);
    assert_eq!(config.rubric.max_score(), 15);
    assert_eq!(config.rubric.tiers.upper_length, 80);
    assert_eq!(config.persistence.retry.max_retries, 1);
    assert!(config.persistence.dir.is_none());
}

#[test]
fn test_missing_file_is_io_error() {
    let err = ProctorConfig::load("/nonexistent/proctor.toml").unwrap_err();
    assert!(matches!(err, ProctorError::Io(_)));
}

#[test]
fn test_empty_rubric_rejected() {
    let err = ProctorConfig::from_toml_str("[rubric]\nentries = []").unwrap_err();
    assert!(matches!(err, ProctorError::InvalidConfig(_)));
}

#[test]
fn test_progress_step_bounds() {
    assert!(ProctorConfig::from_toml_str("[enrollment]\nprogress_step = 0").is_err());
    assert!(ProctorConfig::from_toml_str("[enrollment]\nprogress_step = 100").is_ok());
}

#[test]
fn test_controller_rejects_invalid_config() {
    let mut config = ProctorConfig::default();
    config.interview.duration_secs = 0;
    let result = SessionController::new(&config, Arc::new(MemoryOutcomeStore::new()));
    assert!(matches!(result, Err(ProctorError::InvalidConfig(_))));
}

#[test]
fn test_oversized_duration_rejected() {
    let err =
        ProctorConfig::from_toml_str("[interview]\nduration_secs = 10000000000000").unwrap_err();
    assert!(matches!(err, ProctorError::InvalidConfig(_)));

    let mut config = ProctorConfig::default();
    config.interview.duration_secs = MAX_INTERVIEW_SECS + 1;
    let result = SessionController::new(&config, Arc::new(MemoryOutcomeStore::new()));
    assert!(matches!(result, Err(ProctorError::InvalidConfig(_))));

    config.interview.duration_secs = MAX_INTERVIEW_SECS;
    assert!(config.validate().is_ok());
}

#[test]
fn test_retry_count_is_capped() {
    let toml = format!("[persistence]\nmax_retries = {}", MAX_PERSIST_RETRIES + 1);
    assert!(ProctorConfig::from_toml_str(&toml).is_err());

    let toml = format!("[persistence]\nmax_retries = {MAX_PERSIST_RETRIES}");
    assert!(ProctorConfig::from_toml_str(&toml).is_ok());
}
