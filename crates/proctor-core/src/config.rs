//! Session configuration, loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) yields the
//! shipped behaviour: 100 ms sampling, 2 s evaluation ticks, a 45 minute
//! interview under the live-interview policy, and the coding-round rubric.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::{ProctorError, Result};
use crate::persistence::RetryPolicy;
use crate::policy::PolicySet;
use crate::scoring::Rubric;

/// Longest interview accepted, one day.
pub const MAX_INTERVIEW_SECS: u64 = 24 * 60 * 60;

/// Most persistence retries accepted.
pub const MAX_PERSIST_RETRIES: u32 = 16;

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Cadence of the three periodic activities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// How often the signal feed is polled.
    pub sample_interval_ms: u64,
    /// How often the policy engine evaluates; one sustained-rule tick.
    pub evaluation_interval_ms: u64,
    /// Countdown resolution. Each tick removes one second.
    pub countdown_interval_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sample_interval_ms: 100,
            evaluation_interval_ms: 2000,
            countdown_interval_ms: 1000,
        }
    }
}

impl TimingConfig {
    pub fn sample_interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }

    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_millis(self.evaluation_interval_ms)
    }

    pub fn countdown_interval(&self) -> Duration {
        Duration::from_millis(self.countdown_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterviewConfig {
    pub duration_secs: u64,
    /// Name of a preset policy (see [`PolicySet::named`]).
    pub policy: String,
}

impl Default for InterviewConfig {
    fn default() -> Self {
        Self {
            duration_secs: 45 * 60,
            policy: "live_interview".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrollmentConfig {
    /// Percentage points of progress per accepted sample.
    pub progress_step: u8,
    pub policy: String,
}

impl Default for EnrollmentConfig {
    fn default() -> Self {
        Self {
            progress_step: 2,
            policy: "enrollment".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Directory for `FsOutcomeStore`. `None` keeps outcomes in memory.
    pub dir: Option<PathBuf>,
    #[serde(flatten)]
    pub retry: RetryPolicy,
}

// ---------------------------------------------------------------------------
// ProctorConfig
// ---------------------------------------------------------------------------

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProctorConfig {
    pub timing: TimingConfig,
    pub interview: InterviewConfig,
    pub enrollment: EnrollmentConfig,
    pub rubric: Rubric,
    pub persistence: PersistenceConfig,
}

impl ProctorConfig {
    /// Read and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let t = &self.timing;
        if t.sample_interval_ms == 0
            || t.evaluation_interval_ms == 0
            || t.countdown_interval_ms == 0
        {
            return Err(ProctorError::InvalidConfig(
                "timing intervals must be greater than zero".into(),
            ));
        }
        if !(1..=MAX_INTERVIEW_SECS).contains(&self.interview.duration_secs) {
            return Err(ProctorError::InvalidConfig(format!(
                "interview.duration_secs must be 1..={MAX_INTERVIEW_SECS}, got {}",
                self.interview.duration_secs
            )));
        }
        if self.persistence.retry.max_retries > MAX_PERSIST_RETRIES {
            return Err(ProctorError::InvalidConfig(format!(
                "persistence.max_retries must be at most {MAX_PERSIST_RETRIES}, got {}",
                self.persistence.retry.max_retries
            )));
        }
        if !(1..=100).contains(&self.enrollment.progress_step) {
            return Err(ProctorError::InvalidConfig(format!(
                "enrollment.progress_step must be 1..=100, got {}",
                self.enrollment.progress_step
            )));
        }
        if self.rubric.is_empty() {
            return Err(ProctorError::InvalidConfig("rubric has no questions".into()));
        }
        self.interview_policy()?;
        self.enrollment_policy()?;
        Ok(())
    }

    pub fn interview_policy(&self) -> Result<PolicySet> {
        Ok(PolicySet::named(&self.interview.policy)?)
    }

    pub fn enrollment_policy(&self) -> Result<PolicySet> {
        Ok(PolicySet::named(&self.enrollment.policy)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_is_default() {
        let config = ProctorConfig::from_toml_str("").unwrap();
        assert_eq!(config, ProctorConfig::default());
        assert_eq!(config.timing.evaluation_interval(), Duration::from_secs(2));
        assert_eq!(config.interview.duration_secs, 2700);
        assert_eq!(config.rubric.max_score(), 92);
    }

    #[test]
    fn test_partial_sections_keep_defaults() {
        let config = ProctorConfig::from_toml_str(
            r#"
            [timing]
            evaluation_interval_ms = 500

            [persistence]
            dir = "/var/lib/proctor"
            max_retries = 5
            "#,
        )
        .unwrap();
        assert_eq!(config.timing.evaluation_interval_ms, 500);
        assert_eq!(config.timing.sample_interval_ms, 100);
        assert_eq!(config.persistence.retry.max_retries, 5);
        assert_eq!(config.persistence.retry.backoff_base_ms, 250);
        assert_eq!(
            config.persistence.dir.as_deref(),
            Some(Path::new("/var/lib/proctor"))
        );
    }

    #[test]
    fn test_zero_interval_rejected() {
        let err = ProctorConfig::from_toml_str("[timing]\nsample_interval_ms = 0").unwrap_err();
        assert!(matches!(err, ProctorError::InvalidConfig(_)));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = ProctorConfig::from_toml_str("[interview]\npolicy = \"lenient\"").unwrap_err();
        assert!(matches!(err, ProctorError::Policy(_)));
    }

    #[test]
    fn test_malformed_toml() {
        let err = ProctorConfig::from_toml_str("[timing\n").unwrap_err();
        assert!(matches!(err, ProctorError::ConfigParse(_)));
    }
}
