//! Domain-level error taxonomy for proctoring.

/// The signal source (camera/microphone) could not be acquired.
///
/// Non-fatal to the application: the session stays in `AwaitingConsent`
/// and acquisition may be retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AcquisitionError {
    #[error("capture permission denied: {0}")]
    PermissionDenied(String),

    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),
}

/// A policy set failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    #[error("invalid rule {rule_id}: {reason}")]
    InvalidRule { rule_id: String, reason: String },

    #[error("duplicate rule id: {0}")]
    DuplicateRuleId(String),

    #[error("unknown policy: {0}")]
    UnknownPolicy(String),
}

/// Top-level proctoring errors.
#[derive(Debug, thiserror::Error)]
pub enum ProctorError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("policy error: {0}")]
    Policy(#[from] PolicyError),

    #[error("acquisition error: {0}")]
    Acquisition(#[from] AcquisitionError),

    #[error("session error: {0}")]
    Session(#[from] crate::session::SessionError),

    #[error("storage error: {0}")]
    Storage(#[from] crate::persistence::StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for proctoring operations.
pub type Result<T> = std::result::Result<T, ProctorError>;
