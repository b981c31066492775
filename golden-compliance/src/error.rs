use thiserror::Error;

/// Problems found while resolving settings, raised before any evaluation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{rule}: CLI configuration set, but no configuration set to match.")]
    MissingMatchConfig { rule: String },
    #[error("unknown custom compliance function `{name}` (registered: {registered})")]
    UnknownCustomCompliance { name: String, registered: String },
    #[error("unknown custom remediation function `{name}` (registered: {registered})")]
    UnknownCustomRemediation { name: String, registered: String },
    #[error("{rule}: custom compliance requested but no custom compliance function is configured")]
    CustomComplianceUnconfigured { rule: String },
    #[error("{platform}: custom remediation requested but no custom remediation function is configured")]
    CustomRemediationUnconfigured { platform: String },
    #[error("duplicate remediation setting for platform {0}")]
    DuplicateRemediationSetting(String),
    #[error("invalid pattern `{name}`: {source}")]
    InvalidPattern { name: String, source: regex::Error },
}

/// A custom compliance result that does not follow the result schema.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("custom compliance result must be a mapping, got {received}")]
    NotAMapping { received: String },
    #[error("custom compliance result is missing the `{key}` key")]
    MissingKey { key: &'static str },
    #[error("custom compliance key `{key}` must be {expected}, got {received}")]
    InvalidValue {
        key: &'static str,
        expected: &'static str,
        received: String,
    },
}

/// Failure evaluating a single record. Never affects other records.
#[derive(Debug, Error)]
pub enum EvaluationError {
    #[error("no compliance rule for {platform} - {feature}")]
    UnknownRule { platform: String, feature: String },
    #[error("{rule}: invalid JSON payload: {source}")]
    InvalidJson {
        rule: String,
        source: serde_json::Error,
    },
    #[error("{rule}: invalid XML payload: {source}")]
    InvalidXml {
        rule: String,
        source: config_diff_core::xml::ParseError,
    },
    #[error("{rule}: custom compliance function failed: {message}")]
    Custom { rule: String, message: String },
    #[error("{rule}: {source}")]
    Validation {
        rule: String,
        source: ValidationError,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Failure synthesizing remediation. Callers log it and fall back to an
/// empty remediation.
#[derive(Debug, Error)]
pub enum RemediationError {
    #[error("no remediation setting for platform {0}")]
    NoSetting(String),
    #[error("platform {0} has no remediation profile")]
    UnsupportedPlatform(String),
    #[error("invalid remediation options: {0}")]
    InvalidOptions(#[from] serde_json::Error),
    #[error("invalid remediation rule pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
    #[error("custom remediation is configured for {0} but no function is registered")]
    CustomUnconfigured(String),
    #[error("custom remediation failed: {0}")]
    Custom(String),
}
