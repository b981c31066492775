use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;

/// Representation a rule compares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigType {
    #[default]
    Cli,
    Json,
    Xml,
}

impl Display for ConfigType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigType::Cli => "cli",
            ConfigType::Json => "json",
            ConfigType::Xml => "xml",
        };
        f.write_str(name)
    }
}

/// How one feature is compared on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplianceRule {
    /// Network driver slug, e.g. `cisco_ios`.
    pub platform: String,
    pub feature: String,
    #[serde(default)]
    pub config_type: ConfigType,
    /// Sibling order is significant at every level.
    #[serde(default)]
    pub ordered: bool,
    /// CLI: one top-level line per section. JSON: a top-level key. XML: an
    /// xpath query.
    #[serde(default)]
    pub match_config: String,
    /// Route evaluation to the configured custom compliance function.
    #[serde(default, rename = "custom")]
    pub custom_compliance: bool,
    /// Attempt remediation when the record is not compliant.
    #[serde(default, rename = "remediation")]
    pub config_remediation: bool,
}

impl ComplianceRule {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.config_type == ConfigType::Cli
            && !self.custom_compliance
            && self.selectors().is_empty()
        {
            return Err(ConfigError::MissingMatchConfig {
                rule: self.to_string(),
            });
        }
        Ok(())
    }

    /// Non-empty, trimmed lines of `match_config`.
    pub fn selectors(&self) -> Vec<&str> {
        self.match_config
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }
}

impl Display for ComplianceRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.platform, self.feature)
    }
}

/// Minimal device context handed to engines and custom functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub name: String,
    pub platform: String,
}

impl Device {
    pub fn new(name: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: platform.into(),
        }
    }
}

/// Actual or intended configuration as handed over by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigPayload {
    Text(String),
    Json(Value),
}

impl ConfigPayload {
    /// Text form. JSON payloads render compactly.
    pub fn as_text(&self) -> Cow<'_, str> {
        match self {
            ConfigPayload::Text(text) => Cow::Borrowed(text),
            ConfigPayload::Json(value) => Cow::Owned(value.to_string()),
        }
    }

    /// Structured form. Text payloads are parsed as JSON.
    pub fn to_value(&self) -> Result<Value, serde_json::Error> {
        match self {
            ConfigPayload::Text(text) => serde_json::from_str(text),
            ConfigPayload::Json(value) => Ok(value.clone()),
        }
    }
}

impl From<&str> for ConfigPayload {
    fn from(text: &str) -> Self {
        ConfigPayload::Text(text.to_string())
    }
}

impl From<String> for ConfigPayload {
    fn from(text: String) -> Self {
        ConfigPayload::Text(text)
    }
}

impl From<Value> for ConfigPayload {
    fn from(value: Value) -> Self {
        ConfigPayload::Json(value)
    }
}

/// A `missing` or `extra` payload.
///
/// CLI and XML engines produce text, the JSON engine produces key paths and
/// custom functions may return any JSON value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DiffPayload {
    Text(String),
    Paths(Vec<String>),
    Json(Value),
}

impl Default for DiffPayload {
    fn default() -> Self {
        DiffPayload::Text(String::new())
    }
}

impl DiffPayload {
    pub fn is_empty(&self) -> bool {
        match self {
            DiffPayload::Text(text) => text.is_empty(),
            DiffPayload::Paths(paths) => paths.is_empty(),
            DiffPayload::Json(Value::Null) => true,
            DiffPayload::Json(Value::String(s)) => s.is_empty(),
            DiffPayload::Json(Value::Array(items)) => items.is_empty(),
            DiffPayload::Json(Value::Object(map)) => map.is_empty(),
            DiffPayload::Json(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DiffPayload::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Human-readable form: text as is, one path per line, or pretty JSON.
    pub fn render(&self) -> String {
        match self {
            DiffPayload::Text(text) => text.clone(),
            DiffPayload::Paths(paths) => paths.join("\n"),
            DiffPayload::Json(value) => {
                serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
            }
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            DiffPayload::Text(text) => Value::String(text.clone()),
            DiffPayload::Paths(paths) => {
                Value::Array(paths.iter().cloned().map(Value::String).collect())
            }
            DiffPayload::Json(value) => value.clone(),
        }
    }
}

/// Uniform engine output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub compliance: bool,
    /// `compliance` as 0/1 for aggregation.
    pub compliance_int: u8,
    /// Whether the result itself was order-compliant.
    pub ordered: bool,
    pub missing: DiffPayload,
    pub extra: DiffPayload,
}

impl ComplianceResult {
    pub fn new(compliance: bool, ordered: bool, missing: DiffPayload, extra: DiffPayload) -> Self {
        Self {
            compliance,
            compliance_int: u8::from(compliance),
            ordered,
            missing,
            extra,
        }
    }

    /// Compliant result with nothing missing or extra.
    pub fn neutral() -> Self {
        Self::new(true, true, DiffPayload::default(), DiffPayload::default())
    }
}

/// One evaluation of one rule against one device.
///
/// Records are recomputed wholesale; nothing patches a record in place.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComplianceRecord {
    pub device: String,
    /// Display form of the rule, `<platform> - <feature>`.
    pub rule: String,
    pub feature: String,
    pub actual: ConfigPayload,
    pub intended: ConfigPayload,
    #[serde(flatten)]
    pub result: ComplianceResult,
    /// Remediation commands, empty when none apply.
    pub remediation: String,
}

impl ComplianceRecord {
    pub fn is_compliant(&self) -> bool {
        self.result.compliance
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemediationType {
    Hierconfig,
    Custom,
}

/// Per-platform remediation backend selection and its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationSetting {
    pub platform: String,
    #[serde(rename = "type")]
    pub remediation_type: RemediationType,
    #[serde(default)]
    pub options: Value,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ComplianceResult, ComplianceRule, ConfigPayload, ConfigType, DiffPayload};
    use crate::error::ConfigError;

    fn rule(match_config: &str) -> ComplianceRule {
        ComplianceRule {
            platform: "cisco_ios".to_string(),
            feature: "ntp".to_string(),
            config_type: ConfigType::Cli,
            ordered: false,
            match_config: match_config.to_string(),
            custom_compliance: false,
            config_remediation: false,
        }
    }

    #[test]
    fn cli_rule_requires_match_config() {
        let err = rule("  \n").validate().expect_err("must fail");
        assert!(matches!(err, ConfigError::MissingMatchConfig { .. }));
        assert!(err
            .to_string()
            .contains("CLI configuration set, but no configuration set to match"));
        assert!(rule("ntp\nclock").validate().is_ok());
    }

    #[test]
    fn selectors_skip_blank_lines() {
        assert_eq!(rule("ntp\n\n  clock \n").selectors(), vec!["ntp", "clock"]);
    }

    #[test]
    fn display_joins_platform_and_feature() {
        assert_eq!(rule("ntp").to_string(), "cisco_ios - ntp");
    }

    #[test]
    fn payloads_deserialize_untagged() {
        let text: ConfigPayload = serde_json::from_value(json!("hostname r1")).expect("text");
        assert_eq!(text, ConfigPayload::Text("hostname r1".to_string()));
        let value: ConfigPayload = serde_json::from_value(json!({"vlan": 10})).expect("json");
        assert_eq!(value, ConfigPayload::Json(json!({"vlan": 10})));
    }

    #[test]
    fn diff_payload_emptiness() {
        assert!(DiffPayload::default().is_empty());
        assert!(DiffPayload::Paths(Vec::new()).is_empty());
        assert!(DiffPayload::Json(json!({})).is_empty());
        assert!(!DiffPayload::Json(json!(0)).is_empty());
    }

    #[test]
    fn result_mirrors_compliance_as_int() {
        let result = ComplianceResult::new(false, false, DiffPayload::default(), DiffPayload::default());
        assert_eq!(result.compliance_int, 0);
        assert_eq!(ComplianceResult::neutral().compliance_int, 1);
    }
}
