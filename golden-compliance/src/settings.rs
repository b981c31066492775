//! TOML settings: rules, remediation settings, extensions, sanitization and
//! batch tuning.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::model::{ComplianceRule, RemediationSetting};
use crate::sanitize::{LineRemoval, LineReplacement};

/// Errors returned when loading a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse settings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExtensionSettings {
    pub custom_compliance: Option<String>,
    pub custom_remediation: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SanitizeSettings {
    #[serde(default)]
    pub remove: Vec<LineRemoval>,
    #[serde(default)]
    pub replace: Vec<LineReplacement>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BatchSettings {
    /// Worker threads, 0 for one per CPU.
    #[serde(default)]
    pub jobs: usize,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub extensions: ExtensionSettings,
    #[serde(default, rename = "rule")]
    pub rules: Vec<ComplianceRule>,
    #[serde(default, rename = "remediation")]
    pub remediations: Vec<RemediationSetting>,
    #[serde(default)]
    pub sanitize: SanitizeSettings,
    #[serde(default)]
    pub batch: BatchSettings,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&raw, path.display().to_string())
    }

    pub fn from_toml(raw: &str) -> Result<Self, SettingsError> {
        Self::parse(raw, "inline settings".to_string())
    }

    fn parse(raw: &str, path: String) -> Result<Self, SettingsError> {
        toml::from_str(raw).map_err(|source| SettingsError::Parse { path, source })
    }

    /// Rules for one platform, optionally narrowed to one feature.
    pub fn rules_for<'a>(
        &'a self,
        platform: &'a str,
        feature: Option<&'a str>,
    ) -> impl Iterator<Item = &'a ComplianceRule> + 'a {
        self.rules.iter().filter(move |rule| {
            rule.platform == platform && feature.map_or(true, |f| rule.feature == f)
        })
    }

    /// Remediation settings keyed by platform.
    pub fn remediation_table(&self) -> BTreeMap<String, RemediationSetting> {
        self.remediations
            .iter()
            .map(|setting| (setting.platform.clone(), setting.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;

    use super::{Settings, SettingsError};
    use crate::model::{ConfigType, RemediationType};

    const SAMPLE: &str = r#"
[extensions]
custom_compliance = "text-equality"

[[rule]]
platform = "cisco_ios"
feature = "ntp"
match_config = "ntp"

[[rule]]
platform = "cisco_ios"
feature = "acl"
config_type = "cli"
ordered = true
match_config = "ip access-list"
remediation = true

[[rule]]
platform = "juniper_junos"
feature = "system"
config_type = "xml"
match_config = "/configuration/system"

[[remediation]]
platform = "cisco_ios"
type = "hierconfig"
[remediation.options]
exclude_tags = ["manual"]

[[sanitize.remove]]
name = "build banner"
regex = "^Building configuration.*"

[batch]
jobs = 4
"#;

    #[test]
    fn parses_full_settings_document() {
        let settings = Settings::from_toml(SAMPLE).expect("settings should parse");

        assert_eq!(settings.extensions.custom_compliance.as_deref(), Some("text-equality"));
        assert_eq!(settings.rules.len(), 3);
        assert_eq!(settings.rules[0].config_type, ConfigType::Cli);
        assert!(!settings.rules[0].ordered);
        assert!(settings.rules[1].config_remediation);
        assert_eq!(settings.rules[2].config_type, ConfigType::Xml);

        let remediation = &settings.remediations[0];
        assert_eq!(remediation.remediation_type, RemediationType::Hierconfig);
        assert_eq!(remediation.options, json!({"exclude_tags": ["manual"]}));

        assert_eq!(settings.sanitize.remove.len(), 1);
        assert_eq!(settings.batch.jobs, 4);
    }

    #[test]
    fn filters_rules_by_platform_and_feature() {
        let settings = Settings::from_toml(SAMPLE).expect("settings should parse");
        assert_eq!(settings.rules_for("cisco_ios", None).count(), 2);
        assert_eq!(settings.rules_for("cisco_ios", Some("acl")).count(), 1);
        assert_eq!(settings.rules_for("arista_eos", None).count(), 0);
    }

    #[test]
    fn load_errors_name_the_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("settings.toml");
        fs::write(&path, "[[rule]]\nplatform = 1").expect("write settings");

        let err = Settings::load(&path).expect_err("should fail parse");
        assert!(matches!(err, SettingsError::Parse { .. }));
        assert!(err.to_string().contains("settings.toml"));

        let missing = Settings::load(&dir.path().join("absent.toml")).expect_err("should fail read");
        assert!(matches!(missing, SettingsError::Io { .. }));
    }
}
