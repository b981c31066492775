//! Remediation synthesis for CLI configuration.
//!
//! [`rules`] holds the per-OS rule profiles, [`workflow`] turns a running
//! and an intended tree into the commands that converge them.

pub mod rules;
pub mod workflow;

use config_diff_core::{HierTree, ParseOptions};
use serde_json::Value;

use crate::engine::cli::selected_sections;
use crate::error::RemediationError;
use crate::platform::PlatformTable;

pub use rules::{DriverRules, RemediationProfiles, RuleSpec};
pub use workflow::{future, remediation_config, RemediationConfig};

/// Inputs of one hierarchical remediation.
#[derive(Debug, Clone, Copy)]
pub struct RemediationRequest<'a> {
    pub platform: &'a str,
    pub actual: &'a str,
    pub intended: &'a str,
    /// Top-level sections to remediate; empty for the whole configuration.
    pub selectors: &'a [&'a str],
    pub options: &'a Value,
}

/// Built-in hierarchical remediation backend.
#[derive(Debug, Clone)]
pub struct HierRemediator {
    profiles: RemediationProfiles,
}

impl Default for HierRemediator {
    fn default() -> Self {
        Self::new(RemediationProfiles::builtin())
    }
}

impl HierRemediator {
    pub fn new(profiles: RemediationProfiles) -> Self {
        Self { profiles }
    }

    /// Filtered remediation text for `request`.
    pub fn remediate(
        &self,
        request: &RemediationRequest<'_>,
        platforms: &PlatformTable,
    ) -> Result<String, RemediationError> {
        let prepared = self.prepare(request, platforms)?;
        Ok(prepared.remediation().to_text(prepared.parser.indent))
    }

    /// The running configuration as it would read after applying the
    /// filtered remediation.
    pub fn predict(
        &self,
        request: &RemediationRequest<'_>,
        platforms: &PlatformTable,
    ) -> Result<String, RemediationError> {
        let prepared = self.prepare(request, platforms)?;
        let remediation = prepared.remediation();
        Ok(future(&prepared.running, &remediation, &prepared.rules).render(prepared.parser.indent))
    }

    fn prepare(
        &self,
        request: &RemediationRequest<'_>,
        platforms: &PlatformTable,
    ) -> Result<Prepared, RemediationError> {
        let os = platforms
            .remediation_os(request.platform)
            .filter(|os| self.profiles.contains(os))
            .ok_or_else(|| RemediationError::UnsupportedPlatform(request.platform.to_string()))?;
        let parser = platforms
            .parser_options(request.platform)
            .cloned()
            .unwrap_or_else(ParseOptions::default);
        let rules = self.profiles.rules(&os, request.options)?;

        Ok(Prepared {
            running: reduce(request.actual, request.selectors, &parser),
            intended: reduce(request.intended, request.selectors, &parser),
            rules,
            parser,
        })
    }
}

struct Prepared {
    running: HierTree,
    intended: HierTree,
    rules: DriverRules,
    parser: ParseOptions,
}

impl Prepared {
    fn remediation(&self) -> RemediationConfig {
        remediation_config(&self.running, &self.intended, &self.rules)
            .filtered(self.rules.include_tags(), self.rules.exclude_tags())
    }
}

fn reduce(text: &str, selectors: &[&str], parser: &ParseOptions) -> HierTree {
    if selectors.is_empty() {
        config_diff_core::hier::parse_with_options(text, parser)
    } else {
        selected_sections(text, selectors, parser)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{HierRemediator, RemediationRequest};
    use crate::error::RemediationError;
    use crate::platform::{PlatformMapping, PlatformTable};

    #[test]
    fn remediates_only_selected_sections() {
        let remediator = HierRemediator::default();
        let platforms = PlatformTable::builtin();
        let request = RemediationRequest {
            platform: "cisco_ios",
            actual: "hostname r1\nntp server 10.0.0.9\n",
            intended: "hostname r2\nntp server 10.0.0.1\n",
            selectors: &["ntp"],
            options: &json!(null),
        };

        let text = remediator.remediate(&request, &platforms).expect("remediation");
        assert_eq!(text, "no ntp server 10.0.0.9\nntp server 10.0.0.1");
    }

    #[test]
    fn prediction_matches_intended_sections() {
        let remediator = HierRemediator::default();
        let request = RemediationRequest {
            platform: "cisco_ios",
            actual: "hostname r1\nntp server 10.0.0.9\n",
            intended: "hostname r1\nntp server 10.0.0.1\n",
            selectors: &[],
            options: &json!(null),
        };

        let predicted = remediator
            .predict(&request, &PlatformTable::builtin())
            .expect("prediction");
        assert_eq!(predicted, "hostname r1\nntp server 10.0.0.1");
    }

    #[test]
    fn exclude_tags_from_options_filter_output() {
        let remediator = HierRemediator::default();
        let platforms = PlatformTable::builtin();
        let options = json!({
            "exclude_tags": ["manual"],
            "tags": [{"lineage": [{"startswith": "no ntp"}], "apply_tags": ["manual"]}]
        });
        let request = RemediationRequest {
            platform: "cisco_ios",
            actual: "ntp server 10.0.0.9\n",
            intended: "ntp server 10.0.0.1\n",
            selectors: &["ntp"],
            options: &options,
        };

        let text = remediator.remediate(&request, &platforms).expect("remediation");
        assert_eq!(text, "ntp server 10.0.0.1");
    }

    #[test]
    fn unknown_platforms_are_unsupported() {
        let remediator = HierRemediator::default();
        let request = RemediationRequest {
            platform: "vendor_os",
            actual: "",
            intended: "",
            selectors: &[],
            options: &json!(null),
        };
        let err = remediator
            .remediate(&request, &PlatformTable::builtin())
            .expect_err("must fail");
        assert!(matches!(err, RemediationError::UnsupportedPlatform(_)));
    }

    #[test]
    fn platforms_without_a_profile_are_unsupported() {
        let platforms = PlatformTable::new(vec![PlatformMapping {
            driver: "vendor_os".to_string(),
            remediation_os: Some("vendoros".to_string()),
            parser: Default::default(),
        }]);
        let request = RemediationRequest {
            platform: "vendor_os",
            actual: "ntp server 10.0.0.9\n",
            intended: "ntp server 10.0.0.1\n",
            selectors: &[],
            options: &json!(null),
        };
        let err = HierRemediator::default()
            .remediate(&request, &platforms)
            .expect_err("must fail");
        assert!(matches!(err, RemediationError::UnsupportedPlatform(p) if p == "vendor_os"));
    }

    #[test]
    fn malformed_options_are_reported() {
        let remediator = HierRemediator::default();
        let options = json!({"exclude_tags": "manual"});
        let request = RemediationRequest {
            platform: "cisco_ios",
            actual: "ntp server 10.0.0.9\n",
            intended: "",
            selectors: &["ntp"],
            options: &options,
        };
        let err = remediator
            .remediate(&request, &PlatformTable::builtin())
            .expect_err("must fail");
        assert!(matches!(err, RemediationError::InvalidOptions(_)));
    }
}
