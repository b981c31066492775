use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::engine::{ComplianceEngine, EvaluationContext, Strategy};
use crate::error::{ConfigError, EvaluationError, RemediationError};
use crate::extension::ExtensionRegistry;
use crate::model::{
    ComplianceRecord, ComplianceResult, ComplianceRule, ConfigPayload, ConfigType, Device,
    RemediationSetting, RemediationType,
};
use crate::platform::PlatformTable;
use crate::remediation::{HierRemediator, RemediationRequest};
use crate::settings::Settings;

/// A rule together with the engine it evaluates with.
#[derive(Debug, Clone)]
pub struct ResolvedRule {
    pub rule: ComplianceRule,
    pub strategy: Strategy,
}

/// One (device, feature) comparison to run.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluationJob {
    pub device: Device,
    pub feature: String,
    pub actual: ConfigPayload,
    pub intended: ConfigPayload,
}

/// Evaluates records against resolved rules and attaches remediation.
///
/// Everything here is read-only once built, so one dispatcher can serve
/// any number of threads.
#[derive(Debug)]
pub struct Dispatcher {
    rules: Vec<ResolvedRule>,
    remediations: BTreeMap<String, RemediationSetting>,
    registry: ExtensionRegistry,
    platforms: PlatformTable,
    remediator: HierRemediator,
}

impl Dispatcher {
    /// Resolve every rule and remediation setting up front. Any unresolved
    /// name or invalid rule fails here, before evaluation starts.
    pub fn new(
        rules: Vec<ComplianceRule>,
        remediations: Vec<RemediationSetting>,
        registry: ExtensionRegistry,
        platforms: PlatformTable,
    ) -> Result<Self, ConfigError> {
        let rules = rules
            .into_iter()
            .map(|rule| {
                let strategy = Strategy::resolve(&rule, &registry)?;
                debug!(rule = %rule, engine = strategy.name(), "resolved compliance rule");
                Ok(ResolvedRule { rule, strategy })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        let mut table = BTreeMap::new();
        for setting in remediations {
            if setting.remediation_type == RemediationType::Custom && registry.remediation().is_none() {
                return Err(ConfigError::CustomRemediationUnconfigured {
                    platform: setting.platform,
                });
            }
            if table.contains_key(&setting.platform) {
                return Err(ConfigError::DuplicateRemediationSetting(setting.platform));
            }
            table.insert(setting.platform.clone(), setting);
        }

        Ok(Self {
            rules,
            remediations: table,
            registry,
            platforms,
            remediator: HierRemediator::default(),
        })
    }

    pub fn from_settings(settings: &Settings, platforms: PlatformTable) -> Result<Self, ConfigError> {
        let registry = ExtensionRegistry::from_settings(&settings.extensions)?;
        Self::new(
            settings.rules.clone(),
            settings.remediations.clone(),
            registry,
            platforms,
        )
    }

    pub fn with_remediator(mut self, remediator: HierRemediator) -> Self {
        self.remediator = remediator;
        self
    }

    pub fn rules(&self) -> &[ResolvedRule] {
        &self.rules
    }

    pub fn rule(&self, platform: &str, feature: &str) -> Option<&ResolvedRule> {
        self.rules
            .iter()
            .find(|r| r.rule.platform == platform && r.rule.feature == feature)
    }

    pub fn platforms(&self) -> &PlatformTable {
        &self.platforms
    }

    /// Evaluate a job against the rule for its device platform and feature.
    pub fn evaluate(&self, job: &EvaluationJob) -> Result<ComplianceRecord, EvaluationError> {
        let resolved = self
            .rule(&job.device.platform, &job.feature)
            .ok_or_else(|| EvaluationError::UnknownRule {
                platform: job.device.platform.clone(),
                feature: job.feature.clone(),
            })?;
        self.evaluate_rule(resolved, &job.device, &job.actual, &job.intended)
    }

    /// Evaluate one record. Remediation failures never fail the record.
    pub fn evaluate_rule(
        &self,
        resolved: &ResolvedRule,
        device: &Device,
        actual: &ConfigPayload,
        intended: &ConfigPayload,
    ) -> Result<ComplianceRecord, EvaluationError> {
        let ctx = EvaluationContext {
            device,
            rule: &resolved.rule,
            actual,
            intended,
            platforms: &self.platforms,
        };
        let result = resolved.strategy.evaluate(&ctx)?;
        debug!(
            device = %device.name,
            rule = %resolved.rule,
            compliance = result.compliance,
            "evaluated compliance"
        );
        let remediation = self.remediation_on_save(&ctx, &result);

        Ok(ComplianceRecord {
            device: device.name.clone(),
            rule: resolved.rule.to_string(),
            feature: resolved.rule.feature.clone(),
            actual: actual.clone(),
            intended: intended.clone(),
            result,
            remediation,
        })
    }

    /// Remediation text for a freshly evaluated record; empty when the record
    /// is compliant, remediation is off or cannot be produced.
    fn remediation_on_save(&self, ctx: &EvaluationContext<'_>, result: &ComplianceResult) -> String {
        if result.compliance || !ctx.rule.config_remediation {
            return String::new();
        }
        match self.remediation(ctx, result) {
            Ok(text) => text,
            Err(RemediationError::NoSetting(platform)) => {
                warn!(rule = %ctx.rule, platform = %platform, "no remediation setting, skipping remediation");
                String::new()
            }
            Err(err) => {
                error!(
                    device = %ctx.device.name,
                    rule = %ctx.rule,
                    error = %err,
                    "remediation failed"
                );
                String::new()
            }
        }
    }

    fn remediation(&self, ctx: &EvaluationContext<'_>, result: &ComplianceResult) -> Result<String, RemediationError> {
        let setting = self
            .remediations
            .get(&ctx.device.platform)
            .ok_or_else(|| RemediationError::NoSetting(ctx.device.platform.clone()))?;

        match setting.remediation_type {
            RemediationType::Hierconfig => {
                if ctx.rule.config_type != ConfigType::Cli || ctx.rule.custom_compliance {
                    debug!(rule = %ctx.rule, "hierarchical remediation only applies to CLI rules");
                    return Ok(String::new());
                }
                let actual = ctx.actual.as_text();
                let intended = ctx.intended.as_text();
                let selectors = ctx.rule.selectors();
                let request = RemediationRequest {
                    platform: &ctx.device.platform,
                    actual: &actual,
                    intended: &intended,
                    selectors: &selectors,
                    options: &setting.options,
                };
                self.remediator.remediate(&request, &self.platforms)
            }
            RemediationType::Custom => {
                let (_, function) = self
                    .registry
                    .remediation()
                    .ok_or_else(|| RemediationError::CustomUnconfigured(ctx.device.platform.clone()))?;
                function
                    .remediate(ctx, result, &setting.options)
                    .map_err(|err| RemediationError::Custom(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::{json, Value};

    use super::{Dispatcher, EvaluationJob};
    use crate::engine::EvaluationContext;
    use crate::error::{ConfigError, EvaluationError};
    use crate::extension::{CustomCompliance, CustomRemediation, ExtensionRegistry, ExtensionResult};
    use crate::model::{
        ComplianceResult, ComplianceRule, ConfigType, Device, DiffPayload, RemediationSetting,
        RemediationType,
    };
    use crate::platform::PlatformTable;

    fn rule(feature: &str, config_type: ConfigType, match_config: &str) -> ComplianceRule {
        ComplianceRule {
            platform: "cisco_ios".to_string(),
            feature: feature.to_string(),
            config_type,
            ordered: false,
            match_config: match_config.to_string(),
            custom_compliance: false,
            config_remediation: true,
        }
    }

    fn hierconfig() -> RemediationSetting {
        RemediationSetting {
            platform: "cisco_ios".to_string(),
            remediation_type: RemediationType::Hierconfig,
            options: Value::Null,
        }
    }

    fn job(feature: &str, actual: &str, intended: &str) -> EvaluationJob {
        EvaluationJob {
            device: Device::new("edge-01", "cisco_ios"),
            feature: feature.to_string(),
            actual: actual.into(),
            intended: intended.into(),
        }
    }

    struct AlwaysBroken;

    impl CustomCompliance for AlwaysBroken {
        fn evaluate(&self, _ctx: &EvaluationContext<'_>) -> ExtensionResult<Value> {
            Ok(json!({"compliance": true, "compliance_int": 1, "ordered": true, "missing": ""}))
        }
    }

    struct Echo;

    impl CustomRemediation for Echo {
        fn remediate(
            &self,
            ctx: &EvaluationContext<'_>,
            _result: &ComplianceResult,
            _options: &Value,
        ) -> ExtensionResult<String> {
            Ok(ctx.intended.as_text().into_owned())
        }
    }

    struct Locked;

    impl CustomRemediation for Locked {
        fn remediate(
            &self,
            _ctx: &EvaluationContext<'_>,
            _result: &ComplianceResult,
            _options: &Value,
        ) -> ExtensionResult<String> {
            Err("device configuration is locked".into())
        }
    }

    #[test]
    fn non_compliant_cli_record_gets_remediation() {
        let dispatcher = Dispatcher::new(
            vec![rule("ntp", ConfigType::Cli, "ntp")],
            vec![hierconfig()],
            ExtensionRegistry::default(),
            PlatformTable::builtin(),
        )
        .expect("dispatcher");

        let record = dispatcher
            .evaluate(&job("ntp", "ntp server 10.0.0.9\n", "ntp server 10.0.0.1\n"))
            .expect("record");
        assert!(!record.is_compliant());
        assert_eq!(record.rule, "cisco_ios - ntp");
        assert_eq!(record.remediation, "no ntp server 10.0.0.9\nntp server 10.0.0.1");
    }

    #[test]
    fn compliant_records_have_no_remediation() {
        let dispatcher = Dispatcher::new(
            vec![rule("ntp", ConfigType::Cli, "ntp")],
            vec![hierconfig()],
            ExtensionRegistry::default(),
            PlatformTable::builtin(),
        )
        .expect("dispatcher");

        let record = dispatcher
            .evaluate(&job("ntp", "ntp server 10.0.0.1\n", "ntp server 10.0.0.1\n"))
            .expect("record");
        assert!(record.is_compliant());
        assert_eq!(record.remediation, "");
    }

    #[test]
    fn missing_remediation_setting_yields_empty_remediation() {
        let dispatcher = Dispatcher::new(
            vec![rule("ntp", ConfigType::Cli, "ntp")],
            Vec::new(),
            ExtensionRegistry::default(),
            PlatformTable::builtin(),
        )
        .expect("dispatcher");

        let record = dispatcher
            .evaluate(&job("ntp", "ntp server 10.0.0.9\n", "ntp server 10.0.0.1\n"))
            .expect("record");
        assert!(!record.is_compliant());
        assert_eq!(record.remediation, "");
    }

    #[test]
    fn failing_remediation_keeps_the_compliance_result() {
        let setting = RemediationSetting {
            options: json!({"exclude_tags": "manual"}),
            ..hierconfig()
        };
        let dispatcher = Dispatcher::new(
            vec![rule("ntp", ConfigType::Cli, "ntp")],
            vec![setting],
            ExtensionRegistry::default(),
            PlatformTable::builtin(),
        )
        .expect("dispatcher");

        let record = dispatcher
            .evaluate(&job("ntp", "ntp server 10.0.0.9\n", "ntp server 10.0.0.1\n"))
            .expect("record");
        assert!(!record.is_compliant());
        assert_eq!(record.result.missing, DiffPayload::Text("ntp server 10.0.0.1".to_string()));
        assert_eq!(record.result.extra, DiffPayload::Text("ntp server 10.0.0.9".to_string()));
        assert_eq!(record.remediation, "");
    }

    #[test]
    fn failing_custom_remediation_yields_empty_remediation() {
        let mut registry = ExtensionRegistry::default();
        registry.register_remediation("locked", Arc::new(Locked));
        registry.select_remediation("locked").expect("registered");
        let setting = RemediationSetting {
            remediation_type: RemediationType::Custom,
            ..hierconfig()
        };
        let dispatcher = Dispatcher::new(
            vec![rule("ntp", ConfigType::Cli, "ntp")],
            vec![setting],
            registry,
            PlatformTable::builtin(),
        )
        .expect("dispatcher");

        let record = dispatcher
            .evaluate(&job("ntp", "ntp server 10.0.0.9\n", "ntp server 10.0.0.1\n"))
            .expect("record");
        assert!(!record.is_compliant());
        assert_eq!(record.result.compliance_int, 0);
        assert_eq!(record.result.missing, DiffPayload::Text("ntp server 10.0.0.1".to_string()));
        assert_eq!(record.remediation, "");
    }

    #[test]
    fn unmapped_platform_is_neutral() {
        let dispatcher = Dispatcher::new(
            vec![rule("ntp", ConfigType::Cli, "ntp")],
            vec![hierconfig()],
            ExtensionRegistry::default(),
            PlatformTable::new(Vec::new()),
        )
        .expect("dispatcher");

        let record = dispatcher
            .evaluate(&job("ntp", "ntp server 10.0.0.9\n", "ntp server 10.0.0.1\n"))
            .expect("record");
        assert!(record.is_compliant());
        assert_eq!(record.result.missing, DiffPayload::Text(String::new()));
    }

    #[test]
    fn json_rule_reports_paths() {
        let dispatcher = Dispatcher::new(
            vec![rule("vlans", ConfigType::Json, "")],
            Vec::new(),
            ExtensionRegistry::default(),
            PlatformTable::builtin(),
        )
        .expect("dispatcher");

        let record = dispatcher
            .evaluate(&job("vlans", "{}", r#"{"vlan": 10}"#))
            .expect("record");
        assert!(!record.is_compliant());
        assert_eq!(record.result.missing, DiffPayload::Paths(vec!["root['vlan']".to_string()]));
        assert_eq!(record.result.extra, DiffPayload::Paths(Vec::new()));
    }

    #[test]
    fn invalid_json_fails_only_that_record() {
        let dispatcher = Dispatcher::new(
            vec![rule("vlans", ConfigType::Json, "")],
            Vec::new(),
            ExtensionRegistry::default(),
            PlatformTable::builtin(),
        )
        .expect("dispatcher");

        let err = dispatcher
            .evaluate(&job("vlans", "{not json", "{}"))
            .expect_err("must fail");
        assert!(matches!(err, EvaluationError::InvalidJson { .. }));
    }

    #[test]
    fn unknown_rule_is_an_evaluation_error() {
        let dispatcher = Dispatcher::new(
            Vec::new(),
            Vec::new(),
            ExtensionRegistry::default(),
            PlatformTable::builtin(),
        )
        .expect("dispatcher");
        let err = dispatcher.evaluate(&job("ntp", "", "")).expect_err("must fail");
        assert!(matches!(err, EvaluationError::UnknownRule { .. }));
    }

    #[test]
    fn custom_rule_without_function_fails_at_startup() {
        let mut custom = rule("ntp", ConfigType::Cli, "ntp");
        custom.custom_compliance = true;

        let err = Dispatcher::new(
            vec![custom],
            Vec::new(),
            ExtensionRegistry::default(),
            PlatformTable::builtin(),
        )
        .expect_err("must fail");
        assert!(matches!(err, ConfigError::CustomComplianceUnconfigured { .. }));
    }

    #[test]
    fn custom_results_are_validated() {
        let mut custom = rule("ntp", ConfigType::Cli, "ntp");
        custom.custom_compliance = true;
        let mut registry = ExtensionRegistry::default();
        registry.register_compliance("broken", Arc::new(AlwaysBroken));
        registry.select_compliance("broken").expect("registered");

        let dispatcher = Dispatcher::new(vec![custom], Vec::new(), registry, PlatformTable::builtin())
            .expect("dispatcher");
        let err = dispatcher.evaluate(&job("ntp", "", "")).expect_err("must fail");
        assert!(err.to_string().contains("`extra`"));
    }

    #[test]
    fn custom_remediation_receives_the_context() {
        let mut registry = ExtensionRegistry::discover();
        registry.register_remediation("echo", Arc::new(Echo));
        registry.select_remediation("echo").expect("registered");
        let setting = RemediationSetting {
            remediation_type: RemediationType::Custom,
            ..hierconfig()
        };

        let dispatcher = Dispatcher::new(
            vec![rule("ntp", ConfigType::Cli, "ntp")],
            vec![setting],
            registry,
            PlatformTable::builtin(),
        )
        .expect("dispatcher");
        let record = dispatcher
            .evaluate(&job("ntp", "ntp server 10.0.0.9", "ntp server 10.0.0.1"))
            .expect("record");
        assert_eq!(record.remediation, "ntp server 10.0.0.1");
    }

    #[test]
    fn custom_remediation_without_function_fails_at_startup() {
        let setting = RemediationSetting {
            remediation_type: RemediationType::Custom,
            ..hierconfig()
        };
        let err = Dispatcher::new(
            Vec::new(),
            vec![setting],
            ExtensionRegistry::default(),
            PlatformTable::builtin(),
        )
        .expect_err("must fail");
        assert!(matches!(err, ConfigError::CustomRemediationUnconfigured { .. }));
    }
}
