//! Named custom compliance and remediation functions.
//!
//! Functions are registered at link time with [`inventory::submit!`] or
//! added to an [`ExtensionRegistry`] by hand. The settings name at most one
//! compliance and one remediation function; both are resolved once, before
//! any record is evaluated.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::engine::EvaluationContext;
use crate::error::{ConfigError, ValidationError};
use crate::model::{ComplianceResult, DiffPayload};
use crate::settings::ExtensionSettings;

pub type ExtensionResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// A compliance function returning the raw result mapping.
///
/// The mapping must carry `compliance`, `compliance_int`, `ordered`,
/// `missing` and `extra`; see [`validate_custom_result`].
pub trait CustomCompliance: Send + Sync {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> ExtensionResult<Value>;
}

/// A remediation function returning the remediation text.
pub trait CustomRemediation: Send + Sync {
    fn remediate(
        &self,
        ctx: &EvaluationContext<'_>,
        result: &ComplianceResult,
        options: &Value,
    ) -> ExtensionResult<String>;
}

/// Link-time registration of a [`CustomCompliance`] implementation.
pub struct CustomComplianceRegistration {
    pub name: &'static str,
    pub build: fn() -> Box<dyn CustomCompliance>,
}

/// Link-time registration of a [`CustomRemediation`] implementation.
pub struct CustomRemediationRegistration {
    pub name: &'static str,
    pub build: fn() -> Box<dyn CustomRemediation>,
}

inventory::collect!(CustomComplianceRegistration);
inventory::collect!(CustomRemediationRegistration);

/// Available custom functions and the ones selected by the settings.
#[derive(Default, Clone)]
pub struct ExtensionRegistry {
    compliance_fns: BTreeMap<String, Arc<dyn CustomCompliance>>,
    remediation_fns: BTreeMap<String, Arc<dyn CustomRemediation>>,
    selected_compliance: Option<String>,
    selected_remediation: Option<String>,
}

impl std::fmt::Debug for ExtensionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionRegistry")
            .field("compliance", &self.compliance_fns.keys().collect::<Vec<_>>())
            .field("remediation", &self.remediation_fns.keys().collect::<Vec<_>>())
            .field("selected_compliance", &self.selected_compliance)
            .field("selected_remediation", &self.selected_remediation)
            .finish()
    }
}

impl ExtensionRegistry {
    /// Registry holding every link-time registration, nothing selected.
    pub fn discover() -> Self {
        let mut registry = Self::default();
        for entry in inventory::iter::<CustomComplianceRegistration> {
            registry
                .compliance_fns
                .insert(entry.name.to_string(), Arc::from((entry.build)()));
        }
        for entry in inventory::iter::<CustomRemediationRegistration> {
            registry
                .remediation_fns
                .insert(entry.name.to_string(), Arc::from((entry.build)()));
        }
        registry
    }

    /// Discover registrations and select the functions the settings name.
    pub fn from_settings(settings: &ExtensionSettings) -> Result<Self, ConfigError> {
        let mut registry = Self::discover();
        if let Some(name) = &settings.custom_compliance {
            registry.select_compliance(name)?;
        }
        if let Some(name) = &settings.custom_remediation {
            registry.select_remediation(name)?;
        }
        Ok(registry)
    }

    pub fn register_compliance(&mut self, name: impl Into<String>, function: Arc<dyn CustomCompliance>) {
        self.compliance_fns.insert(name.into(), function);
    }

    pub fn register_remediation(&mut self, name: impl Into<String>, function: Arc<dyn CustomRemediation>) {
        self.remediation_fns.insert(name.into(), function);
    }

    pub fn select_compliance(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.compliance_fns.contains_key(name) {
            return Err(ConfigError::UnknownCustomCompliance {
                name: name.to_string(),
                registered: listing(self.compliance_names()),
            });
        }
        self.selected_compliance = Some(name.to_string());
        Ok(())
    }

    pub fn select_remediation(&mut self, name: &str) -> Result<(), ConfigError> {
        if !self.remediation_fns.contains_key(name) {
            return Err(ConfigError::UnknownCustomRemediation {
                name: name.to_string(),
                registered: listing(self.remediation_names()),
            });
        }
        self.selected_remediation = Some(name.to_string());
        Ok(())
    }

    /// The selected compliance function and its name.
    pub fn compliance(&self) -> Option<(String, Arc<dyn CustomCompliance>)> {
        let name = self.selected_compliance.as_ref()?;
        let function = self.compliance_fns.get(name)?;
        Some((name.clone(), Arc::clone(function)))
    }

    /// The selected remediation function and its name.
    pub fn remediation(&self) -> Option<(String, Arc<dyn CustomRemediation>)> {
        let name = self.selected_remediation.as_ref()?;
        let function = self.remediation_fns.get(name)?;
        Some((name.clone(), Arc::clone(function)))
    }

    pub fn compliance_names(&self) -> Vec<&str> {
        self.compliance_fns.keys().map(String::as_str).collect()
    }

    pub fn remediation_names(&self) -> Vec<&str> {
        self.remediation_fns.keys().map(String::as_str).collect()
    }
}

fn listing(names: Vec<&str>) -> String {
    if names.is_empty() {
        "none".to_string()
    } else {
        names.join(", ")
    }
}

const REQUIRED_KEYS: [&str; 5] = ["compliance", "compliance_int", "ordered", "missing", "extra"];

/// Check a custom compliance result against the result schema and convert
/// it into a [`ComplianceResult`].
pub fn validate_custom_result(raw: &Value) -> Result<ComplianceResult, ValidationError> {
    let Value::Object(map) = raw else {
        return Err(ValidationError::NotAMapping {
            received: describe(raw),
        });
    };

    for key in REQUIRED_KEYS {
        if !map.contains_key(key) {
            return Err(ValidationError::MissingKey { key });
        }
    }

    let compliance = expect_bool(map, "compliance")?;
    let compliance_int = match &map["compliance_int"] {
        Value::Number(n) if n.as_u64() == Some(0) => 0,
        Value::Number(n) if n.as_u64() == Some(1) => 1,
        other => {
            return Err(ValidationError::InvalidValue {
                key: "compliance_int",
                expected: "an integer in {0, 1}",
                received: describe(other),
            })
        }
    };
    let ordered = expect_bool(map, "ordered")?;
    let missing = expect_payload(map, "missing");
    let extra = expect_payload(map, "extra");

    Ok(ComplianceResult {
        compliance,
        compliance_int,
        ordered,
        missing,
        extra,
    })
}

fn expect_bool(map: &serde_json::Map<String, Value>, key: &'static str) -> Result<bool, ValidationError> {
    match &map[key] {
        Value::Bool(flag) => Ok(*flag),
        other => Err(ValidationError::InvalidValue {
            key,
            expected: "a boolean",
            received: describe(other),
        }),
    }
}

/// `null` reads as an empty text payload so records never carry a null
/// `missing` or `extra`.
fn expect_payload(map: &serde_json::Map<String, Value>, key: &'static str) -> DiffPayload {
    match &map[key] {
        Value::String(text) => DiffPayload::Text(text.clone()),
        Value::Null => DiffPayload::Text(String::new()),
        other => DiffPayload::Json(other.clone()),
    }
}

fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    format!("{value} ({kind})")
}

/// Compares the selected sections line by line after collapsing whitespace.
pub struct TextEquality;

impl CustomCompliance for TextEquality {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> ExtensionResult<Value> {
        let actual = normalized_lines(&ctx.actual.as_text());
        let intended = normalized_lines(&ctx.intended.as_text());

        let missing: Vec<&str> = intended
            .iter()
            .filter(|line| !actual.contains(line))
            .map(String::as_str)
            .collect();
        let extra: Vec<&str> = actual
            .iter()
            .filter(|line| !intended.contains(line))
            .map(String::as_str)
            .collect();
        let compliance = missing.is_empty() && extra.is_empty();

        Ok(serde_json::json!({
            "compliance": compliance,
            "compliance_int": u8::from(compliance),
            "ordered": actual == intended,
            "missing": missing.join("\n"),
            "extra": extra.join("\n"),
        }))
    }
}

fn normalized_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect()
}

fn text_equality() -> Box<dyn CustomCompliance> {
    Box::new(TextEquality)
}

inventory::submit! {
    CustomComplianceRegistration {
        name: "text-equality",
        build: text_equality,
    }
}
