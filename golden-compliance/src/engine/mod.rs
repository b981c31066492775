//! Compliance engines, one per configuration representation.
//!
//! A rule's engine is resolved once, when the rule is loaded, into a
//! [`Strategy`]. Evaluating a record is then a plain call with no lookups
//! by name.

pub mod cli;
pub mod json;
pub mod xml;

use std::sync::Arc;

use crate::error::{ConfigError, EvaluationError};
use crate::extension::{validate_custom_result, CustomCompliance, ExtensionRegistry};
use crate::model::{ComplianceResult, ComplianceRule, ConfigPayload, ConfigType, Device};
use crate::platform::PlatformTable;

pub use cli::CliEngine;
pub use json::JsonEngine;
pub use xml::XmlEngine;

/// Everything an engine may look at while evaluating one record.
#[derive(Debug, Clone, Copy)]
pub struct EvaluationContext<'a> {
    pub device: &'a Device,
    pub rule: &'a ComplianceRule,
    pub actual: &'a ConfigPayload,
    pub intended: &'a ConfigPayload,
    pub platforms: &'a PlatformTable,
}

/// Compares actual against intended configuration for one rule.
pub trait ComplianceEngine: Send + Sync {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<ComplianceResult, EvaluationError>;
}

/// Delegates to a registered custom compliance function and validates what
/// it returns.
#[derive(Clone)]
pub struct CustomEngine {
    name: String,
    function: Arc<dyn CustomCompliance>,
}

impl CustomEngine {
    pub fn new(name: impl Into<String>, function: Arc<dyn CustomCompliance>) -> Self {
        Self {
            name: name.into(),
            function,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for CustomEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CustomEngine").field("name", &self.name).finish()
    }
}

impl ComplianceEngine for CustomEngine {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<ComplianceResult, EvaluationError> {
        let raw = self
            .function
            .evaluate(ctx)
            .map_err(|err| EvaluationError::Custom {
                rule: ctx.rule.to_string(),
                message: err.to_string(),
            })?;
        validate_custom_result(&raw).map_err(|source| EvaluationError::Validation {
            rule: ctx.rule.to_string(),
            source,
        })
    }
}

/// The engine a rule evaluates with.
#[derive(Debug, Clone)]
pub enum Strategy {
    Cli(CliEngine),
    Json(JsonEngine),
    Xml(XmlEngine),
    Custom(CustomEngine),
}

impl Strategy {
    /// Pick the engine for `rule`. Custom rules need the registry to hold a
    /// configured compliance function.
    pub fn resolve(rule: &ComplianceRule, registry: &ExtensionRegistry) -> Result<Self, ConfigError> {
        rule.validate()?;
        if rule.custom_compliance {
            let (name, function) = registry.compliance().ok_or_else(|| {
                ConfigError::CustomComplianceUnconfigured {
                    rule: rule.to_string(),
                }
            })?;
            return Ok(Strategy::Custom(CustomEngine::new(name, function)));
        }
        Ok(match rule.config_type {
            ConfigType::Cli => Strategy::Cli(CliEngine),
            ConfigType::Json => Strategy::Json(JsonEngine),
            ConfigType::Xml => Strategy::Xml(XmlEngine::default()),
        })
    }

    pub fn name(&self) -> &str {
        match self {
            Strategy::Cli(_) => "cli",
            Strategy::Json(_) => "json",
            Strategy::Xml(_) => "xml",
            Strategy::Custom(engine) => engine.name(),
        }
    }
}

impl ComplianceEngine for Strategy {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<ComplianceResult, EvaluationError> {
        match self {
            Strategy::Cli(engine) => engine.evaluate(ctx),
            Strategy::Json(engine) => engine.evaluate(ctx),
            Strategy::Xml(engine) => engine.evaluate(ctx),
            Strategy::Custom(engine) => engine.evaluate(ctx),
        }
    }
}
