use config_diff_core::structural::{diff_values, StructuralOptions};
use serde_json::{Map, Value};

use super::{ComplianceEngine, EvaluationContext};
use crate::error::EvaluationError;
use crate::model::{ComplianceResult, DiffPayload};

/// Structural comparison of JSON documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEngine;

impl ComplianceEngine for JsonEngine {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<ComplianceResult, EvaluationError> {
        let invalid = |source| EvaluationError::InvalidJson {
            rule: ctx.rule.to_string(),
            source,
        };
        let actual = ctx.actual.to_value().map_err(invalid)?;
        let intended = ctx.intended.to_value().map_err(invalid)?;

        let key = ctx.rule.match_config.trim();
        let (actual, intended) = if key.is_empty() {
            (actual, intended)
        } else {
            (select_key(&actual, key), select_key(&intended, key))
        };

        Ok(compare(&actual, &intended, ctx.rule.ordered))
    }
}

/// Diff `actual` against `intended`.
///
/// `missing` lists paths intended adds or changes, `extra` the paths actual
/// has that intended removes or changes.
pub fn compare(actual: &Value, intended: &Value, ordered: bool) -> ComplianceResult {
    let diff = diff_values(
        actual,
        intended,
        StructuralOptions {
            ignore_order: !ordered,
        },
    );
    let compliance = diff.is_empty();

    ComplianceResult::new(
        compliance,
        compliance,
        DiffPayload::Paths(diff.added_paths()),
        DiffPayload::Paths(diff.removed_paths()),
    )
}

/// `{key: value}` for a top-level key, or an empty object when absent.
fn select_key(value: &Value, key: &str) -> Value {
    let mut selected = Map::new();
    if let Some(found) = value.get(key) {
        selected.insert(key.to_string(), found.clone());
    }
    Value::Object(selected)
}
