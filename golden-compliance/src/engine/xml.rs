use config_diff_core::format_text_updates;
use config_diff_core::xml::{edit_script_with_options, parse, EditOptions, XmlNode};

use super::{ComplianceEngine, EvaluationContext};
use crate::error::EvaluationError;
use crate::model::{ComplianceResult, DiffPayload};

/// Edit-script comparison of XML documents, run in both directions.
#[derive(Debug, Clone)]
pub struct XmlEngine {
    options: EditOptions,
}

impl Default for XmlEngine {
    fn default() -> Self {
        // Near-identical configurations should diff as text updates rather
        // than node replacements.
        Self {
            options: EditOptions {
                similarity_threshold: 0.1,
                fast_match: true,
            },
        }
    }
}

impl XmlEngine {
    pub fn with_options(options: EditOptions) -> Self {
        Self { options }
    }

    /// Diff two parsed documents. `ordered` is carried into the result
    /// unchanged.
    pub fn compare(&self, actual: &XmlNode, intended: &XmlNode, ordered: bool) -> ComplianceResult {
        let missing = edit_script_with_options(actual, intended, &self.options);
        let extra = edit_script_with_options(intended, actual, &self.options);
        let compliance = missing.is_empty() && extra.is_empty();

        ComplianceResult::new(
            compliance,
            ordered,
            DiffPayload::Text(format_text_updates(&missing)),
            DiffPayload::Text(format_text_updates(&extra)),
        )
    }
}

impl ComplianceEngine for XmlEngine {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<ComplianceResult, EvaluationError> {
        let invalid = |source| EvaluationError::InvalidXml {
            rule: ctx.rule.to_string(),
            source,
        };
        let actual = parse(&ctx.actual.as_text()).map_err(invalid)?;
        let intended = parse(&ctx.intended.as_text()).map_err(invalid)?;

        let query = ctx.rule.match_config.trim();
        if query.is_empty() {
            return Ok(self.compare(&actual, &intended, ctx.rule.ordered));
        }

        let actual_hit = actual.select(query).first().map(|n| (*n).clone());
        let intended_hit = intended.select(query).first().map(|n| (*n).clone());
        let (actual, intended) = match (actual_hit, intended_hit) {
            (None, None) => return Ok(self.compare(&actual, &intended, ctx.rule.ordered)),
            (Some(a), Some(i)) => (a, i),
            (Some(a), None) => {
                let empty = XmlNode::new(a.tag.clone());
                (a, empty)
            }
            (None, Some(i)) => (XmlNode::new(i.tag.clone()), i),
        };

        Ok(self.compare(&actual, &intended, ctx.rule.ordered))
    }
}
