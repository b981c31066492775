//! Hierarchical comparison of indented CLI configuration.
//!
//! Both sides are reduced to the sections named by the rule's selectors.
//! `missing` holds intended lines the actual configuration lacks, `extra`
//! the actual lines intended does not have; each differing line is
//! rendered under the parent lines that give it context.

use config_diff_core::hier::{parse_with_options, subtree_equal, HierTree, NodeId, ParseOptions};
use tracing::warn;

use super::{ComplianceEngine, EvaluationContext};
use crate::error::EvaluationError;
use crate::model::{ComplianceResult, DiffPayload};

#[derive(Debug, Clone, Copy, Default)]
pub struct CliEngine;

impl ComplianceEngine for CliEngine {
    fn evaluate(&self, ctx: &EvaluationContext<'_>) -> Result<ComplianceResult, EvaluationError> {
        let Some(opts) = ctx.platforms.parser_options(&ctx.device.platform) else {
            warn!(
                device = %ctx.device.name,
                platform = %ctx.device.platform,
                rule = %ctx.rule,
                "no CLI parser mapping for platform, treating rule as compliant"
            );
            return Ok(ComplianceResult::neutral());
        };

        Ok(compare(
            &ctx.actual.as_text(),
            &ctx.intended.as_text(),
            &ctx.rule.selectors(),
            ctx.rule.ordered,
            opts,
        ))
    }
}

/// Compare the selected sections of two CLI configurations.
pub fn compare(
    actual: &str,
    intended: &str,
    selectors: &[&str],
    ordered: bool,
    opts: &ParseOptions,
) -> ComplianceResult {
    let actual = selected_sections(actual, selectors, opts);
    let intended = selected_sections(intended, selectors, opts);

    let (missing, extra) = if ordered {
        (ordered_diff(&intended, &actual), ordered_diff(&actual, &intended))
    } else {
        (unordered_diff(&intended, &actual), unordered_diff(&actual, &intended))
    };
    let positional = subtree_equal(&actual, actual.root(), &intended, intended.root(), true);
    let compliance = missing.is_empty() && extra.is_empty();

    ComplianceResult::new(
        compliance,
        positional,
        DiffPayload::Text(missing.render(opts.indent)),
        DiffPayload::Text(extra.render(opts.indent)),
    )
}

/// Parse `text` and keep only the top-level sections a selector names.
pub fn selected_sections(text: &str, selectors: &[&str], opts: &ParseOptions) -> HierTree {
    let mut tree = parse_with_options(text, opts);
    tree.retain_top_level(|line| selectors.iter().any(|s| line.starts_with(s)));
    tree
}

/// Lines of `left` that do not line up, position by position, with `right`.
pub fn ordered_diff(left: &HierTree, right: &HierTree) -> HierTree {
    let mut out = HierTree::new();
    let out_root = out.root();
    ordered_into(left, left.root(), right, right.root(), &mut out, out_root);
    out
}

fn ordered_into(
    left: &HierTree,
    l_id: NodeId,
    right: &HierTree,
    r_id: NodeId,
    out: &mut HierTree,
    out_parent: NodeId,
) {
    let r_children = right.children(r_id);
    for (idx, child) in left.children(l_id).iter().enumerate() {
        match r_children.get(idx) {
            Some(other) if left.text(*child) == right.text(*other) => {
                if subtree_equal(left, *child, right, *other, true) {
                    continue;
                }
                let section = out.add_child(out_parent, left.text(*child));
                ordered_into(left, *child, right, *other, out, section);
                prune_if_empty(out, out_parent, section);
            }
            _ => {
                out.copy_subtree(out_parent, left, *child);
            }
        }
    }
}

/// Lines of `left` with no counterpart in `right`, ignoring sibling order.
pub fn unordered_diff(left: &HierTree, right: &HierTree) -> HierTree {
    let mut out = HierTree::new();
    let out_root = out.root();
    unordered_into(left, left.root(), right, right.root(), &mut out, out_root);
    out
}

fn unordered_into(
    left: &HierTree,
    l_id: NodeId,
    right: &HierTree,
    r_id: NodeId,
    out: &mut HierTree,
    out_parent: NodeId,
) {
    let r_children = right.children(r_id);
    let mut used = vec![false; r_children.len()];

    for child in left.children(l_id) {
        let exact = (0..r_children.len())
            .find(|idx| !used[*idx] && subtree_equal(left, *child, right, r_children[*idx], false));
        if let Some(idx) = exact {
            used[idx] = true;
            continue;
        }

        let same_line = (0..r_children.len())
            .find(|idx| !used[*idx] && right.text(r_children[*idx]) == left.text(*child));
        match same_line {
            Some(idx) => {
                used[idx] = true;
                let section = out.add_child(out_parent, left.text(*child));
                unordered_into(left, *child, right, r_children[idx], out, section);
                prune_if_empty(out, out_parent, section);
            }
            None => {
                out.copy_subtree(out_parent, left, *child);
            }
        }
    }
}

fn prune_if_empty(out: &mut HierTree, parent: NodeId, section: NodeId) {
    if out.is_leaf(section) {
        out.remove_child(parent, section);
    }
}
