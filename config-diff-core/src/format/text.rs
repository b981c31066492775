use crate::structural::{ChangeKind, StructuralDiff};
use crate::xml::EditAction;

/// Format an edit script as plain text, one action per line.
pub fn format_edit_script(actions: &[EditAction]) -> String {
    let mut lines = Vec::with_capacity(actions.len());
    for action in actions {
        let line = match action {
            EditAction::UpdateTextIn { node, text } => {
                format!("~ {node} text={}", text.as_deref().unwrap_or_default())
            }
            EditAction::UpdateAttrib { node, name, value } => format!("~ {node} @{name}={value}"),
            EditAction::InsertAttrib { node, name, value } => format!("+ {node} @{name}={value}"),
            EditAction::DeleteAttrib { node, name } => format!("- {node} @{name}"),
            EditAction::RenameNode { node, tag } => format!("! {node} rename to {tag}"),
            EditAction::InsertNode {
                target,
                tag,
                position,
            } => format!("+ {target}/{tag} at {position}"),
            EditAction::DeleteNode { node } => format!("- {node}"),
        };
        lines.push(line);
    }
    lines.join("\n")
}

/// Keep only text updates and render each as `node, text`.
pub fn format_text_updates(actions: &[EditAction]) -> String {
    actions
        .iter()
        .filter_map(|action| match action {
            EditAction::UpdateTextIn { node, text } => {
                Some(format!("{node}, {}", text.as_deref().unwrap_or_default()))
            }
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Format a structural diff as plain text.
pub fn format_structural(diff: &StructuralDiff) -> String {
    let mut lines = Vec::with_capacity(diff.changes.len());
    for change in &diff.changes {
        let marker = match change.kind {
            ChangeKind::DictionaryItemAdded | ChangeKind::IterableItemAdded => '+',
            ChangeKind::DictionaryItemRemoved | ChangeKind::IterableItemRemoved => '-',
            ChangeKind::ValuesChanged => '~',
            ChangeKind::TypeChanges => '!',
        };
        lines.push(format!("{marker} {}", change.path));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{format_structural, format_text_updates};
    use crate::structural::{diff_values, StructuralOptions};
    use crate::xml::EditAction;

    #[test]
    fn text_updates_skip_other_actions() {
        let actions = vec![
            EditAction::DeleteNode {
                node: "/config/a".to_string(),
            },
            EditAction::UpdateTextIn {
                node: "/config/b".to_string(),
                text: Some("2".to_string()),
            },
        ];
        assert_eq!(format_text_updates(&actions), "/config/b, 2");
    }

    #[test]
    fn structural_changes_are_marked_by_kind() {
        let diff = diff_values(
            &json!({"mtu": 1500, "name": "ge-0/0/0"}),
            &json!({"mtu": 9192, "vlan": 10}),
            StructuralOptions::default(),
        );
        let text = format_structural(&diff);
        assert!(text.contains("~ root['mtu']"));
        assert!(text.contains("+ root['vlan']"));
        assert!(text.contains("- root['name']"));
    }
}
