//! Structural diff over nested JSON-like values.
//!
//! Paths use the `root['key'][0]` notation so they stay readable next to the
//! values they point at. Entries are reported relative to the left value:
//! "added" means present only on the right, "removed" present only on the
//! left.

use serde::Serialize;
use serde_json::Value;

/// Category of a single structural difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    DictionaryItemAdded,
    DictionaryItemRemoved,
    IterableItemAdded,
    IterableItemRemoved,
    ValuesChanged,
    TypeChanges,
}

/// One structural difference at `path`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuralChange {
    pub kind: ChangeKind,
    pub path: String,
    /// Left-side value, when the path exists on the left.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub left: Option<Value>,
    /// Right-side value, when the path exists on the right.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub right: Option<Value>,
}

/// Full result of [`diff_values`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StructuralDiff {
    pub changes: Vec<StructuralChange>,
}

impl StructuralDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Paths of the given kind, in discovery order.
    pub fn paths(&self, kind: ChangeKind) -> Vec<String> {
        self.changes
            .iter()
            .filter(|c| c.kind == kind)
            .map(|c| c.path.clone())
            .collect()
    }

    /// Everything the right side has that the left side lacks: added
    /// dictionary items, added iterable items, changed values and type
    /// changes.
    pub fn added_paths(&self) -> Vec<String> {
        self.collect(&[
            ChangeKind::DictionaryItemAdded,
            ChangeKind::IterableItemAdded,
            ChangeKind::ValuesChanged,
            ChangeKind::TypeChanges,
        ])
    }

    /// Everything the left side has that the right side lacks; the mirror
    /// of [`StructuralDiff::added_paths`].
    pub fn removed_paths(&self) -> Vec<String> {
        self.collect(&[
            ChangeKind::DictionaryItemRemoved,
            ChangeKind::IterableItemRemoved,
            ChangeKind::ValuesChanged,
            ChangeKind::TypeChanges,
        ])
    }

    fn collect(&self, kinds: &[ChangeKind]) -> Vec<String> {
        kinds.iter().flat_map(|kind| self.paths(*kind)).collect()
    }
}

/// Controls how sequences are compared.
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralOptions {
    /// Compare arrays as multisets instead of position by position.
    pub ignore_order: bool,
}

/// Diff two values.
pub fn diff_values(left: &Value, right: &Value, opts: StructuralOptions) -> StructuralDiff {
    let mut diff = StructuralDiff::default();
    diff_at(left, right, "root", opts, &mut diff.changes);
    diff
}

fn diff_at(
    left: &Value,
    right: &Value,
    path: &str,
    opts: StructuralOptions,
    out: &mut Vec<StructuralChange>,
) {
    if type_name(left) != type_name(right) {
        out.push(StructuralChange {
            kind: ChangeKind::TypeChanges,
            path: path.to_string(),
            left: Some(left.clone()),
            right: Some(right.clone()),
        });
        return;
    }

    match (left, right) {
        (Value::Object(l), Value::Object(r)) => {
            for (key, value) in r {
                let child = format!("{path}['{key}']");
                match l.get(key) {
                    Some(existing) => diff_at(existing, value, &child, opts, out),
                    None => out.push(StructuralChange {
                        kind: ChangeKind::DictionaryItemAdded,
                        path: child,
                        left: None,
                        right: Some(value.clone()),
                    }),
                }
            }
            for (key, value) in l {
                if !r.contains_key(key) {
                    out.push(StructuralChange {
                        kind: ChangeKind::DictionaryItemRemoved,
                        path: format!("{path}['{key}']"),
                        left: Some(value.clone()),
                        right: None,
                    });
                }
            }
        }
        (Value::Array(l), Value::Array(r)) if opts.ignore_order => diff_multiset(l, r, path, out),
        (Value::Array(l), Value::Array(r)) => {
            for (idx, (lv, rv)) in l.iter().zip(r).enumerate() {
                diff_at(lv, rv, &format!("{path}[{idx}]"), opts, out);
            }
            for (idx, value) in r.iter().enumerate().skip(l.len()) {
                out.push(StructuralChange {
                    kind: ChangeKind::IterableItemAdded,
                    path: format!("{path}[{idx}]"),
                    left: None,
                    right: Some(value.clone()),
                });
            }
            for (idx, value) in l.iter().enumerate().skip(r.len()) {
                out.push(StructuralChange {
                    kind: ChangeKind::IterableItemRemoved,
                    path: format!("{path}[{idx}]"),
                    left: Some(value.clone()),
                    right: None,
                });
            }
        }
        _ => {
            if left != right {
                out.push(StructuralChange {
                    kind: ChangeKind::ValuesChanged,
                    path: path.to_string(),
                    left: Some(left.clone()),
                    right: Some(right.clone()),
                });
            }
        }
    }
}

/// Order-insensitive comparison: each element is matched to an equal,
/// not yet matched element on the other side; repetitions count.
fn diff_multiset(left: &[Value], right: &[Value], path: &str, out: &mut Vec<StructuralChange>) {
    let mut used = vec![false; left.len()];

    for (idx, value) in right.iter().enumerate() {
        let hit = (0..left.len()).find(|l_idx| !used[*l_idx] && &left[*l_idx] == value);
        match hit {
            Some(l_idx) => used[l_idx] = true,
            None => out.push(StructuralChange {
                kind: ChangeKind::IterableItemAdded,
                path: format!("{path}[{idx}]"),
                left: None,
                right: Some(value.clone()),
            }),
        }
    }

    for (idx, value) in left.iter().enumerate() {
        if !used[idx] {
            out.push(StructuralChange {
                kind: ChangeKind::IterableItemRemoved,
                path: format!("{path}[{idx}]"),
                left: Some(value.clone()),
                right: None,
            });
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{diff_values, ChangeKind, StructuralOptions};

    const ORDERED: StructuralOptions = StructuralOptions { ignore_order: false };
    const UNORDERED: StructuralOptions = StructuralOptions { ignore_order: true };

    #[test]
    fn added_key_is_reported_on_the_added_side() {
        let diff = diff_values(&json!({}), &json!({"vlan": 10}), ORDERED);
        assert_eq!(diff.added_paths(), vec!["root['vlan']".to_string()]);
        assert!(diff.removed_paths().is_empty());
    }

    #[test]
    fn changed_values_count_on_both_sides() {
        let diff = diff_values(&json!({"mtu": 1500}), &json!({"mtu": 9000}), ORDERED);
        assert_eq!(diff.paths(ChangeKind::ValuesChanged), vec!["root['mtu']".to_string()]);
        assert_eq!(diff.added_paths(), diff.removed_paths());
    }

    #[test]
    fn type_changes_stop_descent() {
        let diff = diff_values(&json!({"vlan": "10"}), &json!({"vlan": 10}), ORDERED);
        assert_eq!(diff.paths(ChangeKind::TypeChanges), vec!["root['vlan']".to_string()]);
        assert_eq!(diff.changes.len(), 1);
    }

    #[test]
    fn array_order_matters_only_when_asked() {
        let left = json!({"servers": ["a", "b"]});
        let right = json!({"servers": ["b", "a"]});

        assert!(diff_values(&left, &right, UNORDERED).is_empty());
        let ordered = diff_values(&left, &right, ORDERED);
        assert_eq!(ordered.paths(ChangeKind::ValuesChanged).len(), 2);
    }

    #[test]
    fn multiset_comparison_counts_repetitions() {
        let diff = diff_values(&json!(["a", "a"]), &json!(["a"]), UNORDERED);
        assert_eq!(diff.paths(ChangeKind::IterableItemRemoved), vec!["root[1]".to_string()]);
    }
}
