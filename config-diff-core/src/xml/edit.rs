//! Edit-script diffing between two XML trees.
//!
//! The script describes the operations that turn the left tree into the
//! right one. Node paths are XPath expressions addressing the left tree;
//! positional predicates are only emitted when siblings share a tag.

use std::collections::HashMap;

use serde::Serialize;

use super::tree::XmlNode;

/// One step of an edit script.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum EditAction {
    /// Replace the text of `node`.
    UpdateTextIn { node: String, text: Option<String> },
    /// Change the value of an existing attribute.
    UpdateAttrib {
        node: String,
        name: String,
        value: String,
    },
    /// Add an attribute to `node`.
    InsertAttrib {
        node: String,
        name: String,
        value: String,
    },
    /// Remove an attribute from `node`.
    DeleteAttrib { node: String, name: String },
    /// Change the tag of `node`.
    RenameNode { node: String, tag: String },
    /// Insert a new `tag` element as child `position` of `target`.
    InsertNode {
        target: String,
        tag: String,
        position: usize,
    },
    /// Remove `node` and its subtree.
    DeleteNode { node: String },
}

impl EditAction {
    /// The path the action applies to.
    pub fn node(&self) -> &str {
        match self {
            EditAction::UpdateTextIn { node, .. }
            | EditAction::UpdateAttrib { node, .. }
            | EditAction::InsertAttrib { node, .. }
            | EditAction::DeleteAttrib { node, .. }
            | EditAction::RenameNode { node, .. }
            | EditAction::DeleteNode { node } => node,
            EditAction::InsertNode { target, .. } => target,
        }
    }
}

/// Configures how children are paired before edits are computed.
#[derive(Debug, Clone)]
pub struct EditOptions {
    /// Minimum similarity (0.0..=1.0) for two same-tag elements to be
    /// treated as one element that changed. Lower values favour updates over
    /// delete/insert pairs.
    pub similarity_threshold: f64,
    /// Pair identical subtrees before running the similarity pass.
    pub fast_match: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.5,
            fast_match: false,
        }
    }
}

/// Compute the edit script from `left` to `right` with default options.
pub fn edit_script(left: &XmlNode, right: &XmlNode) -> Vec<EditAction> {
    edit_script_with_options(left, right, &EditOptions::default())
}

/// Compute the edit script from `left` to `right`.
pub fn edit_script_with_options(
    left: &XmlNode,
    right: &XmlNode,
    opts: &EditOptions,
) -> Vec<EditAction> {
    let mut out = Vec::new();
    let root_path = format!("/{}", left.tag);
    if left.tag != right.tag {
        out.push(EditAction::RenameNode {
            node: root_path.clone(),
            tag: right.tag.clone(),
        });
    }
    edit_node(left, right, &root_path, opts, &mut out);
    out
}

fn edit_node(
    left: &XmlNode,
    right: &XmlNode,
    path: &str,
    opts: &EditOptions,
    out: &mut Vec<EditAction>,
) {
    edit_attributes(left, right, path, out);

    if left.normalized_text() != right.normalized_text() {
        out.push(EditAction::UpdateTextIn {
            node: path.to_string(),
            text: right.normalized_text().map(ToString::to_string),
        });
    }

    edit_children(left, right, path, opts, out);
}

fn edit_attributes(left: &XmlNode, right: &XmlNode, path: &str, out: &mut Vec<EditAction>) {
    for (name, value) in &left.attributes {
        match right.attributes.get(name) {
            Some(other) if other != value => out.push(EditAction::UpdateAttrib {
                node: path.to_string(),
                name: name.clone(),
                value: other.clone(),
            }),
            Some(_) => {}
            None => out.push(EditAction::DeleteAttrib {
                node: path.to_string(),
                name: name.clone(),
            }),
        }
    }
    for (name, value) in &right.attributes {
        if !left.attributes.contains_key(name) {
            out.push(EditAction::InsertAttrib {
                node: path.to_string(),
                name: name.clone(),
                value: value.clone(),
            });
        }
    }
}

fn edit_children(
    left: &XmlNode,
    right: &XmlNode,
    path: &str,
    opts: &EditOptions,
    out: &mut Vec<EditAction>,
) {
    let pairs = match_children(&left.children, &right.children, opts);
    let mut used_left = vec![false; left.children.len()];

    for (right_idx, right_child) in right.children.iter().enumerate() {
        match pairs[right_idx] {
            Some(left_idx) => {
                used_left[left_idx] = true;
                let child_path = child_path(path, left, left_idx);
                edit_node(&left.children[left_idx], right_child, &child_path, opts, out);
            }
            None => {
                let new_path = child_path(path, right, right_idx);
                insert_subtree(path, &new_path, right_child, right_idx, out);
            }
        }
    }

    for (left_idx, used) in used_left.iter().enumerate() {
        if !used {
            out.push(EditAction::DeleteNode {
                node: child_path(path, left, left_idx),
            });
        }
    }
}

fn insert_subtree(
    target: &str,
    path: &str,
    node: &XmlNode,
    position: usize,
    out: &mut Vec<EditAction>,
) {
    out.push(EditAction::InsertNode {
        target: target.to_string(),
        tag: node.tag.clone(),
        position,
    });
    for (name, value) in &node.attributes {
        out.push(EditAction::InsertAttrib {
            node: path.to_string(),
            name: name.clone(),
            value: value.clone(),
        });
    }
    if let Some(text) = node.normalized_text() {
        out.push(EditAction::UpdateTextIn {
            node: path.to_string(),
            text: Some(text.to_string()),
        });
    }
    for (idx, child) in node.children.iter().enumerate() {
        let nested = child_path(path, node, idx);
        insert_subtree(path, &nested, child, idx, out);
    }
}

/// XPath of `parent.children[idx]`, with a positional predicate only when
/// the tag repeats among its siblings.
fn child_path(parent_path: &str, parent: &XmlNode, idx: usize) -> String {
    let tag = &parent.children[idx].tag;
    let same_tag = parent.children.iter().filter(|c| &c.tag == tag).count();
    if same_tag > 1 {
        let position = parent.children[..idx]
            .iter()
            .filter(|c| &c.tag == tag)
            .count()
            + 1;
        format!("{parent_path}/{tag}[{position}]")
    } else {
        format!("{parent_path}/{tag}")
    }
}

/// Pair right children with left children. Returns, per right child, the
/// index of its left counterpart.
fn match_children(left: &[XmlNode], right: &[XmlNode], opts: &EditOptions) -> Vec<Option<usize>> {
    let mut pairs: Vec<Option<usize>> = vec![None; right.len()];
    let mut used = vec![false; left.len()];

    if opts.fast_match {
        for (right_idx, right_node) in right.iter().enumerate() {
            let hit = left
                .iter()
                .enumerate()
                .find(|(idx, l)| !used[*idx] && *l == right_node)
                .map(|(idx, _)| idx);
            if let Some(left_idx) = hit {
                used[left_idx] = true;
                pairs[right_idx] = Some(left_idx);
            }
        }
    }

    let left_tokens: Vec<HashMap<String, usize>> = left.iter().map(tokens).collect();

    for (right_idx, right_node) in right.iter().enumerate() {
        if pairs[right_idx].is_some() {
            continue;
        }
        let right_tokens = tokens(right_node);

        let mut best: Option<(usize, f64)> = None;
        for (left_idx, left_node) in left.iter().enumerate() {
            if used[left_idx] || left_node.tag != right_node.tag {
                continue;
            }
            let score = similarity(&left_tokens[left_idx], &right_tokens);
            if score < opts.similarity_threshold {
                continue;
            }
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((left_idx, score));
            }
        }

        if let Some((left_idx, _)) = best {
            used[left_idx] = true;
            pairs[right_idx] = Some(left_idx);
        }
    }

    pairs
}

/// Multiset of structural and content tokens describing a subtree.
fn tokens(node: &XmlNode) -> HashMap<String, usize> {
    let mut out = HashMap::new();
    collect_tokens(node, &node.tag, &mut out);
    out
}

fn collect_tokens(node: &XmlNode, path: &str, out: &mut HashMap<String, usize>) {
    *out.entry(path.to_string()).or_default() += 1;
    if let Some(text) = node.normalized_text() {
        *out.entry(format!("{path}={text}")).or_default() += 1;
    }
    for (name, value) in &node.attributes {
        *out.entry(format!("{path}@{name}={value}")).or_default() += 1;
    }
    for child in &node.children {
        collect_tokens(child, &format!("{path}/{}", child.tag), out);
    }
}

fn similarity(a: &HashMap<String, usize>, b: &HashMap<String, usize>) -> f64 {
    let total: usize = a.values().sum::<usize>() + b.values().sum::<usize>();
    if total == 0 {
        return 1.0;
    }
    let common: usize = a
        .iter()
        .map(|(token, count)| (*count).min(b.get(token).copied().unwrap_or(0)))
        .sum();
    (2 * common) as f64 / total as f64
}
