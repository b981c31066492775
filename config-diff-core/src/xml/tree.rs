use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// A generic XML tree node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct XmlNode {
    /// Element tag name.
    pub tag: String,
    /// XML attributes keyed by name.
    pub attributes: BTreeMap<String, String>,
    /// Child elements.
    pub children: Vec<XmlNode>,
    /// Optional text content.
    pub text: Option<String>,
}

impl XmlNode {
    /// Create a new XML node with no attributes, children, or text.
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            attributes: BTreeMap::new(),
            children: Vec::new(),
            text: None,
        }
    }

    /// Builder-style helper used when assembling trees by hand.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Builder-style helper used when assembling trees by hand.
    pub fn with_child(mut self, child: XmlNode) -> Self {
        self.children.push(child);
        self
    }

    /// Return the first child with the provided tag.
    pub fn get_child(&self, tag: &str) -> Option<&XmlNode> {
        self.children.iter().find(|child| child.tag == tag)
    }

    /// Return all children with the provided tag.
    pub fn get_children(&self, tag: &str) -> Vec<&XmlNode> {
        self.children
            .iter()
            .filter(|child| child.tag == tag)
            .collect()
    }

    /// Walk a nested child path and return terminal node text if found.
    pub fn get_text<'a>(&'a self, path: &[&str]) -> Option<&'a str> {
        if path.is_empty() {
            return self.text.as_deref();
        }

        let mut current = self;
        for segment in path {
            current = current.get_child(segment)?;
        }
        current.text.as_deref()
    }

    /// Text with surrounding whitespace removed; blank text counts as none.
    pub fn normalized_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    /// Evaluate a small XPath subset against this node as document root.
    ///
    /// Supported: absolute steps (`/config/system`), descendant steps
    /// (`//interface`), the wildcard step `*`, and 1-based positional
    /// predicates (`interface[2]`). Matches are returned in document order.
    pub fn select(&self, query: &str) -> Vec<&XmlNode> {
        let query = query.trim();
        if query.is_empty() {
            return vec![self];
        }

        let steps = match parse_steps(query) {
            Some(steps) => steps,
            None => return Vec::new(),
        };

        // An absolute first step addresses the document root itself; relative
        // queries start from the root's children.
        let mut current: Vec<&XmlNode> = Vec::new();
        let mut rest = steps.as_slice();
        if let Some(first) = steps.first() {
            if first.descendant || !query.starts_with('/') {
                current.push(self);
            } else if first.matches_tag(&self.tag) && first.position.map_or(true, |p| p == 1) {
                current.push(self);
                rest = &steps[1..];
            } else {
                return Vec::new();
            }
        }

        for step in rest {
            let mut next = Vec::new();
            for node in current {
                let candidates: Vec<&XmlNode> = if step.descendant {
                    let mut all = Vec::new();
                    node.collect_descendants(&mut all);
                    if std::ptr::eq(node, self) {
                        all.insert(0, self);
                    }
                    all
                } else {
                    node.children.iter().collect()
                };
                let matching: Vec<&XmlNode> = candidates
                    .into_iter()
                    .filter(|c| step.matches_tag(&c.tag))
                    .collect();
                match step.position {
                    Some(pos) => next.extend(matching.get(pos.saturating_sub(1)).copied()),
                    None => next.extend(matching),
                }
            }
            current = next;
        }

        current
    }

    fn collect_descendants<'a>(&'a self, out: &mut Vec<&'a XmlNode>) {
        for child in &self.children {
            out.push(child);
            child.collect_descendants(out);
        }
    }
}

#[derive(Debug)]
struct Step {
    tag: String,
    descendant: bool,
    position: Option<usize>,
}

impl Step {
    fn matches_tag(&self, tag: &str) -> bool {
        self.tag == "*" || self.tag == tag
    }
}

fn parse_steps(query: &str) -> Option<Vec<Step>> {
    let mut steps = Vec::new();
    let mut descendant = false;
    let trimmed = query.strip_prefix('/').unwrap_or(query);
    if trimmed.starts_with('/') {
        descendant = true;
    }

    for raw in trimmed.split('/') {
        if raw.is_empty() {
            descendant = true;
            continue;
        }
        let (tag, position) = match raw.split_once('[') {
            Some((tag, pred)) => {
                let pos: usize = pred.strip_suffix(']')?.trim().parse().ok()?;
                (tag, Some(pos))
            }
            None => (raw, None),
        };
        steps.push(Step {
            tag: tag.to_string(),
            descendant,
            position,
        });
        descendant = false;
    }

    Some(steps)
}

impl Display for XmlNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "<{}", self.tag)?;
        for (key, value) in &self.attributes {
            write!(f, " {}=\"{}\"", key, value)?;
        }

        if self.children.is_empty() && self.text.is_none() {
            return write!(f, "/>");
        }

        write!(f, ">")?;
        if let Some(text) = &self.text {
            write!(f, "{}", text)?;
        }
        for child in &self.children {
            write!(f, "{}", child)?;
        }
        write!(f, "</{}>", self.tag)
    }
}
