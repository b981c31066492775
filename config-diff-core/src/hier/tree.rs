use std::fmt::{self, Display, Formatter};

use serde::Serialize;

/// Index of a node inside a [`HierTree`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

/// One configuration line and the lines nested beneath it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HierNode {
    /// Line text with surrounding whitespace removed.
    pub text: String,
    /// Owning node. Only the synthetic root has none.
    pub parent: Option<NodeId>,
    /// Nested lines in document order.
    pub children: Vec<NodeId>,
}

/// An indented CLI configuration held as an arena of lines.
///
/// Slot 0 is a synthetic root whose children are the top-level lines.
/// Detached nodes stay in the arena but are unreachable from the root, so
/// every traversal starts at [`HierTree::root`].
#[derive(Debug, Clone, Serialize)]
pub struct HierTree {
    nodes: Vec<HierNode>,
}

impl Default for HierTree {
    fn default() -> Self {
        Self::new()
    }
}

impl HierTree {
    /// Create an empty tree holding only the synthetic root.
    pub fn new() -> Self {
        Self {
            nodes: vec![HierNode {
                text: String::new(),
                parent: None,
                children: Vec::new(),
            }],
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    pub fn node(&self, id: NodeId) -> &HierNode {
        &self.nodes[id.0]
    }

    pub fn text(&self, id: NodeId) -> &str {
        &self.nodes[id.0].text
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.nodes[id.0].children.is_empty()
    }

    /// True when the root has no children.
    pub fn is_empty(&self) -> bool {
        self.children(self.root()).is_empty()
    }

    /// Append a new line under `parent` and return its id.
    pub fn add_child(&mut self, parent: NodeId, text: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(HierNode {
            text: text.into(),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(id);
        id
    }

    /// Return `parent`'s existing child with `text`, creating it when absent.
    pub fn add_child_if_missing(&mut self, parent: NodeId, text: &str) -> NodeId {
        match self.get_child(parent, text) {
            Some(id) => id,
            None => self.add_child(parent, text),
        }
    }

    /// Detach `child` from `parent`. The slot stays allocated.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        self.nodes[parent.0].children.retain(|id| *id != child);
        self.nodes[child.0].parent = None;
    }

    /// First child of `parent` whose text equals `text`.
    pub fn get_child(&self, parent: NodeId, text: &str) -> Option<NodeId> {
        self.children(parent)
            .iter()
            .copied()
            .find(|id| self.text(*id) == text)
    }

    /// Find the child of `parent` that matches `other_id` from `other`.
    ///
    /// Two lines match when their text is equal.
    pub fn find_matching_child(
        &self,
        parent: NodeId,
        other: &HierTree,
        other_id: NodeId,
    ) -> Option<NodeId> {
        self.get_child(parent, other.text(other_id))
    }

    /// Copy `src_id` and everything beneath it from `src` under `parent`.
    pub fn copy_subtree(&mut self, parent: NodeId, src: &HierTree, src_id: NodeId) -> NodeId {
        let id = self.add_child(parent, src.text(src_id));
        for child in src.children(src_id) {
            self.copy_subtree(id, src, *child);
        }
        id
    }

    /// Copy the ancestors of `src_id` (excluding the root and the node itself)
    /// under `parent`, reusing lines that already exist, and return the
    /// deepest copied ancestor.
    pub fn ensure_lineage(&mut self, parent: NodeId, src: &HierTree, src_id: NodeId) -> NodeId {
        let mut current = parent;
        let lineage = src.lineage(src_id);
        for ancestor in &lineage[..lineage.len().saturating_sub(1)] {
            current = self.add_child_if_missing(current, src.text(*ancestor));
        }
        current
    }

    /// Path from the top-level line down to `id`, both ends included.
    pub fn lineage(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if node == self.root() {
                break;
            }
            out.push(node);
            current = self.parent(node);
        }
        out.reverse();
        out
    }

    /// Texts along [`HierTree::lineage`].
    pub fn lineage_text(&self, id: NodeId) -> Vec<&str> {
        self.lineage(id).into_iter().map(|n| self.text(n)).collect()
    }

    /// Number of ancestors between `id` and the root. Top-level lines are 1.
    pub fn depth(&self, id: NodeId) -> usize {
        self.lineage(id).len()
    }

    /// All nodes reachable from the root in document (pre-)order.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_descendants(id, &mut out);
        out
    }

    fn collect_descendants(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in self.children(id) {
            out.push(*child);
            self.collect_descendants(*child, out);
        }
    }

    /// Reachable leaves under `id`.
    pub fn leaves(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.is_leaf(*n))
            .collect()
    }

    /// Keep only the top-level lines accepted by `keep`, preserving order.
    pub fn retain_top_level<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        let root = self.root();
        let dropped: Vec<NodeId> = self
            .children(root)
            .iter()
            .copied()
            .filter(|id| !keep(self.text(*id)))
            .collect();
        for id in dropped {
            self.remove_child(root, id);
        }
    }

    /// Stably reorder the children of `parent` by `key`.
    pub fn sort_children_by_key<K, F>(&mut self, parent: NodeId, mut key: F)
    where
        K: Ord,
        F: FnMut(&HierTree, NodeId) -> K,
    {
        let mut keyed: Vec<(K, NodeId)> = self
            .children(parent)
            .iter()
            .map(|id| (key(self, *id), *id))
            .collect();
        keyed.sort_by(|a, b| a.0.cmp(&b.0));
        self.nodes[parent.0].children = keyed.into_iter().map(|(_, id)| id).collect();
    }

    /// Render the tree as indented text, `indent` spaces per level.
    pub fn render(&self, indent: usize) -> String {
        self.render_lines(indent).join("\n")
    }

    /// Indented lines, `indent` spaces per level.
    pub fn render_lines(&self, indent: usize) -> Vec<String> {
        let mut out = Vec::new();
        for child in self.children(self.root()) {
            self.push_lines(*child, 0, indent, &mut out);
        }
        out
    }

    fn push_lines(&self, id: NodeId, level: usize, indent: usize, out: &mut Vec<String>) {
        let pad = " ".repeat(level * indent);
        for (i, line) in self.text(id).split('\n').enumerate() {
            if i == 0 {
                out.push(format!("{pad}{line}"));
            } else {
                // continuation lines of folded blocks such as banners
                out.push(line.to_string());
            }
        }
        for child in self.children(id) {
            self.push_lines(*child, level + 1, indent, out);
        }
    }
}

impl Display for HierTree {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.render(1))
    }
}

/// Compare two subtrees.
///
/// With `ordered`, children must line up by position at every depth.
/// Without it, children are matched as a multiset keyed by their text and
/// compared recursively.
pub fn subtree_equal(a: &HierTree, a_id: NodeId, b: &HierTree, b_id: NodeId, ordered: bool) -> bool {
    if a.text(a_id) != b.text(b_id) {
        return false;
    }
    children_equal(a, a_id, b, b_id, ordered)
}

/// Compare only the children of two nodes, ignoring the nodes' own text.
pub fn children_equal(a: &HierTree, a_id: NodeId, b: &HierTree, b_id: NodeId, ordered: bool) -> bool {
    let left = a.children(a_id);
    let right = b.children(b_id);
    if left.len() != right.len() {
        return false;
    }

    if ordered {
        return left
            .iter()
            .zip(right)
            .all(|(l, r)| subtree_equal(a, *l, b, *r, true));
    }

    let mut used = vec![false; right.len()];
    for l in left {
        let matched = right.iter().enumerate().find(|(idx, r)| {
            !used[*idx] && subtree_equal(a, *l, b, **r, false)
        });
        match matched {
            Some((idx, _)) => used[idx] = true,
            None => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::{subtree_equal, HierTree};

    fn acl(lines: &[&str]) -> HierTree {
        let mut tree = HierTree::new();
        let root = tree.root();
        let section = tree.add_child(root, "ip access-list extended MGMT");
        for line in lines {
            tree.add_child(section, *line);
        }
        tree
    }

    #[test]
    fn subtree_equal_respects_order_flag() {
        let a = acl(&["permit 10.0.0.0/8", "deny any"]);
        let b = acl(&["deny any", "permit 10.0.0.0/8"]);
        let a_section = a.children(a.root())[0];
        let b_section = b.children(b.root())[0];

        assert!(!subtree_equal(&a, a_section, &b, b_section, true));
        assert!(subtree_equal(&a, a_section, &b, b_section, false));
    }

    #[test]
    fn lineage_and_render_follow_nesting() {
        let mut tree = HierTree::new();
        let root = tree.root();
        let bgp = tree.add_child(root, "router bgp 65000");
        let af = tree.add_child(bgp, "address-family ipv4");
        let net = tree.add_child(af, "network 10.0.0.0");

        assert_eq!(
            tree.lineage_text(net),
            vec!["router bgp 65000", "address-family ipv4", "network 10.0.0.0"]
        );
        assert_eq!(tree.depth(net), 3);
        assert_eq!(
            tree.render(1),
            "router bgp 65000\n address-family ipv4\n  network 10.0.0.0"
        );
    }

    #[test]
    fn sorting_children_is_stable() {
        let mut tree = HierTree::new();
        let root = tree.root();
        for line in ["router bgp 1", "interface Gi0/1", "hostname r1", "interface Gi0/2"] {
            tree.add_child(root, line);
        }
        tree.sort_children_by_key(root, |t, id| !t.text(id).starts_with("interface"));

        assert_eq!(
            tree.render(1),
            "interface Gi0/1\ninterface Gi0/2\nrouter bgp 1\nhostname r1"
        );
    }

    #[test]
    fn removed_children_are_unreachable() {
        let mut tree = HierTree::new();
        let root = tree.root();
        let keep = tree.add_child(root, "hostname r1");
        let drop = tree.add_child(root, "ntp server 1.1.1.1");
        tree.remove_child(root, drop);

        assert_eq!(tree.children(root), &[keep]);
        assert_eq!(tree.render(1), "hostname r1");
    }
}
