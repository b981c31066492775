use std::collections::{BTreeSet, HashMap};

use config_diff_core::hier::{subtree_equal, HierTree, NodeId};

use super::rules::DriverRules;

/// What a negation command does when applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Negation {
    /// Removes the running line it negates.
    Remove,
    /// Removes the running line it negates and is itself an intended line,
    /// e.g. `no shutdown` replacing `shutdown`.
    Replace,
}

/// Remediation commands as a tree, with the tags and exit lines of each
/// command and which commands are negations.
#[derive(Debug, Clone)]
pub struct RemediationConfig {
    tree: HierTree,
    tags: HashMap<NodeId, BTreeSet<String>>,
    exits: HashMap<NodeId, String>,
    negations: HashMap<NodeId, Negation>,
}

impl RemediationConfig {
    fn annotate(tree: HierTree, negations: HashMap<NodeId, Negation>, rules: &DriverRules) -> Self {
        let mut tags = HashMap::new();
        let mut exits = HashMap::new();
        for id in tree.descendants(tree.root()) {
            let lineage = tree.lineage_text(id);
            let own = rules.tags(&lineage);
            if !own.is_empty() {
                tags.insert(id, own);
            }
            if !tree.is_leaf(id) {
                if let Some(exit) = rules.exit_text(&lineage) {
                    exits.insert(id, exit.to_string());
                }
            }
        }
        Self {
            tree,
            tags,
            exits,
            negations,
        }
    }

    pub fn tree(&self) -> &HierTree {
        &self.tree
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    /// Tags of `id`, including those inherited from its sections.
    pub fn tags(&self, id: NodeId) -> BTreeSet<String> {
        self.tree
            .lineage(id)
            .iter()
            .filter_map(|node| self.tags.get(node))
            .flatten()
            .cloned()
            .collect()
    }

    /// Keep commands carrying an include tag (any command when `include` is
    /// empty) and no exclude tag. Sections survive while any of their
    /// commands does.
    pub fn filtered(&self, include: &BTreeSet<String>, exclude: &BTreeSet<String>) -> Self {
        let mut out = Self {
            tree: HierTree::new(),
            tags: HashMap::new(),
            exits: HashMap::new(),
            negations: HashMap::new(),
        };
        let out_root = out.tree.root();
        for child in self.tree.children(self.tree.root()) {
            self.copy_filtered(*child, &BTreeSet::new(), include, exclude, &mut out, out_root);
        }
        out
    }

    fn copy_filtered(
        &self,
        id: NodeId,
        inherited: &BTreeSet<String>,
        include: &BTreeSet<String>,
        exclude: &BTreeSet<String>,
        out: &mut Self,
        out_parent: NodeId,
    ) {
        let mut effective = inherited.clone();
        if let Some(own) = self.tags.get(&id) {
            effective.extend(own.iter().cloned());
        }

        if self.tree.is_leaf(id) {
            let included = include.is_empty() || !effective.is_disjoint(include);
            if included && effective.is_disjoint(exclude) {
                let copy = out.tree.add_child(out_parent, self.tree.text(id));
                out.carry(self, id, copy);
            }
            return;
        }

        let copy = out.tree.add_child(out_parent, self.tree.text(id));
        for child in self.tree.children(id) {
            self.copy_filtered(*child, &effective, include, exclude, out, copy);
        }
        if out.tree.is_leaf(copy) {
            out.tree.remove_child(out_parent, copy);
        } else {
            out.carry(self, id, copy);
        }
    }

    fn carry(&mut self, from: &Self, id: NodeId, copy: NodeId) {
        if let Some(tags) = from.tags.get(&id) {
            self.tags.insert(copy, tags.clone());
        }
        if let Some(exit) = from.exits.get(&id) {
            self.exits.insert(copy, exit.clone());
        }
        if let Some(negation) = from.negations.get(&id) {
            self.negations.insert(copy, *negation);
        }
    }

    /// Whether `id` was emitted to remove a running line.
    pub fn is_negation(&self, id: NodeId) -> bool {
        self.negations.contains_key(&id)
    }

    /// Indented command text. Sections with an exit command close with it at
    /// the section's own indentation.
    pub fn to_text(&self, indent: usize) -> String {
        let mut lines = Vec::new();
        for child in self.tree.children(self.tree.root()) {
            self.push_lines(*child, 0, indent, &mut lines);
        }
        lines.join("\n")
    }

    fn push_lines(&self, id: NodeId, level: usize, indent: usize, out: &mut Vec<String>) {
        let pad = " ".repeat(level * indent);
        out.push(format!("{pad}{}", self.tree.text(id)));
        for child in self.tree.children(id) {
            self.push_lines(*child, level + 1, indent, out);
        }
        if let Some(exit) = self.exits.get(&id) {
            out.push(format!("{pad}{exit}"));
        }
    }
}

/// Commands that turn `running` into `intended`.
///
/// At every level running-only lines are negated first; idempotent lines
/// replaced by an intended line are left alone and a negated section is
/// emitted without its children. Intended-only lines are then added with
/// their subtrees, and shared sections are either replaced wholesale
/// (sectional overwrite) or descended into. Siblings are finally ordered
/// by weight.
pub fn remediation_config(running: &HierTree, intended: &HierTree, rules: &DriverRules) -> RemediationConfig {
    let mut out = Remediation {
        tree: HierTree::new(),
        negations: HashMap::new(),
    };
    let root = out.tree.root();
    remediate_level(running, running.root(), intended, intended.root(), rules, &mut out, root);
    order_level(&mut out.tree, root, rules);
    RemediationConfig::annotate(out.tree, out.negations, rules)
}

struct Remediation {
    tree: HierTree,
    negations: HashMap<NodeId, Negation>,
}

impl Remediation {
    fn add_negation(&mut self, parent: NodeId, text: &str) {
        match self.tree.get_child(parent, text) {
            Some(existing) => {
                self.negations.entry(existing).or_insert(Negation::Replace);
            }
            None => {
                let id = self.tree.add_child(parent, text);
                self.negations.insert(id, Negation::Remove);
            }
        }
    }

    /// Adds an intended line. A negation emitted earlier with the same text
    /// becomes a replacement and takes the line's children.
    fn add_intended(&mut self, parent: NodeId, intended: &HierTree, i_id: NodeId) {
        match self.tree.get_child(parent, intended.text(i_id)) {
            Some(existing) => {
                if let Some(negation) = self.negations.get_mut(&existing) {
                    *negation = Negation::Replace;
                    for child in intended.children(i_id) {
                        self.tree.copy_subtree(existing, intended, *child);
                    }
                }
            }
            None => {
                self.tree.copy_subtree(parent, intended, i_id);
            }
        }
    }
}

fn remediate_level(
    running: &HierTree,
    r_id: NodeId,
    intended: &HierTree,
    i_id: NodeId,
    rules: &DriverRules,
    out: &mut Remediation,
    out_parent: NodeId,
) {
    for r_child in running.children(r_id) {
        if intended.find_matching_child(i_id, running, *r_child).is_some() {
            continue;
        }
        let lineage = running.lineage_text(*r_child);
        if let Some(rule) = rules.idempotent_rule(&lineage) {
            let replaced = intended
                .children(i_id)
                .iter()
                .any(|i_child| rules.idempotent_rule(&intended.lineage_text(*i_child)) == Some(rule));
            if replaced {
                continue;
            }
        }
        out.add_negation(out_parent, &rules.negate(&lineage));
    }

    for i_child in intended.children(i_id) {
        let text = intended.text(*i_child);
        let Some(r_child) = running.find_matching_child(r_id, intended, *i_child) else {
            out.add_intended(out_parent, intended, *i_child);
            continue;
        };

        let lineage = intended.lineage_text(*i_child);
        let overwrite = rules.is_sectional_overwrite(&lineage);
        let overwrite_no_negate = rules.is_sectional_overwrite_no_negate(&lineage);
        if (overwrite || overwrite_no_negate)
            && !subtree_equal(running, r_child, intended, *i_child, true)
        {
            if overwrite {
                out.add_negation(out_parent, &rules.negate(&running.lineage_text(r_child)));
            }
            out.tree.copy_subtree(out_parent, intended, *i_child);
            continue;
        }

        if subtree_equal(running, r_child, intended, *i_child, false) {
            continue;
        }
        let section = out.tree.add_child(out_parent, text);
        remediate_level(running, r_child, intended, *i_child, rules, out, section);
        if out.tree.is_leaf(section) {
            out.tree.remove_child(out_parent, section);
        }
    }
}

fn order_level(tree: &mut HierTree, id: NodeId, rules: &DriverRules) {
    tree.sort_children_by_key(id, |t, child| rules.weight(&t.lineage_text(child)));
    let children = tree.children(id).to_vec();
    for child in children {
        order_level(tree, child, rules);
    }
}

/// The configuration expected after applying `remediation` to `running`.
///
/// Negation commands remove the line they negate. Idempotent commands
/// replace the line they supersede and sectional overwrites replace the
/// whole section. Anything else, including a negation that is also an
/// intended line, is merged in.
pub fn future(running: &HierTree, remediation: &RemediationConfig, rules: &DriverRules) -> HierTree {
    let mut out = running.clone();
    let root = out.root();
    apply_level(&mut out, root, remediation, remediation.tree.root(), rules);
    out
}

fn apply_level(out: &mut HierTree, o_id: NodeId, config: &RemediationConfig, m_id: NodeId, rules: &DriverRules) {
    let remediation = &config.tree;
    let mut pending = Vec::new();
    for m_child in remediation.children(m_id) {
        let Some(negation) = config.negations.get(m_child) else {
            pending.push(*m_child);
            continue;
        };
        let text = remediation.text(*m_child);
        let negated = out
            .children(o_id)
            .iter()
            .copied()
            .find(|existing| rules.negate(&out.lineage_text(*existing)) == text);
        if let Some(existing) = negated {
            out.remove_child(o_id, existing);
        }
        if *negation == Negation::Replace {
            pending.push(*m_child);
        }
    }

    for m_child in pending {
        let text = remediation.text(m_child);
        let lineage = remediation.lineage_text(m_child);

        if let Some(rule) = rules.idempotent_rule(&lineage) {
            let superseded: Vec<NodeId> = out
                .children(o_id)
                .iter()
                .copied()
                .filter(|existing| {
                    out.text(*existing) != text
                        && rules.idempotent_rule(&out.lineage_text(*existing)) == Some(rule)
                })
                .collect();
            for existing in superseded {
                out.remove_child(o_id, existing);
            }
        }

        match out.get_child(o_id, text) {
            Some(existing) if rules.is_sectional_overwrite_no_negate(&lineage) => {
                out.remove_child(o_id, existing);
                out.copy_subtree(o_id, remediation, m_child);
            }
            Some(existing) => apply_level(out, existing, config, m_child, rules),
            None => {
                out.copy_subtree(o_id, remediation, m_child);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use config_diff_core::hier::{parse, subtree_equal};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{future, remediation_config};
    use crate::remediation::rules::{DriverRules, RemediationProfiles};

    fn ios_rules() -> DriverRules {
        RemediationProfiles::builtin()
            .rules("ios", &serde_json::Value::Null)
            .expect("ios rules")
    }

    #[test]
    fn negates_removed_lines_and_adds_new_ones() {
        let running = parse("logging host 10.0.0.1\nntp server 10.0.0.9\n");
        let intended = parse("ntp server 10.0.0.9\nntp server 10.0.0.1\n");

        let config = remediation_config(&running, &intended, &DriverRules::default());
        assert_eq!(
            config.to_text(1),
            "no logging host 10.0.0.1\nntp server 10.0.0.1"
        );
    }

    #[test]
    fn idempotent_lines_replace_without_negation() {
        let running = parse("hostname old\n");
        let intended = parse("hostname new\n");

        let config = remediation_config(&running, &intended, &ios_rules());
        assert_eq!(config.to_text(1), "hostname new");
    }

    #[test]
    fn negated_sections_drop_their_children() {
        let running = parse("interface Loopback9\n description temp\n");
        let intended = parse("");

        let config = remediation_config(&running, &intended, &ios_rules());
        assert_eq!(config.to_text(1), "no interface Loopback9");
    }

    #[test]
    fn sectional_overwrite_replaces_reordered_sections() {
        let running = parse("ip access-list extended MGMT\n deny any\n permit 10.0.0.0/8\n");
        let intended = parse("ip access-list extended MGMT\n permit 10.0.0.0/8\n deny any\n");

        let config = remediation_config(&running, &intended, &ios_rules());
        assert_eq!(
            config.to_text(1),
            "no ip access-list extended MGMT\nip access-list extended MGMT\n permit 10.0.0.0/8\n deny any"
        );
    }

    #[test]
    fn exit_text_closes_sections() {
        let running = parse("router bgp 65000\n address-family ipv4\n  network 10.0.0.0\n");
        let intended = parse(
            "router bgp 65000\n address-family ipv4\n  network 10.0.0.0\n  network 172.16.0.0\n",
        );

        let config = remediation_config(&running, &intended, &ios_rules());
        assert_eq!(
            config.to_text(1),
            "router bgp 65000\n address-family ipv4\n  network 172.16.0.0\n exit-address-family"
        );
    }

    #[test]
    fn ordering_weights_sort_siblings() {
        let running = parse("");
        let intended = parse("router ospf 1\n network 10.0.0.0 0.255.255.255 area 0\ninterface Gi0/1\n ip ospf 1 area 0\nvlan 10\n");

        let config = remediation_config(&running, &intended, &ios_rules());
        let top: Vec<&str> = config
            .tree()
            .children(config.tree().root())
            .iter()
            .map(|id| config.tree().text(*id))
            .collect();
        assert_eq!(top, vec!["vlan 10", "interface Gi0/1", "router ospf 1"]);
    }

    #[test]
    fn tags_filter_commands_and_propagate_to_children() {
        let rules = RemediationProfiles::builtin()
            .rules(
                "ios",
                &json!({
                    "tags": [
                        {"lineage": [{"startswith": "router bgp"}], "apply_tags": ["manual"]},
                        {"lineage": [{"startswith": "ntp"}], "apply_tags": ["safe"]}
                    ]
                }),
            )
            .expect("rules");
        let running = parse("");
        let intended = parse("ntp server 10.0.0.1\nrouter bgp 65000\n neighbor 10.0.0.2 remote-as 65001\n");
        let config = remediation_config(&running, &intended, &rules);

        let bgp = config.tree().children(config.tree().root())[1];
        let neighbor = config.tree().children(bgp)[0];
        assert!(config.tags(neighbor).contains("manual"));

        let manual: BTreeSet<String> = ["manual".to_string()].into();
        let safe: BTreeSet<String> = ["safe".to_string()].into();
        assert_eq!(
            config.filtered(&BTreeSet::new(), &manual).to_text(1),
            "ntp server 10.0.0.1"
        );
        assert_eq!(
            config.filtered(&manual, &BTreeSet::new()).to_text(1),
            "router bgp 65000\n neighbor 10.0.0.2 remote-as 65001"
        );
        assert!(config.filtered(&safe, &safe).is_empty());
    }

    #[test]
    fn future_converges_to_intended() {
        let rules = ios_rules();
        let running = parse(
            "hostname edge-old\ninterface Gi0/1\n description old\n shutdown\nip access-list extended MGMT\n deny any\n permit 10.0.0.0/8\nlogging host 10.0.0.1\n",
        );
        let intended = parse(
            "hostname edge-new\ninterface Gi0/1\n description core\nip access-list extended MGMT\n permit 10.0.0.0/8\n deny any\nntp server 10.0.0.1\n",
        );

        let config = remediation_config(&running, &intended, &rules);
        let predicted = future(&running, &config, &rules);
        assert!(subtree_equal(&predicted, predicted.root(), &intended, intended.root(), false));
    }

    #[test]
    fn intended_negated_form_replaces_running_line() {
        let rules = ios_rules();
        let running = parse("interface Gi0/1\n description uplink\n shutdown\n");
        let intended = parse("interface Gi0/1\n description uplink\n no shutdown\n");

        let config = remediation_config(&running, &intended, &rules);
        assert_eq!(config.to_text(1), "interface Gi0/1\n no shutdown");
        let section = config.tree().children(config.tree().root())[0];
        assert!(!config.is_negation(section));
        assert!(config.is_negation(config.tree().children(section)[0]));

        let predicted = future(&running, &config, &rules);
        assert_eq!(
            predicted.render(1),
            "interface Gi0/1\n description uplink\n no shutdown"
        );
        assert!(subtree_equal(&predicted, predicted.root(), &intended, intended.root(), false));
        assert!(remediation_config(&predicted, &intended, &rules).is_empty());
    }

    #[test]
    fn intended_lines_starting_with_no_are_merged() {
        let rules = ios_rules();
        let running = parse("interface Gi0/2\n description spare\n");
        let intended = parse("interface Gi0/2\n description spare\n no shutdown\n");

        let config = remediation_config(&running, &intended, &rules);
        let section = config.tree().children(config.tree().root())[0];
        assert!(!config.is_negation(config.tree().children(section)[0]));

        let predicted = future(&running, &config, &rules);
        assert!(subtree_equal(&predicted, predicted.root(), &intended, intended.root(), false));
    }

    #[test]
    fn filtering_keeps_negations() {
        let rules = ios_rules();
        let running = parse("logging host 10.0.0.1\nntp server 10.0.0.9\n");
        let intended = parse("ntp server 10.0.0.9\n");

        let config = remediation_config(&running, &intended, &rules)
            .filtered(&BTreeSet::new(), &BTreeSet::new());
        let negation = config.tree().children(config.tree().root())[0];
        assert!(config.is_negation(negation));
        let predicted = future(&running, &config, &rules);
        assert_eq!(predicted.render(1), "ntp server 10.0.0.9");
    }

    #[test]
    fn junos_set_lines_negate_as_delete() {
        let rules = RemediationProfiles::builtin()
            .rules("junos", &serde_json::Value::Null)
            .expect("junos rules");
        let running = parse("set system ntp server 10.1.1.9\nset system host-name r1\n");
        let intended = parse("set system ntp server 10.1.1.2\nset system host-name r2\n");

        let config = remediation_config(&running, &intended, &rules);
        assert_eq!(
            config.to_text(4),
            "delete system ntp server 10.1.1.9\nset system ntp server 10.1.1.2\nset system host-name r2"
        );
        let predicted = future(&running, &config, &rules);
        assert!(subtree_equal(&predicted, predicted.root(), &intended, intended.root(), false));
    }
}
