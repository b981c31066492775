use serde::{Deserialize, Serialize};

use super::tree::{HierTree, NodeId};

/// Per-platform rules for turning CLI text into a [`HierTree`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    /// Lines starting with one of these (after trimming) are comments.
    pub comment_prefixes: Vec<String>,
    /// Top-level lines starting with one of these are device preamble.
    pub ignore_prefixes: Vec<String>,
    /// Top-level lines equal to one of these are dropped, e.g. `end`.
    pub ignore_lines: Vec<String>,
    /// Keywords that open a delimited multi-line block, e.g. `banner`.
    pub banner_prefixes: Vec<String>,
    /// Spaces per nesting level when rendering.
    pub indent: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            comment_prefixes: vec!["!".to_string()],
            ignore_prefixes: Vec::new(),
            ignore_lines: Vec::new(),
            banner_prefixes: vec!["banner".to_string()],
            indent: 1,
        }
    }
}

/// Parse an indentation-delimited configuration with default options.
pub fn parse(text: &str) -> HierTree {
    parse_with_options(text, &ParseOptions::default())
}

/// Parse an indentation-delimited configuration.
///
/// Each line becomes a child of the closest preceding line with a smaller
/// indentation. Banner blocks are folded into a single node whose text keeps
/// the original line breaks.
pub fn parse_with_options(text: &str, opts: &ParseOptions) -> HierTree {
    let mut tree = HierTree::new();
    let mut stack: Vec<(usize, NodeId)> = Vec::new();
    let mut lines = text.lines();

    while let Some(raw) = lines.next() {
        let line = raw.trim_end();
        let trimmed = line.trim_start();
        if trimmed.is_empty() || starts_with_any(trimmed, &opts.comment_prefixes) {
            continue;
        }

        let indent = line.len() - trimmed.len();
        if indent == 0
            && (starts_with_any(trimmed, &opts.ignore_prefixes)
                || opts.ignore_lines.iter().any(|l| l == trimmed))
        {
            continue;
        }

        while stack.last().is_some_and(|(level, _)| *level >= indent) {
            stack.pop();
        }
        let parent = stack.last().map_or(tree.root(), |(_, id)| *id);

        let node_text = if starts_with_any(trimmed, &opts.banner_prefixes) {
            fold_banner(trimmed, &mut lines)
        } else {
            trimmed.to_string()
        };

        let id = tree.add_child(parent, node_text);
        stack.push((indent, id));
    }

    tree
}

fn starts_with_any(line: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| !p.is_empty() && line.starts_with(p.as_str()))
}

/// Consume the remaining lines of a delimited banner block.
fn fold_banner<'a, I>(first: &str, lines: &mut I) -> String
where
    I: Iterator<Item = &'a str>,
{
    let Some(delimiter) = banner_delimiter(first) else {
        return first.to_string();
    };

    // `banner motd ^C text ^C` on one line
    let after_open = first
        .find(delimiter.as_str())
        .map(|pos| &first[pos + delimiter.len()..])
        .unwrap_or_default();
    if after_open.contains(delimiter.as_str()) {
        return first.to_string();
    }

    let mut block = vec![first.to_string()];
    for line in lines.by_ref() {
        block.push(line.trim_end().to_string());
        if line.contains(delimiter.as_str()) {
            break;
        }
    }
    block.join("\n")
}

fn banner_delimiter(line: &str) -> Option<String> {
    let token = line.split_whitespace().nth(2)?;
    if token.starts_with('^') {
        Some(token.chars().take(2).collect())
    } else {
        token.chars().next().map(String::from)
    }
}

#[cfg(test)]
mod tests {
    use super::{parse, parse_with_options, ParseOptions};

    #[test]
    fn nests_lines_by_indentation() {
        let tree = parse(
            "hostname r1\n!\ninterface Gi0/1\n description uplink\n ip address 10.0.0.1 255.255.255.0\nntp server 1.1.1.1\n",
        );
        let root = tree.root();
        let top: Vec<&str> = tree.children(root).iter().map(|id| tree.text(*id)).collect();
        assert_eq!(top, vec!["hostname r1", "interface Gi0/1", "ntp server 1.1.1.1"]);

        let interface = tree.children(root)[1];
        assert_eq!(tree.children(interface).len(), 2);
    }

    #[test]
    fn dedent_returns_to_matching_level() {
        let tree = parse("router bgp 1\n address-family ipv4\n  network 10.0.0.0\n neighbor 1.1.1.1 remote-as 2\n");
        let bgp = tree.children(tree.root())[0];
        let children: Vec<&str> = tree.children(bgp).iter().map(|id| tree.text(*id)).collect();
        assert_eq!(children, vec!["address-family ipv4", "neighbor 1.1.1.1 remote-as 2"]);
    }

    #[test]
    fn ignores_preamble_lines() {
        let opts = ParseOptions {
            ignore_prefixes: vec!["Building configuration".to_string()],
            ignore_lines: vec!["end".to_string()],
            ..ParseOptions::default()
        };
        let tree = parse_with_options(
            "Building configuration...\nhostname r1\nend\nend-policy\n",
            &opts,
        );
        assert_eq!(tree.render(1), "hostname r1\nend-policy");
    }

    #[test]
    fn folds_banner_blocks() {
        let tree = parse("banner motd ^C\nAuthorized access only\n ^C\nhostname r1\n");
        let root = tree.root();
        assert_eq!(tree.children(root).len(), 2);
        assert_eq!(
            tree.text(tree.children(root)[0]),
            "banner motd ^C\nAuthorized access only\n ^C"
        );
    }
}
