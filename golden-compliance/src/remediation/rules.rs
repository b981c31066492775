//! Per-OS remediation rules.
//!
//! Rules are written as [`RuleSpec`] (TOML profiles or the JSON `options` of
//! a remediation setting) and compiled into [`DriverRules`]. Every rule
//! addresses lines through a lineage: one matcher per level, from the
//! top-level line down to the line itself.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::RemediationError;
use crate::platform::MappingLoadError;

const DEFAULT_WEIGHT: i64 = 500;

/// Conditions on one line. Every condition given must hold.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MatchSpec {
    pub equals: Option<String>,
    pub startswith: Option<String>,
    pub endswith: Option<String>,
    pub contains: Option<String>,
    pub re_search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct LineageSpec {
    pub lineage: Vec<MatchSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NegateWithSpec {
    pub lineage: Vec<MatchSpec>,
    /// Line to emit instead of the default negation.
    #[serde(rename = "use")]
    pub use_line: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SectionalExitingSpec {
    pub lineage: Vec<MatchSpec>,
    pub exit_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OrderingSpec {
    pub lineage: Vec<MatchSpec>,
    pub weight: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TagSpec {
    pub lineage: Vec<MatchSpec>,
    pub apply_tags: Vec<String>,
}

/// Serializable remediation rules for one OS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RuleSpec {
    /// Profile whose rules come first.
    pub extends: Option<String>,
    /// Negation keyword, `no` unless set.
    pub negation: Option<String>,
    /// Negate `set` lines as `delete` and the other way round.
    pub swap_set_delete: Option<bool>,
    pub negate_with: Vec<NegateWithSpec>,
    pub idempotent_commands: Vec<LineageSpec>,
    pub sectional_overwrite: Vec<LineageSpec>,
    pub sectional_overwrite_no_negate: Vec<LineageSpec>,
    pub sectional_exiting: Vec<SectionalExitingSpec>,
    pub ordering: Vec<OrderingSpec>,
    pub tags: Vec<TagSpec>,
    pub include_tags: Vec<String>,
    pub exclude_tags: Vec<String>,
}

impl RuleSpec {
    /// Append `other`'s rules; scalar settings in `other` win.
    pub fn extend(&mut self, other: RuleSpec) {
        if other.negation.is_some() {
            self.negation = other.negation;
        }
        if other.swap_set_delete.is_some() {
            self.swap_set_delete = other.swap_set_delete;
        }
        self.negate_with.extend(other.negate_with);
        self.idempotent_commands.extend(other.idempotent_commands);
        self.sectional_overwrite.extend(other.sectional_overwrite);
        self.sectional_overwrite_no_negate
            .extend(other.sectional_overwrite_no_negate);
        self.sectional_exiting.extend(other.sectional_exiting);
        self.ordering.extend(other.ordering);
        self.tags.extend(other.tags);
        self.include_tags.extend(other.include_tags);
        self.exclude_tags.extend(other.exclude_tags);
    }
}

#[derive(Debug, Deserialize)]
struct ProfileFile {
    #[serde(default)]
    profile: BTreeMap<String, RuleSpec>,
}

/// Named [`RuleSpec`] profiles, keyed by remediation OS.
#[derive(Debug, Clone, Default)]
pub struct RemediationProfiles {
    profiles: BTreeMap<String, RuleSpec>,
}

impl RemediationProfiles {
    pub fn new(profiles: BTreeMap<String, RuleSpec>) -> Self {
        Self { profiles }
    }

    /// Built-in profiles, embedded at compile time.
    pub fn builtin() -> Self {
        let embedded = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/mappings/remediation.toml"
        ));
        match parse_profiles(embedded, "embedded remediation profiles".to_string()) {
            Ok(profiles) if !profiles.is_empty() => Self::new(profiles),
            _ => Self::default(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, MappingLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| MappingLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_profiles(&raw, path.display().to_string()).map(Self::new)
    }

    pub fn contains(&self, os: &str) -> bool {
        self.profiles.contains_key(os)
    }

    /// The profile for `os` with its `extends` chain resolved. Unknown
    /// profiles resolve to the empty rule set.
    pub fn spec(&self, os: &str) -> RuleSpec {
        let mut chain = Vec::new();
        let mut next = Some(os.to_string());
        while let Some(name) = next {
            if chain.iter().any(|(seen, _)| seen == &name) {
                break;
            }
            let Some(spec) = self.profiles.get(&name) else {
                break;
            };
            next = spec.extends.clone();
            chain.push((name, spec.clone()));
        }

        let mut merged = RuleSpec::default();
        for (_, spec) in chain.into_iter().rev() {
            merged.extend(spec);
        }
        merged.extends = None;
        merged
    }

    /// Compile the rules for `os`, extended by a setting's `options`.
    pub fn rules(&self, os: &str, options: &Value) -> Result<DriverRules, RemediationError> {
        let mut spec = self.spec(os);
        if !options.is_null() {
            let extra: RuleSpec = serde_json::from_value(options.clone())?;
            spec.extend(extra);
        }
        Ok(DriverRules::compile(&spec)?)
    }
}

fn parse_profiles(raw: &str, path: String) -> Result<BTreeMap<String, RuleSpec>, MappingLoadError> {
    let parsed: ProfileFile =
        toml::from_str(raw).map_err(|source| MappingLoadError::Parse { path, source })?;
    Ok(parsed.profile)
}

#[derive(Debug, Clone)]
struct LevelMatcher {
    equals: Option<String>,
    startswith: Option<String>,
    endswith: Option<String>,
    contains: Option<String>,
    re_search: Option<Regex>,
}

impl LevelMatcher {
    fn compile(spec: &MatchSpec) -> Result<Self, regex::Error> {
        Ok(Self {
            equals: spec.equals.clone(),
            startswith: spec.startswith.clone(),
            endswith: spec.endswith.clone(),
            contains: spec.contains.clone(),
            re_search: spec.re_search.as_deref().map(Regex::new).transpose()?,
        })
    }

    fn matches(&self, text: &str) -> bool {
        self.equals.as_deref().map_or(true, |v| text == v)
            && self.startswith.as_deref().map_or(true, |v| text.starts_with(v))
            && self.endswith.as_deref().map_or(true, |v| text.ends_with(v))
            && self.contains.as_deref().map_or(true, |v| text.contains(v))
            && self.re_search.as_ref().map_or(true, |re| re.is_match(text))
    }
}

/// Matches a line whose lineage has exactly one entry per level.
#[derive(Debug, Clone)]
pub struct LineageMatcher {
    levels: Vec<LevelMatcher>,
}

impl LineageMatcher {
    pub fn compile(specs: &[MatchSpec]) -> Result<Self, regex::Error> {
        let levels = specs
            .iter()
            .map(LevelMatcher::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { levels })
    }

    pub fn matches(&self, lineage: &[&str]) -> bool {
        self.levels.len() == lineage.len()
            && self
                .levels
                .iter()
                .zip(lineage)
                .all(|(level, text)| level.matches(text))
    }
}

/// Compiled remediation rules for one OS.
#[derive(Debug, Clone)]
pub struct DriverRules {
    negation: String,
    swap_set_delete: bool,
    negate_with: Vec<(LineageMatcher, String)>,
    idempotent: Vec<LineageMatcher>,
    sectional_overwrite: Vec<LineageMatcher>,
    sectional_overwrite_no_negate: Vec<LineageMatcher>,
    sectional_exiting: Vec<(LineageMatcher, String)>,
    ordering: Vec<(LineageMatcher, i64)>,
    tags: Vec<(LineageMatcher, Vec<String>)>,
    include_tags: BTreeSet<String>,
    exclude_tags: BTreeSet<String>,
}

impl Default for DriverRules {
    fn default() -> Self {
        Self {
            negation: "no".to_string(),
            swap_set_delete: false,
            negate_with: Vec::new(),
            idempotent: Vec::new(),
            sectional_overwrite: Vec::new(),
            sectional_overwrite_no_negate: Vec::new(),
            sectional_exiting: Vec::new(),
            ordering: Vec::new(),
            tags: Vec::new(),
            include_tags: BTreeSet::new(),
            exclude_tags: BTreeSet::new(),
        }
    }
}

impl DriverRules {
    pub fn compile(spec: &RuleSpec) -> Result<Self, regex::Error> {
        let lineages = |specs: &[LineageSpec]| {
            specs
                .iter()
                .map(|s| LineageMatcher::compile(&s.lineage))
                .collect::<Result<Vec<_>, _>>()
        };

        Ok(Self {
            negation: spec.negation.clone().unwrap_or_else(|| "no".to_string()),
            swap_set_delete: spec.swap_set_delete.unwrap_or(false),
            negate_with: spec
                .negate_with
                .iter()
                .map(|s| Ok((LineageMatcher::compile(&s.lineage)?, s.use_line.clone())))
                .collect::<Result<_, regex::Error>>()?,
            idempotent: lineages(&spec.idempotent_commands)?,
            sectional_overwrite: lineages(&spec.sectional_overwrite)?,
            sectional_overwrite_no_negate: lineages(&spec.sectional_overwrite_no_negate)?,
            sectional_exiting: spec
                .sectional_exiting
                .iter()
                .map(|s| Ok((LineageMatcher::compile(&s.lineage)?, s.exit_text.clone())))
                .collect::<Result<_, regex::Error>>()?,
            ordering: spec
                .ordering
                .iter()
                .map(|s| Ok((LineageMatcher::compile(&s.lineage)?, s.weight)))
                .collect::<Result<_, regex::Error>>()?,
            tags: spec
                .tags
                .iter()
                .map(|s| Ok((LineageMatcher::compile(&s.lineage)?, s.apply_tags.clone())))
                .collect::<Result<_, regex::Error>>()?,
            include_tags: spec.include_tags.iter().cloned().collect(),
            exclude_tags: spec.exclude_tags.iter().cloned().collect(),
        })
    }

    /// The command that removes the last line of `lineage`.
    pub fn negate(&self, lineage: &[&str]) -> String {
        if let Some((_, line)) = self.negate_with.iter().find(|(m, _)| m.matches(lineage)) {
            return line.clone();
        }
        let text = lineage.last().copied().unwrap_or_default();

        if self.swap_set_delete {
            if let Some(rest) = text.strip_prefix("set ") {
                return format!("delete {rest}");
            }
            if let Some(rest) = text.strip_prefix("delete ") {
                return format!("set {rest}");
            }
        }

        let prefix = format!("{} ", self.negation);
        match text.strip_prefix(prefix.as_str()) {
            Some(rest) => rest.to_string(),
            None => format!("{prefix}{text}"),
        }
    }

    /// Index of the idempotent rule covering `lineage`. Two lines covered
    /// by the same rule replace each other without a negation.
    pub fn idempotent_rule(&self, lineage: &[&str]) -> Option<usize> {
        self.idempotent.iter().position(|m| m.matches(lineage))
    }

    pub fn is_sectional_overwrite(&self, lineage: &[&str]) -> bool {
        self.sectional_overwrite.iter().any(|m| m.matches(lineage))
    }

    pub fn is_sectional_overwrite_no_negate(&self, lineage: &[&str]) -> bool {
        self.sectional_overwrite_no_negate
            .iter()
            .any(|m| m.matches(lineage))
    }

    pub fn exit_text(&self, lineage: &[&str]) -> Option<&str> {
        self.sectional_exiting
            .iter()
            .find(|(m, _)| m.matches(lineage))
            .map(|(_, text)| text.as_str())
    }

    /// Sort weight of a line; the first matching rule wins.
    pub fn weight(&self, lineage: &[&str]) -> i64 {
        self.ordering
            .iter()
            .find(|(m, _)| m.matches(lineage))
            .map_or(DEFAULT_WEIGHT, |(_, weight)| *weight)
    }

    /// Tags applied directly to the line, without inherited ones.
    pub fn tags(&self, lineage: &[&str]) -> BTreeSet<String> {
        self.tags
            .iter()
            .filter(|(m, _)| m.matches(lineage))
            .flat_map(|(_, tags)| tags.iter().cloned())
            .collect()
    }

    pub fn include_tags(&self) -> &BTreeSet<String> {
        &self.include_tags
    }

    pub fn exclude_tags(&self) -> &BTreeSet<String> {
        &self.exclude_tags
    }
}
