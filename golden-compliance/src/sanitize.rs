use regex::{Regex, RegexBuilder};
use serde::Deserialize;

use crate::error::ConfigError;

/// Drop every line matching `regex`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LineRemoval {
    pub name: String,
    pub regex: String,
}

/// Replace every match of `regex` with `replace`; `$1`-style group
/// references are expanded.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LineReplacement {
    pub name: String,
    pub regex: String,
    pub replace: String,
}

/// Compiled removal and replacement rules, applied in that order.
#[derive(Debug, Clone, Default)]
pub struct Sanitizer {
    removals: Vec<Regex>,
    replacements: Vec<(Regex, String)>,
}

impl Sanitizer {
    pub fn new(removals: &[LineRemoval], replacements: &[LineReplacement]) -> Result<Self, ConfigError> {
        let removals = removals
            .iter()
            .map(|rule| compile(&rule.name, &rule.regex))
            .collect::<Result<Vec<_>, _>>()?;
        let replacements = replacements
            .iter()
            .map(|rule| Ok((compile(&rule.name, &rule.regex)?, rule.replace.clone())))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        Ok(Self {
            removals,
            replacements,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.removals.is_empty() && self.replacements.is_empty()
    }

    pub fn apply(&self, config: &str) -> String {
        let mut text = config
            .lines()
            .filter(|line| !self.removals.iter().any(|re| re.is_match(line)))
            .collect::<Vec<_>>()
            .join("\n");
        for (re, replace) in &self.replacements {
            text = re.replace_all(&text, replace.as_str()).into_owned();
        }
        text
    }
}

fn compile(name: &str, pattern: &str) -> Result<Regex, ConfigError> {
    RegexBuilder::new(pattern)
        .multi_line(true)
        .build()
        .map_err(|source| ConfigError::InvalidPattern {
            name: name.to_string(),
            source,
        })
}
