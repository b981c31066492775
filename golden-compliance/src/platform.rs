use std::fs;
use std::path::Path;

use config_diff_core::ParseOptions;
use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

/// How configuration of one network driver is parsed and remediated.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlatformMapping {
    pub driver: String,
    /// Remediation profile name, e.g. `ios`.
    #[serde(default)]
    pub remediation_os: Option<String>,
    #[serde(default)]
    pub parser: ParseOptions,
}

#[derive(Debug, Deserialize)]
struct MappingFile {
    #[serde(default)]
    platform: Vec<PlatformMapping>,
}

/// Errors returned when loading mapping files.
#[derive(Debug, Error)]
pub enum MappingLoadError {
    #[error("failed to read mappings file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse mappings file {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Lookup table from network driver to [`PlatformMapping`].
#[derive(Debug, Clone)]
pub struct PlatformTable {
    mappings: Vec<PlatformMapping>,
}

impl Default for PlatformTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PlatformTable {
    pub fn new(mappings: Vec<PlatformMapping>) -> Self {
        Self { mappings }
    }

    /// Built-in mappings, embedded at compile time.
    pub fn builtin() -> Self {
        let embedded = include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/mappings/platforms.toml"
        ));
        match parse_mappings(embedded, "embedded mappings".to_string()) {
            Ok(mappings) if !mappings.is_empty() => Self::new(mappings),
            _ => Self::new(fallback_mappings()),
        }
    }

    /// Load platform mappings from a TOML file.
    pub fn load(path: &Path) -> Result<Self, MappingLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| MappingLoadError::Io {
            path: path.display().to_string(),
            source,
        })?;
        parse_mappings(&raw, path.display().to_string()).map(Self::new)
    }

    pub fn get(&self, driver: &str) -> Option<&PlatformMapping> {
        self.mappings.iter().find(|m| m.driver == driver)
    }

    /// CLI parser profile, `None` when the driver is not mapped.
    pub fn parser_options(&self, driver: &str) -> Option<&ParseOptions> {
        self.get(driver).map(|m| &m.parser)
    }

    /// Remediation profile name for `driver`.
    ///
    /// Unmapped drivers fall back to the well-known driver names.
    pub fn remediation_os(&self, driver: &str) -> Option<String> {
        if let Some(os) = self.get(driver).and_then(|m| m.remediation_os.clone()) {
            return Some(os);
        }
        let os = fallback_remediation_os(driver)?;
        warn!(driver = %driver, os = %os, "no remediation profile mapped, using driver default");
        Some(os.to_string())
    }
}

fn parse_mappings(raw: &str, path: String) -> Result<Vec<PlatformMapping>, MappingLoadError> {
    let parsed: MappingFile =
        toml::from_str(raw).map_err(|source| MappingLoadError::Parse { path, source })?;
    Ok(parsed.platform)
}

fn fallback_remediation_os(driver: &str) -> Option<&'static str> {
    match driver {
        "cisco_ios" => Some("ios"),
        "cisco_xe" => Some("iosxe"),
        "cisco_xr" => Some("iosxr"),
        "cisco_nxos" => Some("nxos"),
        "arista_eos" => Some("eos"),
        "juniper_junos" => Some("junos"),
        _ => None,
    }
}

fn fallback_mappings() -> Vec<PlatformMapping> {
    let ios_like = ParseOptions {
        ignore_prefixes: vec![
            "Building configuration".to_string(),
            "Current configuration".to_string(),
        ],
        ignore_lines: vec!["end".to_string()],
        ..ParseOptions::default()
    };
    vec![
        PlatformMapping {
            driver: "cisco_ios".to_string(),
            remediation_os: Some("ios".to_string()),
            parser: ios_like.clone(),
        },
        PlatformMapping {
            driver: "cisco_xe".to_string(),
            remediation_os: Some("iosxe".to_string()),
            parser: ios_like,
        },
        PlatformMapping {
            driver: "arista_eos".to_string(),
            remediation_os: Some("eos".to_string()),
            parser: ParseOptions {
                ignore_lines: vec!["end".to_string()],
                indent: 3,
                ..ParseOptions::default()
            },
        },
        PlatformMapping {
            driver: "juniper_junos".to_string(),
            remediation_os: Some("junos".to_string()),
            parser: ParseOptions {
                comment_prefixes: vec!["#".to_string()],
                banner_prefixes: Vec::new(),
                indent: 4,
                ..ParseOptions::default()
            },
        },
    ]
}
