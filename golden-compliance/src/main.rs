use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use golden_compliance::dispatch::Dispatcher;
use golden_compliance::logging;
use golden_compliance::model::{ComplianceRule, ConfigType};
use golden_compliance::platform::PlatformTable;
use golden_compliance::remediation::{HierRemediator, RemediationProfiles};
use golden_compliance::sanitize::Sanitizer;
use golden_compliance::settings::Settings;

mod batch_cmd;
mod check_cmd;
mod cli;
mod remediate_cmd;

use cli::{Cli, Command, SourceArgs};

fn main() -> Result<()> {
    let cli = Cli::parse();
    if let Err(err) = logging::init(cli.verbose) {
        eprintln!("warning: failed to initialize logging ({err})");
    }

    match cli.command {
        Command::Check(args) => check_cmd::run_check(args),
        Command::Batch(args) => batch_cmd::run_batch(args),
        Command::Remediate(args) => remediate_cmd::run_remediate(args),
    }
}

/// Settings, platform table and the components built from them.
pub(crate) struct Environment {
    pub settings: Settings,
    pub dispatcher: Dispatcher,
    pub sanitizer: Sanitizer,
}

impl Environment {
    pub fn load(source: &SourceArgs) -> Result<Self> {
        let settings = Settings::load(&source.settings)?;
        let platforms = load_platforms(source.mappings.as_deref())?;
        let sanitizer = Sanitizer::new(&settings.sanitize.remove, &settings.sanitize.replace)
            .context("invalid sanitization settings")?;
        let dispatcher = Dispatcher::from_settings(&settings, platforms)
            .with_context(|| format!("invalid settings in {}", source.settings.display()))?
            .with_remediator(load_remediator(source.profiles.as_deref())?);
        Ok(Self {
            settings,
            dispatcher,
            sanitizer,
        })
    }

    /// Sanitize actual CLI text; other payloads pass through untouched.
    pub fn prepare_actual(&self, rule: &ComplianceRule, actual: String) -> String {
        if rule.config_type == ConfigType::Cli && !self.sanitizer.is_empty() {
            self.sanitizer.apply(&actual)
        } else {
            actual
        }
    }
}

pub(crate) fn load_platforms(path: Option<&Path>) -> Result<PlatformTable> {
    match path {
        Some(path) => Ok(PlatformTable::load(path)?),
        None => Ok(PlatformTable::builtin()),
    }
}

pub(crate) fn load_remediator(path: Option<&Path>) -> Result<HierRemediator> {
    match path {
        Some(path) => Ok(HierRemediator::new(RemediationProfiles::load(path)?)),
        None => Ok(HierRemediator::default()),
    }
}

pub(crate) fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}
