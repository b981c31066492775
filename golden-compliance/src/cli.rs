use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use golden_compliance::plan::PlanType;

#[derive(Parser, Debug)]
#[command(name = "golden-compliance")]
#[command(about = "Check network device configuration against intended configuration")]
pub struct Cli {
    /// Log at debug level regardless of RUST_LOG.
    #[arg(short, long, global = true)]
    pub verbose: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Evaluate one device against the rules of its platform.
    Check(CheckArgs),
    /// Evaluate every job listed in a manifest in parallel.
    Batch(BatchArgs),
    /// Print the commands that bring running configuration to intended.
    Remediate(RemediateArgs),
}

#[derive(Parser, Debug)]
pub struct SourceArgs {
    /// Settings TOML with rules, remediation and sanitization.
    #[arg(long)]
    pub settings: PathBuf,
    /// Platform mapping TOML replacing the embedded table.
    #[arg(long)]
    pub mappings: Option<PathBuf>,
    /// Remediation profile TOML replacing the embedded profiles.
    #[arg(long)]
    pub profiles: Option<PathBuf>,
}

#[derive(Parser, Debug)]
pub struct CheckArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Device name used in reports.
    #[arg(long)]
    pub device: String,
    /// Network driver of the device, for example cisco_ios.
    #[arg(long)]
    pub platform: String,
    /// Actual (backup) configuration file.
    pub actual: PathBuf,
    /// Intended configuration file.
    pub intended: PathBuf,
    /// Only evaluate this feature.
    #[arg(long)]
    pub feature: Option<String>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Print the device config set of this type instead of the records.
    #[arg(long, value_enum)]
    pub plan: Option<PlanType>,
    /// Exit non-zero when any feature is not compliant.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Debug)]
pub struct BatchArgs {
    #[command(flatten)]
    pub source: SourceArgs,
    /// Manifest TOML listing `[[job]]` entries; file paths are relative to it.
    pub manifest: PathBuf,
    /// Worker threads, 0 for one per CPU. Overrides the settings.
    #[arg(long)]
    pub jobs: Option<usize>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// Exit non-zero when any job fails or is not compliant.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Parser, Debug)]
pub struct RemediateArgs {
    /// Network driver of the device, for example cisco_ios.
    #[arg(long)]
    pub platform: String,
    /// Running configuration file.
    pub running: PathBuf,
    /// Intended configuration file.
    pub intended: PathBuf,
    /// Settings TOML providing the platform's remediation options.
    #[arg(long)]
    pub settings: Option<PathBuf>,
    /// Platform mapping TOML replacing the embedded table.
    #[arg(long)]
    pub mappings: Option<PathBuf>,
    /// Remediation profile TOML replacing the embedded profiles.
    #[arg(long)]
    pub profiles: Option<PathBuf>,
    /// Limit remediation to top-level sections starting with this text.
    #[arg(long = "match")]
    pub selectors: Vec<String>,
    /// Print the predicted configuration after remediation instead.
    #[arg(long)]
    pub future: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
