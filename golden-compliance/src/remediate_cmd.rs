use anyhow::{Context, Result};
use golden_compliance::remediation::RemediationRequest;
use golden_compliance::settings::Settings;
use serde_json::Value;

use crate::cli::RemediateArgs;
use crate::{load_platforms, load_remediator, read_text};

pub fn run_remediate(args: RemediateArgs) -> Result<()> {
    let platforms = load_platforms(args.mappings.as_deref())?;
    let options = match &args.settings {
        Some(path) => Settings::load(path)?
            .remediation_table()
            .remove(&args.platform)
            .map(|setting| setting.options)
            .unwrap_or(Value::Null),
        None => Value::Null,
    };
    let running = read_text(&args.running)?;
    let intended = read_text(&args.intended)?;
    let selectors: Vec<&str> = args.selectors.iter().map(String::as_str).collect();

    let request = RemediationRequest {
        platform: &args.platform,
        actual: &running,
        intended: &intended,
        selectors: &selectors,
        options: &options,
    };
    let remediator = load_remediator(args.profiles.as_deref())?;
    let outcome = if args.future {
        remediator.predict(&request, &platforms)
    } else {
        remediator.remediate(&request, &platforms)
    };
    let text =
        outcome.with_context(|| format!("failed to build remediation for {}", args.platform))?;

    if !text.is_empty() {
        println!("{text}");
    }
    Ok(())
}
