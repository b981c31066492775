use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use golden_compliance::batch::evaluate_batch;
use golden_compliance::dispatch::EvaluationJob;
use golden_compliance::model::Device;
use golden_compliance::report::{render_batch, render_summary};
use serde::Deserialize;
use serde_json::json;

use crate::cli::{BatchArgs, OutputFormat};
use crate::{read_text, Environment};

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default, rename = "job")]
    jobs: Vec<ManifestJob>,
}

#[derive(Debug, Deserialize)]
struct ManifestJob {
    device: String,
    platform: String,
    feature: String,
    actual: PathBuf,
    intended: PathBuf,
}

pub fn run_batch(args: BatchArgs) -> Result<()> {
    let env = Environment::load(&args.source)?;
    let raw = read_text(&args.manifest)?;
    let manifest: Manifest = toml::from_str(&raw)
        .with_context(|| format!("failed to parse manifest {}", args.manifest.display()))?;
    let base = args.manifest.parent().unwrap_or_else(|| Path::new("."));

    let jobs = manifest
        .jobs
        .into_iter()
        .map(|entry| load_job(&env, base, entry))
        .collect::<Result<Vec<_>>>()?;

    let workers = args.jobs.unwrap_or(env.settings.batch.jobs);
    let outcomes = evaluate_batch(&env.dispatcher, &jobs, workers);
    let records: Vec<_> = outcomes.iter().filter_map(|o| o.as_ref().ok()).cloned().collect();
    let failed = outcomes.len() - records.len();

    match args.format {
        OutputFormat::Text => {
            println!("{}", render_batch(&jobs, &outcomes));
            println!();
            println!("{}", render_summary(&records, failed));
        }
        OutputFormat::Json => {
            let rows: Vec<_> = jobs
                .iter()
                .zip(&outcomes)
                .map(|(job, outcome)| match outcome {
                    Ok(record) => json!(record),
                    Err(err) => json!({
                        "device": job.device.name,
                        "feature": job.feature,
                        "error": err.to_string(),
                    }),
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&rows)?);
        }
    }

    let non_compliant = records.iter().filter(|r| !r.is_compliant()).count();
    if args.strict && (non_compliant > 0 || failed > 0) {
        bail!("strict mode failed: {non_compliant} non-compliant, {failed} failed");
    }
    Ok(())
}

fn load_job(env: &Environment, base: &Path, entry: ManifestJob) -> Result<EvaluationJob> {
    let mut actual = read_text(&base.join(&entry.actual))?;
    let intended = read_text(&base.join(&entry.intended))?;
    if let Some(resolved) = env.dispatcher.rule(&entry.platform, &entry.feature) {
        actual = env.prepare_actual(&resolved.rule, actual);
    }
    Ok(EvaluationJob {
        device: Device::new(entry.device, entry.platform),
        feature: entry.feature,
        actual: actual.into(),
        intended: intended.into(),
    })
}
