use anyhow::{bail, Result};
use golden_compliance::model::{ComplianceRecord, ConfigPayload, Device};
use golden_compliance::plan::generate_config_set;
use golden_compliance::report::{render_records, render_summary};
use tracing::error;

use crate::cli::{CheckArgs, OutputFormat};
use crate::{read_text, Environment};

pub fn run_check(args: CheckArgs) -> Result<()> {
    let env = Environment::load(&args.source)?;
    let device = Device::new(args.device.clone(), args.platform.clone());
    let actual = read_text(&args.actual)?;
    let intended = read_text(&args.intended)?;

    let rules: Vec<_> = env
        .dispatcher
        .rules()
        .iter()
        .filter(|r| {
            r.rule.platform == args.platform
                && args.feature.as_deref().map_or(true, |f| r.rule.feature == f)
        })
        .collect();
    if rules.is_empty() {
        match &args.feature {
            Some(feature) => bail!("no compliance rule for {} - {feature}", args.platform),
            None => bail!("no compliance rules for platform {}", args.platform),
        }
    }

    let mut records: Vec<ComplianceRecord> = Vec::new();
    let mut failed = 0;
    for resolved in rules {
        let actual = ConfigPayload::from(env.prepare_actual(&resolved.rule, actual.clone()));
        let intended = ConfigPayload::from(intended.as_str());
        match env
            .dispatcher
            .evaluate_rule(resolved, &device, &actual, &intended)
        {
            Ok(record) => records.push(record),
            Err(err) => {
                error!(device = %device.name, rule = %resolved.rule, error = %err, "compliance evaluation failed");
                failed += 1;
            }
        }
    }

    if let Some(plan_type) = args.plan {
        if let Some(set) = generate_config_set(&records, plan_type, &[]) {
            println!("{set}");
        }
    } else {
        match args.format {
            OutputFormat::Text => {
                println!("{}", render_records(&records));
                println!();
                println!("{}", render_summary(&records, failed));
            }
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&records)?),
        }
    }

    let non_compliant = records.iter().filter(|r| !r.is_compliant()).count();
    if args.strict && (non_compliant > 0 || failed > 0) {
        bail!("strict mode failed: {non_compliant} non-compliant, {failed} failed");
    }
    Ok(())
}
