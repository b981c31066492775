use colored::Colorize;

use crate::batch::JobOutcome;
use crate::dispatch::EvaluationJob;
use crate::model::{ComplianceRecord, DiffPayload};

/// Render one record for terminal output.
pub fn render_record(record: &ComplianceRecord) -> String {
    let mut out = Vec::new();
    let status = if record.is_compliant() {
        "COMPLIANT".green().to_string()
    } else {
        "NON-COMPLIANT".red().to_string()
    };
    out.push(format!(
        "{} [{}] {status} ordered={}",
        record.device, record.rule, record.result.ordered
    ));

    append_payload(&mut out, "missing", '+', &record.result.missing);
    append_payload(&mut out, "extra", '-', &record.result.extra);

    if !record.remediation.is_empty() {
        out.push("remediation".to_string());
        for line in record.remediation.lines() {
            out.push(format!("  {line}").cyan().to_string());
        }
    }

    out.join("\n")
}

fn append_payload(out: &mut Vec<String>, label: &str, marker: char, payload: &DiffPayload) {
    if payload.is_empty() {
        return;
    }
    out.push(label.to_string());
    for line in payload.render().lines() {
        let line = format!("{marker} {line}");
        let colored = if marker == '+' {
            line.green().to_string()
        } else {
            line.red().to_string()
        };
        out.push(colored);
    }
}

/// Render several records separated by blank lines.
pub fn render_records(records: &[ComplianceRecord]) -> String {
    records
        .iter()
        .map(render_record)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Render summary counts for terminal output.
pub fn render_summary(records: &[ComplianceRecord], failed: usize) -> String {
    let compliant = records.iter().filter(|r| r.is_compliant()).count();
    format!(
        "records={} compliant={} non_compliant={} failed={}",
        records.len() + failed,
        compliant,
        records.len() - compliant,
        failed
    )
    .cyan()
    .to_string()
}

/// Render batch outcomes in job order, failures included.
pub fn render_batch(jobs: &[EvaluationJob], outcomes: &[JobOutcome]) -> String {
    let mut out = Vec::new();
    for (job, outcome) in jobs.iter().zip(outcomes) {
        match outcome {
            Ok(record) => out.push(render_record(record)),
            Err(err) => out.push(
                format!("! {} [{}] {err}", job.device.name, job.feature)
                    .magenta()
                    .to_string(),
            ),
        }
    }
    out.join("\n\n")
}
