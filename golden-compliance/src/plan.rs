//! Per-device config sets assembled from compliance records.

use std::fmt::{self, Display, Formatter};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::{ComplianceRecord, ConfigPayload};

/// Which payload of each record a plan collects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum PlanType {
    Intended,
    Missing,
    Remediation,
}

impl Display for PlanType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlanType::Intended => "intended",
            PlanType::Missing => "missing",
            PlanType::Remediation => "remediation",
        };
        f.write_str(name)
    }
}

enum Piece {
    Text(String),
    Structured(Value),
}

impl Piece {
    fn is_empty(&self) -> bool {
        match self {
            Piece::Text(text) => text.trim().is_empty(),
            Piece::Structured(Value::Null) => true,
            Piece::Structured(Value::Array(items)) => items.is_empty(),
            Piece::Structured(Value::Object(map)) => map.is_empty(),
            Piece::Structured(_) => false,
        }
    }

    fn into_value(self) -> Value {
        match self {
            Piece::Text(text) => Value::String(text),
            Piece::Structured(value) => value,
        }
    }
}

fn piece(record: &ComplianceRecord, plan_type: PlanType) -> Piece {
    match plan_type {
        PlanType::Intended => match &record.intended {
            ConfigPayload::Text(text) => Piece::Text(text.clone()),
            ConfigPayload::Json(value) => Piece::Structured(value.clone()),
        },
        PlanType::Missing => match record.result.missing.as_text() {
            Some(text) => Piece::Text(text.to_string()),
            None => Piece::Structured(record.result.missing.to_value()),
        },
        PlanType::Remediation => Piece::Text(record.remediation.clone()),
    }
}

/// Build one device's config set from its records.
///
/// Only records whose feature is listed in `features` contribute; an empty
/// list takes every record. Text payloads are joined with newlines in record
/// order. When any contributing payload is structured, the set is instead
/// the pretty-printed JSON array of all contributing payloads. Returns
/// `None` when nothing contributes.
pub fn generate_config_set(
    records: &[ComplianceRecord],
    plan_type: PlanType,
    features: &[&str],
) -> Option<String> {
    let pieces: Vec<Piece> = records
        .iter()
        .filter(|r| features.is_empty() || features.contains(&r.feature.as_str()))
        .map(|r| piece(r, plan_type))
        .filter(|p| !p.is_empty())
        .collect();

    if pieces.is_empty() {
        return None;
    }

    if pieces.iter().all(|p| matches!(p, Piece::Text(_))) {
        let lines: Vec<String> = pieces
            .into_iter()
            .map(|p| match p {
                Piece::Text(text) => text.trim_end().to_string(),
                Piece::Structured(value) => value.to_string(),
            })
            .collect();
        return Some(lines.join("\n"));
    }

    let values: Vec<Value> = pieces.into_iter().map(Piece::into_value).collect();
    serde_json::to_string_pretty(&values).ok()
}
