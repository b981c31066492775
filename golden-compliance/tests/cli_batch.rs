use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn fixture(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join(path)
}

#[test]
fn batch_isolates_failing_jobs() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("golden-compliance"));
    cmd.arg("batch")
        .arg("--settings")
        .arg(fixture("fixtures/settings.toml"))
        .arg(fixture("fixtures/batch.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("edge-02 [juniper_junos - system]"))
        .stdout(predicate::str::contains("! leaf-02 [vlans]"))
        .stdout(predicate::str::contains(
            "records=5 compliant=1 non_compliant=3 failed=1",
        ));
}

#[test]
fn batch_json_keeps_job_order() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("golden-compliance"));
    let output = cmd
        .arg("batch")
        .arg("--settings")
        .arg(fixture("fixtures/settings.toml"))
        .arg(fixture("fixtures/batch.toml"))
        .arg("--format")
        .arg("json")
        .arg("--jobs")
        .arg("4")
        .output()
        .expect("run batch");
    assert!(output.status.success());

    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json output");
    let rows = rows.as_array().expect("array");
    let devices: Vec<_> = rows.iter().map(|r| r["device"].as_str().unwrap_or_default()).collect();
    assert_eq!(devices, vec!["edge-01", "edge-01", "edge-02", "leaf-01", "leaf-02"]);
    assert!(rows[4]["error"].as_str().is_some_and(|e| e.contains("invalid JSON")));
    assert_eq!(rows[0]["compliance"], true);
}

#[test]
fn strict_batch_fails_when_any_job_fails() {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("golden-compliance"));
    cmd.arg("batch")
        .arg("--settings")
        .arg(fixture("fixtures/settings.toml"))
        .arg(fixture("fixtures/batch.toml"))
        .arg("--strict")
        .assert()
        .failure()
        .stderr(predicate::str::contains("1 failed"));
}

#[test]
fn missing_manifest_file_is_reported() {
    let dir = tempdir().expect("tempdir");
    let manifest = dir.path().join("batch.toml");
    fs::write(
        &manifest,
        "[[job]]\ndevice = \"r1\"\nplatform = \"cisco_ios\"\nfeature = \"ntp\"\nactual = \"absent.cfg\"\nintended = \"absent.cfg\"\n",
    )
    .expect("write manifest");

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("golden-compliance"));
    cmd.arg("batch")
        .arg("--settings")
        .arg(fixture("fixtures/settings.toml"))
        .arg(&manifest)
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to read"));
}
