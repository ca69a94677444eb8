#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::Value;
use tempfile::TempDir;

fn write_snapshot(name: &str, rows: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(format!("{name}.csv"));
    fs::write(&path, format!("entity,value,type\n{rows}")).expect("write snapshot");
    (dir, path)
}

#[test]
fn verify_unique_snapshot_succeeds() {
    let (_dir, csv) = write_snapshot("unique", "1,alice@x.com,\n2,bob@x.com,\n3,7,int\n");
    let output = cargo_bin_cmd!("sidx")
        .args(["--format", "json", "--partitions", "2", "verify"])
        .arg(&csv)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["success"], Value::Bool(true));
    assert_eq!(json["partitions"], 2);
    assert!(json["conflict"].is_null());
}

#[test]
fn verify_duplicate_exits_with_conflict() {
    let (_dir, csv) = write_snapshot("dup", "1,alice@x.com,\n2,bob@x.com,\n3,alice@x.com,\n");
    let output = cargo_bin_cmd!("sidx")
        .args(["--format", "json", "--partitions", "2", "verify"])
        .arg(&csv)
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["success"], Value::Bool(false));
    assert_eq!(json["conflict"]["entity_a"], 1);
    assert_eq!(json["conflict"]["entity_b"], 3);
    assert_eq!(json["conflict"]["value"], "alice@x.com");
}

#[test]
fn verify_targeted_values_only() {
    let (_dir, csv) = write_snapshot("targeted", "1,a,\n2,a,\n3,b,\n");
    cargo_bin_cmd!("sidx")
        .arg("verify")
        .arg(&csv)
        .args(["--value", "b"])
        .assert()
        .success();
    cargo_bin_cmd!("sidx")
        .arg("verify")
        .arg(&csv)
        .args(["--value", "a"])
        .assert()
        .code(2);
}

#[test]
fn verify_text_names_both_entities() {
    let (_dir, csv) = write_snapshot("text", "4,2,int\n9,2.0,float\n");
    let output = cargo_bin_cmd!("sidx")
        .arg("verify")
        .arg(&csv)
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(
        text.contains("both entity 4 and entity 9 share the property value 2"),
        "{text}"
    );
}

#[test]
fn sample_emits_json() {
    let (_dir, csv) = write_snapshot("sample", "1,a,\n2,a,\n3,b,\n4,c,\n");
    let output = cargo_bin_cmd!("sidx")
        .args(["--format", "json", "--partitions", "3", "sample"])
        .arg(&csv)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["index_size"], 4);
    assert_eq!(json["sample_size"], 4);
    assert_eq!(json["unique_values"], 3);
    assert_eq!(json["cancelled"], Value::Bool(false));
}

#[test]
fn sample_unique_mode_uses_document_count() {
    let (_dir, csv) = write_snapshot("sample-unique", "1,a,\n2,a,\n");
    let output = cargo_bin_cmd!("sidx")
        .args(["--format", "json", "sample", "--unique"])
        .arg(&csv)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["unique_values"], 2);
    assert_eq!(json["selectivity"], 1.0);
}

#[test]
fn config_file_supplies_partitions_and_constraint() {
    let (dir, csv) = write_snapshot("configured", "1,x,\n2,y,\n");
    let config = dir.path().join("index.toml");
    fs::write(
        &config,
        "partitions = 2\n\n[[constraints]]\nproperty = \"email\"\nprop_id = 5\n",
    )
    .expect("write config");
    let output = cargo_bin_cmd!("sidx")
        .args(["--format", "json", "--config"])
        .arg(&config)
        .args(["verify", "--property", "email"])
        .arg(&csv)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Value = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["partitions"], 2);
}

#[test]
fn invalid_input_fails_cleanly() {
    let (dir, csv) = write_snapshot("bad", "1,notanumber,int\n");
    cargo_bin_cmd!("sidx")
        .arg("verify")
        .arg(&csv)
        .assert()
        .code(1);
    cargo_bin_cmd!("sidx")
        .arg("sample")
        .arg(dir.path().join("missing.csv"))
        .assert()
        .code(1);
    cargo_bin_cmd!("sidx")
        .args(["--partitions", "0", "sample"])
        .arg(&csv)
        .assert()
        .code(1);
}
