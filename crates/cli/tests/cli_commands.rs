use std::fs;
use std::path::{Path, PathBuf};

use matcher_core::input::{HashType, InputFile, InputSets};
use predicates::prelude::*;
use tempfile::tempdir;

const SIDE_A: &str = r#"[
  {
    "binaryName": "p/Owner",
    "superName": "java/lang/Object",
    "access": 33,
    "fields": [{"name": "bar", "descriptor": "I", "access": 2}],
    "methods": [
      {"name": "foo", "descriptor": "(I)I", "access": 1, "codeSize": 6,
       "refs": [{"kind": "fieldRead", "owner": "p/Owner", "name": "bar", "descriptor": "I"}]}
    ]
  }
]"#;

const SIDE_B: &str = r#"[
  {
    "binaryName": "q/X",
    "superName": "java/lang/Object",
    "access": 33,
    "fields": [{"name": "b", "descriptor": "I", "access": 2}],
    "methods": [
      {"name": "a", "descriptor": "(I)I", "access": 1, "codeSize": 6,
       "refs": [{"kind": "fieldRead", "owner": "q/X", "name": "b", "descriptor": "I"}]},
      {"name": "c", "descriptor": "()V", "access": 1, "codeSize": 1}
    ]
  }
]"#;

fn write_sides(root: &Path) -> (PathBuf, PathBuf) {
    let a = root.join("a.json");
    let b = root.join("b.json");
    fs::write(&a, SIDE_A).expect("write side A");
    fs::write(&b, SIDE_B).expect("write side B");
    (a, b)
}

fn cmd() -> assert_cmd::Command {
    assert_cmd::cargo::cargo_bin_cmd!("class-matcher")
}

/// A run with ambiguities or leftovers still exits 0 and prints the summary.
#[test]
fn match_prints_summary() {
    let dir = tempdir().expect("tempdir");
    let (a, b) = write_sides(dir.path());

    cmd()
        .arg("match")
        .arg("--a")
        .arg(&a)
        .arg("--b")
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::str::contains("Matched:"))
        .stdout(predicate::str::contains("Classes: 1"))
        .stdout(predicate::str::contains("Methods: 1"))
        .stdout(predicate::str::contains("Unmatched: A 0 / B 1"));
}

#[test]
fn match_json_output_is_a_report() {
    let dir = tempdir().expect("tempdir");
    let (a, b) = write_sides(dir.path());

    let output = cmd().arg("match").arg("--a").arg(&a).arg("--b").arg(&b).arg("--json").output().expect("run");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("report JSON");
    assert_eq!(report["stats"]["confirmed"], 3);
    assert_eq!(report["methods"][0]["a"]["name"], "foo");
    assert_eq!(report["methods"][0]["b"]["name"], "a");
    assert_eq!(report["unmatched_b"][0]["name"], "c");
}

#[test]
fn match_writes_report_file() {
    let dir = tempdir().expect("tempdir");
    let (a, b) = write_sides(dir.path());
    let report_path = dir.path().join("out/report.json");

    cmd()
        .arg("match")
        .arg("--a")
        .arg(&a)
        .arg("--b")
        .arg(&b)
        .arg("--report")
        .arg(&report_path)
        .assert()
        .success();

    let body = fs::read_to_string(&report_path).expect("report written");
    let report: serde_json::Value = serde_json::from_str(&body).expect("report JSON");
    assert_eq!(report["classes"].as_array().map(Vec::len), Some(1));
    assert_eq!(report["fields"][0]["b"]["name"], "b");
}

#[test]
fn match_resolves_descriptor_sets() {
    let dir = tempdir().expect("tempdir");
    let inputs_dir = dir.path().join("inputs");
    fs::create_dir_all(&inputs_dir).expect("mkdir");
    let (a, b) = write_sides(&inputs_dir);

    let describe = |path: &Path| InputFile { path: None, ..InputFile::from_path(path, HashType::Sha256).expect("hash") };
    let sets = InputSets {
        a: vec![describe(&a)],
        b: vec![describe(&b)],
        shared: Vec::new(),
        input_dirs: vec![PathBuf::from("inputs")],
    };
    let sets_path = dir.path().join("sets.json");
    fs::write(&sets_path, serde_json::to_string(&sets).expect("serialize sets")).expect("write sets");

    cmd()
        .arg("match")
        .arg("--inputs")
        .arg(&sets_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Classes: 1"));
}

#[test]
fn match_with_mismatched_descriptor_fails() {
    let dir = tempdir().expect("tempdir");
    let (a, b) = write_sides(dir.path());
    let mut wrong = InputFile::from_path(&a, HashType::Sha256).expect("hash");
    wrong.path = None;
    wrong.hash = Some("00".repeat(32));
    let sets = InputSets {
        a: vec![wrong],
        b: vec![InputFile::from_path(&b, HashType::Sha256).expect("hash")],
        shared: Vec::new(),
        input_dirs: vec![dir.path().to_path_buf()],
    };
    let sets_path = dir.path().join("sets.json");
    fs::write(&sets_path, serde_json::to_string(&sets).expect("serialize sets")).expect("write sets");

    cmd()
        .arg("match")
        .arg("--inputs")
        .arg(&sets_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input integrity error"));
}

#[test]
fn match_with_missing_input_fails() {
    let dir = tempdir().expect("tempdir");
    let (_, b) = write_sides(dir.path());

    cmd()
        .arg("match")
        .arg("--a")
        .arg(dir.path().join("missing.jar"))
        .arg("--b")
        .arg(&b)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load inputs"));
}

#[test]
fn match_without_inputs_fails() {
    cmd().arg("match").assert().failure().stderr(predicate::str::contains("Both sides need at least one input"));
}

#[test]
fn match_applies_config_thresholds() {
    let dir = tempdir().expect("tempdir");
    let (a, b) = write_sides(dir.path());
    let config = dir.path().join("matcher.yaml");
    fs::write(&config, "matcher:\n  min_score: 0.99\n").expect("write config");

    cmd()
        .arg("match")
        .arg("--a")
        .arg(&a)
        .arg("--b")
        .arg(&b)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Classes: 0"));
}

#[test]
fn inspect_reports_counts() {
    let dir = tempdir().expect("tempdir");
    let (_, b) = write_sides(dir.path());

    cmd()
        .arg("inspect")
        .arg(&b)
        .assert()
        .success()
        .stdout(predicate::str::contains("Classes: 1"))
        .stdout(predicate::str::contains("Methods: 2"))
        .stdout(predicate::str::contains("Fields: 1"));
}

#[test]
fn classifiers_lists_builtins_and_plugin_classifiers() {
    cmd()
        .arg("classifiers")
        .assert()
        .success()
        .stdout(predicate::str::contains("method-position"))
        .stdout(predicate::str::contains("class-package-hint").not());

    let output = cmd().args(["classifiers", "--plugin", "package-hint", "--json"]).output().expect("run");
    assert!(output.status.success());
    let infos: serde_json::Value = serde_json::from_slice(&output.stdout).expect("classifier JSON");
    let names: Vec<&str> = infos.as_array().expect("array").iter().filter_map(|i| i["name"].as_str()).collect();
    assert!(names.contains(&"class-package-hint"));
}

#[test]
fn classifiers_warns_about_rejected_plugin_weights() {
    let dir = tempdir().expect("tempdir");
    let manifest = dir.path().join("weights.json");
    fs::write(&manifest, r#"{"name": "bad-weights", "weights": {"no-such-classifier": 1.0}}"#).expect("write manifest");

    cmd()
        .env_remove("RUST_LOG")
        .arg("classifiers")
        .arg("--plugin")
        .arg(&manifest)
        .assert()
        .success()
        .stdout(predicate::str::contains("class-kind"))
        .stderr(predicate::str::contains("bad-weights"))
        .stderr(predicate::str::contains("no-such-classifier"));
}

#[test]
fn plugins_lists_builtins_and_failures() {
    cmd()
        .args(["plugins", "--plugin", "no-such-plugin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("package-hint"))
        .stdout(predicate::str::contains("Failed:"))
        .stdout(predicate::str::contains("no-such-plugin"));
}

#[test]
fn hash_input_prints_descriptors() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("abc.bin");
    fs::write(&path, b"abc").expect("write");

    let output = cmd().arg("hash-input").arg(&path).output().expect("run");
    assert!(output.status.success());
    let descriptors: serde_json::Value = serde_json::from_slice(&output.stdout).expect("descriptor JSON");
    assert_eq!(descriptors[0]["fileName"], "abc.bin");
    assert_eq!(descriptors[0]["size"], 3);
    assert_eq!(descriptors[0]["hash"], "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad");

    cmd()
        .arg("hash-input")
        .arg(&path)
        .args(["--algorithm", "md5"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported hash algorithm"));
}
