use assert_fs::prelude::*;
use predicates::prelude::*;

use crate::common::TestContext;

#[test]
fn missing_library_path() {
    let context = TestContext::new();
    context
        .find()
        .arg(context.temp_dir.child("libfoo.so.1").path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("was not found"));
}

#[test]
fn missing_library_path_is_reported_when_quiet() {
    let context = TestContext::new();
    context
        .find()
        .arg("--quiet")
        .arg(context.temp_dir.child("libfoo.so.1").path())
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("was not found"));
}

#[test]
fn missing_library_name() {
    let context = TestContext::new();
    context
        .find()
        .arg("depbundle-does-not-exist")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Library `depbundle-does-not-exist` was not found",
        ));
}

/// The `depbundle` executable itself is a real ELF file with a real closure.
#[cfg(target_os = "linux")]
#[test]
fn report_for_own_executable() {
    let context = TestContext::new();
    let executable = assert_cmd::cargo::cargo_bin("depbundle");
    let report = context.temp_dir.child("report.json");
    let script = context.temp_dir.child("copy.sh");

    context
        .find()
        .arg(&executable)
        .arg("--output")
        .arg(report.path())
        .arg("--generate-script")
        .arg(script.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("depbundle"))
        .stderr(predicate::str::contains("Wrote report to"));

    let report: serde_json::Value =
        serde_json::from_str(&fs_err::read_to_string(report.path()).unwrap()).unwrap();
    assert_eq!(report["platform"], "linux");
    assert!(report["libraries"]["depbundle"].is_string(), "{report}");
    let libraries = report["libraries"].as_object().unwrap();
    assert_eq!(report["total_count"], libraries.len());
    assert!(libraries.keys().all(|name| !name.starts_with("libc.so")));

    script.assert(predicate::str::starts_with("#!/bin/sh"));
}

#[cfg(target_os = "linux")]
#[test]
fn copy_own_executable() {
    let context = TestContext::new();
    let executable = assert_cmd::cargo::cargo_bin("depbundle");
    let bundle = context.temp_dir.child("bundle");

    context
        .find()
        .arg(&executable)
        .arg("--copy-to")
        .arg(bundle.path())
        .assert()
        .success()
        .stderr(predicate::str::contains("Copied"));

    bundle.child("depbundle").assert(predicate::path::is_file());
    let metadata: serde_json::Value = serde_json::from_str(
        &fs_err::read_to_string(bundle.child("metadata.json").path()).unwrap(),
    )
    .unwrap();
    assert_eq!(metadata["platform"], "linux");
    assert!(
        metadata["libraries"]
            .as_array()
            .unwrap()
            .iter()
            .any(|name| name == "depbundle")
    );
}
