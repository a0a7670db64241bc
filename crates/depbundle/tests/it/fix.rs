use assert_fs::prelude::*;
use predicates::prelude::*;

use crate::common::TestContext;

#[test]
fn missing_directory() {
    let context = TestContext::new();
    context
        .fix()
        .arg("does-not-exist")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(
            "Directory not found: `does-not-exist`",
        ));
}

/// A missing directory doesn't prevent the others from being fixed.
#[cfg(unix)]
#[test]
fn missing_directory_does_not_stop_others() {
    let context = TestContext::new();
    context.temp_dir.child("bundle").create_dir_all().unwrap();
    context
        .fix()
        .args(["bundle", "does-not-exist"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Rewrote 0 of 0 libraries"))
        .stderr(predicate::str::contains("Directory not found"));
}

#[cfg(unix)]
#[test]
fn empty_directory_succeeds() {
    let context = TestContext::new();
    context.temp_dir.child("bundle").create_dir_all().unwrap();
    context.fix().arg("bundle").assert().success();
}
