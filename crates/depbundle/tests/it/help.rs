use predicates::prelude::*;

use crate::common::TestContext;

#[test]
fn help() {
    let context = TestContext::new();
    context
        .command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: depbundle [OPTIONS] <COMMAND>"))
        .stdout(predicate::str::contains("find"))
        .stdout(predicate::str::contains("fix"))
        .stdout(predicate::str::contains("--tool-timeout"));
}

#[test]
fn version() {
    let context = TestContext::new();
    context
        .command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::starts_with(format!(
            "depbundle {}",
            env!("CARGO_PKG_VERSION")
        )));
}

#[test]
fn missing_subcommand() {
    let context = TestContext::new();
    context.command().assert().failure().code(2);
}

#[test]
fn fix_paths_requires_copy_to() {
    let context = TestContext::new();
    context
        .find()
        .args(["libvips.so.42", "--fix-paths"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--copy-to"));
}
