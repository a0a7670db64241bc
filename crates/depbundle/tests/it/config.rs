use assert_fs::prelude::*;
use indoc::indoc;
use predicates::prelude::*;

use crate::common::TestContext;

#[test]
fn invalid_config_file() {
    let context = TestContext::new();
    context
        .temp_dir
        .child("depbundle.toml")
        .write_str("search-path = [\"lib\"]\n")
        .unwrap();

    context
        .fix()
        .arg(".")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Failed to parse"))
        .stderr(predicate::str::contains("unknown field `search-path`"));
}

#[test]
fn no_config_skips_discovery() {
    let context = TestContext::new();
    context
        .temp_dir
        .child("depbundle.toml")
        .write_str("search-path = [\"lib\"]\n")
        .unwrap();

    // The invalid file is never read.
    context
        .command()
        .arg("--no-config")
        .arg("fix")
        .arg("does-not-exist")
        .assert()
        .code(1);
}

#[test]
fn explicit_config_file() {
    let context = TestContext::new();
    let config = context.temp_dir.child("custom.toml");
    config
        .write_str(indoc! {r#"
            tool-timeout = 10
            concurrency = 2
        "#})
        .unwrap();

    context
        .command()
        .arg("--config-file")
        .arg(config.path())
        .arg("-v")
        .arg("fix")
        .arg("does-not-exist")
        .assert()
        .code(1)
        .stderr(
            predicate::str::is_match(
                "(?m)^DEBUG Using a tool timeout of 10s and a concurrency of 2$",
            )
            .unwrap(),
        );
}

#[test]
fn missing_config_file() {
    let context = TestContext::new();
    context
        .command()
        .arg("--config-file")
        .arg("missing.toml")
        .arg("fix")
        .arg(".")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("missing.toml"));
}
