use assert_fs::prelude::*;

use depbundle_closure::{
    ClosureExporter, DependencyGraph, Error, GraphBuilder, LinkageInspector, METADATA_FILE,
    detect_version,
};
use depbundle_platform::Platform;

use crate::common::{FakeToolchain, touch_libraries};

mod common;

async fn libvips_graph(toolchain: &FakeToolchain, root: &std::path::Path) -> DependencyGraph {
    let inspector = LinkageInspector::new(Platform::Linux, toolchain);
    GraphBuilder::new(&inspector).build(root).await.unwrap()
}

fn linux_toolchain() -> FakeToolchain {
    FakeToolchain::new()
        .library(
            "libvips.so.42",
            Some("libvips.so.42"),
            &["libpng16.so.16", "libheif.so.1"],
        )
        .library("libpng16.so.16", Some("libpng16.so.16"), &[])
}

#[tokio::test]
async fn report() {
    let temp = assert_fs::TempDir::new().unwrap();
    touch_libraries(&temp, &["libvips.so.42", "libpng16.so.16"]);
    let toolchain = linux_toolchain();
    let graph = libvips_graph(&toolchain, &temp.child("libvips.so.42")).await;

    let exporter = ClosureExporter::new(&graph, Platform::Linux).unwrap();
    let path = temp.child("out/report.json");
    let report = exporter.write_report(&path).unwrap();
    assert_eq!(report.total_count, 2);
    assert_eq!(
        report.total_size,
        ("fake contents of libvips.so.42".len() + "fake contents of libpng16.so.16".len()) as u64
    );

    let json: serde_json::Value =
        serde_json::from_str(&fs_err::read_to_string(path.path()).unwrap()).unwrap();
    insta::assert_json_snapshot!(json, {
        ".root_library_path" => "[PATH]",
        ".libraries.*" => "[PATH]",
    }, @r#"
    {
      "dependencies": {
        "libpng16.so.16": [],
        "libvips.so.42": [
          "libpng16.so.16"
        ]
      },
      "libraries": {
        "libpng16.so.16": "[PATH]",
        "libvips.so.42": "[PATH]"
      },
      "platform": "linux",
      "root_library_path": "[PATH]",
      "total_count": 2,
      "total_size": 61,
      "unresolved": {
        "libvips.so.42": [
          "libheif.so.1"
        ]
      }
    }
    "#);
}

#[tokio::test]
async fn export_and_metadata() {
    let temp = assert_fs::TempDir::new().unwrap();
    let source = temp.child("source");
    touch_libraries(&source, &["libvips.so.42", "libpng16.so.16"]);
    let toolchain = linux_toolchain();
    let graph = libvips_graph(&toolchain, &source.child("libvips.so.42")).await;

    let bundle = temp.child("bundle");
    let exporter = ClosureExporter::new(&graph, Platform::Linux).unwrap();
    exporter.export(&bundle, "8.15.1", "x86_64").unwrap();
    // A second export over the first one replaces the files.
    let metadata = exporter.export(&bundle, "8.15.1", "x86_64").unwrap();
    assert_eq!(metadata.total_count, 2);

    bundle
        .child("libvips.so.42")
        .assert("fake contents of libvips.so.42");
    let json: serde_json::Value = serde_json::from_str(
        &fs_err::read_to_string(bundle.child(METADATA_FILE).path()).unwrap(),
    )
    .unwrap();
    insta::assert_json_snapshot!(json, @r#"
    {
      "architecture": "x86_64",
      "libraries": [
        "libpng16.so.16",
        "libvips.so.42"
      ],
      "platform": "linux",
      "total_count": 2,
      "total_size": 61,
      "version": "8.15.1"
    }
    "#);
}

#[tokio::test]
async fn export_into_source_directory() {
    let temp = assert_fs::TempDir::new().unwrap();
    touch_libraries(&temp, &["libvips.so.42", "libpng16.so.16"]);
    let toolchain = linux_toolchain();
    let graph = libvips_graph(&toolchain, &temp.child("libvips.so.42")).await;

    // The destination is the directory the libraries were found in.
    let exporter = ClosureExporter::new(&graph, Platform::Linux).unwrap();
    let metadata = exporter.export(&temp, "8.15.1", "x86_64").unwrap();
    assert_eq!(metadata.total_count, 2);

    temp.child("libvips.so.42").assert("fake contents of libvips.so.42");
    temp.child("libpng16.so.16").assert("fake contents of libpng16.so.16");
    assert!(temp.child(METADATA_FILE).path().is_file());
}

#[cfg(unix)]
#[tokio::test]
async fn script() {
    use std::os::unix::fs::PermissionsExt;

    let temp = assert_fs::TempDir::new().unwrap();
    touch_libraries(&temp, &["libvips.so.42", "libpng16.so.16"]);
    let toolchain = linux_toolchain();
    let graph = libvips_graph(&toolchain, &temp.child("libvips.so.42")).await;

    let exporter = ClosureExporter::new(&graph, Platform::Linux).unwrap();
    let script = temp.child("copy-libs.sh");
    exporter.write_script(&script, "x86_64").unwrap();

    let contents = fs_err::read_to_string(script.path()).unwrap();
    let root = dunce::canonicalize(temp.path()).unwrap();
    let contents = contents.replace(&root.display().to_string(), "[TEMP]");
    insta::assert_snapshot!(contents, @r#"
    #!/bin/sh
    # Copies the shared-library closure of libvips.so.42
    # Platform: linux
    # Architecture: x86_64
    # Libraries: 2
    set -e

    DEST_DIR="${1:-.}"
    mkdir -p "$DEST_DIR"

    cp '[TEMP]/libpng16.so.16' "$DEST_DIR/"
    cp '[TEMP]/libvips.so.42' "$DEST_DIR/"

    echo "Copied 2 libraries to $DEST_DIR"
    "#);

    let mode = fs_err::metadata(script.path()).unwrap().permissions().mode();
    assert_eq!(mode & 0o111, 0o111);

    // The script reproduces the bundle.
    let destination = temp.child("copied");
    let status = std::process::Command::new("sh")
        .arg(script.path())
        .arg(destination.path())
        .status()
        .unwrap();
    assert!(status.success());
    destination
        .child("libpng16.so.16")
        .assert("fake contents of libpng16.so.16");
    destination
        .child("libvips.so.42")
        .assert("fake contents of libvips.so.42");
}

#[tokio::test]
async fn name_collision() {
    let temp = assert_fs::TempDir::new().unwrap();
    touch_libraries(&temp.child("a"), &["libvips.so.42", "libffi.so.8"]);
    touch_libraries(&temp.child("b"), &["libffi.so.8"]);

    // Two different files, both named `libffi.so.8`.
    let other = temp.child("b/libffi.so.8");
    let toolchain = FakeToolchain::new()
        .library(
            "libvips.so.42",
            None,
            &[
                "libffi.so.8",
                &format!("libffi.so.7 => {}", other.path().display()),
            ],
        )
        .library("libffi.so.8", None, &[]);

    let graph = libvips_graph(&toolchain, &temp.child("a/libvips.so.42")).await;
    assert_eq!(graph.len(), 3);

    let Err(err) = ClosureExporter::new(&graph, Platform::Linux) else {
        panic!("expected a name collision");
    };
    assert!(
        matches!(&err, Error::NameCollision { name, .. } if name == "libffi.so.8"),
        "{err:?}"
    );
}

#[tokio::test]
async fn version_from_path() {
    let temp = assert_fs::TempDir::new().unwrap();
    let root = temp.child("Cellar/vips/8.15.1/lib/libvips.42.dylib");
    root.touch().unwrap();
    let toolchain = FakeToolchain::new();

    assert_eq!(detect_version(&root, &toolchain).await, "8.15.1");
    assert!(toolchain.invocations("vips").is_empty());
}

#[tokio::test]
async fn version_unknown() {
    let temp = assert_fs::TempDir::new().unwrap();
    let root = temp.child("lib/libvips.42.dylib");
    root.touch().unwrap();
    let toolchain = FakeToolchain::new();

    assert_eq!(detect_version(&root, &toolchain).await, "unknown");
    assert_eq!(toolchain.invocations("vips"), ["vips --version"]);
}
