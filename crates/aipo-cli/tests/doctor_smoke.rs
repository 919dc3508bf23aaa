//! `aipo doctor check` preflight smoke test, grounded in the teacher's
//! `assay-cli/tests/doctor_fix_e2e.rs` style of driving the built binary
//! with `assert_cmd` against fixtures in a temp directory.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn doctor_check_passes_for_a_valid_mock_adapter() {
    let temp = tempdir().expect("tempdir");
    let adapter_dir = temp.path().join("adapters");
    fs::create_dir_all(&adapter_dir).expect("mkdir adapters");
    let adapter_path = adapter_dir.join("mock.yaml");
    fs::write(&adapter_path, "name: mock\nkind: mock\n").expect("write adapter");

    Command::cargo_bin("aipo")
        .unwrap()
        .current_dir(temp.path())
        .arg("doctor")
        .arg("check")
        .arg("--adapter").arg(&adapter_path)
        .arg("--output-dir").arg(temp.path().join("out"))
        .assert()
        .success()
        .stdout(predicate::str::contains("[ok] storage directories"))
        .stdout(predicate::str::contains("[ok] adapter spec"))
        .stdout(predicate::str::contains("[ok] adapter construction"));
}

#[test]
fn doctor_check_fails_for_an_unresolvable_adapter_name() {
    let temp = tempdir().expect("tempdir");

    Command::cargo_bin("aipo")
        .unwrap()
        .current_dir(temp.path())
        .arg("doctor")
        .arg("check")
        .arg("--adapter").arg("does-not-exist")
        .arg("--output-dir").arg(temp.path().join("out"))
        .assert()
        .code(2)
        .stdout(predicate::str::contains("[FAIL] adapter spec"));
}
