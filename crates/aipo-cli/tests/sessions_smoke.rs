//! `aipo sessions {list,prune}` and `aipo list-conversations` against a
//! freshly created, empty conversation store — confirms the commands don't
//! error out when there is nothing to report, which is the common case for
//! an operator who hasn't run anything against a fresh `--output-dir` yet.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn sessions_list_on_an_empty_store_succeeds_with_no_rows() {
    let temp = tempdir().expect("tempdir");
    let output_dir = temp.path().join("out");

    Command::cargo_bin("aipo")
        .unwrap()
        .arg("sessions")
        .arg("list")
        .arg("--output-dir").arg(&output_dir)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn list_conversations_on_an_empty_store_succeeds() {
    let temp = tempdir().expect("tempdir");
    let output_dir = temp.path().join("out");

    Command::cargo_bin("aipo")
        .unwrap()
        .arg("list-conversations")
        .arg("--output-dir").arg(&output_dir)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn sessions_prune_reports_zero_when_nothing_is_old_enough() {
    let temp = tempdir().expect("tempdir");
    let output_dir = temp.path().join("out");

    Command::cargo_bin("aipo")
        .unwrap()
        .arg("sessions")
        .arg("prune")
        .arg("--older-than-days").arg("30")
        .arg("--output-dir").arg(&output_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("pruned 0 conversation(s)"));
}

#[test]
fn sessions_delete_on_an_unknown_conversation_removes_nothing() {
    let temp = tempdir().expect("tempdir");
    let output_dir = temp.path().join("out");

    Command::cargo_bin("aipo")
        .unwrap()
        .arg("sessions")
        .arg("delete")
        .arg("00000000-0000-0000-0000-000000000000")
        .arg("--output-dir").arg(&output_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("deleted 0 turn(s)"));
}
