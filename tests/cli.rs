use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn prints_version() {
    Command::cargo_bin("pentyflix")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn prints_help() {
    Command::cargo_bin("pentyflix")
        .unwrap()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("PentyFlix"))
        .stdout(predicate::str::contains("--base-url"))
        .stdout(predicate::str::contains("--demo"));
}

#[test]
fn rejects_unknown_arguments() {
    Command::cargo_bin("pentyflix")
        .unwrap()
        .arg("--bogus")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown argument"));
}

#[test]
fn config_flag_requires_a_path() {
    Command::cargo_bin("pentyflix")
        .unwrap()
        .arg("--config")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--config needs a path"));
}
