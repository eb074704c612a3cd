use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn quill() -> Command {
    Command::cargo_bin("quill").expect("binary exists")
}

#[test]
fn run_executes_a_script_file() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("hello.ql");
    fs::write(&script, "name = \"Quill\"\nprint(`Hello from ${name}!`)\n").expect("write script");

    quill()
        .arg("run")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello from Quill!"));
}

#[test]
fn eval_prints_the_last_value() {
    quill()
        .arg("eval")
        .arg("1 + 2")
        .assert()
        .success()
        .stdout(predicate::str::diff("3\n"));
}

#[test]
fn ast_dumps_the_syntax_tree() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("tree.ql");
    fs::write(&script, "total = 4 * 2\n").expect("write script");

    quill()
        .arg("ast")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("Assign"));
}

#[test]
fn failing_script_reports_the_error() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("broken.ql");
    fs::write(&script, "x = 1\nmissing()\n").expect("write script");

    quill()
        .arg("run")
        .arg(&script)
        .assert()
        .failure()
        .stderr(predicate::str::contains("undefined function"));
}

#[test]
fn handled_error_exits_cleanly() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("handled.ql");
    fs::write(
        &script,
        "function onError(err) { print(\"caught\", err.message) }\nmissing()\n",
    )
    .expect("write script");

    quill()
        .arg("run")
        .arg(&script)
        .assert()
        .success()
        .stdout(predicate::str::contains("caught undefined function `missing`"));
}

#[test]
fn config_file_enables_strict_types() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("mixed.ql");
    fs::write(&script, "label = \"n\" + 1\nprint(label)\n").expect("write script");

    quill().arg("run").arg(&script).assert().success().stdout("n1\n");

    let config = dir.path().join("quill.toml");
    fs::write(&config, "strict_types = true\n").expect("write config");
    quill()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .arg(&script)
        .assert()
        .failure();
}

#[test]
fn unknown_config_key_is_rejected() {
    let dir = tempdir().expect("create temp dir");
    let config = dir.path().join("quill.toml");
    fs::write(&config, "stritc_types = true\n").expect("write config");

    quill()
        .arg("--config")
        .arg(&config)
        .arg("eval")
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("stritc_types"));
}
