use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn scrutinizer() -> Command {
    Command::cargo_bin("scrutinizer").unwrap()
}

#[test]
fn analyzers_lists_standard_set() {
    scrutinizer()
        .arg("analyzers")
        .assert()
        .success()
        .stdout("loc\nclippy (disabled by default)\ncustom\n");
}

#[test]
fn config_prints_reference() {
    scrutinizer()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("before_commands: []"))
        .stdout(predicate::str::contains("clippy:"))
        .stdout(predicate::str::contains("timeout: 600"));
}

#[test]
fn config_resolves_project_file() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(".scrutinizer.yml"), "clippy:\n  enabled: true\n").unwrap();

    scrutinizer()
        .arg("config")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("enabled: true"))
        .stdout(predicate::str::contains("enabled: false").not());
}

#[test]
fn run_prints_json_report() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("lib.rs"), "pub fn answer() -> u32 {\n    42\n}\n").unwrap();
    std::fs::write(
        dir.path().join(".scrutinizer.yml"),
        "before_commands:\n  - echo preparing\n",
    )
    .unwrap();

    let output = scrutinizer().arg("run").arg(dir.path()).output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["commands"][0]["command"], "echo preparing");
    assert_eq!(report["commands"][0]["status"], "succeeded");
    assert!(report["elements"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e["type"] == "file" && e["name"] == "lib.rs"));
}

#[test]
fn run_writes_output_and_log_file() {
    let dir = tempdir().unwrap();
    let out = tempdir().unwrap();
    let report = out.path().join("report.json");
    let log = out.path().join("run.log");
    std::fs::write(dir.path().join(".scrutinizer.yml"), "after_commands: ['echo finished']\n").unwrap();

    scrutinizer()
        .arg("run")
        .arg(dir.path())
        .arg("--output")
        .arg(&report)
        .arg("--log-file")
        .arg(&log)
        .assert()
        .success();

    assert!(report.exists());
    let log = std::fs::read_to_string(log).unwrap();
    assert!(log.contains("Executing after commands"));
    assert!(log.contains("Running \"echo finished\"..."));
    assert!(log.contains("finished"));
}

#[test]
fn run_fails_on_missing_directory() {
    let dir = tempdir().unwrap();

    scrutinizer()
        .arg("run")
        .arg(dir.path().join("missing"))
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn run_fails_on_unknown_option() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join(".scrutinizer.yml"), "loc:\n  colour: blue\n").unwrap();

    scrutinizer()
        .arg("run")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("colour"));
}
