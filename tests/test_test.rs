use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const BIN_NAME: &str = env!("CARGO_PKG_NAME");

#[test]
fn example_suites_are_green() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin(BIN_NAME)?;

    cmd.current_dir("tests/data").arg("test").arg("harness.yaml");

    let report = predicate::str::contains(
        "PASS  telemetry / renders the default sampling rate without a selector",
    )
    .and(predicate::str::contains(
        "PASS  telemetry / renders the selector labels",
    ))
    .and(predicate::str::contains(
        "PASS  telemetry-values / merges value files below set",
    ))
    .and(predicate::str::contains(
        "Suites: 2 passed, 0 failed, 2 total",
    ))
    .and(predicate::str::contains("Tests:  5 passed, 0 failed, 5 total"));
    cmd.assert().success().stdout(report);

    Ok(())
}

#[test]
fn failing_suite_reports_every_failure() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin(BIN_NAME)?;

    cmd.current_dir("tests/data")
        .arg("test")
        .arg("--serial")
        .arg("harness_failing.yaml");

    let report = predicate::str::contains("PASS  telemetry-failing / passes")
        .and(predicate::str::contains(
            "FAIL  telemetry-failing / expects a selector that is not rendered",
        ))
        .and(predicate::str::contains(
            "- equal spec.selector.matchLabels.app",
        ))
        .and(predicate::str::contains("expected: \"demo\""))
        .and(predicate::str::contains("actual:   <absent>"))
        .and(predicate::str::contains(
            "ERROR telemetry-failing / passes a malformed selector: malformed configuration at `selector`",
        ))
        .and(predicate::str::contains("Tests:  1 passed, 2 failed, 3 total"));

    cmd.assert()
        .failure()
        .stdout(report)
        .stderr(predicate::str::contains("2 test case(s) failed"));

    Ok(())
}

#[test]
fn filter_selects_test_cases() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin(BIN_NAME)?;

    cmd.current_dir("tests/data")
        .arg("test")
        .arg("--filter")
        .arg("^passes$")
        .arg("harness_failing.yaml");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Tests:  1 passed, 0 failed, 1 total"));

    Ok(())
}

#[test]
fn disabled_project_is_skipped() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin(BIN_NAME)?;

    cmd.current_dir("tests/data")
        .arg("test")
        .arg("harness_disabled.yaml");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Tests:  0 passed, 0 failed, 0 total"));

    Ok(())
}
