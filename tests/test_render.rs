use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

const BIN_NAME: &str = env!("CARGO_PKG_NAME");

#[test]
fn render_defaults_to_stdout() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin(BIN_NAME)?;

    cmd.current_dir("tests/data")
        .arg("render")
        .arg("harness.yaml")
        .arg("--template")
        .arg("telemetry");

    let samples = predicate::str::starts_with("---")
        .and(predicate::str::contains("kind: Telemetry"))
        .and(predicate::str::contains("randomSamplingPercentage: 10"))
        .and(predicate::str::contains("selector").not());
    cmd.assert().success().stdout(samples);

    Ok(())
}

#[test]
fn render_with_value_files() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin(BIN_NAME)?;

    cmd.current_dir("tests/data")
        .arg("render")
        .arg("harness.yaml")
        .arg("-t")
        .arg("telemetry")
        .arg("-f")
        .arg("values/custom.yaml")
        .arg("-f")
        .arg("values/sampling.json");

    let samples = predicate::str::contains("randomSamplingPercentage: 55.5")
        .and(predicate::str::contains("matchLabels"))
        .and(predicate::str::contains("app: demo"));
    cmd.assert().success().stdout(samples);

    Ok(())
}

#[test]
fn render_to_file() -> anyhow::Result<()> {
    let output = std::env::temp_dir().join(format!(
        "manifest-harness-render-{}/telemetry.yaml",
        std::process::id()
    ));

    let mut cmd = Command::cargo_bin(BIN_NAME)?;
    cmd.current_dir("tests/data")
        .arg("render")
        .arg("harness.yaml")
        .arg("--template")
        .arg("telemetry")
        .arg("--output")
        .arg(&output);
    cmd.assert().success();

    let contents = std::fs::read_to_string(&output)?;
    assert!(contents.contains("kind: Telemetry"));

    // clean up file wrote to disk
    if let Some(parent) = output.parent() {
        std::fs::remove_dir_all(parent)?;
    }

    Ok(())
}

#[test]
fn render_unknown_template() -> anyhow::Result<()> {
    let mut cmd = Command::cargo_bin(BIN_NAME)?;

    cmd.current_dir("tests/data")
        .arg("render")
        .arg("harness.yaml")
        .arg("--template")
        .arg("gateway");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("template `gateway` not found"));

    Ok(())
}
