use crate::assertion::{AssertionResult, StructuralEvaluator};
use crate::config::{Config, ValidationOpts};
use crate::suite::{CaseOutcome, RunOpts, SuiteReport, SuiteRunner};
use crate::TestCmdOpts;
use anyhow::{bail, Context};
use log::{debug, info};
use regex::Regex;
use std::io::Write;

/// The test sub command runs every suite of the given project files and reports
/// per-case results. Fails if any suite is not green.
pub struct TestCmd {
    opts: TestCmdOpts,
}

impl TestCmd {
    pub fn new(opts: TestCmdOpts) -> Self {
        Self { opts }
    }

    /// Main entry point to run the suites
    /// will return nothing if every suite is green and an error otherwise
    pub fn run(&self) -> anyhow::Result<()> {
        debug!("test options: {:?}", self.opts);

        let mut reports = vec![];

        for file in &self.opts.input_files {
            info!("processing {:?}", file);

            let cfg = Config::load(file)?;
            if !cfg.is_enabled() {
                info!("config is disabled (skipped)");
                continue;
            }

            cfg.validate(&ValidationOpts {
                skip_disabled: true,
            })?;

            let registry = cfg.registry()?;
            let evaluator = StructuralEvaluator;
            let runner = SuiteRunner::new(&registry, &evaluator, self.run_opts()?);

            for suite in cfg.suites()? {
                if !suite.is_enabled() {
                    info!(" - (skip) {}", suite.name);
                    continue;
                }

                info!(" - {}", suite.name);
                reports.push(runner.run(&suite));
            }
        }

        write_report(&reports, std::io::stdout().lock())?;

        let failed: usize = reports.iter().map(SuiteReport::failed_cases).sum();
        if failed > 0 {
            bail!("{} test case(s) failed", failed);
        }

        Ok(())
    }

    fn run_opts(&self) -> anyhow::Result<RunOpts> {
        let filter = match &self.opts.filter {
            Some(f) => Some(Regex::new(f).with_context(|| format!("invalid filter {:?}", f))?),
            None => None,
        };

        Ok(RunOpts {
            filter,
            serial: self.opts.serial,
        })
    }
}

/// Human readable report: one line per case, details for every failure
fn write_report(reports: &[SuiteReport], mut out: impl Write) -> anyhow::Result<()> {
    let mut passed_cases = 0;
    let mut total_cases = 0;

    for report in reports {
        for case in &report.cases {
            total_cases += 1;
            if case.passed() {
                passed_cases += 1;
                writeln!(out, "PASS  {} / {}", report.name, case.name)?;
                continue;
            }

            match &case.outcome {
                CaseOutcome::Evaluated(_) => {
                    writeln!(out, "FAIL  {} / {}", report.name, case.name)?;
                    for result in case.failed_assertions() {
                        write_failure(result, &mut out)?;
                    }
                }
                CaseOutcome::RenderFailed(err) => {
                    writeln!(out, "ERROR {} / {}: {}", report.name, case.name, err)?;
                }
                CaseOutcome::Aborted(msg) => {
                    writeln!(out, "ERROR {} / {}: aborted: {}", report.name, case.name, msg)?;
                }
            }
        }
    }

    let green = reports.iter().filter(|r| r.is_green()).count();
    writeln!(out)?;
    writeln!(
        out,
        "Suites: {} passed, {} failed, {} total",
        green,
        reports.len() - green,
        reports.len()
    )?;
    writeln!(
        out,
        "Tests:  {} passed, {} failed, {} total",
        passed_cases,
        total_cases - passed_cases,
        total_cases
    )?;

    Ok(())
}

fn write_failure(result: &AssertionResult, out: &mut impl Write) -> std::io::Result<()> {
    writeln!(out, "        - {}", result.assertion)?;
    if let Some(failure) = &result.failure {
        writeln!(out, "            {}", failure)?;
    }
    if let Some(expected) = &result.expected {
        writeln!(out, "            expected: {}", expected)?;
    }
    match &result.actual {
        Some(actual) => writeln!(out, "            actual:   {}", actual),
        None => writeln!(out, "            actual:   <absent>"),
    }
}
