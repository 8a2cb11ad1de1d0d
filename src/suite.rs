use crate::assertion::{Assertion, AssertionResult, Evaluator};
use crate::loader;
use crate::registry::Renderer;
use crate::template::RenderError;
use crate::value::Value;
use anyhow::Context;
use regex::Regex;
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::thread;

/// Named collection of test cases run against one or more templates
#[derive(Deserialize, Debug, Clone)]
pub struct Suite {
    #[serde(rename = "suite")]
    pub name: String,

    /// Activate/deactivate this suite
    pub enabled: Option<bool>,

    /// Templates every test case renders, in order
    #[serde(default)]
    pub templates: Vec<String>,

    #[serde(default)]
    pub tests: Vec<TestCase>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TestCase {
    #[serde(rename = "it")]
    pub name: String,

    /// Configuration handed to the templates; merged on top of `values`
    #[serde(default, rename = "set")]
    pub config: Value,

    /// Value files merged in order before `set` is applied.
    /// Paths are relative to the suite file and resolved while loading.
    #[serde(default)]
    pub values: Vec<PathBuf>,

    /// Render only this template instead of the suite's templates
    pub template: Option<String>,

    #[serde(default)]
    pub asserts: Vec<Assertion>,
}

/// Outcome of a single test case
#[derive(Debug, Clone, PartialEq)]
pub enum CaseOutcome {
    /// Rendering succeeded and every assertion was evaluated
    Evaluated(Vec<AssertionResult>),

    /// Rendering failed; no assertion was evaluated
    RenderFailed(RenderError),

    /// The worker running this case panicked
    Aborted(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CaseReport {
    pub name: String,
    pub outcome: CaseOutcome,
}

/// Per-case results in the order the suite declares its cases
#[derive(Debug, Clone, PartialEq)]
pub struct SuiteReport {
    pub name: String,
    pub cases: Vec<CaseReport>,
}

#[derive(Debug, Default)]
pub struct RunOpts {
    /// Only run cases whose name matches
    pub filter: Option<Regex>,

    /// Run every case on the calling thread
    pub serial: bool,
}

/// Runs suites through a renderer and an evaluator
pub struct SuiteRunner<'a, R: Renderer, E: Evaluator> {
    renderer: &'a R,
    evaluator: &'a E,
    opts: RunOpts,
}

impl Suite {
    /// Load a suite file and merge the value files of its test cases
    pub fn load<P: AsRef<Path>>(file: P) -> anyhow::Result<Suite> {
        let file = file.as_ref();
        let mut suite: Suite = loader::load(file)?;
        let base_path = file.parent().unwrap_or_else(|| Path::new(""));

        for case in &mut suite.tests {
            case.resolve_values(base_path).with_context(|| {
                format!("failed to load values of test `{}` in {:?}", case.name, file)
            })?;
        }

        Ok(suite)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Templates a case renders: its own override, or the suite's list
    pub fn templates_for<'s>(&'s self, case: &'s TestCase) -> Vec<&'s str> {
        match &case.template {
            Some(t) => vec![t.as_str()],
            None => self.templates.iter().map(String::as_str).collect(),
        }
    }
}

impl TestCase {
    /// Fold the case's value files into its configuration; `set` wins
    fn resolve_values(&mut self, base_path: &Path) -> anyhow::Result<()> {
        if self.values.is_empty() {
            return Ok(());
        }

        let mut merged = Value::Null;
        for file in &mut self.values {
            *file = base_path.join(&file);
            let values: Value = loader::load(&file)?;
            merged.merge(values);
        }
        merged.merge(std::mem::take(&mut self.config));
        self.config = merged;

        Ok(())
    }
}

impl CaseReport {
    pub fn passed(&self) -> bool {
        match &self.outcome {
            CaseOutcome::Evaluated(results) => results.iter().all(|r| r.passed),
            CaseOutcome::RenderFailed(_) | CaseOutcome::Aborted(_) => false,
        }
    }

    pub fn failed_assertions(&self) -> impl Iterator<Item = &AssertionResult> {
        let results: &[AssertionResult] = match &self.outcome {
            CaseOutcome::Evaluated(results) => results,
            _ => &[],
        };
        results.iter().filter(|r| !r.passed)
    }
}

impl SuiteReport {
    /// A suite is green iff every assertion of every case passed
    pub fn is_green(&self) -> bool {
        self.cases.iter().all(CaseReport::passed)
    }

    pub fn failed_cases(&self) -> usize {
        self.cases.iter().filter(|c| !c.passed()).count()
    }
}

impl<'a, R: Renderer, E: Evaluator> SuiteRunner<'a, R, E> {
    pub fn new(renderer: &'a R, evaluator: &'a E, opts: RunOpts) -> Self {
        Self {
            renderer,
            evaluator,
            opts,
        }
    }

    /// Run every selected case of `suite`. Cases share nothing and may run
    /// concurrently; the report always lists them in declared order.
    pub fn run(&self, suite: &Suite) -> SuiteReport {
        let cases: Vec<&TestCase> = suite
            .tests
            .iter()
            .filter(|case| self.is_selected(case))
            .collect();

        log::debug!(
            "running {} of {} case(s) of suite {}",
            cases.len(),
            suite.tests.len(),
            suite.name
        );

        let cases: Vec<CaseReport> = if self.opts.serial || cases.len() < 2 {
            self.run_chunk(suite, &cases)
        } else {
            self.run_parallel(suite, &cases)
        };

        SuiteReport {
            name: suite.name.clone(),
            cases,
        }
    }

    /// Split the cases over at most one worker per available CPU. Each worker
    /// runs its chunk in order, so joining the workers in order keeps the
    /// declared order of the cases.
    fn run_parallel(&self, suite: &Suite, cases: &[&TestCase]) -> Vec<CaseReport> {
        let workers = thread::available_parallelism()
            .map_or(1, NonZeroUsize::get)
            .min(cases.len());
        let chunk_size = (cases.len() + workers - 1) / workers;

        log::trace!(
            "running {} case(s) on {} worker(s)",
            cases.len(),
            workers
        );

        let scoped = crossbeam::thread::scope(|s| {
            let spawned: Vec<_> = cases
                .chunks(chunk_size)
                .map(|chunk| {
                    let handle = s.builder().spawn(move |_| self.run_chunk(suite, chunk));
                    (chunk, handle)
                })
                .collect();

            spawned
                .into_iter()
                .flat_map(|(chunk, handle)| match handle {
                    Ok(handle) => handle
                        .join()
                        .unwrap_or_else(|panic| aborted_all(chunk, &panic_message(panic))),
                    Err(err) => {
                        log::warn!(
                            "could not start worker ({}); running {} case(s) inline",
                            err,
                            chunk.len()
                        );
                        self.run_chunk(suite, chunk)
                    }
                })
                .collect::<Vec<_>>()
        });

        scoped.unwrap_or_else(|panic| aborted_all(cases, &panic_message(panic)))
    }

    /// Run `chunk` in order; a panicking case is reported as aborted and the
    /// rest of the chunk still runs
    fn run_chunk(&self, suite: &Suite, chunk: &[&TestCase]) -> Vec<CaseReport> {
        chunk
            .iter()
            .map(|case| {
                panic::catch_unwind(AssertUnwindSafe(|| self.run_case(suite, case)))
                    .unwrap_or_else(|panic| aborted(case, &panic_message(panic)))
            })
            .collect()
    }

    /// Render fresh documents for the case and evaluate its assertions
    fn run_case(&self, suite: &Suite, case: &TestCase) -> CaseReport {
        log::trace!("running case {:?} of suite {}", case.name, suite.name);

        let outcome = match self.render_case(suite, case) {
            Ok(documents) => {
                CaseOutcome::Evaluated(self.evaluator.evaluate(&documents, &case.asserts))
            }
            Err(err) => CaseOutcome::RenderFailed(err),
        };

        CaseReport {
            name: case.name.clone(),
            outcome,
        }
    }

    fn render_case(&self, suite: &Suite, case: &TestCase) -> Result<Vec<Value>, RenderError> {
        let mut documents = vec![];
        for template in suite.templates_for(case) {
            documents.extend(self.renderer.render(template, &case.config)?);
        }
        Ok(documents)
    }

    fn is_selected(&self, case: &TestCase) -> bool {
        match &self.opts.filter {
            Some(filter) => filter.is_match(&case.name),
            None => true,
        }
    }
}

fn aborted(case: &TestCase, message: &str) -> CaseReport {
    CaseReport {
        name: case.name.clone(),
        outcome: CaseOutcome::Aborted(message.to_string()),
    }
}

fn aborted_all(cases: &[&TestCase], message: &str) -> Vec<CaseReport> {
    cases.iter().map(|case| aborted(case, message)).collect()
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "test case panicked".to_string()
    }
}
