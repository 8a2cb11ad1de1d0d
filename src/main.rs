#[macro_use]
extern crate log;

use std::path::PathBuf;

use anyhow::{Context, Result};
use env_logger::Builder;
use log::LevelFilter;
use structopt::StructOpt;
use structopt_flags::GetWithDefault;

use validate_cmd::ValidateCmd;

use crate::render_cmd::RenderCmd;
use crate::test_cmd::TestCmd;

mod assertion;
mod config;
mod loader;
mod path;
mod registry;
mod render_cmd;
mod suite;
mod template;
mod test_cmd;
mod validate_cmd;
mod value;

#[derive(StructOpt, Debug)]
#[structopt(
    name = "manifest-harness",
    about = "Unit-test manifest templates by asserting on their rendered documents"
)]
struct Args {
    #[structopt(flatten)]
    verbose: structopt_flags::VerboseNoDef,

    #[structopt(subcommand)]
    cmd: SubCmd,
}

#[derive(StructOpt, Debug)]
enum SubCmd {
    #[structopt(name = "validate", about = "Validate given project file(s)")]
    Validate(ValidateCmdOpts),

    #[structopt(
        name = "render",
        about = "Render a template of given project file with test values"
    )]
    Render(RenderCmdOpts),

    #[structopt(name = "test", about = "Run the test suites of given project file(s)")]
    Test(TestCmdOpts),
}

#[derive(StructOpt, Debug)]
pub struct ValidateCmdOpts {
    /// Project file(s) to validate (supported formats: toml, yaml, json)
    input_files: Vec<PathBuf>,

    #[structopt(short, long, about = "Skip validation if `enabled` is set to false")]
    skip_disabled: bool,
}

#[derive(StructOpt, Debug)]
pub struct RenderCmdOpts {
    /// Project file providing the templates (supported formats: toml, yaml, json)
    input_file: PathBuf,

    /// Name of the template to render
    #[structopt(short, long)]
    template: String,

    /// Value file(s) to render with; merged in order of appearance
    #[structopt(short = "f", long = "values", number_of_values = 1)]
    values: Vec<PathBuf>,

    /// Write the documents to this file instead of stdout
    #[structopt(short, long)]
    output: Option<PathBuf>,
}

#[derive(StructOpt, Debug)]
pub struct TestCmdOpts {
    /// Project file(s) to run the suites of (supported formats: toml, yaml, json)
    input_files: Vec<PathBuf>,

    /// Only run test cases whose name matches this regular expression
    #[structopt(long)]
    filter: Option<String>,

    /// Run test cases one after another instead of in parallel
    #[structopt(long)]
    serial: bool,
}

fn main() -> Result<()> {
    let args = Args::from_args();

    let log_level = args.verbose.get_with_default(LevelFilter::Info);
    Builder::from_default_env().filter_level(log_level).init();

    match args.cmd {
        SubCmd::Validate(opts) => ValidateCmd::new(opts)
            .run()
            .context("Configuration failed validation")?,
        SubCmd::Render(opts) => RenderCmd::new(opts).run().context("Rendering failed")?,
        SubCmd::Test(opts) => TestCmd::new(opts).run().context("Testing failed")?,
    };

    Ok(())
}
