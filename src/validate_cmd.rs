use crate::config::{Config, ValidationOpts};
use crate::ValidateCmdOpts;
use anyhow::Result;

/// The validate sub command checks project files, their templates and their suites
/// without running any test.
pub struct ValidateCmd {
    opts: ValidateCmdOpts,
}

impl ValidateCmd {
    /// Create sub command struct to run validation of the given input files
    pub fn new(opts: ValidateCmdOpts) -> Self {
        Self { opts }
    }

    /// Main entry point to run the validator
    /// will return nothing on the happy path and descriptive errors on failure
    pub fn run(&self) -> Result<()> {
        debug!("validation options: {:?}", self.opts);

        let opts = ValidationOpts {
            skip_disabled: self.opts.skip_disabled,
        };

        for file in &self.opts.input_files {
            info!("validating {:?}", file);
            Config::load(file)?.validate(&opts)?;
        }

        Ok(())
    }
}
