use crate::loader;
use crate::registry::{Registry, Renderer};
use crate::suite::Suite;
use anyhow::{anyhow, bail, Context};
use log::info;
use serde::Deserialize;
use std::path::Path;
use std::path::PathBuf;

/// Harness project file: which template files to load and which suites to run
#[derive(Deserialize, Debug)]
pub struct Config {
    /// Schema version to use
    pub version: String,

    /// Activate/deactivate all suites of this project
    pub enabled: Option<bool>,

    /// Template files to load into the registry
    #[serde(default)]
    pub templates: Vec<PathBuf>,

    /// Test suite files to run
    #[serde(default)]
    pub suites: Vec<PathBuf>,

    /// Directory of the project file; all paths are relative to it
    #[serde(skip)]
    base_path: PathBuf,
}

#[derive(Default)]
pub struct ValidationOpts {
    pub skip_disabled: bool,
}

impl Config {
    /// Load given project file and deserialize it.
    /// Does not call Config::validate - only checks the path and runs Serde
    pub fn load<S: AsRef<Path>>(file: S) -> anyhow::Result<Config> {
        let file = file.as_ref();
        let mut cfg: Config = loader::load(file)?;

        cfg.base_path = file
            .parent()
            .ok_or_else(|| {
                anyhow!(
                    "could not determine base path of given configuration file {:?}",
                    file
                )
            })?
            .to_path_buf();

        Ok(cfg)
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    /// Validate the loaded project file, the templates and the suites it references
    pub fn validate(&self, opts: &ValidationOpts) -> anyhow::Result<()> {
        if !self.is_enabled() && opts.skip_disabled {
            info!("Skipped validation of disabled file");
            return Ok(());
        }

        self.check_schema_version()?;
        self.check_at_least_one_suite()?;
        self.check_files_exist_and_readable()?;

        let registry = self.registry()?;
        if registry.is_empty() {
            bail!("No templates configured")
        }
        for template in registry.templates() {
            log::debug!(
                "template {}: {}",
                template.name(),
                template.description().unwrap_or("(no description)")
            );
        }

        let suites = self.suites()?;
        Self::check_suites_reference_known_templates(&registry, &suites)?;

        Ok(())
    }

    /// Template files, relative to the working directory
    pub fn template_files(&self) -> Vec<PathBuf> {
        self.templates.iter().map(|f| self.base_path.join(f)).collect()
    }

    /// Suite files, relative to the working directory
    pub fn suite_files(&self) -> Vec<PathBuf> {
        self.suites.iter().map(|f| self.base_path.join(f)).collect()
    }

    /// Load every referenced template file into a fresh registry
    pub fn registry(&self) -> anyhow::Result<Registry> {
        let mut registry = Registry::new();
        for file in self.template_files() {
            registry.load_file(&file)?;
        }

        log::debug!("loaded {} template(s)", registry.len());
        Ok(registry)
    }

    /// Load every referenced suite file
    pub fn suites(&self) -> anyhow::Result<Vec<Suite>> {
        self.suite_files()
            .iter()
            .map(|file| Suite::load(file).with_context(|| format!("invalid suite {:?}", file)))
            .collect()
    }

    /// Check the given schema version; should be extended once multiple are available
    fn check_schema_version(&self) -> anyhow::Result<()> {
        if self.version != "v1" {
            bail!("invalid schema version used; only 'v1' is supported")
        }

        Ok(())
    }

    fn check_at_least_one_suite(&self) -> anyhow::Result<()> {
        if self.suites.is_empty() {
            bail!("No test suites configured")
        }

        Ok(())
    }

    /// Find all referenced files and check if they exist
    fn check_files_exist_and_readable(&self) -> anyhow::Result<()> {
        for f in self.template_files().iter().chain(self.suite_files().iter()) {
            loader::check_file_exists_and_readable(f)?;
        }

        Ok(())
    }

    /// Every enabled suite needs templates, and all of them must be registered
    fn check_suites_reference_known_templates(
        registry: &Registry,
        suites: &[Suite],
    ) -> anyhow::Result<()> {
        for suite in suites.iter().filter(|s| s.is_enabled()) {
            for case in &suite.tests {
                let templates = suite.templates_for(case);
                if templates.is_empty() {
                    bail!(
                        "test `{}` of suite `{}` does not reference any template",
                        case.name,
                        suite.name
                    );
                }

                if let Some(missing) = templates.iter().find(|t| !registry.contains(t)) {
                    bail!(
                        "test `{}` of suite `{}` references unknown template `{}`",
                        case.name,
                        suite.name,
                        missing
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn get_config() -> Config {
        Config {
            version: "v1".to_string(),
            enabled: Some(true),
            templates: vec![PathBuf::from("templates/telemetry.yaml")],
            suites: vec![PathBuf::from("suites/telemetry_test.yaml")],
            base_path: PathBuf::from("tests/data"),
        }
    }

    #[test]
    #[should_panic]
    fn input_file_does_not_exist() {
        Config::load("does-not-exist.yaml").unwrap();
    }

    #[test]
    fn input_file_exists() {
        let cfg = Config::load("tests/data/harness.yaml").unwrap();
        assert_eq!(cfg.base_path, PathBuf::from("tests/data"));
        assert_eq!(
            cfg.template_files(),
            vec![PathBuf::from("tests/data/templates/telemetry.yaml")]
        );
    }

    #[test]
    fn example_project_is_valid() {
        get_config().validate(&ValidationOpts::default()).unwrap();
    }

    #[test]
    #[should_panic]
    fn schema_version_must_be_v1() {
        let mut cfg = get_config();
        cfg.version = "invalid".to_string();

        cfg.check_schema_version().unwrap();
    }

    #[test]
    fn disabled_files_can_be_skipped_during_validation() {
        let mut cfg = get_config();
        cfg.version = "invalid".to_string();
        cfg.enabled = Some(false);

        cfg.validate(&ValidationOpts {
            skip_disabled: true,
        })
        .unwrap();
    }

    #[test]
    #[should_panic]
    fn fail_if_no_suites_are_configured() {
        let mut cfg = get_config();
        cfg.suites = vec![];

        cfg.validate(&ValidationOpts::default()).unwrap();
    }

    #[test]
    fn fail_if_a_file_is_missing() {
        let mut cfg = get_config();
        cfg.templates.push(PathBuf::from("templates/does-not-exist.yaml"));

        let err = cfg.validate(&ValidationOpts::default()).unwrap_err();
        assert!(err.to_string().contains("does not exist or is not readable"));
    }

    #[test]
    fn fail_if_a_suite_references_an_unknown_template() {
        let mut cfg = get_config();
        cfg.suites = vec![PathBuf::from("suites/unknown_template_test.yaml")];

        let err = cfg.validate(&ValidationOpts::default()).unwrap_err();
        assert!(err.to_string().contains("unknown template `gateway`"));
    }
}
