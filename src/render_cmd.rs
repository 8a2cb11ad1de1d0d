use crate::config::Config;
use crate::loader;
use crate::registry::Renderer;
use crate::value::Value;
use crate::RenderCmdOpts;
use anyhow::Context;
use log::{debug, info};
use std::io::Write;

pub struct RenderCmd {
    opts: RenderCmdOpts,
}

impl RenderCmd {
    /// Create sub command struct to render a template of the given project file
    pub fn new(opts: RenderCmdOpts) -> Self {
        Self { opts }
    }

    /// Main entry point to run the rendering process
    /// will return nothing on the happy path and descriptive errors on failure
    pub fn run(&self) -> anyhow::Result<()> {
        debug!("render options: {:?}", self.opts);

        let cfg = Config::load(&self.opts.input_file)?;
        let registry = cfg.registry()?;
        let values = self.values()?;

        info!("rendering template {}", self.opts.template);
        let documents = registry.render(&self.opts.template, &values)?;
        debug!("rendered {} document(s)", documents.len());

        match &self.opts.output {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if parent.components().next().is_some() {
                        std::fs::create_dir_all(parent)?;
                    }
                }

                let output_file =
                    std::fs::File::create(path).context("can not create output file")?;
                write_documents(&documents, std::io::BufWriter::new(output_file))
            }
            None => write_documents(&documents, std::io::stdout().lock()),
        }
    }

    /// Merge all value files given on the command line, in order
    fn values(&self) -> anyhow::Result<Value> {
        let mut merged = Value::Null;

        for file in &self.opts.values {
            debug!("merging values from {:?}", file);
            let values: Value = loader::load(file)?;
            merged.merge(values);
        }

        Ok(merged)
    }
}

/// Write documents as a multi-document YAML stream
fn write_documents(documents: &[Value], mut output: impl Write) -> anyhow::Result<()> {
    for doc in documents {
        let yaml = serde_yaml::to_string(doc)?;
        output
            .write_all(yaml.as_bytes())
            .context("can not write to output")?;
        if !yaml.ends_with('\n') {
            output.write_all(b"\n").context("can not write to output")?;
        }
    }

    output.flush().context("can not write to output")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::yaml;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    fn get_cmd() -> RenderCmd {
        RenderCmd {
            opts: RenderCmdOpts {
                input_file: PathBuf::from("tests/data/harness.yaml"),
                template: "telemetry".to_string(),
                values: vec![],
                output: None,
            },
        }
    }

    fn written(documents: &[Value]) -> String {
        let mut buffer = vec![];
        write_documents(documents, &mut buffer).unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn no_values_means_null_config() {
        assert_eq!(get_cmd().values().unwrap(), Value::Null);
    }

    #[test]
    fn value_files_are_merged_in_order() {
        let mut cmd = get_cmd();
        cmd.opts.values = vec![
            PathBuf::from("tests/data/values/custom.yaml"),
            PathBuf::from("tests/data/values/sampling.json"),
        ];

        assert_eq!(
            cmd.values().unwrap(),
            yaml("{samplingPercentage: 55.5, selector: {app: demo}}")
        );
    }

    #[test]
    fn every_document_starts_a_new_yaml_document() {
        let out = written(&[yaml("{kind: A}"), yaml("{kind: B}")]);

        assert_eq!(out.matches("---").count(), 2);
        let docs: Vec<&str> = out.split("---").filter(|d| !d.trim().is_empty()).collect();
        assert_eq!(docs.len(), 2);
        assert!(docs[0].contains("kind: A"));
        assert!(docs[1].contains("kind: B"));
    }

    #[test]
    fn no_documents_write_nothing() {
        assert_eq!(written(&[]), "");
    }
}
