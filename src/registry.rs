use crate::loader;
use crate::template::{RenderError, Template, TemplateFile};
use crate::value::Value;
use anyhow::{bail, Context};
use indexmap::IndexMap;
use std::path::Path;

/// Anything that can turn a template name and a configuration into documents.
/// The suite runner only talks to this trait, so it can run against any engine.
pub trait Renderer: Sync {
    fn render(&self, template: &str, config: &Value) -> Result<Vec<Value>, RenderError>;

    fn contains(&self, template: &str) -> bool;
}

/// Templates by name, in the order they were registered
#[derive(Debug, Default)]
pub struct Registry {
    templates: IndexMap<String, Template>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template; names must be unique
    pub fn insert(&mut self, template: Template) -> anyhow::Result<()> {
        if self.templates.contains_key(template.name()) {
            bail!("template `{}` is defined more than once", template.name());
        }

        self.templates.insert(template.name().to_string(), template);
        Ok(())
    }

    /// Compile and register every template found in the given file
    pub fn load_file<P: AsRef<Path>>(&mut self, file: P) -> anyhow::Result<()> {
        let file = file.as_ref();
        let contents: TemplateFile = loader::load(file)?;

        for (name, def) in &contents.templates {
            let template = Template::compile(name, def)
                .with_context(|| format!("invalid template `{}` in {:?}", name, file))?;
            log::debug!("registered template {} from {:?}", name, file);
            self.insert(template)?;
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Template> {
        self.templates.get(name)
    }

    pub fn templates(&self) -> impl Iterator<Item = &Template> {
        self.templates.values()
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

impl Renderer for Registry {
    fn render(&self, template: &str, config: &Value) -> Result<Vec<Value>, RenderError> {
        self.get(template)
            .ok_or_else(|| RenderError::TemplateNotFound(template.to_string()))?
            .render(config)
    }

    fn contains(&self, template: &str) -> bool {
        self.templates.contains_key(template)
    }
}
