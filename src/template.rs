use crate::path::{resolve_steps, Path, PathError, Step};
use crate::value::{Kind, Mapping, Value};
use indexmap::IndexMap;
use serde::Deserialize;
use std::convert::TryFrom;

const VALUE: &str = "$value";
const DEFAULT: &str = "$default";
const REQUIRED: &str = "$required";
const TYPE: &str = "$type";
const IF: &str = "$if";
const THEN: &str = "$then";
const EACH: &str = "$each";
const EMIT: &str = "$emit";

/// Path prefixes addressing the current entry inside an `$each` body
const ENTRY_KEY: &str = "@key";
const ENTRY_VALUE: &str = "@value";

/// Template as written in a template file, before its directives are compiled
#[derive(Deserialize, Debug, Clone)]
pub struct TemplateDef {
    /// Free text shown by `validate`
    pub description: Option<String>,

    /// One node per document this template can emit
    pub documents: Vec<Value>,
}

/// Contents of a template file
#[derive(Deserialize, Debug)]
pub struct TemplateFile {
    pub templates: IndexMap<String, TemplateDef>,
}

#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    #[error("unknown directive `{0}`")]
    UnknownDirective(String),

    #[error("`{directive}` can not be combined with `{key}`")]
    UnexpectedKey { directive: &'static str, key: String },

    #[error("`{directive}` requires `{argument}`")]
    MissingArgument {
        directive: &'static str,
        argument: &'static str,
    },

    #[error("`{argument}` must be {expected}")]
    InvalidArgument {
        argument: &'static str,
        expected: &'static str,
    },

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Failure to render a template for a given configuration
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("template `{0}` not found")]
    TemplateNotFound(String),

    #[error("malformed configuration at `{path}`: {reason}")]
    MalformedConfiguration { path: String, reason: String },
}

/// Compiled template node
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// Scalar copied as-is
    Literal(Value),

    Map(IndexMap<String, Node>),

    List(Vec<Node>),

    /// Value taken from the configuration, see `Lookup`
    Lookup(Lookup),

    /// `then` is rendered only if the raw configuration value at `when` is truthy.
    /// Defaults of other lookups never take part in this check.
    Gate { when: Path, then: Box<Node> },

    /// Iterate the mapping or list at `over`. Without `emit` the entries of a
    /// mapping are copied in order; with `emit` one node is rendered per entry.
    Each { over: Path, emit: Option<Box<Node>> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Lookup {
    pub path: Path,
    pub default: Option<Value>,
    pub required: bool,
    pub expect: Option<Kind>,
}

/// Named, compiled template
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    description: Option<String>,
    documents: Vec<Node>,
}

/// What paths inside a template resolve against
struct Scope<'a> {
    config: &'a Value,
    entry: Option<(Value, &'a Value)>,
}

impl<'a> Scope<'a> {
    fn root(config: &'a Value) -> Self {
        Scope {
            config,
            entry: None,
        }
    }

    fn with_entry(&self, key: Value, value: &'a Value) -> Scope<'a> {
        Scope {
            config: self.config,
            entry: Some((key, value)),
        }
    }

    /// Raw lookup, no defaults applied
    fn lookup(&self, path: &Path) -> Option<&Value> {
        match (path.steps().split_first(), &self.entry) {
            (Some((Step::Key(k), rest)), Some((key, _))) if k == ENTRY_KEY => {
                if rest.is_empty() {
                    Some(key)
                } else {
                    None
                }
            }
            (Some((Step::Key(k), rest)), Some((_, value))) if k == ENTRY_VALUE => {
                resolve_steps(rest, value)
            }
            _ => path.resolve(self.config),
        }
    }
}

impl Template {
    /// Compile the directives of a template definition
    pub fn compile(name: &str, def: &TemplateDef) -> Result<Self, TemplateError> {
        let documents = def
            .documents
            .iter()
            .map(Node::compile)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Template {
            name: name.to_string(),
            description: def.description.clone(),
            documents,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Render every document of this template against `config`.
    /// Documents whose root is an omitted section are left out of the result.
    pub fn render(&self, config: &Value) -> Result<Vec<Value>, RenderError> {
        match config {
            Value::Null | Value::Map(_) => {}
            other => {
                return Err(RenderError::MalformedConfiguration {
                    path: String::new(),
                    reason: format!("expected a map, found {}", other.kind()),
                })
            }
        }

        let scope = Scope::root(config);
        let mut rendered = vec![];
        for document in &self.documents {
            if let Some(doc) = document.render(&scope)? {
                rendered.push(doc);
            }
        }

        log::trace!(
            "template {} rendered {} document(s)",
            self.name,
            rendered.len()
        );

        Ok(rendered)
    }
}

impl Node {
    pub fn compile(source: &Value) -> Result<Node, TemplateError> {
        match source {
            Value::Map(map) if map.keys().any(|k| is_directive(k)) => Self::compile_directive(map),
            Value::Map(map) => {
                let mut nodes = IndexMap::with_capacity(map.len());
                for (key, value) in map {
                    nodes.insert(unescape(key), Node::compile(value)?);
                }
                Ok(Node::Map(nodes))
            }
            Value::List(list) => Ok(Node::List(
                list.iter().map(Node::compile).collect::<Result<_, _>>()?,
            )),
            scalar => Ok(Node::Literal(scalar.clone())),
        }
    }

    fn compile_directive(map: &Mapping) -> Result<Node, TemplateError> {
        if map.contains_key(VALUE) {
            check_keys(map, VALUE, &[DEFAULT, REQUIRED, TYPE])?;

            let required = match map.get(REQUIRED) {
                None => false,
                Some(Value::Bool(b)) => *b,
                Some(_) => {
                    return Err(TemplateError::InvalidArgument {
                        argument: REQUIRED,
                        expected: "a boolean",
                    })
                }
            };

            let expect = match map.get(TYPE) {
                None => None,
                Some(t) => Some(parse_kind(t)?),
            };

            let default = map.get(DEFAULT).cloned();
            if let (Some(default), Some(expect)) = (&default, expect) {
                if default.kind() != expect {
                    return Err(TemplateError::InvalidArgument {
                        argument: DEFAULT,
                        expected: "of the kind named by `$type`",
                    });
                }
            }

            return Ok(Node::Lookup(Lookup {
                path: path_argument(map, VALUE)?,
                default,
                required,
                expect,
            }));
        }

        if map.contains_key(IF) {
            check_keys(map, IF, &[THEN])?;
            let then = map.get(THEN).ok_or(TemplateError::MissingArgument {
                directive: IF,
                argument: THEN,
            })?;

            return Ok(Node::Gate {
                when: path_argument(map, IF)?,
                then: Box::new(Node::compile(then)?),
            });
        }

        if map.contains_key(EACH) {
            check_keys(map, EACH, &[EMIT])?;
            let emit = match map.get(EMIT) {
                Some(body) => Some(Box::new(Node::compile(body)?)),
                None => None,
            };

            return Ok(Node::Each {
                over: path_argument(map, EACH)?,
                emit,
            });
        }

        let unknown = map.keys().find(|k| is_directive(k)).cloned().unwrap_or_default();
        Err(TemplateError::UnknownDirective(unknown))
    }

    /// `Ok(None)` means the node is omitted from its parent
    fn render(&self, scope: &Scope<'_>) -> Result<Option<Value>, RenderError> {
        match self {
            Node::Literal(value) => Ok(Some(value.clone())),
            Node::Map(nodes) => {
                let mut out = Mapping::with_capacity(nodes.len());
                for (key, node) in nodes {
                    if let Some(value) = node.render(scope)? {
                        out.insert(key.clone(), value);
                    }
                }
                Ok(Some(Value::Map(out)))
            }
            Node::List(nodes) => {
                let mut out = Vec::with_capacity(nodes.len());
                for node in nodes {
                    if let Some(value) = node.render(scope)? {
                        out.push(value);
                    }
                }
                Ok(Some(Value::List(out)))
            }
            Node::Lookup(lookup) => lookup.render(scope),
            Node::Gate { when, then } => {
                if scope.lookup(when).map_or(false, Value::is_truthy) {
                    then.render(scope)
                } else {
                    Ok(None)
                }
            }
            Node::Each { over, emit } => Self::render_each(scope, over, emit.as_deref()),
        }
    }

    fn render_each(
        scope: &Scope<'_>,
        over: &Path,
        emit: Option<&Node>,
    ) -> Result<Option<Value>, RenderError> {
        let target = match scope.lookup(over) {
            None | Some(Value::Null) => return Ok(None),
            Some(target) => target,
        };

        match (target, emit) {
            (Value::Map(map), None) => Ok(Some(Value::Map(map.clone()))),
            (Value::Map(map), Some(body)) => {
                let mut out = Vec::with_capacity(map.len());
                for (key, value) in map {
                    let entry = scope.with_entry(Value::from(key.as_str()), value);
                    out.extend(body.render(&entry)?);
                }
                Ok(Some(Value::List(out)))
            }
            (Value::List(list), Some(body)) => {
                let mut out = Vec::with_capacity(list.len());
                for (index, value) in list.iter().enumerate() {
                    let entry = scope.with_entry(Value::Int(index as i64), value);
                    out.extend(body.render(&entry)?);
                }
                Ok(Some(Value::List(out)))
            }
            (other, emit) => Err(RenderError::MalformedConfiguration {
                path: over.to_string(),
                reason: format!(
                    "expected {}, found {}",
                    if emit.is_some() { "a map or list" } else { "a map" },
                    other.kind()
                ),
            }),
        }
    }
}

impl Lookup {
    fn render(&self, scope: &Scope<'_>) -> Result<Option<Value>, RenderError> {
        match scope.lookup(&self.path) {
            Some(value) if !value.is_null() => {
                if let Some(expect) = self.expect {
                    if value.kind() != expect {
                        return Err(RenderError::MalformedConfiguration {
                            path: self.path.to_string(),
                            reason: format!("expected {}, found {}", expect, value.kind()),
                        });
                    }
                }
                Ok(Some(value.clone()))
            }
            _ => match (&self.default, self.required) {
                (Some(default), _) => Ok(Some(default.clone())),
                (None, true) => Err(RenderError::MalformedConfiguration {
                    path: self.path.to_string(),
                    reason: "required value is missing".to_string(),
                }),
                (None, false) => Ok(None),
            },
        }
    }
}

/// Keys starting with a single `$` are directives; `$$` escapes a literal `$`
fn is_directive(key: &str) -> bool {
    key.starts_with('$') && !key.starts_with("$$")
}

fn unescape(key: &str) -> String {
    match key.strip_prefix("$$") {
        Some(rest) => format!("${}", rest),
        None => key.to_string(),
    }
}

fn check_keys(
    map: &Mapping,
    directive: &'static str,
    allowed: &[&'static str],
) -> Result<(), TemplateError> {
    match map
        .keys()
        .find(|k| k.as_str() != directive && !allowed.iter().any(|a| *a == k.as_str()))
    {
        Some(key) => Err(TemplateError::UnexpectedKey {
            directive,
            key: key.clone(),
        }),
        None => Ok(()),
    }
}

fn path_argument(map: &Mapping, directive: &'static str) -> Result<Path, TemplateError> {
    match map.get(directive) {
        Some(Value::String(s)) => Ok(Path::try_from(s.clone())?),
        _ => Err(TemplateError::InvalidArgument {
            argument: directive,
            expected: "a path string",
        }),
    }
}

fn parse_kind(value: &Value) -> Result<Kind, TemplateError> {
    let invalid = TemplateError::InvalidArgument {
        argument: TYPE,
        expected: "one of string, number, bool, map, list",
    };
    match value.as_str() {
        Some("string") => Ok(Kind::String),
        Some("number") => Ok(Kind::Number),
        Some("bool") => Ok(Kind::Bool),
        Some("map") => Ok(Kind::Map),
        Some("list") => Ok(Kind::List),
        _ => Err(invalid),
    }
}
