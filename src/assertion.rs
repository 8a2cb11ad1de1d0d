use crate::path::Path;
use crate::value::Value;
use serde::Deserialize;
use std::fmt;

/// Root key identifying the type of a rendered document
const KIND: &str = "kind";

/// Declarative check against the documents rendered for a test case.
///
/// Path based assertions target the first document unless `documentIndex` is given.
#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub enum Assertion {
    /// Number of rendered documents
    HasDocuments { count: usize },

    /// Value of the root `kind` key
    IsKind {
        of: String,
        #[serde(default, rename = "documentIndex")]
        document_index: Option<usize>,
    },

    Exists {
        path: Path,
        #[serde(default, rename = "documentIndex")]
        document_index: Option<usize>,
    },

    NotExists {
        path: Path,
        #[serde(default, rename = "documentIndex")]
        document_index: Option<usize>,
    },

    /// Numbers compare by value, so `10` equals `10.0`
    Equal {
        path: Path,
        value: Value,
        #[serde(default, rename = "documentIndex")]
        document_index: Option<usize>,
    },

    NotEqual {
        path: Path,
        value: Value,
        #[serde(default, rename = "documentIndex")]
        document_index: Option<usize>,
    },

    /// Passes if the path is absent or explicitly null
    IsNull {
        path: Path,
        #[serde(default, rename = "documentIndex")]
        document_index: Option<usize>,
    },
}

/// Why an assertion did not pass
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Failure {
    #[error("{0}")]
    AssertionMismatch(String),

    #[error("document index {index} is out of range; {count} document(s) rendered")]
    PathResolutionAmbiguous { index: usize, count: usize },
}

/// Verdict for a single assertion
#[derive(Debug, Clone, PartialEq)]
pub struct AssertionResult {
    pub assertion: Assertion,
    pub passed: bool,
    pub expected: Option<Value>,
    pub actual: Option<Value>,
    pub failure: Option<Failure>,
}

/// Anything that can check assertions against rendered documents
pub trait Evaluator: Sync {
    fn evaluate(&self, documents: &[Value], assertions: &[Assertion]) -> Vec<AssertionResult>;
}

/// Evaluates assertions by walking the rendered value trees
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuralEvaluator;

impl Evaluator for StructuralEvaluator {
    fn evaluate(&self, documents: &[Value], assertions: &[Assertion]) -> Vec<AssertionResult> {
        evaluate(documents, assertions)
    }
}

/// Evaluate every assertion independently; one failing assertion never
/// affects the verdict of another. Results keep the order of `assertions`.
pub fn evaluate(documents: &[Value], assertions: &[Assertion]) -> Vec<AssertionResult> {
    assertions.iter().map(|a| a.evaluate(documents)).collect()
}

impl Assertion {
    pub fn evaluate(&self, documents: &[Value]) -> AssertionResult {
        let mut result = AssertionResult {
            assertion: self.clone(),
            passed: false,
            expected: None,
            actual: None,
            failure: None,
        };

        if let Assertion::HasDocuments { count } = self {
            result.expected = Some(Value::Int(*count as i64));
            result.actual = Some(Value::Int(documents.len() as i64));
            return if documents.len() == *count {
                result.pass()
            } else {
                result.mismatch(format!(
                    "expected {} document(s), got {}",
                    count,
                    documents.len()
                ))
            };
        }

        let index = self.document_index().unwrap_or(0);
        let document = match documents.get(index) {
            Some(d) => d,
            None => {
                result.failure = Some(Failure::PathResolutionAmbiguous {
                    index,
                    count: documents.len(),
                });
                return result;
            }
        };

        match self {
            Assertion::HasDocuments { .. } => result,
            Assertion::IsKind { of, .. } => {
                let kind = document.get(KIND);
                result.expected = Some(Value::from(of.as_str()));
                result.actual = kind.cloned();
                match kind {
                    None => result.mismatch(format!("`{}` is not set", KIND)),
                    Some(Value::String(k)) if k == of => result.pass(),
                    Some(k) => result.mismatch(format!("expected kind `{}`, got {}", of, k)),
                }
            }
            Assertion::Exists { path, .. } => {
                let resolved = path.resolve(document);
                result.actual = resolved.cloned();
                match resolved {
                    Some(_) => result.pass(),
                    None => result.mismatch(format!("`{}` does not exist", path)),
                }
            }
            Assertion::NotExists { path, .. } => {
                let resolved = path.resolve(document);
                result.actual = resolved.cloned();
                match resolved {
                    None => result.pass(),
                    Some(_) => result.mismatch(format!("`{}` exists", path)),
                }
            }
            Assertion::Equal { path, value, .. } => {
                let resolved = path.resolve(document);
                result.expected = Some(value.clone());
                result.actual = resolved.cloned();
                match resolved {
                    Some(v) if v == value => result.pass(),
                    Some(_) => result.mismatch(format!("values at `{}` differ", path)),
                    None => result.mismatch(format!("`{}` does not exist", path)),
                }
            }
            Assertion::NotEqual { path, value, .. } => {
                let resolved = path.resolve(document);
                result.expected = Some(value.clone());
                result.actual = resolved.cloned();
                match resolved {
                    Some(v) if v == value => {
                        result.mismatch(format!("value at `{}` must not equal {}", path, value))
                    }
                    _ => result.pass(),
                }
            }
            Assertion::IsNull { path, .. } => {
                let resolved = path.resolve(document);
                result.expected = Some(Value::Null);
                result.actual = resolved.cloned();
                match resolved {
                    None | Some(Value::Null) => result.pass(),
                    Some(_) => result.mismatch(format!("`{}` is not null", path)),
                }
            }
        }
    }

    pub fn document_index(&self) -> Option<usize> {
        match self {
            Assertion::HasDocuments { .. } => None,
            Assertion::IsKind { document_index, .. }
            | Assertion::Exists { document_index, .. }
            | Assertion::NotExists { document_index, .. }
            | Assertion::Equal { document_index, .. }
            | Assertion::NotEqual { document_index, .. }
            | Assertion::IsNull { document_index, .. } => *document_index,
        }
    }
}

impl AssertionResult {
    fn pass(mut self) -> Self {
        self.passed = true;
        self
    }

    fn mismatch(mut self, detail: String) -> Self {
        self.passed = false;
        self.failure = Some(Failure::AssertionMismatch(detail));
        self
    }
}

impl fmt::Display for Assertion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Assertion::HasDocuments { count } => write!(f, "hasDocuments {}", count)?,
            Assertion::IsKind { of, .. } => write!(f, "isKind {}", of)?,
            Assertion::Exists { path, .. } => write!(f, "exists {}", path)?,
            Assertion::NotExists { path, .. } => write!(f, "notExists {}", path)?,
            Assertion::Equal { path, .. } => write!(f, "equal {}", path)?,
            Assertion::NotEqual { path, .. } => write!(f, "notEqual {}", path)?,
            Assertion::IsNull { path, .. } => write!(f, "isNull {}", path)?,
        }

        match self.document_index() {
            Some(index) => write!(f, " (document {})", index),
            None => Ok(()),
        }
    }
}
