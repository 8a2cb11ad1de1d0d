use crate::value::Value;
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

/// Single step of a `Path`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Mapping key, written as `name` or `["dotted.name"]`
    Key(String),

    /// List index, written as `[0]`
    Index(usize),
}

/// Accessor into a value tree, e.g. `spec.tracing[0].randomSamplingPercentage`.
///
/// Parsed once into a list of steps, so resolving it is a plain walk over the tree.
/// The empty string addresses the root.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
#[serde(try_from = "String")]
pub struct Path {
    raw: String,
    steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("invalid path `{path}`: unexpected `{found}` at position {position}")]
    UnexpectedChar {
        path: String,
        found: char,
        position: usize,
    },

    #[error("invalid path `{path}`: empty segment at position {position}")]
    EmptySegment { path: String, position: usize },

    #[error("invalid path `{path}`: unterminated `[`")]
    UnterminatedBracket { path: String },

    #[error("invalid path `{path}`: `{index}` is not a valid list index")]
    InvalidIndex { path: String, index: String },
}

/// What the parser saw last; decides which tokens may follow
#[derive(Clone, Copy, PartialEq)]
enum Last {
    Start,
    Dot,
    Key,
    Bracket,
}

impl Path {
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Resolve against `root`. Missing keys, out of range indices and steps
    /// into scalars all resolve to `None`; resolution never fails.
    pub fn resolve<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        resolve_steps(&self.steps, root)
    }

    fn parse(raw: &str) -> Result<Self, PathError> {
        let chars: Vec<char> = raw.chars().collect();
        let mut steps = vec![];
        let mut last = Last::Start;
        let mut i = 0;

        let unexpected = |found: char, position: usize| PathError::UnexpectedChar {
            path: raw.to_string(),
            found,
            position,
        };

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    if last != Last::Key && last != Last::Bracket {
                        return Err(PathError::EmptySegment {
                            path: raw.to_string(),
                            position: i,
                        });
                    }
                    last = Last::Dot;
                    i += 1;
                }
                '[' => {
                    if last == Last::Dot {
                        return Err(unexpected('[', i));
                    }
                    let close = chars[i..]
                        .iter()
                        .position(|c| *c == ']')
                        .map(|offset| i + offset)
                        .ok_or_else(|| PathError::UnterminatedBracket {
                            path: raw.to_string(),
                        })?;
                    let inner: String = chars[i + 1..close].iter().collect();
                    steps.push(Self::parse_bracket(raw, &inner)?);
                    last = Last::Bracket;
                    i = close + 1;
                }
                c @ ']' | c @ '"' => return Err(unexpected(c, i)),
                c => {
                    if last == Last::Key || last == Last::Bracket {
                        return Err(unexpected(c, i));
                    }
                    let start = i;
                    while i < chars.len() && !matches!(chars[i], '.' | '[' | ']' | '"') {
                        i += 1;
                    }
                    steps.push(Step::Key(chars[start..i].iter().collect()));
                    last = Last::Key;
                }
            }
        }

        if last == Last::Dot {
            return Err(PathError::EmptySegment {
                path: raw.to_string(),
                position: chars.len(),
            });
        }

        Ok(Path {
            raw: raw.to_string(),
            steps,
        })
    }

    /// Bracket content is either a quoted key or a list index
    fn parse_bracket(raw: &str, inner: &str) -> Result<Step, PathError> {
        if inner.len() >= 2 && inner.starts_with('"') && inner.ends_with('"') {
            return Ok(Step::Key(inner[1..inner.len() - 1].to_string()));
        }

        inner
            .trim()
            .parse::<usize>()
            .map(Step::Index)
            .map_err(|_| PathError::InvalidIndex {
                path: raw.to_string(),
                index: inner.to_string(),
            })
    }
}

/// Walk `steps` down from `root`
pub fn resolve_steps<'a>(steps: &[Step], root: &'a Value) -> Option<&'a Value> {
    steps.iter().try_fold(root, |current, step| match (step, current) {
        (Step::Key(key), Value::Map(m)) => m.get(key),
        (Step::Index(index), Value::List(l)) => l.get(*index),
        _ => None,
    })
}

impl FromStr for Path {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = PathError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Path::parse(&s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
