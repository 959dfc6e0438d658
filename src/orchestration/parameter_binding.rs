//! # Parameter Binding
//!
//! Path expressions that pull an Activity's request parameters out of the
//! workflow context document.
//!
//! Grammar (no filters, functions or wildcards):
//!
//! ```text
//! path    := ( ident | '[' quoted ']' ) ( '.' ident | '[' index ']' | '[' quoted ']' )*
//! ident   := [A-Za-z0-9_-]+
//! index   := [0-9]+
//! quoted  := '"' ( [^"\\] | '\\' any )* '"' | '\'' ( [^'\\] | '\\' any )* '\''
//! ```
//!
//! Inside a quoted key a backslash takes the next character literally, so
//! every field name can be written. `Display` always produces a path that
//! parses back to the same segments.
//!
//! Example: `input.customer.addresses[0]["postal code"]`.

use crate::constants::context_keys;
use crate::registry::DispatchError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathSegment {
    Field(String),
    Index(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
    #[error("invalid path '{path}' at position {position}: {reason}")]
    InvalidPath {
        path: String,
        position: usize,
        reason: String,
    },

    #[error("'{path}' does not resolve: no value at '{missing}'")]
    Unresolved { path: String, missing: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PathExpression {
    segments: Vec<PathSegment>,
}

impl PathExpression {
    pub fn parse(path: &str) -> Result<Self, BindingError> {
        Parser::new(path).parse()
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// First field name, e.g. `input` or `activities`
    pub fn root(&self) -> Option<&str> {
        match self.segments.first() {
            Some(PathSegment::Field(name)) => Some(name),
            _ => None,
        }
    }

    /// Walk `document`, reporting the first prefix of the path that has no value
    pub fn resolve<'a>(&self, document: &'a Value) -> Result<&'a Value, BindingError> {
        let mut current = document;
        for (depth, segment) in self.segments.iter().enumerate() {
            let next = match segment {
                PathSegment::Field(name) => current.as_object().and_then(|obj| obj.get(name)),
                PathSegment::Index(index) => current.as_array().and_then(|arr| arr.get(*index)),
            };
            current = next.ok_or_else(|| BindingError::Unresolved {
                path: self.to_string(),
                missing: render(&self.segments[..=depth]),
            })?;
        }
        Ok(current)
    }
}

fn render(segments: &[PathSegment]) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            PathSegment::Field(name) if is_ident(name) => {
                if i > 0 {
                    out.push('.');
                }
                out.push_str(name);
            }
            PathSegment::Field(name) => {
                out.push_str("[\"");
                for c in name.chars() {
                    if c == '"' || c == '\\' {
                        out.push('\\');
                    }
                    out.push(c);
                }
                out.push_str("\"]");
            }
            PathSegment::Index(index) => out.push_str(&format!("[{index}]")),
        }
    }
    out
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}

fn is_ident(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_ident_char)
}

impl fmt::Display for PathExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&render(&self.segments))
    }
}

impl FromStr for PathExpression {
    type Err = BindingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PathExpression {
    type Error = BindingError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<PathExpression> for String {
    fn from(path: PathExpression) -> Self {
        path.to_string()
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<char>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.chars().collect(),
            pos: 0,
        }
    }

    fn error(&self, reason: impl Into<String>) -> BindingError {
        BindingError::InvalidPath {
            path: self.source.to_string(),
            position: self.pos,
            reason: reason.into(),
        }
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn parse(mut self) -> Result<PathExpression, BindingError> {
        if self.chars.is_empty() {
            return Err(self.error("path is empty"));
        }

        let root = if self.peek() == Some('[') {
            self.pos += 1;
            match self.bracket()? {
                field @ PathSegment::Field(_) => field,
                PathSegment::Index(_) => {
                    return Err(self.error("path must start with a field name"))
                }
            }
        } else {
            PathSegment::Field(self.ident()?)
        };

        let mut segments = vec![root];
        while let Some(c) = self.peek() {
            match c {
                '.' => {
                    self.pos += 1;
                    segments.push(PathSegment::Field(self.ident()?));
                }
                '[' => {
                    self.pos += 1;
                    segments.push(self.bracket()?);
                }
                other => return Err(self.error(format!("unexpected character '{other}'"))),
            }
        }

        Ok(PathExpression { segments })
    }

    fn ident(&mut self) -> Result<String, BindingError> {
        let start = self.pos;
        while self.peek().is_some_and(is_ident_char) {
            self.pos += 1;
        }
        if start == self.pos {
            return Err(self.error("expected a field name"));
        }
        Ok(self.chars[start..self.pos].iter().collect())
    }

    fn bracket(&mut self) -> Result<PathSegment, BindingError> {
        let segment = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut key = String::new();
                loop {
                    match self.peek() {
                        None => return Err(self.error("unterminated quoted key")),
                        Some(c) if c == quote => break,
                        Some('\\') => {
                            self.pos += 1;
                            let Some(escaped) = self.peek() else {
                                return Err(self.error("unterminated escape in quoted key"));
                            };
                            key.push(escaped);
                        }
                        Some(c) => key.push(c),
                    }
                    self.pos += 1;
                }
                self.pos += 1;
                PathSegment::Field(key)
            }
            Some(c) if c.is_ascii_digit() => {
                let start = self.pos;
                while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                    self.pos += 1;
                }
                let digits: String = self.chars[start..self.pos].iter().collect();
                let index = digits
                    .parse::<usize>()
                    .map_err(|_| self.error("array index out of range"))?;
                PathSegment::Index(index)
            }
            _ => return Err(self.error("expected an index or a quoted key")),
        };

        if self.peek() != Some(']') {
            return Err(self.error("expected ']'"));
        }
        self.pos += 1;
        Ok(segment)
    }
}

/// Build an Activity's request object from its parameter bindings.
///
/// Each binding maps a request parameter name to a path into `context`. An
/// Activity with no bindings receives the whole `input` object.
pub fn bind_parameters(
    bindings: &BTreeMap<String, String>,
    context: &Value,
) -> Result<Value, DispatchError> {
    if bindings.is_empty() {
        return Ok(context
            .get(context_keys::INPUT)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new())));
    }

    let mut request = Map::new();
    for (parameter, path) in bindings {
        let value = PathExpression::parse(path)
            .and_then(|expr| expr.resolve(context).cloned())
            .map_err(|e| DispatchError::Binding {
                parameter: parameter.clone(),
                path: path.clone(),
                reason: e.to_string(),
            })?;
        request.insert(parameter.clone(), value);
    }

    Ok(Value::Object(request))
}
