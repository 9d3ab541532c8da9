//! Field paths into event data
//!
//! A [`FieldPath`] addresses a value inside a JSON document using dotted and
//! bracketed notation:
//!
//! - `user` - top-level key
//! - `request.headers.host` - nested keys
//! - `items[0].price` - array index
//! - `labels["app.kubernetes.io/name"]` - quoted key containing separators
//!
//! Reads never fail: a path that does not resolve yields `None`. Writes never
//! fail either: missing intermediate objects and arrays are created and
//! scalars standing in the way are replaced.

use crate::errors::{FieldPathError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// One step of a field path
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Segment {
    /// Object key
    Key(String),
    /// Array index
    Index(usize),
}

/// Parsed dotted/bracketed path
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parse a path such as `a.b[0]["c d"]`
    pub fn parse(path: &str) -> Result<Self> {
        if path.trim().is_empty() {
            return Err(FieldPathError::Empty);
        }

        let chars: Vec<char> = path.chars().collect();
        let mut segments = Vec::new();
        let mut need_key = true;
        let mut i = 0;

        while i < chars.len() {
            match chars[i] {
                '.' => {
                    if need_key {
                        return Err(FieldPathError::EmptySegment {
                            path: path.to_string(),
                            offset: i,
                        });
                    }
                    need_key = true;
                    i += 1;
                }
                '[' => {
                    if need_key && !segments.is_empty() {
                        return Err(FieldPathError::EmptySegment {
                            path: path.to_string(),
                            offset: i,
                        });
                    }
                    let (segment, next) = parse_bracket(path, &chars, i)?;
                    segments.push(segment);
                    need_key = false;
                    i = next;
                    if i < chars.len() && chars[i] != '.' && chars[i] != '[' {
                        return Err(FieldPathError::UnexpectedCharacter {
                            path: path.to_string(),
                            found: chars[i],
                            offset: i,
                        });
                    }
                }
                ']' => {
                    return Err(FieldPathError::UnexpectedCharacter {
                        path: path.to_string(),
                        found: ']',
                        offset: i,
                    });
                }
                _ => {
                    let start = i;
                    while i < chars.len() && !matches!(chars[i], '.' | '[' | ']') {
                        i += 1;
                    }
                    segments.push(Segment::Key(chars[start..i].iter().collect()));
                    need_key = false;
                }
            }
        }

        if need_key {
            return Err(FieldPathError::EmptySegment {
                path: path.to_string(),
                offset: chars.len(),
            });
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    /// Single-key path that is never split, whatever characters it contains
    ///
    /// Generated destination names such as `sum(order.total)` go through here.
    pub fn literal(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            segments: vec![Segment::Key(name.clone())],
            raw: name,
        }
    }

    /// The path as written
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Resolve the path against a document
    pub fn read<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        self.segments
            .iter()
            .try_fold(root, |current, segment| match segment {
                Segment::Key(key) => current.as_object()?.get(key),
                Segment::Index(index) => current.as_array()?.get(*index),
            })
    }

    /// Store `value` at the path, creating containers on the way
    pub fn write(&self, root: &mut Value, value: Value) {
        let mut current = root;
        for segment in &self.segments {
            current = match segment {
                Segment::Key(key) => {
                    if !current.is_object() {
                        *current = Value::Object(Map::new());
                    }
                    let Value::Object(map) = current else {
                        return;
                    };
                    map.entry(key.clone()).or_insert(Value::Null)
                }
                Segment::Index(index) => {
                    if !current.is_array() {
                        *current = Value::Array(Vec::new());
                    }
                    let Value::Array(items) = current else {
                        return;
                    };
                    if items.len() <= *index {
                        items.resize(*index + 1, Value::Null);
                    }
                    &mut items[*index]
                }
            };
        }
        *current = value;
    }
}

/// Parse a `[...]` group starting at `open`; returns the segment and the
/// offset just past the closing bracket.
fn parse_bracket(path: &str, chars: &[char], open: usize) -> Result<(Segment, usize)> {
    let unterminated = || FieldPathError::UnterminatedBracket {
        path: path.to_string(),
    };

    let start = open + 1;
    match chars.get(start) {
        Some(&quote) if quote == '"' || quote == '\'' => {
            let end_quote = chars[start + 1..]
                .iter()
                .position(|&c| c == quote)
                .map(|p| start + 1 + p)
                .ok_or_else(unterminated)?;
            if chars.get(end_quote + 1) != Some(&']') {
                return Err(unterminated());
            }
            let key: String = chars[start + 1..end_quote].iter().collect();
            Ok((Segment::Key(key), end_quote + 2))
        }
        Some(_) => {
            let close = chars[start..]
                .iter()
                .position(|&c| c == ']')
                .map(|p| start + p)
                .ok_or_else(unterminated)?;
            let inner: String = chars[start..close].iter().collect();
            let index = inner
                .trim()
                .parse::<usize>()
                .map_err(|_| FieldPathError::InvalidIndex {
                    path: path.to_string(),
                    index: inner.clone(),
                })?;
            Ok((Segment::Index(index), close + 1))
        }
        None => Err(unterminated()),
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for FieldPath {
    type Err = FieldPathError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for FieldPath {
    type Error = FieldPathError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<FieldPath> for String {
    fn from(path: FieldPath) -> Self {
        path.raw
    }
}
