//! Path-addressable JSON documents
//!
//! Paths are dotted expressions rooted at `$`, e.g. `$.order.lines[0].sku`.
//! Reads never fail: a missing node, a malformed path or a path that walks
//! through a scalar all read as absent. Writes create missing intermediate
//! objects; removes and array reads are strict.

use serde_json::{Map, Value};
use std::fmt;

use crate::error::{Error, Result};

pub const ROOT: &str = "$";

/// One step of a path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Field(String),
    Index(usize),
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Field(name) => write!(f, ".{}", name),
            Segment::Index(idx) => write!(f, "[{}]", idx),
        }
    }
}

/// A parsed path expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<Segment>,
}

impl JsonPath {
    /// Parse `$`, `$.a.b`, `$.a[2].b` or `$['a b'].c`
    pub fn parse(path: &str) -> Result<Self> {
        let invalid = || Error::InvalidPath(path.to_string());

        let rest = path.trim().strip_prefix(ROOT).ok_or_else(invalid)?;
        let mut segments = Vec::new();
        let mut chars = rest.char_indices().peekable();

        while let Some((start, c)) = chars.next() {
            match c {
                '.' => {
                    let mut end = rest.len();
                    while let Some(&(idx, next)) = chars.peek() {
                        if next == '.' || next == '[' {
                            end = idx;
                            break;
                        }
                        chars.next();
                    }
                    let name = &rest[start + 1..end];
                    if name.is_empty() {
                        return Err(invalid());
                    }
                    segments.push(Segment::Field(name.to_string()));
                }
                '[' => {
                    let close = rest[start..].find(']').ok_or_else(invalid)? + start;
                    let inner = rest[start + 1..close].trim();
                    let segment = if let Some(quoted) = inner
                        .strip_prefix('\'')
                        .and_then(|s| s.strip_suffix('\''))
                    {
                        Segment::Field(quoted.to_string())
                    } else {
                        Segment::Index(inner.parse().map_err(|_| invalid())?)
                    };
                    segments.push(segment);
                    while let Some(&(idx, _)) = chars.peek() {
                        if idx > close {
                            break;
                        }
                        chars.next();
                    }
                }
                _ => return Err(invalid()),
            }
        }

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(ROOT)?;
        for segment in &self.segments {
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

fn child<'v>(value: &'v Value, segment: &Segment) -> Option<&'v Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Field(name)) => map.get(name),
        (Value::Array(items), Segment::Index(idx)) => items.get(*idx),
        _ => None,
    }
}

fn child_mut<'v>(value: &'v mut Value, segment: &Segment) -> Option<&'v mut Value> {
    match (value, segment) {
        (Value::Object(map), Segment::Field(name)) => map.get_mut(name),
        (Value::Array(items), Segment::Index(idx)) => items.get_mut(*idx),
        _ => None,
    }
}

fn navigate_mut<'v>(root: &'v mut Value, segments: &[Segment]) -> Option<&'v mut Value> {
    segments
        .iter()
        .try_fold(root, |node, segment| child_mut(node, segment))
}

/// A JSON value that can be read and mutated by path
#[derive(Debug, Clone, PartialEq)]
pub struct JsonDocument {
    root: Value,
}

impl Default for JsonDocument {
    fn default() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }
}

impl From<Value> for JsonDocument {
    fn from(root: Value) -> Self {
        Self { root }
    }
}

impl JsonDocument {
    pub fn parse(json: &str) -> Result<Self> {
        Ok(Self {
            root: serde_json::from_str(json)?,
        })
    }

    pub fn value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    pub fn to_json(&self) -> String {
        self.root.to_string()
    }

    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(&self.root).unwrap_or_else(|_| self.root.to_string())
    }

    /// Value at `path`, or `None` when it cannot be reached.
    pub fn read(&self, path: &str) -> Option<&Value> {
        let path = JsonPath::parse(path).ok()?;
        path.segments()
            .iter()
            .try_fold(&self.root, |node, segment| child(node, segment))
    }

    /// True when `path` holds a non-null value
    pub fn exists(&self, path: &str) -> bool {
        self.read(path).is_some_and(|v| !v.is_null())
    }

    /// Overwrite the value at `path`, creating missing parent objects.
    pub fn set_value(&mut self, path: &str, value: Value) -> Result<()> {
        let parsed = JsonPath::parse(path)?;

        if self.exists(path) || parsed.is_root() {
            if let Some(slot) = navigate_mut(&mut self.root, parsed.segments()) {
                *slot = value;
                return Ok(());
            }
        }

        self.vivify(&parsed, value)
    }

    fn vivify(&mut self, path: &JsonPath, value: Value) -> Result<()> {
        let segments = path.segments();
        let Some((last, parents)) = segments.split_last() else {
            // the root always exists
            self.root = value;
            return Ok(());
        };

        for depth in 0..parents.len() {
            let parent = navigate_mut(&mut self.root, &parents[..depth])
                .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
            match (&parents[depth], parent) {
                (Segment::Field(name), Value::Object(map)) => {
                    let node = map.entry(name.clone()).or_insert(Value::Null);
                    if node.is_null() {
                        *node = Value::Object(Map::new());
                    }
                }
                (Segment::Index(idx), Value::Array(items)) if *idx < items.len() => {
                    if items[*idx].is_null() {
                        items[*idx] = Value::Object(Map::new());
                    }
                }
                (segment, _) => {
                    return Err(Error::InvalidType {
                        path: format!("{}{}", JsonPath { segments: parents[..depth].to_vec() }, segment),
                        expected: "reachable through an object".to_string(),
                    });
                }
            }
        }

        let parent = navigate_mut(&mut self.root, parents)
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;
        match (last, parent) {
            (Segment::Field(name), Value::Object(map)) => {
                map.insert(name.clone(), value);
                Ok(())
            }
            (Segment::Index(idx), Value::Array(items)) if *idx < items.len() => {
                items[*idx] = value;
                Ok(())
            }
            (Segment::Index(_), Value::Array(_)) => Err(Error::InvalidPath(path.to_string())),
            _ => Err(Error::InvalidType {
                path: JsonPath {
                    segments: parents.to_vec(),
                }
                .to_string(),
                expected: "a JSON object".to_string(),
            }),
        }
    }

    /// Delete the node at `path`; fails when it does not exist.
    pub fn remove(&mut self, path: &str) -> Result<Value> {
        if !self.exists(path) {
            return Err(Error::PathNotFound(path.to_string()));
        }

        let parsed = JsonPath::parse(path)?;
        let Some((last, parents)) = parsed.segments().split_last() else {
            return Ok(std::mem::replace(&mut self.root, Value::Null));
        };

        let parent = navigate_mut(&mut self.root, parents)
            .ok_or_else(|| Error::PathNotFound(path.to_string()))?;
        let removed = match (parent, last) {
            (Value::Object(map), Segment::Field(name)) => map.remove(name),
            (Value::Array(items), Segment::Index(idx)) if *idx < items.len() => {
                Some(items.remove(*idx))
            }
            _ => None,
        };

        removed.ok_or_else(|| Error::PathNotFound(path.to_string()))
    }

    /// Append `item` to the array at `path`, or create a one-element array.
    ///
    /// The existing array is copied, extended and written back.
    pub fn append_array_item(&mut self, path: &str, item: Value) -> Result<()> {
        let updated = match self.read(path) {
            Some(Value::Array(items)) => {
                let mut copy = items.clone();
                copy.push(item);
                copy
            }
            Some(Value::Null) | None => vec![item],
            Some(_) => {
                return Err(Error::InvalidType {
                    path: path.to_string(),
                    expected: "a JSON Array".to_string(),
                })
            }
        };

        self.set_value(path, Value::Array(updated))
    }

    /// The array of records at `path`.
    ///
    /// Accepts an absent value, an empty array or an array whose first
    /// element is an object. Scalar arrays and non-arrays are rejected.
    pub fn get_array(&self, path: &str) -> Result<Option<&Vec<Value>>> {
        match self.read(path) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Array(items)) if items.first().map_or(true, Value::is_object) => {
                Ok(Some(items))
            }
            Some(_) => Err(Error::InvalidType {
                path: path.to_string(),
                expected: "a JSON Array".to_string(),
            }),
        }
    }
}

/// String form used when comparing a JSON value with a table cell
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
