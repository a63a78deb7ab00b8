use crate::{FlattenError, Result};
use serde_json::{Number, Value};

/// Separator placed between nested keys and array indices.
pub const PATH_DELIMITER: char = '.';

/// A leaf scalar taken out of a nested document.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatValue {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl FlatValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlatField {
    pub path: String,
    pub value: FlatValue,
}

/// Flatten a serialized JSON document into one field per leaf scalar.
///
/// Object keys are joined with [`PATH_DELIMITER`]; array elements contribute
/// their index as a numeric segment, so `{"a":[{"b":1}]}` yields `a.0.b`.
/// Empty objects and arrays contribute nothing.
pub fn flatten(payload: &str) -> Result<Vec<FlatField>> {
    let root: Value = serde_json::from_str(payload)?;
    match &root {
        Value::Object(_) | Value::Array(_) => {}
        Value::String(_) => return Err(FlattenError::NotAContainer("string")),
        Value::Number(_) => return Err(FlattenError::NotAContainer("number")),
        Value::Bool(_) => return Err(FlattenError::NotAContainer("boolean")),
        Value::Null => return Err(FlattenError::NotAContainer("null")),
    }

    let mut fields = Vec::new();
    let mut prefix = String::new();
    walk(root, &mut prefix, &mut fields);
    Ok(fields)
}

fn walk(value: Value, prefix: &mut String, out: &mut Vec<FlatField>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let restore = push_segment(prefix, &key);
                walk(child, prefix, out);
                prefix.truncate(restore);
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.into_iter().enumerate() {
                let restore = push_segment(prefix, &idx.to_string());
                walk(child, prefix, out);
                prefix.truncate(restore);
            }
        }
        Value::String(s) => out.push(leaf(prefix, FlatValue::String(s))),
        Value::Number(n) => out.push(leaf(prefix, FlatValue::Number(n))),
        Value::Bool(b) => out.push(leaf(prefix, FlatValue::Bool(b))),
        Value::Null => out.push(leaf(prefix, FlatValue::Null)),
    }
}

fn push_segment(prefix: &mut String, segment: &str) -> usize {
    let restore = prefix.len();
    if !prefix.is_empty() {
        prefix.push(PATH_DELIMITER);
    }
    prefix.push_str(segment);
    restore
}

fn leaf(prefix: &str, value: FlatValue) -> FlatField {
    FlatField {
        path: prefix.to_string(),
        value,
    }
}
