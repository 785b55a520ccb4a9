use std::fmt;

use stream_parser::{node_as, NodeRef};

use crate::nodes::{Array, JsonString, Literal, Number, Object};

/// Plain value view of a parsed tree, used to compare parses.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    /// Kept as written.
    Number(String),
    String(String),
    Array(Vec<Value>),
    Object(Vec<(String, Value)>),
}

impl Value {
    /// Builds the value of a completed node. Unfinished containers and
    /// pairs without a value yield `None`.
    pub fn from_node(node: &NodeRef) -> Option<Value> {
        if let Some(string) = node_as::<JsonString>(node) {
            return Some(Value::String(string.value()));
        }
        if let Some(number) = node_as::<Number>(node) {
            return Some(Value::Number(number.text()));
        }
        if let Some(literal) = node_as::<Literal>(node) {
            return match literal.keyword().as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => Some(Value::Null),
            };
        }
        if let Some(array) = node_as::<Array>(node) {
            if !array.is_complete() {
                return None;
            }
            let items = array
                .items()
                .iter()
                .map(Value::from_node)
                .collect::<Option<Vec<_>>>()?;
            return Some(Value::Array(items));
        }
        if let Some(object) = node_as::<Object>(node) {
            if !object.is_complete() {
                return None;
            }
            let mut members = Vec::new();
            for pair in object.pairs() {
                let value = pair.value()?;
                members.push((pair.key(), Value::from_node(&value)?));
            }
            return Some(Value::Object(members));
        }
        None
    }
}

fn write_string(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in text.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '\r' => f.write_str("\\r")?,
            ch => write!(f, "{ch}")?,
        }
    }
    f.write_str("\"")
}

/// Compact JSON rendering.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Bool(value) => write!(f, "{value}"),
            Value::Number(text) => f.write_str(text),
            Value::String(text) => write_string(f, text),
            Value::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Object(members) => {
                f.write_str("{")?;
                for (i, (key, value)) in members.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write_string(f, key)?;
                    write!(f, ":{value}")?;
                }
                f.write_str("}")
            }
        }
    }
}
