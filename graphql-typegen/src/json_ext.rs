//! JSON value plumbing for response trees and argument literals.

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::ByteString;
use serde_json_bytes::Value;

/// A JSON object keyed by response keys.
pub type Object = serde_json_bytes::Map<ByteString, Value>;

/// One step into a response value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PathElement {
    /// An object key.
    Key(String),
    /// An index into an array.
    Index(usize),
}

impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathElement::Key(key) => write!(f, "{key}"),
            PathElement::Index(index) => write!(f, "{index}"),
        }
    }
}

/// A path into a response value, used to locate decode failures.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Path(pub Vec<PathElement>);

impl Path {
    pub fn push(&mut self, element: PathElement) {
        self.0.push(element);
    }

    pub fn pop(&mut self) -> Option<PathElement> {
        self.0.pop()
    }

    pub fn last(&self) -> Option<&PathElement> {
        self.0.last()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "<root>");
        }
        for (i, element) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{element}")?;
        }
        Ok(())
    }
}

pub(crate) trait ValueExt {
    /// Spec: <https://spec.graphql.org/draft/#sec-Int.Input-Coercion>
    fn is_valid_int_input(&self) -> bool;

    /// Spec: <https://spec.graphql.org/draft/#sec-Float.Input-Coercion>
    fn is_valid_float_input(&self) -> bool;
}

impl ValueExt for Value {
    fn is_valid_int_input(&self) -> bool {
        // An Int input is valid if it fits in an i32
        self.as_i64()
            .map(|i| i32::try_from(i).is_ok())
            .or_else(|| self.as_u64().map(|i| i32::try_from(i).is_ok()))
            .unwrap_or(false)
    }

    fn is_valid_float_input(&self) -> bool {
        self.as_f64().is_some() || self.is_valid_int_input()
    }
}
