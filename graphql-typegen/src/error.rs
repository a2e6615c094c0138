//! Generation and decode errors.

use displaydoc::Display;
use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::ast::Positioned;
use crate::json_ext::Path;
use crate::parser::ParseError;

/// A single problem found while loading a schema.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum SchemaError {
    /// failed to deserialize the introspection document: {0}
    Deserialize(String),
    /// invalid type reference in the introspection document: {0}
    InvalidTypeRef(String),
    /// duplicate type name '{0}'
    DuplicateType(String),
    /// unknown type '{0}' referenced by '{1}'
    UnknownType(String, String),
    /// '{0}' is declared as a union member of '{1}' but is not an object type
    InvalidUnionMember(String, String),
    /// '{0}' implements '{1}' but '{1}' is not an interface
    NotAnInterface(String, String),
    /// '{0}' implements '{1}' but does not provide field '{2}'
    MissingInterfaceField(String, String, String),
    /// field '{2}' of '{0}' has type '{3}', incompatible with interface '{1}'
    IncompatibleInterfaceField(String, String, String, String),
    /// the schema has no '{0}' root operation type
    MissingRootType(String),
}

/// All problems found while loading a schema, reported together.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaErrors {
    pub errors: Vec<SchemaError>,
}

impl std::fmt::Display for SchemaErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.errors.iter().join("\n"))
    }
}

impl From<SchemaError> for SchemaErrors {
    fn from(error: SchemaError) -> Self {
        SchemaErrors {
            errors: vec![error],
        }
    }
}

/// A single problem found while resolving a selection set against the schema.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum ResolutionError {
    /// cannot query field '{field}' on type '{ty}' at {path}
    InvalidField {
        field: String,
        ty: String,
        path: String,
    },
    /// unknown fragment '{0}'
    UnknownFragment(String),
    /// duplicate fragment name '{0}'
    DuplicateFragment(String),
    /// fragment cycle: {0}
    FragmentCycle(String),
    /// unknown type '{0}' in type condition at {1}
    UnknownTypeCondition(String, String),
    /// type condition '{condition}' can never match type '{ty}' at {path}
    InvalidTypeCondition {
        condition: String,
        ty: String,
        path: String,
    },
    /// response key '{key}' maps to both field '{first}' and field '{second}' at {path}
    ResponseKeyConflict {
        key: String,
        first: String,
        second: String,
        path: String,
    },
    /// conflicting arguments for response key '{key}' at {path}
    ConflictingArguments { key: String, path: String },
    /// field '{field}' of composite type '{ty}' requires a selection set at {path}
    MissingSubselection {
        field: String,
        ty: String,
        path: String,
    },
    /// field '{field}' of leaf type '{ty}' cannot have a selection set at {path}
    UnexpectedSubselection {
        field: String,
        ty: String,
        path: String,
    },
    /// fragment '{0}' has a non-composite type condition '{1}'
    NonCompositeFragment(String, String),
    /// duplicate variable '{0}'
    DuplicateVariable(String),
    /// duplicate operation name '{0}'
    DuplicateOperation(String),
    /// anonymous operation in a document set with more than one operation
    AnonymousOperation,
    /// subscription operations are not supported
    SubscriptionNotSupported,
    /// the schema does not define a '{0}' root operation type
    MissingRootType(String),
}

/// All problems found while resolving one operation or fragment definition.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionErrors {
    /// The operation or fragment name the errors belong to.
    pub name: Option<String>,
    pub errors: Vec<ResolutionError>,
}

impl std::fmt::Display for ResolutionErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "in '{name}': {}", self.errors.iter().join("; ")),
            None => write!(f, "{}", self.errors.iter().join("; ")),
        }
    }
}

/// Errors raised while decoding one response against generated metadata.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum DecodeError {
    /// response is missing key '{key}' at {path}
    MissingKey { key: String, path: Path },
    /// cannot return null for non-nullable field of type '{ty}' at {path}
    NullForNonNull { ty: String, path: Path },
    /// expected a {expected} value at {path}
    ShapeMismatch { expected: String, path: Path },
    /// unknown value '{value}' for enum '{ty}' at {path}
    UnknownEnumValue {
        ty: String,
        value: String,
        path: Path,
    },
    /// response is missing the '__typename' discriminator at {path}
    MissingTypename { path: Path },
}

/// Errors raised while validating request variables against an operation.
#[derive(Error, Debug, Display, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum VariableError {
    /// invalid type for variable: '{0}'
    InvalidVariableType(String),
    /// missing required variable: '{0}'
    MissingVariable(String),
}

/// A non-fatal problem encountered during one generation run.
///
/// A syntax error discards one document and a resolution failure discards one
/// operation or fragment; sibling inputs still produce artifacts.
#[derive(Error, Debug, Display, Clone, PartialEq)]
#[non_exhaustive]
pub enum GenerateError {
    /// syntax error in '{0}': {1}
    Syntax(String, Positioned<ParseError>),
    /// {0}
    Resolution(#[from] ResolutionErrors),
}
