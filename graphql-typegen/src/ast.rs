//! Abstract syntax tree for executable GraphQL documents.
//!
//! Every node that can fail later checks carries the source position it was
//! parsed at.

use indexmap::IndexMap;
use serde::Deserialize;
use serde::Serialize;

/// A source position: 1-indexed line and column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SourcePosition {
    pub line: usize,
    pub column: usize,
}

impl SourcePosition {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }

    /// Position of the first character of a document.
    pub fn start() -> Self {
        Self { line: 1, column: 1 }
    }
}

impl std::fmt::Display for SourcePosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// A value paired with the position it starts at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Positioned<T> {
    pub position: SourcePosition,
    pub item: T,
}

impl<T> Positioned<T> {
    pub fn new(position: SourcePosition, item: T) -> Self {
        Self { position, item }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Positioned<U> {
        Positioned {
            position: self.position,
            item: f(self.item),
        }
    }
}

impl<T: std::fmt::Display> std::fmt::Display for Positioned<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} at {}", self.item, self.position)
    }
}

/// An executable document: operations and fragment definitions, in source
/// order.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub definitions: Vec<Definition>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Operation(OperationDefinition),
    Fragment(FragmentDefinition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OperationKind::Query => write!(f, "query"),
            OperationKind::Mutation => write!(f, "mutation"),
            OperationKind::Subscription => write!(f, "subscription"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationDefinition {
    pub position: SourcePosition,
    pub kind: OperationKind,
    pub name: Option<String>,
    pub variables: Vec<VariableDefinition>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    pub position: SourcePosition,
    pub name: String,
    pub var_type: TypeAnnotation,
    pub default_value: Option<Value>,
}

/// A type written in variable definition position, e.g. `[User!]!`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeAnnotation {
    Named(String),
    List(Box<TypeAnnotation>),
    NonNull(Box<TypeAnnotation>),
}

impl std::fmt::Display for TypeAnnotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TypeAnnotation::Named(name) => write!(f, "{name}"),
            TypeAnnotation::List(inner) => write!(f, "[{inner}]"),
            TypeAnnotation::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentDefinition {
    pub position: SourcePosition,
    pub name: String,
    pub type_condition: Positioned<String>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Directive {
    pub position: SourcePosition,
    pub name: String,
    pub arguments: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectionSet {
    pub position: SourcePosition,
    pub items: Vec<Selection>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Selection {
    Field(Field),
    FragmentSpread(FragmentSpread),
    InlineFragment(InlineFragment),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub position: SourcePosition,
    pub alias: Option<String>,
    pub name: String,
    pub arguments: IndexMap<String, Value>,
    pub directives: Vec<Directive>,
    pub selection_set: Option<SelectionSet>,
}

impl Field {
    /// The key this field appears under in the response: the alias when one
    /// is given, the field name otherwise.
    pub fn response_key(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FragmentSpread {
    pub position: SourcePosition,
    pub name: String,
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InlineFragment {
    pub position: SourcePosition,
    pub type_condition: Option<Positioned<String>>,
    pub directives: Vec<Directive>,
    pub selection_set: SelectionSet,
}

/// A GraphQL input value literal.
///
/// Int and Float stay split the way the grammar splits them, so argument
/// comparison is exact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    String(String),
    Boolean(bool),
    Enum(String),
    Variable(String),
    List(Vec<Value>),
    Object(IndexMap<String, Value>),
}
