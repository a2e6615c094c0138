//! Typed code generation for GraphQL operations.
//!
//! The pipeline runs entirely offline: load a schema from a typed
//! introspection response, parse executable documents, resolve every
//! operation into a typed selection tree, and emit Rust modules with the
//! normalized query text and embedded decode metadata. At runtime the
//! embedded metadata drives [`decode_response`], which checks a response
//! strictly against what the operation selected.
//!
//! Failures are scoped: a schema that does not load aborts the run, a syntax
//! error discards one document, a resolution failure discards one operation,
//! and sibling inputs still produce artifacts.

#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::panic))]

pub mod ast;
pub mod decode;
pub mod emit;
pub mod error;
pub mod field_type;
pub mod introspection;
pub mod json_ext;
pub mod lexer;
pub mod parser;
pub mod resolver;
pub mod schema;
#[cfg(test)]
pub(crate) mod testing;

pub use decode::decode_response;
pub use decode::decode_selection_set;
pub use error::DecodeError;
pub use error::GenerateError;
pub use error::SchemaErrors;
pub use resolver::ResolvedOperation;
pub use schema::Schema;

use indexmap::IndexSet;

use crate::ast::Definition;
use crate::error::ResolutionError;
use crate::error::ResolutionErrors;
use crate::resolver::FragmentMap;

/// The meta field servers answer with the concrete type name.
pub const TYPENAME: &str = "__typename";

/// The output of one generation run.
#[derive(Debug, Clone, Default)]
pub struct Generated {
    pub artifacts: Vec<Artifact>,
    /// Problems that discarded a document or an operation.
    pub errors: Vec<GenerateError>,
}

/// The generated code for one input document.
#[derive(Debug, Clone)]
pub struct Artifact {
    /// The name of the document the artifact came from.
    pub document: String,
    pub operations: Vec<ResolvedOperation>,
    /// Rust source: one module per operation.
    pub code: String,
}

/// Run the whole pipeline over a batch of named documents.
///
/// Fragments are shared across the batch, so a document may spread fragments
/// a sibling document defines. Operation names must be unique across the
/// batch; an anonymous operation is only allowed when it is the only
/// operation of its document.
#[tracing::instrument(skip_all, level = "trace")]
pub fn generate<'a>(
    schema: &Schema,
    documents: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> Generated {
    let mut generated = Generated::default();

    let mut parsed = Vec::new();
    for (name, source) in documents {
        match parser::parse_document(source) {
            Ok(document) => parsed.push((name, document)),
            Err(error) => {
                tracing::debug!(document = name, %error, "discarding document");
                generated
                    .errors
                    .push(GenerateError::Syntax(name.to_string(), error));
            }
        }
    }

    let (fragments, duplicates) = FragmentMap::new(parsed.iter().map(|(_, document)| document));
    if !duplicates.is_empty() {
        generated.errors.push(
            ResolutionErrors {
                name: None,
                errors: duplicates,
            }
            .into(),
        );
    }
    for fragment in fragments.iter() {
        if let Err(errors) = resolver::resolve_fragment(schema, fragment, &fragments) {
            generated.errors.push(errors.into());
        }
    }

    let mut seen_names: IndexSet<String> = IndexSet::new();
    for (name, document) in &parsed {
        let operations: Vec<_> = document
            .definitions
            .iter()
            .filter_map(|definition| match definition {
                Definition::Operation(operation) => Some(operation),
                Definition::Fragment(_) => None,
            })
            .collect();

        let mut resolved = Vec::new();
        for operation in &operations {
            if operation.name.is_none() && operations.len() > 1 {
                generated.errors.push(
                    ResolutionErrors {
                        name: None,
                        errors: vec![ResolutionError::AnonymousOperation],
                    }
                    .into(),
                );
                continue;
            }
            if let Some(op_name) = &operation.name {
                if !seen_names.insert(op_name.clone()) {
                    generated.errors.push(
                        ResolutionErrors {
                            name: Some(op_name.clone()),
                            errors: vec![ResolutionError::DuplicateOperation(op_name.clone())],
                        }
                        .into(),
                    );
                    continue;
                }
            }
            match resolver::resolve_operation(schema, operation, &fragments) {
                Ok(operation) => resolved.push(operation),
                Err(errors) => {
                    tracing::debug!(document = *name, %errors, "discarding operation");
                    generated.errors.push(errors.into());
                }
            }
        }

        if !resolved.is_empty() {
            let code = emit::emit_operations(schema, &resolved);
            tracing::debug!(
                document = *name,
                operations = resolved.len(),
                "emitted artifact"
            );
            generated.artifacts.push(Artifact {
                document: name.to_string(),
                operations: resolved,
                code,
            });
        }
    }

    generated
}
