//! Mechanical emission of Rust modules from resolved operations.
//!
//! Each operation becomes one module holding the normalized query text, the
//! embedded decode metadata, a `Variables` struct, and one type per selection
//! scope. Polymorphic scopes become an enum tagged on `__typename`, with one
//! variant per concrete type the scope can resolve to.

use std::fmt::Write;

use heck::ToSnakeCase;
use heck::ToUpperCamelCase;
use indexmap::IndexMap;
use indexmap::IndexSet;
use itertools::Itertools;

use crate::ast;
use crate::field_type::FieldType;
use crate::resolver::ResolvedField;
use crate::resolver::ResolvedOperation;
use crate::resolver::ResolvedSelectionSet;
use crate::resolver::Shape;
use crate::schema::Schema;
use crate::TYPENAME;

const DERIVES: &str =
    "#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]";

/// Emit one module per operation.
pub fn emit_operations(schema: &Schema, operations: &[ResolvedOperation]) -> String {
    let mut out = String::new();
    out.push_str("// Generated file, do not edit by hand.\n");
    for operation in operations {
        out.push('\n');
        out.push_str(&emit_operation(schema, operation));
    }
    out
}

/// Emit the module for a single operation.
pub fn emit_operation(schema: &Schema, operation: &ResolvedOperation) -> String {
    let mut emitter = Emitter::new(schema);
    emitter.operation(operation);
    emitter.out
}

struct Emitter<'a> {
    schema: &'a Schema,
    out: String,
    /// GraphQL enum and input object types already emitted in this module.
    emitted: IndexSet<String>,
    /// Referenced leaf types waiting to be emitted.
    queue: Vec<String>,
}

impl<'a> Emitter<'a> {
    fn new(schema: &'a Schema) -> Self {
        Emitter {
            schema,
            out: String::new(),
            emitted: IndexSet::new(),
            queue: Vec::new(),
        }
    }

    fn flush_leaf_types(&mut self) {
        while !self.queue.is_empty() {
            let name = self.queue.remove(0);
            if self.emitted.insert(name.clone()) {
                self.leaf_type(&name);
            }
        }
    }

    fn line(&mut self, indent: usize, text: &str) {
        for _ in 0..indent {
            self.out.push_str("    ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn operation(&mut self, operation: &ResolvedOperation) {
        let display_name = operation.name.as_deref().unwrap_or("Unnamed");
        let module = display_name.to_snake_case();
        let query = print_operation(operation);

        self.line(
            0,
            &format!("/// Generated from the `{display_name}` operation."),
        );
        self.line(0, &format!("pub mod {module} {{"));
        self.line(
            1,
            &format!("pub const OPERATION_NAME: &str = {display_name:?};"),
        );
        self.line(1, &format!("pub const QUERY: &str = {query:?};"));
        // the metadata is embedded as JSON and parsed on first use
        #[allow(clippy::expect_used)]
        let metadata =
            serde_json::to_string(operation).expect("resolved operations serialize to JSON");
        self.line(1, &format!("const METADATA: &str = {metadata:?};"));
        self.line(
            1,
            "pub fn metadata() -> graphql_typegen::ResolvedOperation {",
        );
        self.line(
            2,
            "serde_json::from_str(METADATA).expect(\"embedded metadata is valid\")",
        );
        self.line(1, "}");
        self.line(
            1,
            "pub fn decode(data: &serde_json_bytes::Value) -> Result<serde_json_bytes::Value, graphql_typegen::DecodeError> {",
        );
        self.line(2, "graphql_typegen::decode_response(&metadata(), data)");
        self.line(1, "}");

        self.variables(operation);
        self.selection_types("ResponseData", &operation.selection_set);
        self.line(0, "}");
    }

    fn variables(&mut self, operation: &ResolvedOperation) {
        self.out.push('\n');
        self.line(1, DERIVES);
        self.line(1, "pub struct Variables {");
        for (name, variable) in &operation.variables {
            let optional = !variable.var_type.is_non_null() || variable.default_value.is_some();
            self.field_decl(2, name, &variable.var_type, optional);
        }
        self.line(1, "}");
        self.flush_leaf_types();
    }

    /// One struct (or enum, for polymorphic scopes) per selection scope,
    /// depth first.
    fn selection_types(&mut self, name: &str, set: &ResolvedSelectionSet) {
        match &set.shape {
            Shape::Fields { fields } => {
                self.fields_struct(name, fields.values());
                self.nested_types(name, fields.values());
            }
            Shape::Polymorphic { common, branches } => {
                self.out.push('\n');
                self.line(1, DERIVES);
                self.line(1, "#[serde(tag = \"__typename\")]");
                self.line(1, &format!("pub enum {name} {{"));
                let variants: Vec<String> = self
                    .schema
                    .possible_types(&set.on_type)
                    .iter()
                    .map(|concrete| concrete.to_string())
                    .collect();
                for concrete in &variants {
                    self.line(
                        2,
                        &format!("{concrete}({name}On{concrete}),"),
                    );
                }
                self.line(1, "}");
                for concrete in &variants {
                    let empty = IndexMap::new();
                    let branch = branches.get(concrete).unwrap_or(&empty);
                    // a branch entry replaces the common entry of the same key
                    let merged: Vec<&ResolvedField> = common
                        .values()
                        .map(|field| branch.get(&field.response_key).unwrap_or(field))
                        .chain(
                            branch
                                .values()
                                .filter(|field| !common.contains_key(&field.response_key)),
                        )
                        .filter(|field| field.response_key != TYPENAME)
                        .collect();
                    self.fields_struct(&format!("{name}On{concrete}"), merged.iter().copied());
                    self.nested_types(&format!("{name}On{concrete}"), merged.into_iter());
                }
            }
        }
    }

    fn fields_struct<'f>(&mut self, name: &str, fields: impl Iterator<Item = &'f ResolvedField>) {
        self.out.push('\n');
        self.line(1, DERIVES);
        self.line(1, &format!("pub struct {name} {{"));
        for field in fields {
            let optional = !field.field_type.is_non_null() || field.conditional;
            if field.selection_set.is_some() {
                let child = format!("{name}{}", field.response_key.to_upper_camel_case());
                self.named_field_decl(2, &field.response_key, &field.field_type, &child, optional);
            } else {
                self.field_decl(2, &field.response_key, &field.field_type, optional);
            }
        }
        self.line(1, "}");
        self.flush_leaf_types();
    }

    fn nested_types<'f>(
        &mut self,
        name: &str,
        fields: impl Iterator<Item = &'f ResolvedField>,
    ) {
        for field in fields {
            if let Some(set) = &field.selection_set {
                let child = format!("{name}{}", field.response_key.to_upper_camel_case());
                self.selection_types(&child, set);
            }
        }
    }

    fn field_decl(&mut self, indent: usize, key: &str, ty: &FieldType, optional: bool) {
        let inner = ty
            .inner_type_name()
            .map(|name| self.leaf_rust_name(name))
            .unwrap_or_default();
        self.named_field_decl(indent, key, ty, &inner, optional);
    }

    fn named_field_decl(
        &mut self,
        indent: usize,
        key: &str,
        ty: &FieldType,
        named: &str,
        optional: bool,
    ) {
        let ident = field_ident(key);
        if ident != key {
            self.line(indent, &format!("#[serde(rename = {key:?})]"));
        }
        let mut rust = rust_type(ty, named);
        if optional && !rust.starts_with("Option<") {
            rust = format!("Option<{rust}>");
        }
        self.line(indent, &format!("pub {ident}: {rust},"));
    }

    /// The Rust name a named GraphQL leaf type maps to, queuing enums and
    /// input objects for emission.
    fn leaf_rust_name(&mut self, graphql_name: &str) -> String {
        if self.schema.enums.contains_key(graphql_name)
            || self.schema.input_type(graphql_name).is_some()
        {
            if !self.emitted.contains(graphql_name) && !self.queue.iter().any(|n| n == graphql_name)
            {
                self.queue.push(graphql_name.to_string());
            }
            graphql_name.to_upper_camel_case()
        } else {
            // custom scalar
            "serde_json::Value".to_string()
        }
    }

    /// Emit a schema enum or input object the module references.
    fn leaf_type(&mut self, graphql_name: &str) {
        let rust_name = graphql_name.to_upper_camel_case();
        if let Some(values) = self.schema.enums.get(graphql_name) {
            self.out.push('\n');
            self.line(1, DERIVES);
            self.line(1, &format!("pub enum {rust_name} {{"));
            for value in values {
                let variant = value.to_upper_camel_case();
                if variant != *value {
                    self.line(2, &format!("#[serde(rename = {value:?})]"));
                }
                self.line(2, &format!("{variant},"));
            }
            self.line(1, "}");
        } else if let Some(input) = self.schema.input_type(graphql_name) {
            // nested input objects and enums get queued while declaring fields
            let fields: Vec<_> = input.fields.values().cloned().collect();
            self.out.push('\n');
            self.line(1, DERIVES);
            self.line(1, &format!("pub struct {rust_name} {{"));
            for field in &fields {
                let optional = !field.value_type.is_non_null() || field.default_value.is_some();
                self.field_decl(2, &field.name, &field.value_type, optional);
            }
            self.line(1, "}");
        }
    }
}

fn rust_type(ty: &FieldType, named: &str) -> String {
    match ty {
        FieldType::NonNull(inner) => base_type(inner, named),
        _ => format!("Option<{}>", base_type(ty, named)),
    }
}

fn base_type(ty: &FieldType, named: &str) -> String {
    match ty {
        // rust_type re-wraps nullable inner types in Option
        FieldType::NonNull(inner) => base_type(inner, named),
        FieldType::List(inner) => format!("Vec<{}>", rust_type(inner, named)),
        FieldType::String | FieldType::Id => "String".to_string(),
        FieldType::Int => "i64".to_string(),
        FieldType::Float => "f64".to_string(),
        FieldType::Boolean => "bool".to_string(),
        FieldType::Named(_) => named.to_string(),
    }
}

/// Keywords a response key could collide with when snake cased.
const RESERVED: [&str; 14] = [
    "as", "else", "enum", "fn", "for", "if", "impl", "in", "loop", "match", "mod", "move", "ref",
    "type",
];

fn field_ident(key: &str) -> String {
    let ident = key.to_snake_case();
    if RESERVED.contains(&ident.as_str()) {
        format!("{ident}_")
    } else {
        ident
    }
}

/// Print the normalized GraphQL text of a resolved operation: fragments
/// flattened, branches as inline fragments, the injected `__typename`
/// included.
pub fn print_operation(operation: &ResolvedOperation) -> String {
    let mut out = String::new();
    out.push_str(&operation.kind.to_string());
    if let Some(name) = &operation.name {
        let _ = write!(out, " {name}");
    }
    if !operation.variables.is_empty() {
        let vars = operation
            .variables
            .iter()
            .map(|(name, variable)| {
                let mut var = format!("${name}: {}", variable.var_type);
                if let Some(default) = &variable.default_value {
                    let _ = write!(var, " = {}", print_value(default));
                }
                var
            })
            .join(", ");
        let _ = write!(out, "({vars})");
    }
    out.push(' ');
    print_set(&mut out, &operation.selection_set, 0);
    out.push('\n');
    out
}

fn print_set(out: &mut String, set: &ResolvedSelectionSet, depth: usize) {
    out.push_str("{\n");
    match &set.shape {
        Shape::Fields { fields } => {
            for field in fields.values() {
                print_field(out, field, depth + 1);
            }
        }
        Shape::Polymorphic { common, branches } => {
            for field in common.values() {
                print_field(out, field, depth + 1);
            }
            for (concrete, fields) in branches {
                indent(out, depth + 1);
                let _ = write!(out, "... on {concrete} ");
                out.push_str("{\n");
                for field in fields.values() {
                    print_field(out, field, depth + 2);
                }
                indent(out, depth + 1);
                out.push_str("}\n");
            }
        }
    }
    indent(out, depth);
    out.push('}');
    if depth > 0 {
        out.push('\n');
    }
}

fn print_field(out: &mut String, field: &ResolvedField, depth: usize) {
    indent(out, depth);
    if field.response_key != field.name {
        let _ = write!(out, "{}: ", field.response_key);
    }
    out.push_str(&field.name);
    if !field.arguments.is_empty() {
        let args = field
            .arguments
            .iter()
            .map(|(name, value)| format!("{name}: {}", print_value(value)))
            .join(", ");
        let _ = write!(out, "({args})");
    }
    match &field.selection_set {
        Some(set) => {
            out.push(' ');
            print_set(out, set, depth);
        }
        None => out.push('\n'),
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn print_value(value: &ast::Value) -> String {
    match value {
        ast::Value::Null => "null".to_string(),
        ast::Value::Int(i) => i.to_string(),
        // Debug keeps a decimal point, so the literal re-lexes as a float
        ast::Value::Float(f) => format!("{f:?}"),
        ast::Value::String(s) => format!("{s:?}"),
        ast::Value::Boolean(b) => b.to_string(),
        ast::Value::Enum(name) => name.clone(),
        ast::Value::Variable(name) => format!("${name}"),
        ast::Value::List(items) => {
            format!("[{}]", items.iter().map(print_value).join(", "))
        }
        ast::Value::Object(fields) => {
            format!(
                "{{{}}}",
                fields
                    .iter()
                    .map(|(name, value)| format!("{name}: {}", print_value(value)))
                    .join(", ")
            )
        }
    }
}
