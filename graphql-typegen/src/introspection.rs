//! Serde model of the typed introspection document.
//!
//! This mirrors the response shape of the standard `__schema` introspection
//! query. Deserialization only; consistency checks live in [`crate::schema`].

use serde::Deserialize;

use crate::error::SchemaError;
use crate::error::SchemaErrors;

/// The `__schema` object of an introspection response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntrospectionSchema {
    pub query_type: RootTypeRef,
    pub mutation_type: Option<RootTypeRef>,
    pub subscription_type: Option<RootTypeRef>,
    pub types: Vec<FullType>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RootTypeRef {
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TypeKind {
    Scalar,
    Object,
    Interface,
    Union,
    Enum,
    InputObject,
    List,
    NonNull,
}

/// One entry of `__schema.types`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullType {
    pub kind: TypeKind,
    pub name: String,
    #[serde(default)]
    pub fields: Option<Vec<Field>>,
    #[serde(default)]
    pub interfaces: Option<Vec<TypeRef>>,
    #[serde(default)]
    pub possible_types: Option<Vec<TypeRef>>,
    #[serde(default)]
    pub enum_values: Option<Vec<EnumValue>>,
    #[serde(default)]
    pub input_fields: Option<Vec<InputValue>>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub args: Vec<InputValue>,
    #[serde(rename = "type")]
    pub field_type: TypeRef,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputValue {
    pub name: String,
    #[serde(rename = "type")]
    pub value_type: TypeRef,
    #[serde(default)]
    pub default_value: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnumValue {
    pub name: String,
}

/// A possibly wrapped type reference: `NON_NULL` and `LIST` nest through
/// `ofType`, everything else is a named leaf.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeRef {
    pub kind: TypeKind,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub of_type: Option<Box<TypeRef>>,
}

#[derive(Deserialize)]
struct SchemaEnvelope {
    #[serde(rename = "__schema")]
    schema: IntrospectionSchema,
}

#[derive(Deserialize)]
struct DataEnvelope {
    data: SchemaEnvelope,
}

/// Parse an introspection response, accepting either the raw `{"__schema":…}`
/// object or a full `{"data":{"__schema":…}}` response envelope.
pub fn parse(json: &str) -> Result<IntrospectionSchema, SchemaErrors> {
    match serde_json::from_str::<SchemaEnvelope>(json) {
        Ok(envelope) => Ok(envelope.schema),
        Err(first) => serde_json::from_str::<DataEnvelope>(json)
            .map(|envelope| envelope.data.schema)
            .map_err(|_| SchemaError::Deserialize(first.to_string()).into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_is_optional() {
        let raw = r#"{"__schema": {"queryType": {"name": "Query"}, "types": []}}"#;
        let enveloped = format!(r#"{{"data": {raw}}}"#);

        assert_eq!(parse(raw).unwrap().query_type.name, "Query");
        assert_eq!(parse(&enveloped).unwrap().query_type.name, "Query");
    }

    #[test]
    fn deserialize_error_is_reported() {
        let err = parse(r#"{"no_schema_here": true}"#).unwrap_err();
        assert!(matches!(err.errors[0], SchemaError::Deserialize(_)));
    }

    #[test]
    fn nested_type_ref() {
        let json = r#"{
            "kind": "NON_NULL",
            "ofType": {"kind": "LIST", "ofType": {"kind": "SCALAR", "name": "String"}}
        }"#;
        let type_ref: TypeRef = serde_json::from_str(json).unwrap();
        assert_eq!(type_ref.kind, TypeKind::NonNull);
        assert_eq!(
            type_ref.of_type.unwrap().of_type.unwrap().name.as_deref(),
            Some("String")
        );
    }
}
