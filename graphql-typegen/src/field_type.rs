use serde::Deserialize;
use serde::Serialize;
use serde_json_bytes::Value;

use crate::error::SchemaError;
use crate::introspection;
use crate::json_ext::ValueExt;
use crate::schema::Schema;

#[derive(Debug)]
pub(crate) struct InvalidValue;

// Primitives are taken from scalars: https://spec.graphql.org/draft/#sec-Scalars
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    /// Named type {0}
    Named(String),
    /// List type {0}
    List(Box<FieldType>),
    /// Non null type {0}
    NonNull(Box<FieldType>),
    /// String
    String,
    /// Int
    Int,
    /// Float
    Float,
    /// Id
    Id,
    /// Boolean
    Boolean,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::Named(ty) => write!(f, "{ty}"),
            FieldType::List(ty) => write!(f, "[{ty}]"),
            FieldType::NonNull(ty) => write!(f, "{ty}!"),
            FieldType::String => write!(f, "String"),
            FieldType::Int => write!(f, "Int"),
            FieldType::Float => write!(f, "Float"),
            FieldType::Id => write!(f, "ID"),
            FieldType::Boolean => write!(f, "Boolean"),
        }
    }
}

impl FieldType {
    pub(crate) fn named(name: &str) -> Self {
        match name {
            "String" => Self::String,
            "Int" => Self::Int,
            "Float" => Self::Float,
            "ID" => Self::Id,
            "Boolean" => Self::Boolean,
            _ => Self::Named(name.to_string()),
        }
    }

    // This function validates input values according to the graphql specification.
    // Each of the values are validated against the "input coercion" rules.
    pub(crate) fn validate_input_value(
        &self,
        value: &Value,
        schema: &Schema,
    ) -> Result<(), InvalidValue> {
        match (self, value) {
            (FieldType::String, Value::String(_)) => Ok(()),
            // Spec: https://spec.graphql.org/June2018/#sec-Int
            (FieldType::Int, maybe_int) => {
                if maybe_int == &Value::Null || maybe_int.is_valid_int_input() {
                    Ok(())
                } else {
                    Err(InvalidValue)
                }
            }
            // Spec: https://spec.graphql.org/draft/#sec-Float.Input-Coercion
            (FieldType::Float, maybe_float) => {
                if maybe_float == &Value::Null || maybe_float.is_valid_float_input() {
                    Ok(())
                } else {
                    Err(InvalidValue)
                }
            }
            // The ID scalar type is serialized in the same way as a String,
            // but in practice servers accept numbers too
            (FieldType::Id, Value::String(_)) => Ok(()),
            (FieldType::Id, maybe_int) => {
                if maybe_int == &Value::Null || maybe_int.is_valid_int_input() {
                    Ok(())
                } else {
                    Err(InvalidValue)
                }
            }
            (FieldType::Boolean, Value::Bool(_)) => Ok(()),
            (FieldType::List(inner_ty), Value::Array(vec)) => vec
                .iter()
                .try_for_each(|x| inner_ty.validate_input_value(x, schema)),
            // For coercion from single value to list
            (FieldType::List(inner_ty), val) if val != &Value::Null => {
                inner_ty.validate_input_value(val, schema)
            }
            (FieldType::NonNull(inner_ty), value) => {
                if value.is_null() {
                    Err(InvalidValue)
                } else {
                    inner_ty.validate_input_value(value, schema)
                }
            }
            (FieldType::Named(name), _)
                if schema.is_custom_scalar(name) || schema.is_enum(name) =>
            {
                Ok(())
            }
            // NOTE: graphql's types are all optional by default
            (_, Value::Null) => Ok(()),
            (FieldType::Named(name), value) => {
                if let Some(object) = value.as_object() {
                    if let Some(object_ty) = schema.input_type(name) {
                        object_ty
                            .validate_object(object, schema)
                            .map_err(|_| InvalidValue)
                    } else {
                        Err(InvalidValue)
                    }
                } else {
                    Err(InvalidValue)
                }
            }
            _ => Err(InvalidValue),
        }
    }

    /// return the name of the type on which selections happen
    ///
    /// Example if we get the field `list: [User!]!`, it will return "User"
    pub(crate) fn inner_type_name(&self) -> Option<&str> {
        match self {
            FieldType::Named(name) => Some(name.as_str()),
            FieldType::List(inner) | FieldType::NonNull(inner) => inner.inner_type_name(),
            FieldType::String
            | FieldType::Int
            | FieldType::Float
            | FieldType::Id
            | FieldType::Boolean => None,
        }
    }

    pub(crate) fn is_non_null(&self) -> bool {
        matches!(self, FieldType::NonNull(_))
    }
}

impl TryFrom<&introspection::TypeRef> for FieldType {
    type Error = SchemaError;

    // Spec: https://spec.graphql.org/draft/#sec-Type-References
    fn try_from(type_ref: &introspection::TypeRef) -> Result<Self, Self::Error> {
        match type_ref.kind {
            introspection::TypeKind::NonNull => {
                let inner = type_ref.of_type.as_deref().ok_or_else(|| {
                    SchemaError::InvalidTypeRef("NON_NULL is missing its ofType".to_string())
                })?;
                Ok(Self::NonNull(Box::new(inner.try_into()?)))
            }
            introspection::TypeKind::List => {
                let inner = type_ref.of_type.as_deref().ok_or_else(|| {
                    SchemaError::InvalidTypeRef("LIST is missing its ofType".to_string())
                })?;
                Ok(Self::List(Box::new(inner.try_into()?)))
            }
            _ => {
                let name = type_ref.name.as_deref().ok_or_else(|| {
                    SchemaError::InvalidTypeRef("named type reference without a name".to_string())
                })?;
                Ok(Self::named(name))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_preserves_wrapping() {
        let ty = FieldType::NonNull(Box::new(FieldType::List(Box::new(FieldType::NonNull(
            Box::new(FieldType::Named("User".to_string())),
        )))));
        assert_eq!(ty.to_string(), "[User!]!");
    }

    #[test]
    fn builtin_scalars_are_inlined() {
        assert_eq!(FieldType::named("ID"), FieldType::Id);
        assert_eq!(FieldType::named("Boolean"), FieldType::Boolean);
        assert_eq!(
            FieldType::named("Account"),
            FieldType::Named("Account".to_string())
        );
    }

    #[test]
    fn inner_type_name_unwraps_modifiers() {
        let ty = FieldType::NonNull(Box::new(FieldType::List(Box::new(FieldType::Named(
            "User".to_string(),
        )))));
        assert_eq!(ty.inner_type_name(), Some("User"));
        assert_eq!(FieldType::String.inner_type_name(), None);
    }
}
