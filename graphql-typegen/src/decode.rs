//! Strict decoding of response data against resolved metadata.
//!
//! The decoder needs no schema: everything it checks (shapes, nullability,
//! enum values, the polymorphic discriminator) is embedded in the
//! [`ResolvedOperation`] the generator produced. The first violation aborts
//! the decode with the path it was found at.

use indexmap::IndexMap;
use serde_json_bytes::Value;

use crate::error::DecodeError;
use crate::field_type::FieldType;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::PathElement;
use crate::json_ext::ValueExt;
use crate::resolver::ResolvedField;
use crate::resolver::ResolvedOperation;
use crate::resolver::ResolvedSelectionSet;
use crate::resolver::Shape;
use crate::TYPENAME;

/// Decode the `data` value of a response against an operation.
///
/// Returns the response reduced to the selected keys, in selection order,
/// with every branch dispatched on `__typename`. Keys the selection does not
/// name are dropped.
pub fn decode_response(
    operation: &ResolvedOperation,
    data: &Value,
) -> Result<Value, DecodeError> {
    let mut decoder = Decoder::default();
    decoder.decode_set(&operation.selection_set, data)
}

/// Decode a value against a single resolved selection set, for callers that
/// hold fragment-level metadata.
pub fn decode_selection_set(
    selection_set: &ResolvedSelectionSet,
    data: &Value,
) -> Result<Value, DecodeError> {
    let mut decoder = Decoder::default();
    decoder.decode_set(selection_set, data)
}

#[derive(Default)]
struct Decoder {
    path: Path,
}

impl Decoder {
    fn decode_set(
        &mut self,
        set: &ResolvedSelectionSet,
        value: &Value,
    ) -> Result<Value, DecodeError> {
        let Some(object) = value.as_object() else {
            return Err(self.mismatch("object"));
        };
        match &set.shape {
            Shape::Fields { fields } => self.decode_fields(fields.values(), object),
            Shape::Polymorphic { common, branches } => {
                let typename = object
                    .get(TYPENAME)
                    .and_then(Value::as_str)
                    .ok_or_else(|| DecodeError::MissingTypename {
                        path: self.path.clone(),
                    })?;
                // unmatched concrete types decode with the common shape alone
                let mut merged: IndexMap<&str, &ResolvedField> = common
                    .iter()
                    .map(|(key, field)| (key.as_str(), field))
                    .collect();
                if let Some(branch) = branches.get(typename) {
                    for (key, field) in branch {
                        merged.insert(key.as_str(), field);
                    }
                }
                self.decode_fields(merged.into_values(), object)
            }
        }
    }

    fn decode_fields<'f>(
        &mut self,
        fields: impl Iterator<Item = &'f ResolvedField>,
        object: &Object,
    ) -> Result<Value, DecodeError> {
        let mut output = Object::default();
        for field in fields {
            let Some(value) = object.get(field.response_key.as_str()) else {
                if field.conditional {
                    continue;
                }
                return Err(DecodeError::MissingKey {
                    key: field.response_key.clone(),
                    path: self.path.clone(),
                });
            };
            self.path.push(PathElement::Key(field.response_key.clone()));
            let decoded = self.decode_value(&field.field_type, field, value)?;
            self.path.pop();
            output.insert(field.response_key.as_str(), decoded);
        }
        Ok(Value::Object(output))
    }

    fn decode_value(
        &mut self,
        ty: &FieldType,
        field: &ResolvedField,
        value: &Value,
    ) -> Result<Value, DecodeError> {
        match ty {
            FieldType::NonNull(inner) => {
                if value.is_null() {
                    Err(DecodeError::NullForNonNull {
                        ty: field.field_type.to_string(),
                        path: self.path.clone(),
                    })
                } else {
                    self.decode_value(inner, field, value)
                }
            }
            FieldType::List(inner) => match value {
                Value::Null => Ok(Value::Null),
                Value::Array(items) => {
                    let mut output = Vec::with_capacity(items.len());
                    for (index, item) in items.iter().enumerate() {
                        self.path.push(PathElement::Index(index));
                        output.push(self.decode_value(inner, field, item)?);
                        self.path.pop();
                    }
                    Ok(Value::Array(output))
                }
                _ => Err(self.mismatch("array")),
            },
            FieldType::String => match value {
                Value::Null | Value::String(_) => Ok(value.clone()),
                _ => Err(self.mismatch("string")),
            },
            // servers commonly serialize IDs as either strings or integers
            FieldType::Id => match value {
                Value::Null | Value::String(_) => Ok(value.clone()),
                _ if value.is_valid_int_input() => Ok(value.clone()),
                _ => Err(self.mismatch("id")),
            },
            FieldType::Int => {
                if value.is_null() || value.is_valid_int_input() {
                    Ok(value.clone())
                } else {
                    Err(self.mismatch("integer"))
                }
            }
            FieldType::Float => {
                if value.is_null() || value.is_valid_float_input() {
                    Ok(value.clone())
                } else {
                    Err(self.mismatch("float"))
                }
            }
            FieldType::Boolean => match value {
                Value::Null | Value::Bool(_) => Ok(value.clone()),
                _ => Err(self.mismatch("boolean")),
            },
            FieldType::Named(name) => {
                if value.is_null() {
                    return Ok(Value::Null);
                }
                if let Some(selection_set) = &field.selection_set {
                    return self.decode_set(selection_set, value);
                }
                if let Some(values) = &field.enum_values {
                    let Some(text) = value.as_str() else {
                        return Err(self.mismatch("string"));
                    };
                    if !values.iter().any(|v| v == text) {
                        return Err(DecodeError::UnknownEnumValue {
                            ty: name.clone(),
                            value: text.to_string(),
                            path: self.path.clone(),
                        });
                    }
                    return Ok(value.clone());
                }
                // custom scalar, passed through untouched
                Ok(value.clone())
            }
        }
    }

    fn mismatch(&self, expected: &str) -> DecodeError {
        DecodeError::ShapeMismatch {
            expected: expected.to_string(),
            path: self.path.clone(),
        }
    }
}
