//! GraphQL schema type graph, built from a typed introspection document.

use std::collections::HashSet;
use std::collections::VecDeque;

use indexmap::IndexMap;
use indexmap::IndexSet;

use crate::ast::OperationKind;
use crate::error::SchemaError;
use crate::error::SchemaErrors;
use crate::field_type::FieldType;
use crate::field_type::InvalidValue;
use crate::introspection;
use crate::json_ext::Object;

pub(crate) const BUILTIN_SCALARS: [&str; 5] = ["String", "Int", "Float", "ID", "Boolean"];

/// A GraphQL schema.
///
/// Immutable after load; every resolver call borrows it. The maps keep
/// declaration order so downstream output is deterministic.
#[derive(Debug, Clone)]
pub struct Schema {
    pub(crate) object_types: IndexMap<String, ObjectType>,
    pub(crate) interfaces: IndexMap<String, InterfaceType>,
    pub(crate) unions: IndexMap<String, UnionType>,
    pub(crate) enums: IndexMap<String, IndexSet<String>>,
    pub(crate) input_types: IndexMap<String, InputObjectType>,
    pub(crate) custom_scalars: IndexSet<String>,
    /// abstract type name -> all named subtypes, transitive, abstract ones included
    subtype_map: IndexMap<String, IndexSet<String>>,
    /// abstract type name -> concrete object types it can resolve to
    possible_map: IndexMap<String, IndexSet<String>>,
    query_type: String,
    mutation_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ObjectType {
    pub name: String,
    pub fields: IndexMap<String, FieldDef>,
    pub interfaces: IndexSet<String>,
}

#[derive(Debug, Clone)]
pub struct InterfaceType {
    pub name: String,
    pub fields: IndexMap<String, FieldDef>,
    pub interfaces: IndexSet<String>,
}

#[derive(Debug, Clone)]
pub struct UnionType {
    pub name: String,
    pub members: IndexSet<String>,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub args: IndexMap<String, InputValueDef>,
    pub field_type: FieldType,
}

#[derive(Debug, Clone)]
pub struct InputValueDef {
    pub name: String,
    pub value_type: FieldType,
    /// Raw default value literal, as reported by introspection.
    pub default_value: Option<String>,
}

#[derive(Debug, Clone)]
pub struct InputObjectType {
    pub name: String,
    pub fields: IndexMap<String, InputValueDef>,
}

impl InputObjectType {
    pub(crate) fn validate_object(
        &self,
        object: &Object,
        schema: &Schema,
    ) -> Result<(), InvalidValue> {
        for (key, value) in object.iter() {
            let field = self.fields.get(key.as_str()).ok_or(InvalidValue)?;
            field.value_type.validate_input_value(value, schema)?;
        }
        // all the non-nullable fields without a default MUST be present
        for field in self.fields.values() {
            if field.value_type.is_non_null()
                && field.default_value.is_none()
                && !object.contains_key(field.name.as_str())
            {
                return Err(InvalidValue);
            }
        }
        Ok(())
    }
}

impl Schema {
    /// Parse and validate an introspection response into a type graph.
    pub fn parse(json: &str) -> Result<Self, SchemaErrors> {
        Self::from_introspection(introspection::parse(json)?)
    }

    pub fn from_introspection(
        document: introspection::IntrospectionSchema,
    ) -> Result<Self, SchemaErrors> {
        let mut errors = Vec::new();
        let mut schema = Schema {
            object_types: IndexMap::new(),
            interfaces: IndexMap::new(),
            unions: IndexMap::new(),
            enums: IndexMap::new(),
            input_types: IndexMap::new(),
            custom_scalars: IndexSet::new(),
            subtype_map: IndexMap::new(),
            possible_map: IndexMap::new(),
            query_type: document.query_type.name.clone(),
            mutation_type: document.mutation_type.as_ref().map(|t| t.name.clone()),
        };

        let mut seen = HashSet::new();
        for full_type in &document.types {
            // introspection meta types are not part of the user's type graph
            if full_type.name.starts_with("__") {
                continue;
            }
            if !seen.insert(full_type.name.clone()) {
                errors.push(SchemaError::DuplicateType(full_type.name.clone()));
                continue;
            }
            schema.insert_type(full_type, &mut errors);
        }

        schema.build_subtype_maps();
        schema.validate(&mut errors);

        if errors.is_empty() {
            Ok(schema)
        } else {
            Err(SchemaErrors { errors })
        }
    }

    fn insert_type(&mut self, full_type: &introspection::FullType, errors: &mut Vec<SchemaError>) {
        let name = full_type.name.clone();
        match full_type.kind {
            introspection::TypeKind::Scalar => {
                if !BUILTIN_SCALARS.contains(&name.as_str()) {
                    self.custom_scalars.insert(name);
                }
            }
            introspection::TypeKind::Object => {
                let fields = convert_fields(&name, full_type.fields.as_deref(), errors);
                let interfaces = named_refs(full_type.interfaces.as_deref());
                self.object_types.insert(
                    name.clone(),
                    ObjectType {
                        name,
                        fields,
                        interfaces,
                    },
                );
            }
            introspection::TypeKind::Interface => {
                let fields = convert_fields(&name, full_type.fields.as_deref(), errors);
                let interfaces = named_refs(full_type.interfaces.as_deref());
                self.interfaces.insert(
                    name.clone(),
                    InterfaceType {
                        name,
                        fields,
                        interfaces,
                    },
                );
            }
            introspection::TypeKind::Union => {
                let members = named_refs(full_type.possible_types.as_deref());
                self.unions.insert(name.clone(), UnionType { name, members });
            }
            introspection::TypeKind::Enum => {
                let values = full_type
                    .enum_values
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .map(|value| value.name.clone())
                    .collect();
                self.enums.insert(name, values);
            }
            introspection::TypeKind::InputObject => {
                let fields = full_type
                    .input_fields
                    .as_deref()
                    .unwrap_or_default()
                    .iter()
                    .filter_map(|input| convert_input_value(&name, input, errors))
                    .map(|input| (input.name.clone(), input))
                    .collect();
                self.input_types
                    .insert(name.clone(), InputObjectType { name, fields });
            }
            // wrapping kinds never appear as top level definitions
            introspection::TypeKind::List | introspection::TypeKind::NonNull => {
                errors.push(SchemaError::InvalidTypeRef(format!(
                    "'{name}' is declared with a wrapping kind"
                )));
            }
        }
    }

    /// The subtype map contains both direct and transitive subtypes, while the
    /// possible map is restricted to concrete object types.
    ///
    /// The logic of this algorithm is inspired from the npm package graphql:
    /// https://github.com/graphql/graphql-js/blob/ac8f0c6b484a0d5dca2dc13c387247f96772580a/src/type/schema.ts#L302-L327
    fn build_subtype_maps(&mut self) {
        let mut direct: IndexMap<String, IndexSet<String>> = IndexMap::new();
        for object in self.object_types.values() {
            for interface in &object.interfaces {
                direct
                    .entry(interface.clone())
                    .or_default()
                    .insert(object.name.clone());
            }
        }
        for interface in self.interfaces.values() {
            for implemented in &interface.interfaces {
                direct
                    .entry(implemented.clone())
                    .or_default()
                    .insert(interface.name.clone());
            }
        }
        for union in self.unions.values() {
            direct
                .entry(union.name.clone())
                .or_default()
                .extend(union.members.iter().cloned());
        }

        for abstract_type in direct.keys() {
            let mut all = IndexSet::new();
            let mut queue: VecDeque<&str> = direct[abstract_type]
                .iter()
                .map(String::as_str)
                .collect();
            while let Some(subtype) = queue.pop_front() {
                if !all.insert(subtype.to_string()) {
                    continue;
                }
                if let Some(deeper) = direct.get(subtype) {
                    queue.extend(deeper.iter().map(String::as_str));
                }
            }
            let possible = all
                .iter()
                .filter(|name| self.object_types.contains_key(name.as_str()))
                .cloned()
                .collect();
            self.possible_map.insert(abstract_type.clone(), possible);
            self.subtype_map.insert(abstract_type.clone(), all);
        }
    }

    fn validate(&self, errors: &mut Vec<SchemaError>) {
        for object in self.object_types.values() {
            self.validate_fields(&object.name, &object.fields, errors);
            for interface in &object.interfaces {
                self.validate_implementation(&object.name, &object.fields, interface, errors);
            }
        }
        for interface in self.interfaces.values() {
            self.validate_fields(&interface.name, &interface.fields, errors);
            for implemented in &interface.interfaces {
                self.validate_implementation(
                    &interface.name,
                    &interface.fields,
                    implemented,
                    errors,
                );
            }
        }
        for union in self.unions.values() {
            for member in &union.members {
                if !self.object_types.contains_key(member) {
                    errors.push(SchemaError::InvalidUnionMember(
                        member.clone(),
                        union.name.clone(),
                    ));
                }
            }
        }
        for input_type in self.input_types.values() {
            for field in input_type.fields.values() {
                self.validate_type_ref(&field.value_type, &input_type.name, errors);
            }
        }
        if !self.object_types.contains_key(&self.query_type) {
            errors.push(SchemaError::MissingRootType(self.query_type.clone()));
        }
        if let Some(mutation) = &self.mutation_type {
            if !self.object_types.contains_key(mutation) {
                errors.push(SchemaError::MissingRootType(mutation.clone()));
            }
        }
    }

    fn validate_fields(
        &self,
        on_type: &str,
        fields: &IndexMap<String, FieldDef>,
        errors: &mut Vec<SchemaError>,
    ) {
        for field in fields.values() {
            self.validate_type_ref(&field.field_type, on_type, errors);
            for arg in field.args.values() {
                self.validate_type_ref(&arg.value_type, on_type, errors);
            }
        }
    }

    fn validate_type_ref(&self, ty: &FieldType, referenced_by: &str, errors: &mut Vec<SchemaError>) {
        if let Some(name) = ty.inner_type_name() {
            if !self.contains_type(name) {
                errors.push(SchemaError::UnknownType(
                    name.to_string(),
                    referenced_by.to_string(),
                ));
            }
        }
    }

    // Exact type match is enough here: the generator never needs variance
    fn validate_implementation(
        &self,
        implementor: &str,
        fields: &IndexMap<String, FieldDef>,
        interface: &str,
        errors: &mut Vec<SchemaError>,
    ) {
        let Some(interface_type) = self.interfaces.get(interface) else {
            errors.push(SchemaError::NotAnInterface(
                implementor.to_string(),
                interface.to_string(),
            ));
            return;
        };
        for interface_field in interface_type.fields.values() {
            match fields.get(&interface_field.name) {
                None => errors.push(SchemaError::MissingInterfaceField(
                    implementor.to_string(),
                    interface.to_string(),
                    interface_field.name.clone(),
                )),
                Some(field) if field.field_type != interface_field.field_type => {
                    errors.push(SchemaError::IncompatibleInterfaceField(
                        implementor.to_string(),
                        interface.to_string(),
                        field.name.clone(),
                        field.field_type.to_string(),
                    ));
                }
                Some(_) => {}
            }
        }
    }

    pub(crate) fn contains_type(&self, name: &str) -> bool {
        BUILTIN_SCALARS.contains(&name)
            || self.object_types.contains_key(name)
            || self.interfaces.contains_key(name)
            || self.unions.contains_key(name)
            || self.enums.contains_key(name)
            || self.input_types.contains_key(name)
            || self.custom_scalars.contains(name)
    }

    /// Object, interface or union: a type on which selections happen.
    pub(crate) fn is_composite(&self, name: &str) -> bool {
        self.object_types.contains_key(name)
            || self.interfaces.contains_key(name)
            || self.unions.contains_key(name)
    }

    pub(crate) fn is_enum(&self, name: &str) -> bool {
        self.enums.contains_key(name)
    }

    pub(crate) fn is_custom_scalar(&self, name: &str) -> bool {
        self.custom_scalars.contains(name)
    }

    pub(crate) fn input_type(&self, name: &str) -> Option<&InputObjectType> {
        self.input_types.get(name)
    }

    pub fn is_subtype(&self, abstract_type: &str, maybe_subtype: &str) -> bool {
        self.subtype_map
            .get(abstract_type)
            .map(|x| x.contains(maybe_subtype))
            .unwrap_or(false)
    }

    /// The concrete object types a composite type can resolve to at runtime.
    pub(crate) fn possible_types<'s>(&'s self, name: &'s str) -> IndexSet<&'s str> {
        if self.object_types.contains_key(name) {
            return IndexSet::from([name]);
        }
        self.possible_map
            .get(name)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// The fields selectable on an object or interface type.
    pub(crate) fn type_fields(&self, name: &str) -> Option<&IndexMap<String, FieldDef>> {
        self.object_types
            .get(name)
            .map(|object| &object.fields)
            .or_else(|| self.interfaces.get(name).map(|interface| &interface.fields))
    }

    pub(crate) fn root_operation_name(&self, kind: OperationKind) -> Option<&str> {
        match kind {
            OperationKind::Query => Some(self.query_type.as_str()),
            OperationKind::Mutation => self.mutation_type.as_deref(),
            OperationKind::Subscription => None,
        }
    }
}

fn convert_fields(
    on_type: &str,
    fields: Option<&[introspection::Field]>,
    errors: &mut Vec<SchemaError>,
) -> IndexMap<String, FieldDef> {
    fields
        .unwrap_or_default()
        .iter()
        .filter_map(|field| {
            let field_type = match FieldType::try_from(&field.field_type) {
                Ok(ty) => ty,
                Err(error) => {
                    errors.push(error);
                    return None;
                }
            };
            let args = field
                .args
                .iter()
                .filter_map(|arg| convert_input_value(on_type, arg, errors))
                .map(|arg| (arg.name.clone(), arg))
                .collect();
            Some((
                field.name.clone(),
                FieldDef {
                    name: field.name.clone(),
                    args,
                    field_type,
                },
            ))
        })
        .collect()
}

fn convert_input_value(
    _on_type: &str,
    input: &introspection::InputValue,
    errors: &mut Vec<SchemaError>,
) -> Option<InputValueDef> {
    match FieldType::try_from(&input.value_type) {
        Ok(value_type) => Some(InputValueDef {
            name: input.name.clone(),
            value_type,
            default_value: input.default_value.clone(),
        }),
        Err(error) => {
            errors.push(error);
            None
        }
    }
}

fn named_refs(refs: Option<&[introspection::TypeRef]>) -> IndexSet<String> {
    refs.unwrap_or_default()
        .iter()
        .filter_map(|type_ref| type_ref.name.clone())
        .collect()
}
