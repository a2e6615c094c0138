//! Resolution of executable documents against a schema.
//!
//! This is the heart of the generator: it flattens fragments, merges
//! selections by response key, type-checks every field, and produces the
//! typed selection tree the emitter and the runtime decoder both consume.
//!
//! Type conditions split the tree in two ways. A condition that holds for
//! every concrete type the scope can resolve to is merged into the common
//! shape. A condition that only holds for some of them routes its selections
//! into one branch per matching concrete type, and the scope becomes
//! polymorphic with `__typename` as the runtime discriminator.

use indexmap::IndexMap;
use indexmap::IndexSet;
use itertools::Itertools;
use serde::Deserialize;
use serde::Serialize;

use crate::ast;
use crate::ast::OperationKind;
use crate::ast::Selection;
use crate::ast::SelectionSet;
use crate::error::ResolutionError;
use crate::error::ResolutionErrors;
use crate::error::VariableError;
use crate::field_type::FieldType;
use crate::json_ext::Object;
use crate::json_ext::Path;
use crate::json_ext::PathElement;
use crate::schema::Schema;
use crate::TYPENAME;

/// One operation, fully resolved: fragments flattened, every field
/// type-checked against the schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedOperation {
    pub name: Option<String>,
    pub kind: OperationKind,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub variables: IndexMap<String, Variable>,
    pub selection_set: ResolvedSelectionSet,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    pub var_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<ast::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedSelectionSet {
    /// The composite type the selections were resolved against.
    pub on_type: String,
    pub shape: Shape,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Shape {
    /// Every field applies to every value of the scope.
    Fields { fields: IndexMap<String, ResolvedField> },
    /// Some selections only apply to some concrete types. `common` holds the
    /// fields shared by all of them, `branches` the extra fields per concrete
    /// type. A response whose `__typename` matches no branch decodes with the
    /// common fields alone.
    Polymorphic {
        common: IndexMap<String, ResolvedField>,
        branches: IndexMap<String, IndexMap<String, ResolvedField>>,
    },
}

impl Shape {
    /// The fields present regardless of the concrete runtime type.
    pub fn common_fields(&self) -> &IndexMap<String, ResolvedField> {
        match self {
            Shape::Fields { fields } => fields,
            Shape::Polymorphic { common, .. } => common,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedField {
    /// The key the field appears under in the response.
    pub response_key: String,
    /// The schema field name, which differs from the key when aliased.
    pub name: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub arguments: IndexMap<String, ast::Value>,
    pub field_type: FieldType,
    /// The declared values, when the field resolves to an enum.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selection_set: Option<Box<ResolvedSelectionSet>>,
    /// True when every occurrence of the field sits under `@skip` or
    /// `@include`: the decoder then tolerates a missing key.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub conditional: bool,
}

impl ResolvedOperation {
    /// Check request variables against the operation's declarations, the way
    /// a server would before executing.
    pub fn validate_variables(
        &self,
        schema: &Schema,
        variables: &Object,
    ) -> Result<(), Vec<VariableError>> {
        let mut errors = Vec::new();
        for (name, variable) in &self.variables {
            match variables.get(name.as_str()) {
                Some(value) => {
                    if variable
                        .var_type
                        .validate_input_value(value, schema)
                        .is_err()
                    {
                        errors.push(VariableError::InvalidVariableType(name.clone()));
                    }
                }
                None => {
                    if variable.var_type.is_non_null() && variable.default_value.is_none() {
                        errors.push(VariableError::MissingVariable(name.clone()));
                    }
                }
            }
        }
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Fragment definitions by name, shared across every document of a run.
#[derive(Debug, Clone, Default)]
pub struct FragmentMap {
    map: IndexMap<String, ast::FragmentDefinition>,
}

impl FragmentMap {
    /// Gather the fragments of a document batch. The first definition of a
    /// name wins; later ones are reported as duplicates.
    pub fn new<'a>(
        documents: impl IntoIterator<Item = &'a ast::Document>,
    ) -> (Self, Vec<ResolutionError>) {
        let mut map = IndexMap::new();
        let mut errors = Vec::new();
        for document in documents {
            for definition in &document.definitions {
                if let ast::Definition::Fragment(fragment) = definition {
                    if map.contains_key(&fragment.name) {
                        errors.push(ResolutionError::DuplicateFragment(fragment.name.clone()));
                    } else {
                        map.insert(fragment.name.clone(), fragment.clone());
                    }
                }
            }
        }
        (FragmentMap { map }, errors)
    }

    fn get(&self, name: &str) -> Option<&ast::FragmentDefinition> {
        self.map.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ast::FragmentDefinition> {
        self.map.values()
    }
}

/// Resolve one operation against the schema.
#[tracing::instrument(skip_all, level = "trace")]
pub fn resolve_operation(
    schema: &Schema,
    operation: &ast::OperationDefinition,
    fragments: &FragmentMap,
) -> Result<ResolvedOperation, ResolutionErrors> {
    let mut resolver = Resolver::new(schema, fragments);

    if operation.kind == OperationKind::Subscription {
        return Err(resolver.into_errors(
            operation.name.clone(),
            Some(ResolutionError::SubscriptionNotSupported),
        ));
    }
    let Some(root) = schema.root_operation_name(operation.kind) else {
        return Err(resolver.into_errors(
            operation.name.clone(),
            Some(ResolutionError::MissingRootType(
                operation.kind.to_string(),
            )),
        ));
    };
    let root = root.to_string();

    let mut variables = IndexMap::new();
    for definition in &operation.variables {
        let variable = Variable {
            var_type: FieldType::from(&definition.var_type),
            default_value: definition.default_value.clone(),
        };
        if variables.insert(definition.name.clone(), variable).is_some() {
            resolver.push_error(ResolutionError::DuplicateVariable(definition.name.clone()));
        }
    }

    tracing::debug!(
        operation = operation.name.as_deref().unwrap_or("<anonymous>"),
        root = root.as_str(),
        "resolving operation"
    );
    let selection_set = resolver.resolve_set(&root, &[&operation.selection_set]);
    if resolver.errors.is_empty() {
        Ok(ResolvedOperation {
            name: operation.name.clone(),
            kind: operation.kind,
            variables,
            selection_set,
        })
    } else {
        Err(resolver.into_errors(operation.name.clone(), None))
    }
}

/// Resolve one fragment definition on its own, for validation of fragments no
/// operation of the batch spreads.
pub fn resolve_fragment(
    schema: &Schema,
    fragment: &ast::FragmentDefinition,
    fragments: &FragmentMap,
) -> Result<ResolvedSelectionSet, ResolutionErrors> {
    let mut resolver = Resolver::new(schema, fragments);
    let condition = &fragment.type_condition.item;
    if !schema.contains_type(condition) {
        return Err(resolver.into_errors(
            Some(fragment.name.clone()),
            Some(ResolutionError::UnknownTypeCondition(
                condition.clone(),
                Path::default().to_string(),
            )),
        ));
    }
    if !schema.is_composite(condition) {
        return Err(resolver.into_errors(
            Some(fragment.name.clone()),
            Some(ResolutionError::NonCompositeFragment(
                fragment.name.clone(),
                condition.clone(),
            )),
        ));
    }
    // seed the stack so direct self-recursion is caught
    resolver.active_fragments.push(fragment.name.clone());
    let resolved = resolver.resolve_set(condition, &[&fragment.selection_set]);
    if resolver.errors.is_empty() {
        Ok(resolved)
    } else {
        Err(resolver.into_errors(Some(fragment.name.clone()), None))
    }
}

/// Which concrete types a pass is collecting for.
enum Pass<'a> {
    /// Selections that apply to every possible type of the scope.
    Common { on_type: &'a str },
    /// Everything that applies to one concrete type of the scope.
    Branch { on_type: &'a str, concrete: &'a str },
}

impl Pass<'_> {
    /// The composite type the whole scope resolves against. Conditions are
    /// checked against it: a sibling branch's condition is not an error, it
    /// just does not apply to this pass.
    fn scope(&self) -> &str {
        match self {
            Pass::Common { on_type } | Pass::Branch { on_type, .. } => on_type,
        }
    }
}

struct FieldAcc<'a> {
    name: String,
    arguments: IndexMap<String, ast::Value>,
    field_type: FieldType,
    child_sets: Vec<&'a SelectionSet>,
    conditional: bool,
}

struct Resolver<'a> {
    schema: &'a Schema,
    fragments: &'a FragmentMap,
    errors: Vec<ResolutionError>,
    path: Path,
    active_fragments: Vec<String>,
}

impl<'a> Resolver<'a> {
    fn new(schema: &'a Schema, fragments: &'a FragmentMap) -> Self {
        Resolver {
            schema,
            fragments,
            errors: Vec::new(),
            path: Path::default(),
            active_fragments: Vec::new(),
        }
    }

    /// Branch passes re-walk the selections the common pass walked, so the
    /// same error can be found twice.
    fn push_error(&mut self, error: ResolutionError) {
        if !self.errors.contains(&error) {
            self.errors.push(error);
        }
    }

    fn into_errors(
        mut self,
        name: Option<String>,
        extra: Option<ResolutionError>,
    ) -> ResolutionErrors {
        if let Some(error) = extra {
            self.push_error(error);
        }
        ResolutionErrors {
            name,
            errors: self.errors,
        }
    }

    /// Does the condition hold for every possible type of the scope?
    fn covers(&self, condition: &str, on_type: &str) -> bool {
        condition == on_type || self.schema.is_subtype(condition, on_type)
    }

    fn condition_applies(&self, pass: &Pass, condition: &str) -> bool {
        match pass {
            Pass::Common { on_type } => self.covers(condition, on_type),
            Pass::Branch { concrete, .. } => {
                condition == *concrete || self.schema.is_subtype(condition, concrete)
            }
        }
    }

    /// Report condition problems and decide whether its selections can apply
    /// to anything in the scope at all.
    fn check_condition(&mut self, condition: &str, on_type: &str) -> bool {
        if !self.schema.contains_type(condition) {
            self.push_error(ResolutionError::UnknownTypeCondition(
                condition.to_string(),
                self.path.to_string(),
            ));
            return false;
        }
        if !self.schema.is_composite(condition) {
            self.push_error(ResolutionError::InvalidTypeCondition {
                condition: condition.to_string(),
                ty: on_type.to_string(),
                path: self.path.to_string(),
            });
            return false;
        }
        let possible = self.schema.possible_types(on_type);
        let matching = self.schema.possible_types(condition);
        if possible.is_disjoint(&matching) {
            self.push_error(ResolutionError::InvalidTypeCondition {
                condition: condition.to_string(),
                ty: on_type.to_string(),
                path: self.path.to_string(),
            });
            return false;
        }
        true
    }

    fn resolve_set(&mut self, on_type: &str, sets: &[&'a SelectionSet]) -> ResolvedSelectionSet {
        let targets = self.gather_targets(on_type, sets, &mut IndexSet::new());

        let mut acc = IndexMap::new();
        self.collect_fields(&Pass::Common { on_type }, on_type, sets, false, &mut acc);
        let mut common = self.finalize(acc);

        if targets.is_empty() {
            return ResolvedSelectionSet {
                on_type: on_type.to_string(),
                shape: Shape::Fields { fields: common },
            };
        }

        // a polymorphic scope always carries its discriminator
        if !common.contains_key(TYPENAME) {
            common.shift_insert(
                0,
                TYPENAME.to_string(),
                ResolvedField {
                    response_key: TYPENAME.to_string(),
                    name: TYPENAME.to_string(),
                    arguments: IndexMap::new(),
                    field_type: FieldType::NonNull(Box::new(FieldType::String)),
                    enum_values: None,
                    selection_set: None,
                    conditional: false,
                },
            );
        }

        // branch order follows the schema's possible type order
        let branch_types: Vec<String> = self
            .schema
            .possible_types(on_type)
            .iter()
            .filter(|name| targets.contains(**name))
            .map(|name| name.to_string())
            .collect();
        let mut branches = IndexMap::new();
        for concrete in branch_types {
            let mut acc = IndexMap::new();
            self.collect_fields(
                &Pass::Branch {
                    on_type,
                    concrete: &concrete,
                },
                &concrete,
                sets,
                false,
                &mut acc,
            );
            let mut fields = self.finalize(acc);
            // keep only what the branch adds on top of the common shape
            fields.retain(|key, field| common.get(key) != Some(field));
            branches.insert(concrete, fields);
        }
        // a branch that adds nothing decodes like any other unlisted type
        branches.retain(|_, fields| !fields.is_empty());

        ResolvedSelectionSet {
            on_type: on_type.to_string(),
            shape: Shape::Polymorphic { common, branches },
        }
    }

    /// First pass: find the concrete types that narrowing conditions route
    /// selections to. Nested scopes are not entered; a field's sub-selections
    /// form their own scope.
    fn gather_targets(
        &self,
        on_type: &str,
        sets: &[&SelectionSet],
        visited: &mut IndexSet<String>,
    ) -> IndexSet<String> {
        let mut targets = IndexSet::new();
        for set in sets {
            for selection in &set.items {
                let (condition, selection_set) = match selection {
                    Selection::Field(_) => continue,
                    Selection::InlineFragment(inline) => (
                        inline.type_condition.as_ref().map(|c| c.item.as_str()),
                        &inline.selection_set,
                    ),
                    Selection::FragmentSpread(spread) => {
                        let Some(fragment) = self.fragments.get(&spread.name) else {
                            continue;
                        };
                        if !visited.insert(spread.name.clone()) {
                            continue;
                        }
                        (
                            Some(fragment.type_condition.item.as_str()),
                            &fragment.selection_set,
                        )
                    }
                };
                match condition {
                    Some(condition) if !self.schema.is_composite(condition) => {}
                    Some(condition) if !self.covers(condition, on_type) => {
                        let possible = self.schema.possible_types(on_type);
                        targets.extend(
                            self.schema
                                .possible_types(condition)
                                .iter()
                                .filter(|name| possible.contains(**name))
                                .map(|name| name.to_string()),
                        );
                        // conditions nested in a narrowing condition can only
                        // route within it
                        targets.extend(
                            self.gather_targets(condition, &[selection_set], visited)
                                .into_iter()
                                .filter(|name| possible.contains(name.as_str())),
                        );
                    }
                    _ => {
                        targets.extend(self.gather_targets(on_type, &[selection_set], visited));
                    }
                }
            }
        }
        targets
    }

    /// Second pass: flatten the selections the pass applies to and merge
    /// occurrences by response key.
    fn collect_fields(
        &mut self,
        pass: &Pass,
        lookup: &str,
        sets: &[&'a SelectionSet],
        conditional: bool,
        acc: &mut IndexMap<String, FieldAcc<'a>>,
    ) {
        for set in sets {
            for selection in &set.items {
                match selection {
                    Selection::Field(field) => {
                        let conditional = conditional || has_condition(&field.directives);
                        self.collect_field(lookup, field, conditional, acc);
                    }
                    Selection::InlineFragment(inline) => {
                        let conditional = conditional || has_condition(&inline.directives);
                        match &inline.type_condition {
                            None => self.collect_fields(
                                pass,
                                lookup,
                                &[&inline.selection_set],
                                conditional,
                                acc,
                            ),
                            Some(condition) => {
                                if self.check_condition(&condition.item, pass.scope())
                                    && self.condition_applies(pass, &condition.item)
                                {
                                    self.collect_fields(
                                        pass,
                                        lookup,
                                        &[&inline.selection_set],
                                        conditional,
                                        acc,
                                    );
                                }
                            }
                        }
                    }
                    Selection::FragmentSpread(spread) => {
                        let conditional = conditional || has_condition(&spread.directives);
                        self.collect_spread(pass, lookup, spread, conditional, acc);
                    }
                }
            }
        }
    }

    fn collect_spread(
        &mut self,
        pass: &Pass,
        lookup: &str,
        spread: &'a ast::FragmentSpread,
        conditional: bool,
        acc: &mut IndexMap<String, FieldAcc<'a>>,
    ) {
        let Some(fragment) = self.fragments.get(&spread.name) else {
            self.push_error(ResolutionError::UnknownFragment(spread.name.clone()));
            return;
        };
        if self.active_fragments.iter().any(|name| name == &spread.name) {
            let cycle = self
                .active_fragments
                .iter()
                .chain(std::iter::once(&spread.name))
                .join(" -> ");
            self.push_error(ResolutionError::FragmentCycle(cycle));
            return;
        }
        let condition = &fragment.type_condition.item;
        if !self.schema.contains_type(condition) {
            self.push_error(ResolutionError::UnknownTypeCondition(
                condition.clone(),
                self.path.to_string(),
            ));
            return;
        }
        if !self.schema.is_composite(condition) {
            self.push_error(ResolutionError::NonCompositeFragment(
                spread.name.clone(),
                condition.clone(),
            ));
            return;
        }
        if !self.check_condition(condition, pass.scope()) {
            return;
        }
        if !self.condition_applies(pass, condition) {
            return;
        }
        self.active_fragments.push(spread.name.clone());
        self.collect_fields(pass, lookup, &[&fragment.selection_set], conditional, acc);
        self.active_fragments.pop();
    }

    fn collect_field(
        &mut self,
        lookup: &str,
        field: &'a ast::Field,
        conditional: bool,
        acc: &mut IndexMap<String, FieldAcc<'a>>,
    ) {
        let field_type = if field.name == TYPENAME {
            FieldType::NonNull(Box::new(FieldType::String))
        } else {
            let def = self
                .schema
                .type_fields(lookup)
                .and_then(|fields| fields.get(&field.name));
            match def {
                Some(def) => def.field_type.clone(),
                None => {
                    self.push_error(ResolutionError::InvalidField {
                        field: field.name.clone(),
                        ty: lookup.to_string(),
                        path: self.path.to_string(),
                    });
                    return;
                }
            }
        };

        let key = field.response_key().to_string();
        match acc.get_mut(&key) {
            None => {
                acc.insert(
                    key,
                    FieldAcc {
                        name: field.name.clone(),
                        arguments: field.arguments.clone(),
                        field_type,
                        child_sets: field.selection_set.as_ref().into_iter().collect(),
                        conditional,
                    },
                );
            }
            Some(existing) => {
                if existing.name != field.name {
                    self.push_error(ResolutionError::ResponseKeyConflict {
                        key,
                        first: existing.name.clone(),
                        second: field.name.clone(),
                        path: self.path.to_string(),
                    });
                    return;
                }
                if existing.arguments != field.arguments {
                    self.push_error(ResolutionError::ConflictingArguments {
                        key,
                        path: self.path.to_string(),
                    });
                    return;
                }
                if let Some(set) = &field.selection_set {
                    existing.child_sets.push(set);
                }
                // the field is guaranteed as soon as one occurrence is
                existing.conditional = existing.conditional && conditional;
            }
        }
    }

    /// Turn merged occurrences into resolved fields, recursing into composite
    /// field types.
    fn finalize(&mut self, acc: IndexMap<String, FieldAcc<'a>>) -> IndexMap<String, ResolvedField> {
        let mut fields = IndexMap::new();
        for (key, entry) in acc {
            self.path.push(PathElement::Key(key.clone()));
            let inner = entry.field_type.inner_type_name().map(str::to_string);
            let composite = inner
                .as_deref()
                .is_some_and(|name| self.schema.is_composite(name));

            let selection_set = if composite {
                match inner.as_deref() {
                    Some(inner_type) if !entry.child_sets.is_empty() => {
                        Some(Box::new(self.resolve_set(inner_type, &entry.child_sets)))
                    }
                    _ => {
                        self.push_error(ResolutionError::MissingSubselection {
                            field: entry.name.clone(),
                            ty: entry.field_type.to_string(),
                            path: self.path.to_string(),
                        });
                        None
                    }
                }
            } else {
                if !entry.child_sets.is_empty() {
                    self.push_error(ResolutionError::UnexpectedSubselection {
                        field: entry.name.clone(),
                        ty: entry.field_type.to_string(),
                        path: self.path.to_string(),
                    });
                }
                None
            };

            let enum_values = inner
                .as_deref()
                .filter(|name| self.schema.is_enum(name))
                .and_then(|name| self.schema.enums.get(name))
                .map(|values| values.iter().cloned().collect());

            self.path.pop();
            fields.insert(
                key.clone(),
                ResolvedField {
                    response_key: key,
                    name: entry.name,
                    arguments: entry.arguments,
                    field_type: entry.field_type,
                    enum_values,
                    selection_set,
                    conditional: entry.conditional,
                },
            );
        }
        fields
    }
}

fn has_condition(directives: &[ast::Directive]) -> bool {
    directives
        .iter()
        .any(|directive| directive.name == "skip" || directive.name == "include")
}

impl From<&ast::TypeAnnotation> for FieldType {
    fn from(annotation: &ast::TypeAnnotation) -> Self {
        match annotation {
            ast::TypeAnnotation::Named(name) => FieldType::named(name),
            ast::TypeAnnotation::List(inner) => {
                FieldType::List(Box::new(FieldType::from(inner.as_ref())))
            }
            ast::TypeAnnotation::NonNull(inner) => {
                FieldType::NonNull(Box::new(FieldType::from(inner.as_ref())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;
    use test_log::test;

    use super::*;
    use crate::parser::parse_document;
    use crate::testing::test_schema;

    fn resolve(source: &str) -> Result<ResolvedOperation, ResolutionErrors> {
        let schema = test_schema();
        let document = parse_document(source).unwrap();
        let (fragments, duplicates) = FragmentMap::new([&document]);
        assert!(duplicates.is_empty());
        let operation = document
            .definitions
            .iter()
            .find_map(|definition| match definition {
                ast::Definition::Operation(op) => Some(op),
                ast::Definition::Fragment(_) => None,
            })
            .unwrap();
        resolve_operation(&schema, operation, &fragments)
    }

    fn errors(source: &str) -> Vec<ResolutionError> {
        resolve(source).unwrap_err().errors
    }

    #[test]
    fn plain_fields() {
        let operation = resolve("{ dog { id name barkVolume } }").unwrap();
        let Shape::Fields { fields } = &operation.selection_set.shape else {
            panic!("expected a plain shape");
        };
        let dog = fields.get("dog").unwrap();
        assert_eq!(dog.field_type.to_string(), "Dog!");
        let child = dog.selection_set.as_ref().unwrap();
        assert_eq!(child.on_type, "Dog");
        let Shape::Fields { fields } = &child.shape else {
            panic!("expected a plain shape");
        };
        assert_eq!(
            fields.keys().collect::<Vec<_>>(),
            vec!["id", "name", "barkVolume"]
        );
        assert!(!fields.get("barkVolume").unwrap().conditional);
    }

    #[test]
    fn aliases_key_the_shape() {
        let operation = resolve(r#"{ best: dog { loud: barkVolume } }"#).unwrap();
        let dog = operation.selection_set.shape.common_fields().get("best").unwrap();
        assert_eq!(dog.name, "dog");
        let child = dog.selection_set.as_ref().unwrap();
        let loud = child.shape.common_fields().get("loud").unwrap();
        assert_eq!(loud.name, "barkVolume");
    }

    #[test]
    fn covering_condition_stays_monomorphic() {
        let operation = resolve("{ node(id: 1) { ... on Node { id } } }").unwrap();
        let node = operation.selection_set.shape.common_fields().get("node").unwrap();
        let child = node.selection_set.as_ref().unwrap();
        assert!(matches!(child.shape, Shape::Fields { .. }));
        assert!(child.shape.common_fields().contains_key("id"));
    }

    #[test]
    fn narrowing_condition_branches() {
        let operation = resolve(
            "{ node(id: 1) { id ... on Dog { barkVolume } } }",
        )
        .unwrap();
        let node = operation.selection_set.shape.common_fields().get("node").unwrap();
        let child = node.selection_set.as_ref().unwrap();
        let Shape::Polymorphic { common, branches } = &child.shape else {
            panic!("expected a polymorphic shape");
        };
        // the discriminator is injected first
        assert_eq!(common.keys().collect::<Vec<_>>(), vec!["__typename", "id"]);
        assert_eq!(branches.keys().collect::<Vec<_>>(), vec!["Dog"]);
        assert!(branches["Dog"].contains_key("barkVolume"));
        assert!(!branches["Dog"].contains_key("id"));
    }

    #[test]
    fn sibling_concrete_conditions_each_get_a_branch() {
        let operation = resolve(
            "{ node(id: 1) { id ... on Dog { barkVolume } ... on Cat { meowVolume } } }",
        )
        .unwrap();
        let node = operation.selection_set.shape.common_fields().get("node").unwrap();
        let Shape::Polymorphic { common, branches } = &node.selection_set.as_ref().unwrap().shape
        else {
            panic!("expected a polymorphic shape");
        };
        assert_eq!(common.keys().collect::<Vec<_>>(), vec!["__typename", "id"]);
        assert_eq!(branches.keys().collect::<Vec<_>>(), vec!["Dog", "Cat"]);
        assert!(branches["Dog"].contains_key("barkVolume"));
        assert!(!branches["Dog"].contains_key("meowVolume"));
        assert!(branches["Cat"].contains_key("meowVolume"));
    }

    #[test]
    fn condition_nested_in_a_narrowing_condition_stays_inside_it() {
        let operation = resolve("{ node(id: 1) { ... on Dog { ... on Pet { name } } } }").unwrap();
        let node = operation.selection_set.shape.common_fields().get("node").unwrap();
        let Shape::Polymorphic { branches, .. } = &node.selection_set.as_ref().unwrap().shape
        else {
            panic!("expected a polymorphic shape");
        };
        assert_eq!(branches.keys().collect::<Vec<_>>(), vec!["Dog"]);
        assert!(branches["Dog"].contains_key("name"));
    }

    #[test]
    fn branch_that_adds_nothing_is_dropped() {
        let operation =
            resolve("{ node(id: 1) { id ... on Dog { id } ... on Cat { meowVolume } } }").unwrap();
        let node = operation.selection_set.shape.common_fields().get("node").unwrap();
        let Shape::Polymorphic { branches, .. } = &node.selection_set.as_ref().unwrap().shape
        else {
            panic!("expected a polymorphic shape");
        };
        assert_eq!(branches.keys().collect::<Vec<_>>(), vec!["Cat"]);
    }

    #[test]
    fn interface_condition_fans_out_to_concrete_types() {
        let operation = resolve("{ node(id: 1) { ... on Pet { name } } }").unwrap();
        let node = operation.selection_set.shape.common_fields().get("node").unwrap();
        let Shape::Polymorphic { common, branches } = &node.selection_set.as_ref().unwrap().shape
        else {
            panic!("expected a polymorphic shape");
        };
        assert_eq!(common.keys().collect::<Vec<_>>(), vec!["__typename"]);
        let mut keys: Vec<_> = branches.keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["Cat", "Dog"]);
        assert!(branches["Cat"].contains_key("name"));
        assert!(branches["Dog"].contains_key("name"));
    }

    #[test]
    fn requested_typename_is_not_injected_twice() {
        let operation =
            resolve("{ node(id: 1) { __typename ... on Dog { barkVolume } } }").unwrap();
        let node = operation.selection_set.shape.common_fields().get("node").unwrap();
        let Shape::Polymorphic { common, .. } = &node.selection_set.as_ref().unwrap().shape else {
            panic!("expected a polymorphic shape");
        };
        assert_eq!(common.keys().filter(|k| *k == "__typename").count(), 1);
    }

    #[test]
    fn union_members_only_share_typename() {
        let operation = resolve(
            "{ search(text: \"x\") { __typename ... on Dog { name } ... on Robot { model } } }",
        )
        .unwrap();
        let search = operation.selection_set.shape.common_fields().get("search").unwrap();
        let child = search.selection_set.as_ref().unwrap();
        assert_eq!(child.on_type, "SearchResult");
        let Shape::Polymorphic { branches, .. } = &child.shape else {
            panic!("expected a polymorphic shape");
        };
        assert_eq!(branches.keys().collect::<Vec<_>>(), vec!["Dog", "Robot"]);
    }

    #[test]
    fn field_on_union_is_invalid() {
        let errors = errors("{ search(text: \"x\") { name } }");
        assert!(errors.iter().any(|e| matches!(
            e,
            ResolutionError::InvalidField { field, ty, .. } if field == "name" && ty == "SearchResult"
        )));
    }

    #[test]
    fn fragment_spreads_merge_with_direct_fields() {
        let operation = resolve(
            "query { dog { name ...DogParts } }\n\
             fragment DogParts on Dog { name barkVolume }",
        )
        .unwrap();
        let dog = operation.selection_set.shape.common_fields().get("dog").unwrap();
        let fields = dog.selection_set.as_ref().unwrap().shape.common_fields();
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["name", "barkVolume"]);
    }

    #[test]
    fn same_key_merges_subselections() {
        let operation = resolve("{ dog { id } dog { name } }").unwrap();
        let dog = operation.selection_set.shape.common_fields().get("dog").unwrap();
        let fields = dog.selection_set.as_ref().unwrap().shape.common_fields();
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["id", "name"]);
    }

    #[test]
    fn fragment_cycle_is_reported() {
        let errors = errors(
            "query { dog { ...A } }\n\
             fragment A on Dog { ...B }\n\
             fragment B on Dog { ...A }",
        );
        assert!(errors.iter().any(|e| matches!(
            e,
            ResolutionError::FragmentCycle(cycle) if cycle == "A -> B -> A"
        )));
    }

    #[test]
    fn unknown_field_carries_its_path() {
        let errors = errors("{ dog { owner { name } } }");
        assert_eq!(errors.len(), 1);
        assert!(matches!(
            &errors[0],
            ResolutionError::InvalidField { field, ty, path }
                if field == "owner" && ty == "Dog" && path == "dog"
        ));
    }

    #[test]
    fn impossible_condition_is_an_error() {
        let errors = errors("{ dog { ... on Cat { meowVolume } } }");
        assert!(errors.iter().any(|e| matches!(
            e,
            ResolutionError::InvalidTypeCondition { condition, ty, .. }
                if condition == "Cat" && ty == "Dog"
        )));
    }

    #[test]
    fn leaf_fields_reject_subselections() {
        let errors = errors("{ dog { name { length } } }");
        assert!(errors.iter().any(|e| matches!(
            e,
            ResolutionError::UnexpectedSubselection { field, .. } if field == "name"
        )));
    }

    #[test]
    fn composite_fields_require_subselections() {
        let errors = errors("{ dog }");
        assert!(errors.iter().any(|e| matches!(
            e,
            ResolutionError::MissingSubselection { field, .. } if field == "dog"
        )));
    }

    #[test]
    fn response_key_conflicts() {
        let errors = errors("{ dog { volume: barkVolume volume: name } }");
        assert!(errors.iter().any(|e| matches!(
            e,
            ResolutionError::ResponseKeyConflict { key, first, second, .. }
                if key == "volume" && first == "barkVolume" && second == "name"
        )));
    }

    #[test]
    fn conflicting_arguments() {
        let errors = errors(r#"{ node(id: 1) { id } node(id: 2) { id } }"#);
        assert!(errors.iter().any(|e| matches!(
            e,
            ResolutionError::ConflictingArguments { key, .. } if key == "node"
        )));
    }

    #[test]
    fn conditional_only_when_every_occurrence_is() {
        let operation = resolve(
            "query($full: Boolean!) { dog { barkVolume @include(if: $full) name @skip(if: $full) name } }",
        )
        .unwrap();
        let dog = operation.selection_set.shape.common_fields().get("dog").unwrap();
        let fields = dog.selection_set.as_ref().unwrap().shape.common_fields();
        assert!(fields.get("barkVolume").unwrap().conditional);
        assert!(!fields.get("name").unwrap().conditional);
    }

    #[test]
    fn fragment_conditions_propagate_to_contained_fields() {
        let operation = resolve(
            "query($full: Boolean!) { dog { ... @include(if: $full) { barkVolume } } }",
        )
        .unwrap();
        let dog = operation.selection_set.shape.common_fields().get("dog").unwrap();
        let fields = dog.selection_set.as_ref().unwrap().shape.common_fields();
        assert!(fields.get("barkVolume").unwrap().conditional);
    }

    #[test]
    fn subscriptions_are_rejected() {
        let errors = errors("subscription { dog { id } }");
        assert_eq!(errors, vec![ResolutionError::SubscriptionNotSupported]);
    }

    #[test]
    fn duplicate_variables_are_rejected() {
        let errors = errors("query($a: Int, $a: String) { dog { id } }");
        assert!(errors.contains(&ResolutionError::DuplicateVariable("a".to_string())));
    }

    #[test]
    fn enum_fields_carry_their_values() {
        let operation = resolve("{ episode }").unwrap();
        let episode = operation.selection_set.shape.common_fields().get("episode").unwrap();
        assert_eq!(
            episode.enum_values.as_deref(),
            Some(&["NEWHOPE".to_string(), "EMPIRE".to_string(), "JEDI".to_string()][..])
        );
    }

    #[test]
    fn standalone_fragment_resolution() {
        let schema = test_schema();
        let document =
            parse_document("fragment PetParts on Pet { name ... on Dog { barkVolume } }").unwrap();
        let (fragments, _) = FragmentMap::new([&document]);
        let ast::Definition::Fragment(fragment) = &document.definitions[0] else {
            panic!("expected a fragment");
        };
        let resolved = resolve_fragment(&schema, fragment, &fragments).unwrap();
        assert_eq!(resolved.on_type, "Pet");
        assert!(matches!(resolved.shape, Shape::Polymorphic { .. }));
    }

    #[test]
    fn self_recursive_fragment() {
        let schema = test_schema();
        let document = parse_document("fragment Loop on Dog { ...Loop }").unwrap();
        let (fragments, _) = FragmentMap::new([&document]);
        let ast::Definition::Fragment(fragment) = &document.definitions[0] else {
            panic!("expected a fragment");
        };
        let errors = resolve_fragment(&schema, fragment, &fragments).unwrap_err();
        assert!(errors
            .errors
            .iter()
            .any(|e| matches!(e, ResolutionError::FragmentCycle(_))));
    }

    #[test]
    fn validate_variables_accepts_and_rejects() {
        let schema = test_schema();
        let operation = resolve(
            "query($limit: Int!, $filter: Filter, $name: String = \"rex\") { dog { id } }",
        )
        .unwrap();

        assert!(operation
            .validate_variables(&schema, json!({"limit": 3}).as_object().unwrap())
            .is_ok());
        assert!(operation
            .validate_variables(
                &schema,
                json!({"limit": 3, "filter": {"limit": 1, "tag": "x"}})
                    .as_object()
                    .unwrap()
            )
            .is_ok());

        let errors = operation
            .validate_variables(&schema, json!({}).as_object().unwrap())
            .unwrap_err();
        assert_eq!(errors, vec![VariableError::MissingVariable("limit".to_string())]);

        let errors = operation
            .validate_variables(
                &schema,
                json!({"limit": "three", "filter": {"tag": "x"}})
                    .as_object()
                    .unwrap(),
            )
            .unwrap_err();
        assert_eq!(
            errors,
            vec![
                VariableError::InvalidVariableType("limit".to_string()),
                VariableError::InvalidVariableType("filter".to_string()),
            ]
        );
    }

    #[test]
    fn metadata_round_trips_through_serde() {
        let operation = resolve(
            "query Q($id: ID!) { node(id: $id) { id ... on Dog { barkVolume } } }",
        )
        .unwrap();
        let json = serde_json::to_string(&operation).unwrap();
        let back: ResolvedOperation = serde_json::from_str(&json).unwrap();
        assert_eq!(back, operation);
    }
}
