//! Field collection: walking selection sets into deduplicated, merged groups
//! of fields, one group per response key.
//!
//! Each group carries shared state that later execution memoizes on: the
//! field definition, coerced arguments, the merged child selection set, and
//! the per-concrete-type child plans. Sibling objects of the same shape
//! (list elements, most commonly) reuse the work of the first one.

use crate::input_coercion::VariableValues;
use crate::response::GraphQLError;
use crate::response::JsonMap;
use apollo_compiler::ast::Value;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::Selection;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::Name;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::validation::Valid;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use indexmap::IndexMap;
use std::cell::OnceCell;
use std::cell::RefCell;
use std::collections::HashMap;
use std::collections::HashSet;
use std::rc::Rc;

/// The ordered groups collected for one object type: response-key order here
/// is response-key order in the output object.
pub(crate) type GroupedFieldSet<'a> = Vec<Rc<FieldGroup<'a>>>;

/// One logical field in a merged selection set, shared between every sibling
/// object it is executed on.
pub(crate) struct FieldGroup<'a> {
    pub(crate) response_key: &'a Name,
    /// All field nodes merged under this response key, in source order.
    /// Arguments come from the first occurrence; validation guarantees the
    /// rest agree.
    pub(crate) fields: Vec<&'a Field>,

    // Memoized per enclosing object type. The guard name is checked on every
    // use and the entry recomputed if the enclosing type changed.
    field_def: RefCell<Option<(&'a Name, &'a FieldDefinition)>>,
    arguments: RefCell<Option<(&'a Name, Rc<JsonMap>)>>,

    merged_selections: OnceCell<Vec<&'a Selection>>,
    child_plans: RefCell<HashMap<&'a Name, Rc<GroupedFieldSet<'a>>>>,
}

impl<'a> FieldGroup<'a> {
    fn new(response_key: &'a Name, fields: Vec<&'a Field>) -> Self {
        Self {
            response_key,
            fields,
            field_def: RefCell::new(None),
            arguments: RefCell::new(None),
            merged_selections: OnceCell::new(),
            child_plans: RefCell::new(HashMap::new()),
        }
    }

    pub(crate) fn is_typename(&self) -> bool {
        self.fields[0].name == "__typename"
    }

    /// The schema definition of this field on `enclosing`, memoized.
    ///
    /// `None` if the type has no such field.
    pub(crate) fn field_def(
        &self,
        schema: &'a Valid<Schema>,
        enclosing: &'a ObjectType,
    ) -> Option<&'a FieldDefinition> {
        if let Some((guard, def)) = *self.field_def.borrow() {
            if guard == &enclosing.name {
                return Some(def);
            }
        }
        let component = schema
            .type_field(&enclosing.name, &self.fields[0].name)
            .ok()?;
        let def: &'a FieldDefinition = component;
        *self.field_def.borrow_mut() = Some((&enclosing.name, def));
        Some(def)
    }

    /// Coerced argument values memoized from the first sibling that coerced
    /// them successfully against `enclosing`.
    pub(crate) fn cached_arguments(&self, enclosing: &'a ObjectType) -> Option<Rc<JsonMap>> {
        match &*self.arguments.borrow() {
            Some((guard, arguments)) if *guard == &enclosing.name => Some(Rc::clone(arguments)),
            _ => None,
        }
    }

    pub(crate) fn cache_arguments(&self, enclosing: &'a ObjectType, arguments: Rc<JsonMap>) {
        *self.arguments.borrow_mut() = Some((&enclosing.name, arguments));
    }

    /// The concatenation of the sub-selections of every merged field node,
    /// built once.
    ///
    /// <https://spec.graphql.org/October2021/#MergeSelectionSets()>
    pub(crate) fn merged_selection_set(&self) -> &[&'a Selection] {
        self.merged_selections.get_or_init(|| {
            self.fields
                .iter()
                .flat_map(|field| &field.selection_set.selections)
                .collect()
        })
    }

    pub(crate) fn has_subselections(&self) -> bool {
        !self.merged_selection_set().is_empty()
    }

    /// The grouped field set of this field's sub-selections against one
    /// concrete object type.
    ///
    /// Collection runs at most once per `(group, concrete type)` pair;
    /// subsequent siblings of that type get the cached plan, which also pins
    /// their response-key order to the first sibling's.
    pub(crate) fn child_plan(
        &self,
        schema: &'a Valid<Schema>,
        document: &'a Valid<ExecutableDocument>,
        variables: &VariableValues,
        object_type: &'a ObjectType,
        errors: &mut Vec<GraphQLError>,
    ) -> Rc<GroupedFieldSet<'a>> {
        if let Some(plan) = self.child_plans.borrow().get(&object_type.name) {
            return Rc::clone(plan);
        }
        let plan = Rc::new(collect_fields(
            schema,
            document,
            variables,
            object_type,
            self.merged_selection_set().iter().copied(),
            errors,
        ));
        self.child_plans
            .borrow_mut()
            .insert(&object_type.name, Rc::clone(&plan));
        plan
    }
}

/// Collect the selections that apply to `object_type` into ordered field
/// groups, one per unique response key.
///
/// <https://spec.graphql.org/October2021/#CollectFields()>
pub(crate) fn collect_fields<'a>(
    schema: &'a Valid<Schema>,
    document: &'a Valid<ExecutableDocument>,
    variables: &VariableValues,
    object_type: &'a ObjectType,
    selections: impl IntoIterator<Item = &'a Selection>,
    errors: &mut Vec<GraphQLError>,
) -> GroupedFieldSet<'a> {
    let mut grouped = IndexMap::new();
    collect_into(
        schema,
        document,
        variables,
        object_type,
        selections,
        &mut HashSet::new(),
        &mut grouped,
        errors,
    );
    grouped
        .into_iter()
        .map(|(response_key, fields)| Rc::new(FieldGroup::new(response_key, fields)))
        .collect()
}

#[allow(clippy::too_many_arguments)]
fn collect_into<'a>(
    schema: &'a Valid<Schema>,
    document: &'a Valid<ExecutableDocument>,
    variables: &VariableValues,
    object_type: &'a ObjectType,
    selections: impl IntoIterator<Item = &'a Selection>,
    visited_fragments: &mut HashSet<&'a Name>,
    grouped: &mut IndexMap<&'a Name, Vec<&'a Field>>,
    errors: &mut Vec<GraphQLError>,
) {
    for selection in selections {
        if eval_if_arg(selection, "skip", variables).unwrap_or(false)
            || !eval_if_arg(selection, "include", variables).unwrap_or(true)
        {
            continue;
        }
        match selection {
            Selection::Field(field) => grouped
                .entry(field.response_key())
                .or_default()
                .push(field.as_ref()),
            Selection::FragmentSpread(spread) => {
                let new = visited_fragments.insert(&spread.fragment_name);
                if !new {
                    continue;
                }
                let Some(fragment) = document.fragments.get(&spread.fragment_name) else {
                    errors.push(GraphQLError::new(
                        format!("Unknown fragment \"{}\".", spread.fragment_name),
                        spread.fragment_name.location(),
                        &document.sources,
                    ));
                    continue;
                };
                if !does_fragment_type_apply(schema, object_type, fragment.type_condition()) {
                    continue;
                }
                collect_into(
                    schema,
                    document,
                    variables,
                    object_type,
                    &fragment.selection_set.selections,
                    visited_fragments,
                    grouped,
                    errors,
                )
            }
            Selection::InlineFragment(inline) => {
                if let Some(condition) = &inline.type_condition {
                    if !does_fragment_type_apply(schema, object_type, condition) {
                        continue;
                    }
                }
                collect_into(
                    schema,
                    document,
                    variables,
                    object_type,
                    &inline.selection_set.selections,
                    visited_fragments,
                    grouped,
                    errors,
                )
            }
        }
    }
}

/// <https://spec.graphql.org/October2021/#DoesFragmentTypeApply()>
fn does_fragment_type_apply(
    schema: &Schema,
    object_type: &ObjectType,
    fragment_type: &Name,
) -> bool {
    match schema.types.get(fragment_type) {
        Some(ExtendedType::Object(_)) => *fragment_type == object_type.name,
        Some(ExtendedType::Interface(_)) => {
            object_type.implements_interfaces.contains(fragment_type)
        }
        Some(ExtendedType::Union(def)) => def.members.contains(&object_type.name),
        // Undefined or not an output type: validation should have caught this
        _ => false,
    }
}

/// Evaluate the `if` argument of a `@skip` or `@include` directive on a
/// selection, consulting the coerced variable values.
fn eval_if_arg(
    selection: &Selection,
    directive_name: &str,
    variables: &VariableValues,
) -> Option<bool> {
    match selection
        .directives()
        .get(directive_name)?
        .specified_argument_by_name("if")?
        .as_ref()
    {
        Value::Boolean(value) => Some(*value),
        Value::Variable(var) => variables.get(var.as_str())?.as_bool(),
        _ => None,
    }
}
