//! Selection-set execution: spawning one strand per collected field group and
//! assembling their outcomes into the response tree.

use crate::collect::collect_fields;
use crate::collect::FieldGroup;
use crate::collect::GroupedFieldSet;
use crate::input_coercion::coerce_argument_values;
use crate::input_coercion::VariableValues;
use crate::introspection;
use crate::resolver::FieldError;
use crate::resolver::ObjectValue;
use crate::resolver::ResolveInfo;
use crate::response::GraphQLError;
use crate::response::JsonMap;
use crate::response::JsonValue;
use crate::response::LinkedPath;
use crate::response::LinkedPathElement;
use crate::response::PathSegment;
use crate::response::Response;
use crate::result_coercion::complete_value;
use crate::strand::StrandOutput;
use crate::strand::Strands;
use apollo_compiler::executable::Operation;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::schema::Type;
use apollo_compiler::validation::Valid;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use std::any::Any;
use std::rc::Rc;

/// <https://spec.graphql.org/October2021/#sec-Normal-and-Serial-Execution>
#[derive(Debug, Copy, Clone)]
pub(crate) enum ExecutionMode {
    /// Strands drain cooperatively, in any interleaving
    Normal,
    /// Top-level fields of a mutation operation run strictly one after
    /// another; within each, execution is `Normal` again
    Sequential,
}

/// Returned in `Err` when a field error occurred at some non-nullable place.
///
/// <https://spec.graphql.org/October2021/#sec-Handling-Field-Errors>
pub(crate) struct PropagateNull;

/// Everything immutable that execution carries from the root to every strand.
#[derive(Clone, Copy)]
pub(crate) struct ExecutionContext<'a> {
    pub(crate) schema: &'a Valid<Schema>,
    pub(crate) document: &'a Valid<ExecutableDocument>,
    pub(crate) variables: &'a VariableValues,
    pub(crate) context_value: Option<&'a dyn Any>,
}

/// Execute the root selection set of an operation and assemble the response.
pub(crate) async fn execute_root_selection_set<'a>(
    ctx: ExecutionContext<'a>,
    mode: ExecutionMode,
    object_type: &'a ObjectType,
    root_value: &(dyn ObjectValue + '_),
    operation: &'a Operation,
) -> Response {
    let mut errors = Vec::new();
    let plan = collect_fields(
        ctx.schema,
        ctx.document,
        ctx.variables,
        object_type,
        &operation.selection_set.selections,
        &mut errors,
    );
    let data = execute_selection_set(ctx, None, mode, object_type, root_value, &plan, &mut errors)
        .await
        .ok();
    Response { errors, data }
}

/// <https://spec.graphql.org/October2021/#ExecuteSelectionSet()>
pub(crate) async fn execute_selection_set<'a>(
    ctx: ExecutionContext<'a>,
    path: LinkedPath<'_>,
    mode: ExecutionMode,
    object_type: &'a ObjectType,
    object_value: &(dyn ObjectValue + '_),
    plan: &GroupedFieldSet<'a>,
    errors: &mut Vec<GraphQLError>,
) -> Result<JsonMap, PropagateNull> {
    let mut strands = Strands::new();
    for group in plan {
        // Unknown fields never spawn a strand and leave no key in the result
        let Some(field_def) = group.field_def(ctx.schema, object_type) else {
            let field = group.fields[0];
            errors.push(GraphQLError::field_error(
                format!(
                    "Cannot query field \"{}\" on type \"{}\".",
                    field.name, object_type.name
                ),
                path,
                field.name.location(),
                &ctx.document.sources,
            ));
            continue;
        };
        let group = Rc::clone(group);
        strands.spawn(async move {
            let mut errors = Vec::new();
            let element = LinkedPathElement {
                element: PathSegment::Field(group.response_key.clone()),
                next: path,
            };
            let value = execute_field(
                ctx,
                Some(&element),
                object_type,
                object_value,
                field_def,
                &group,
                &mut errors,
            )
            .await;
            StrandOutput {
                response_key: group.response_key,
                value,
                errors,
            }
        });
    }

    let mut response_map = JsonMap::with_capacity(strands.len());
    let mut propagated = false;
    for output in strands.drain(mode).await {
        let StrandOutput {
            response_key,
            value,
            errors: mut strand_errors,
        } = output;
        // Merging in queue order keeps the error list deterministic, and a
        // propagating sibling never discards the errors of the others
        errors.append(&mut strand_errors);
        match value {
            Ok(value) => {
                response_map.insert(response_key.as_str(), value);
            }
            Err(PropagateNull) => propagated = true,
        }
    }
    if propagated {
        Err(PropagateNull)
    } else {
        Ok(response_map)
    }
}

/// <https://spec.graphql.org/October2021/#ExecuteField()>
async fn execute_field<'a>(
    ctx: ExecutionContext<'a>,
    path: LinkedPath<'_>,
    object_type: &'a ObjectType,
    object_value: &(dyn ObjectValue + '_),
    field_def: &'a FieldDefinition,
    group: &FieldGroup<'a>,
    errors: &mut Vec<GraphQLError>,
) -> Result<JsonValue, PropagateNull> {
    let field = group.fields[0];
    if group.is_typename() {
        return Ok(object_type.name.as_str().into());
    }
    let arguments = match group.cached_arguments(object_type) {
        Some(arguments) => arguments,
        None => match coerce_argument_values(ctx, path, field_def, field, errors) {
            Ok(arguments) => {
                let arguments = Rc::new(arguments);
                group.cache_arguments(object_type, Rc::clone(&arguments));
                arguments
            }
            Err(PropagateNull) => return try_nullify(&field_def.ty, Err(PropagateNull)),
        },
    };
    let info = ResolveInfo {
        schema: ctx.schema,
        document: ctx.document,
        parent_type: &object_type.name,
        response_key: group.response_key,
        fields: &group.fields,
        arguments: &arguments,
        path,
        context: ctx.context_value,
    };
    let is_root_query_type = || {
        ctx.schema
            .schema_definition
            .query
            .as_ref()
            .is_some_and(|q| q.name == object_type.name)
    };
    let resolved_result = match field.name.as_str() {
        "__schema" if is_root_query_type() => Ok(introspection::schema_meta_field(ctx.schema)),
        "__type" if is_root_query_type() => introspection::type_meta_field(ctx.schema, &arguments),
        _ => object_value.resolve_field(&info),
    };
    let completed_result = match resolved_result {
        Ok(resolved) => {
            complete_value(ctx, path, object_type, field.ty(), group, resolved, errors).await
        }
        Err(FieldError { message }) => {
            errors.push(GraphQLError::field_error(
                format!("resolver error: {message}"),
                path,
                field.name.location(),
                &ctx.document.sources,
            ));
            Err(PropagateNull)
        }
    };
    try_nullify(&field_def.ty, completed_result)
}

/// Try to insert a propagated null if possible, or keep propagating it.
///
/// This is the null fence: the first nullable enclosing type absorbs the
/// propagation and the field becomes null there.
///
/// <https://spec.graphql.org/October2021/#sec-Handling-Field-Errors>
pub(crate) fn try_nullify(
    ty: &Type,
    result: Result<JsonValue, PropagateNull>,
) -> Result<JsonValue, PropagateNull> {
    match result {
        Ok(json) => Ok(json),
        Err(PropagateNull) => {
            if ty.is_non_null() {
                Err(PropagateNull)
            } else {
                Ok(JsonValue::Null)
            }
        }
    }
}
