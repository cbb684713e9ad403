//! Value completion: turning what a resolver returned into the shape the
//! schema declares, recording errors and propagating nulls along the way.

use crate::collect::FieldGroup;
use crate::engine::execute_selection_set;
use crate::engine::try_nullify;
use crate::engine::ExecutionContext;
use crate::engine::ExecutionMode;
use crate::engine::PropagateNull;
use crate::resolver::FieldError;
use crate::resolver::ObjectValue;
use crate::resolver::ResolvedValue;
use crate::response::GraphQLError;
use crate::response::JsonValue;
use crate::response::LinkedPath;
use crate::response::LinkedPathElement;
use crate::response::PathSegment;
use apollo_compiler::parser::SourceSpan;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::Name;
use apollo_compiler::schema::ObjectType;
use apollo_compiler::schema::Type;

enum LeafOrObject<'v> {
    Leaf(JsonValue),
    Object(Box<dyn ObjectValue + 'v>),
}

/// Complete one resolved value against its declared type.
///
/// Returns `Err` for a field error being propagated upwards to find a
/// nullable place. The null fence is whichever enclosing type first absorbs
/// it in [`try_nullify`].
///
/// <https://spec.graphql.org/October2021/#CompleteValue()>
pub(crate) async fn complete_value<'a, 'v>(
    ctx: ExecutionContext<'a>,
    path: LinkedPath<'_>,
    object_type: &'a ObjectType,
    ty: &'a Type,
    group: &FieldGroup<'a>,
    resolved: ResolvedValue<'v>,
    errors: &mut Vec<GraphQLError>,
) -> Result<JsonValue, PropagateNull> {
    let field = group.fields[0];
    let location = field.name.location();
    macro_rules! field_error {
        ($($arg: tt)+) => {
            {
                errors.push(GraphQLError::field_error(
                    format!($($arg)+),
                    path,
                    location,
                    &ctx.document.sources,
                ));
                return Err(PropagateNull);
            }
        };
    }

    // Settle pending values first; chains of futures are awaited through.
    // Everything that is already available keeps the strand on its fast
    // path: no suspension, no trip through the queue.
    let mut resolved = resolved;
    let leaf_or_object = loop {
        match resolved {
            ResolvedValue::Pending(future) => match future.await {
                Ok(next) => resolved = next,
                Err(FieldError { message }) => field_error!("resolver error: {message}"),
            },
            ResolvedValue::Leaf(JsonValue::Null) => {
                if ty.is_non_null() {
                    field_error!(
                        "Cannot return null for non-nullable field {}.{}.",
                        object_type.name,
                        field.name
                    )
                } else {
                    return Ok(JsonValue::Null);
                }
            }
            ResolvedValue::List(iter) => {
                return Box::pin(complete_list_value(
                    ctx,
                    path,
                    object_type,
                    ty,
                    group,
                    iter,
                    errors,
                ))
                .await;
            }
            ResolvedValue::Leaf(leaf) => break LeafOrObject::Leaf(leaf),
            ResolvedValue::Object(object) => break LeafOrObject::Object(object),
        }
    };

    let ty_name = match ty {
        Type::List(_) | Type::NonNullList(_) => {
            field_error!("list type {ty} resolved to a single value")
        }
        Type::Named(name) | Type::NonNullNamed(name) => name,
    };
    let Some(ty_def) = ctx.schema.types.get(ty_name) else {
        errors.push(
            GraphQLError::field_error(
                format!("undefined type {ty_name}"),
                path,
                location,
                &ctx.document.sources,
            )
            .suspected_validation_bug(),
        );
        return Err(PropagateNull);
    };
    if let ExtendedType::InputObject(_) = ty_def {
        errors.push(
            GraphQLError::field_error(
                format!("field with input object type {ty_name}"),
                path,
                location,
                &ctx.document.sources,
            )
            .suspected_validation_bug(),
        );
        return Err(PropagateNull);
    }

    let object_value = match leaf_or_object {
        LeafOrObject::Leaf(json_value) => {
            return complete_leaf_value(ctx, path, ty_name, ty_def, group, json_value, errors);
        }
        LeafOrObject::Object(object_value) => object_value,
    };

    let concrete: &'a ObjectType = match ty_def {
        ExtendedType::InputObject(_) => unreachable!(), // early return above
        ExtendedType::Enum(_) | ExtendedType::Scalar(_) => {
            field_error!("resolver returned an object for leaf type {ty_name}")
        }
        ExtendedType::Interface(_) | ExtendedType::Union(_) => resolve_abstract_type(
            ctx,
            path,
            location,
            ty_name,
            ty_def,
            &*object_value,
            errors,
        )?,
        ExtendedType::Object(def) => {
            if let Some(resolved_name) = object_value.type_name() {
                if resolved_name != ty_name.as_str() {
                    field_error!(
                        "resolver returned an object of type {resolved_name}, expected {ty_name}"
                    )
                }
            }
            if object_value.is_type_of(ty_name.as_str()) == Some(false) {
                field_error!("value is not an instance of type {ty_name}")
            }
            &**def
        }
    };

    let plan = group.child_plan(ctx.schema, ctx.document, ctx.variables, concrete, errors);
    Box::pin(execute_selection_set(
        ctx,
        path,
        ExecutionMode::Normal,
        concrete,
        &*object_value,
        &plan,
        errors,
    ))
    .await
    .map(JsonValue::Object)
}

/// Resolve which concrete object type an abstract-typed value belongs to.
///
/// When the value does not name its own type, every possible type of the
/// abstract type is probed through `is_type_of` and the first `true` in
/// schema definition order wins. The scan never stops early: probing has the
/// same cost and side effects regardless of which candidate matches.
fn resolve_abstract_type<'a>(
    ctx: ExecutionContext<'a>,
    path: LinkedPath<'_>,
    location: Option<SourceSpan>,
    abstract_name: &'a Name,
    abstract_def: &'a ExtendedType,
    object_value: &dyn ObjectValue,
    errors: &mut Vec<GraphQLError>,
) -> Result<&'a ObjectType, PropagateNull> {
    macro_rules! field_error {
        ($($arg: tt)+) => {
            {
                errors.push(GraphQLError::field_error(
                    format!($($arg)+),
                    path,
                    location,
                    &ctx.document.sources,
                ));
                return Err(PropagateNull);
            }
        };
    }
    let concrete_name = match object_value.type_name() {
        Some(name) => {
            if object_value.is_type_of(name) == Some(false) {
                field_error!("value is not an instance of type {name}")
            }
            name.to_owned()
        }
        None => {
            let mut matched = None;
            for (candidate, _) in possible_object_types(ctx.schema, abstract_name, abstract_def) {
                // `is_type_of` goes first so every candidate is probed
                if object_value.is_type_of(candidate.as_str()) == Some(true) && matched.is_none() {
                    matched = Some(candidate);
                }
            }
            match matched {
                Some(name) => name.as_str().to_owned(),
                None => field_error!(
                    "could not resolve the concrete type of abstract type {abstract_name}"
                ),
            }
        }
    };
    let Some(object_def) = ctx.schema.get_object(&concrete_name) else {
        field_error!(
            "resolver returned an object of type {concrete_name} not defined in the schema"
        )
    };
    if let ExtendedType::Union(union_def) = abstract_def {
        if !union_def.members.contains(concrete_name.as_str()) {
            field_error!(
                "resolver returned an object of type {concrete_name}, \
                 expected a member of union type {abstract_name}"
            )
        }
    } else if !object_def.implements_interfaces.contains(abstract_name) {
        field_error!(
            "resolver returned an object of type {concrete_name} \
             which does not implement interface {abstract_name}"
        )
    }
    Ok(&**object_def)
}

/// The object types an abstract type can resolve to, in schema definition
/// order.
pub(crate) fn possible_object_types<'a>(
    schema: &'a apollo_compiler::Schema,
    abstract_name: &Name,
    abstract_def: &'a ExtendedType,
) -> Vec<(&'a Name, &'a ObjectType)> {
    match abstract_def {
        ExtendedType::Union(def) => def
            .members
            .iter()
            .filter_map(|member| {
                schema
                    .get_object(&member.name)
                    .map(|object| (&member.name, &**object))
            })
            .collect(),
        ExtendedType::Interface(_) => schema
            .types
            .iter()
            .filter_map(|(name, def)| match def {
                ExtendedType::Object(object)
                    if object.implements_interfaces.contains(abstract_name) =>
                {
                    Some((name, &**object))
                }
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

async fn complete_list_value<'a, 'v>(
    ctx: ExecutionContext<'a>,
    path: LinkedPath<'_>,
    object_type: &'a ObjectType,
    ty: &'a Type,
    group: &FieldGroup<'a>,
    iter: Box<dyn Iterator<Item = Result<ResolvedValue<'v>, FieldError>> + 'v>,
    errors: &mut Vec<GraphQLError>,
) -> Result<JsonValue, PropagateNull> {
    let location = group.fields[0].name.location();
    let inner_ty = match ty {
        Type::Named(_) | Type::NonNullNamed(_) => {
            errors.push(GraphQLError::field_error(
                format!("non-list type {ty} resolved to a list"),
                path,
                location,
                &ctx.document.sources,
            ));
            return Err(PropagateNull);
        }
        Type::List(inner_ty) | Type::NonNullList(inner_ty) => inner_ty,
    };
    let mut completed_list = Vec::with_capacity(iter.size_hint().0);
    for (index, item) in iter.enumerate() {
        let inner_path = LinkedPathElement {
            element: PathSegment::ListIndex(index),
            next: path,
        };
        let item = item.map_err(|err| {
            errors.push(GraphQLError::field_error(
                format!("resolver error: {}", err.message),
                Some(&inner_path),
                location,
                &ctx.document.sources,
            ));
            PropagateNull
        })?;
        let inner_result = Box::pin(complete_value(
            ctx,
            Some(&inner_path),
            object_type,
            inner_ty,
            group,
            item,
            errors,
        ))
        .await;
        // On a field error, try to nullify just that item
        match try_nullify(inner_ty, inner_result) {
            Ok(inner_value) => completed_list.push(inner_value),
            // A non-null item nullifies the list instead
            Err(PropagateNull) => return try_nullify(ty, Err(PropagateNull)),
        }
    }
    Ok(completed_list.into())
}

fn complete_leaf_value<'a>(
    ctx: ExecutionContext<'a>,
    path: LinkedPath<'_>,
    ty_name: &Name,
    ty_def: &ExtendedType,
    group: &FieldGroup<'a>,
    json_value: JsonValue,
    errors: &mut Vec<GraphQLError>,
) -> Result<JsonValue, PropagateNull> {
    let field = group.fields[0];
    let location = field.name.location();
    macro_rules! field_error {
        ($($arg: tt)+) => {
            {
                errors.push(GraphQLError::field_error(
                    format!($($arg)+),
                    path,
                    location,
                    &ctx.document.sources,
                ));
                return Err(PropagateNull);
            }
        };
    }
    if group.has_subselections() {
        // Reported once per group; the leaf value itself still completes.
        errors.push(GraphQLError::field_error(
            format!(
                "Field \"{}\" is not composite - cannot query sub-fields",
                field.name
            ),
            path,
            location,
            &ctx.document.sources,
        ));
    }
    match ty_def {
        ExtendedType::InputObject(_) => unreachable!(), // early return in complete_value
        ExtendedType::Object(_) | ExtendedType::Interface(_) | ExtendedType::Union(_) => {
            field_error!("resolver returned a leaf value but expected an object for type {ty_name}")
        }
        ExtendedType::Enum(enum_def) => {
            // https://spec.graphql.org/October2021/#sec-Enums.Result-Coercion
            if !json_value
                .as_str()
                .is_some_and(|str| enum_def.values.contains_key(str))
            {
                field_error!("resolver returned {json_value}, expected enum {ty_name}")
            }
        }
        ExtendedType::Scalar(_) => match ty_name.as_str() {
            "Int" => {
                // https://spec.graphql.org/October2021/#sec-Int.Result-Coercion
                // Integers only; nothing is silently rounded into range
                if let Some(int) = json_value.as_i64() {
                    if i32::try_from(int).is_err() {
                        field_error!("resolver returned {json_value} which overflows Int")
                    }
                } else {
                    field_error!("resolver returned {json_value}, expected Int")
                }
            }
            "Float" => {
                // https://spec.graphql.org/October2021/#sec-Float.Result-Coercion
                if !(json_value.is_f64() || json_value.is_i64()) {
                    field_error!("resolver returned {json_value}, expected Float")
                }
            }
            "String" => {
                // https://spec.graphql.org/October2021/#sec-String.Result-Coercion
                if !json_value.is_string() {
                    field_error!("resolver returned {json_value}, expected String")
                }
            }
            "Boolean" => {
                // https://spec.graphql.org/October2021/#sec-Boolean.Result-Coercion
                if !json_value.is_boolean() {
                    field_error!("resolver returned {json_value}, expected Boolean")
                }
            }
            "ID" => {
                // https://spec.graphql.org/October2021/#sec-ID.Result-Coercion
                if !(json_value.is_string() || json_value.is_i64()) {
                    field_error!("resolver returned {json_value}, expected ID")
                }
            }
            _ => {
                // Custom scalar: accept any JSON value (including an array or
                // object, despite this being a leaf as far as resolution is
                // concerned)
            }
        },
    };
    Ok(json_value)
}
