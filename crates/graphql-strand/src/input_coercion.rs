//! Input value coercion: variables at request time, field arguments at
//! execution time.

use crate::engine::ExecutionContext;
use crate::engine::PropagateNull;
use crate::response::GraphQLError;
use crate::response::JsonMap;
use crate::response::JsonValue;
use crate::response::LinkedPath;
use crate::response::RequestError;
use apollo_compiler::ast::Type;
use apollo_compiler::ast::Value;
use apollo_compiler::executable::Field;
use apollo_compiler::executable::Operation;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::FieldDefinition;
use apollo_compiler::validation::Valid;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use std::collections::HashMap;

macro_rules! request_error {
    ($($arg: tt)+) => {
        return Err(RequestError::new(format!($($arg)+)))
    };
}

macro_rules! validation_bug {
    ($($arg: tt)+) => {
        return Err(RequestError::new(format!($($arg)+)).validation_bug())
    };
}

/// Values of the variables of a request, after coercion to the types declared
/// by the operation.
pub struct VariableValues(JsonMap);

impl std::ops::Deref for VariableValues {
    type Target = JsonMap;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl VariableValues {
    /// Coerce raw variable values against an operation's variable definitions.
    ///
    /// Returns a [request error][RequestError] if a value has an incompatible
    /// type or a required variable is missing; the request must not be
    /// executed in that case.
    ///
    /// <https://spec.graphql.org/October2021/#CoerceVariableValues()>
    pub fn coerce(
        schema: &Valid<Schema>,
        operation: &Operation,
        values: &JsonMap,
    ) -> Result<Self, RequestError> {
        let mut coerced_values = JsonMap::new();
        for variable_def in &operation.variables {
            let name = variable_def.name.as_str();
            if let Some((key, value)) = values.get_key_value(name) {
                let value = coerce_variable_value(
                    schema,
                    "variable",
                    "",
                    "",
                    name,
                    &variable_def.ty,
                    value,
                )?;
                coerced_values.insert(key.clone(), value);
            } else if let Some(default) = &variable_def.default_value {
                let value = graphql_value_to_json("variable", "", "", name, default)
                    .map_err(|err| err.at(default.location()))?;
                coerced_values.insert(name, value);
            } else if variable_def.ty.is_non_null() {
                request_error!("missing value for non-null variable '{name}'")
            } else {
                // Nullable variable with no provided value nor explicit default:
                // absent from the coerced map, which is distinct from an
                // explicitly provided null.
            }
        }
        Ok(Self(coerced_values))
    }
}

fn coerce_variable_value(
    schema: &Valid<Schema>,
    kind: &str,
    parent: &str,
    sep: &str,
    name: &str,
    ty: &Type,
    value: &JsonValue,
) -> Result<JsonValue, RequestError> {
    if value.is_null() {
        if ty.is_non_null() {
            request_error!("null value for non-null {kind} {parent}{sep}{name}")
        } else {
            return Ok(JsonValue::Null);
        }
    }
    let ty_name = match ty {
        Type::List(inner) | Type::NonNullList(inner) => {
            // https://spec.graphql.org/October2021/#sec-List.Input-Coercion
            return value
                .as_array()
                .map(Vec::as_slice)
                // If not an array, treat the value as an array of size one:
                .unwrap_or(std::slice::from_ref(value))
                .iter()
                .map(|item| coerce_variable_value(schema, kind, parent, sep, name, inner, item))
                .collect();
        }
        Type::Named(ty_name) | Type::NonNullNamed(ty_name) => ty_name,
    };
    let Some(ty_def) = schema.types.get(ty_name) else {
        validation_bug!("Undefined type {ty_name} for {kind} {parent}{sep}{name}")
    };
    match ty_def {
        ExtendedType::Object(_) | ExtendedType::Interface(_) | ExtendedType::Union(_) => {
            validation_bug!("Non-input type {ty_name} for {kind} {parent}{sep}{name}.")
        }
        ExtendedType::Scalar(_) => match ty_name.as_str() {
            "Int" => {
                // https://spec.graphql.org/October2021/#sec-Int.Input-Coercion
                if value
                    .as_i64()
                    .is_some_and(|value| i32::try_from(value).is_ok())
                {
                    return Ok(value.clone());
                }
            }
            "Float" => {
                // https://spec.graphql.org/October2021/#sec-Float.Input-Coercion
                if value.is_f64() || value.is_i64() {
                    return Ok(value.clone());
                }
            }
            "String" => {
                // https://spec.graphql.org/October2021/#sec-String.Input-Coercion
                if value.is_string() {
                    return Ok(value.clone());
                }
            }
            "Boolean" => {
                // https://spec.graphql.org/October2021/#sec-Boolean.Input-Coercion
                if value.is_boolean() {
                    return Ok(value.clone());
                }
            }
            "ID" => {
                // https://spec.graphql.org/October2021/#sec-ID.Input-Coercion
                if value.is_string() || value.is_i64() {
                    return Ok(value.clone());
                }
            }
            _ => {
                // Custom scalar: accept any JSON value
                return Ok(value.clone());
            }
        },
        ExtendedType::Enum(ty_def) => {
            // https://spec.graphql.org/October2021/#sec-Enums.Input-Coercion
            if let Some(str) = value.as_str() {
                if ty_def.values.keys().any(|value_name| value_name == str) {
                    return Ok(value.clone());
                }
            }
        }
        ExtendedType::InputObject(ty_def) => {
            // https://spec.graphql.org/October2021/#sec-Input-Objects.Input-Coercion
            if let Some(object) = value.as_object() {
                if let Some(key) = object
                    .keys()
                    .find(|key| !ty_def.fields.contains_key(key.as_str()))
                {
                    request_error!(
                        "Input object has key {} not in type {ty_name}",
                        key.as_str()
                    )
                }
                let mut object = object.clone();
                for (field_name, field_def) in &ty_def.fields {
                    if let Some(field_value) = object.get_mut(field_name.as_str()) {
                        *field_value = coerce_variable_value(
                            schema,
                            "input field",
                            ty_name,
                            ".",
                            field_name,
                            &field_def.ty,
                            field_value,
                        )?
                    } else if let Some(default) = &field_def.default_value {
                        let default =
                            graphql_value_to_json("input field", ty_name, ".", field_name, default)
                                .map_err(|err| err.at(default.location()))?;
                        object.insert(field_name.as_str(), default);
                    } else if field_def.ty.is_non_null() {
                        request_error!(
                            "Missing value for non-null input object field {ty_name}.{field_name}"
                        )
                    } else {
                        // Field not required
                    }
                }
                return Ok(object.into());
            }
        }
    }
    request_error!("Could not coerce {kind} {parent}{sep}{name}: {value} to type {ty_name}")
}

/// Convert a GraphQL value from the document into JSON.
///
/// Relies on validation for scalar/enum compatibility; only numeric overflow
/// is re-checked because JSON numbers are parsed here.
fn graphql_value_to_json(
    kind: &str,
    parent: &str,
    sep: &str,
    name: &str,
    value: &Value,
) -> Result<JsonValue, RequestError> {
    match value {
        Value::Null => Ok(JsonValue::Null),
        Value::Variable(_) => {
            validation_bug!("Variable in default value of {kind} {parent}{sep}{name}.")
        }
        Value::Enum(value) => Ok(value.as_str().into()),
        Value::String(value) => Ok(value.as_str().into()),
        Value::Boolean(value) => Ok((*value).into()),
        // Rely on `Number`'s own parser to use whatever precision it supports
        Value::Int(value) => Ok(JsonValue::Number(value.as_str().parse().or_else(|_| {
            request_error!("Int value overflow in {kind} {parent}{sep}{name}")
        })?)),
        Value::Float(value) => Ok(JsonValue::Number(value.as_str().parse().or_else(|_| {
            request_error!("Float value overflow in {kind} {parent}{sep}{name}")
        })?)),
        Value::List(value) => value
            .iter()
            .map(|value| graphql_value_to_json(kind, parent, sep, name, value))
            .collect(),
        Value::Object(value) => value
            .iter()
            .map(|(key, value)| {
                Ok((
                    key.as_str(),
                    graphql_value_to_json(kind, parent, sep, name, value)?,
                ))
            })
            .collect(),
    }
}

/// Coerce the arguments of one field against its definition.
///
/// Coercion failures are field errors: they are recorded and propagate like a
/// null from a non-null field.
///
/// <https://spec.graphql.org/October2021/#sec-Coercing-Field-Arguments>
pub(crate) fn coerce_argument_values(
    ctx: ExecutionContext<'_>,
    path: LinkedPath<'_>,
    field_def: &FieldDefinition,
    field: &Field,
    errors: &mut Vec<GraphQLError>,
) -> Result<JsonMap, PropagateNull> {
    let sources = &ctx.document.sources;
    let mut coerced_values = JsonMap::new();
    for arg_def in &field_def.arguments {
        let arg_name = &arg_def.name;
        if let Some(arg) = field.arguments.iter().find(|arg| arg.name == *arg_name) {
            if let Value::Variable(var_name) = arg.value.as_ref() {
                if let Some(var_value) = ctx.variables.get(var_name.as_str()) {
                    if var_value.is_null() && arg_def.ty.is_non_null() {
                        errors.push(GraphQLError::field_error(
                            format!("null value for non-nullable argument {arg_name}"),
                            path,
                            arg.value.location(),
                            sources,
                        ));
                        return Err(PropagateNull);
                    } else {
                        coerced_values.insert(arg_name.as_str(), var_value.clone());
                        continue;
                    }
                }
            } else if arg.value.is_null() && arg_def.ty.is_non_null() {
                errors.push(GraphQLError::field_error(
                    format!("null value for non-nullable argument {arg_name}"),
                    path,
                    arg.value.location(),
                    sources,
                ));
                return Err(PropagateNull);
            } else {
                let coerced_value = coerce_argument_value(
                    ctx,
                    path,
                    "argument",
                    "",
                    "",
                    arg_name,
                    &arg_def.ty,
                    &arg.value,
                    errors,
                )?;
                coerced_values.insert(arg_name.as_str(), coerced_value);
                continue;
            }
        }
        if let Some(default) = &arg_def.default_value {
            let value =
                graphql_value_to_json("argument", "", "", arg_name, default).map_err(|err| {
                    errors.push(err.into_field_error(path, arg_def.location(), sources));
                    PropagateNull
                })?;
            coerced_values.insert(arg_name.as_str(), value);
            continue;
        }
        if arg_def.ty.is_non_null() {
            errors.push(GraphQLError::field_error(
                format!("missing value for required argument {arg_name}"),
                path,
                arg_def.location(),
                sources,
            ));
            return Err(PropagateNull);
        }
    }
    Ok(coerced_values)
}

#[allow(clippy::too_many_arguments)]
fn coerce_argument_value(
    ctx: ExecutionContext<'_>,
    path: LinkedPath<'_>,
    kind: &str,
    parent: &str,
    sep: &str,
    name: &str,
    ty: &Type,
    value: &Node<Value>,
    errors: &mut Vec<GraphQLError>,
) -> Result<JsonValue, PropagateNull> {
    let sources = &ctx.document.sources;
    if value.is_null() {
        if ty.is_non_null() {
            errors.push(GraphQLError::field_error(
                format!("null value for non-null {kind} {parent}{sep}{name}"),
                path,
                value.location(),
                sources,
            ));
            return Err(PropagateNull);
        } else {
            return Ok(JsonValue::Null);
        }
    }
    if let Some(var_name) = value.as_variable() {
        if let Some(var_value) = ctx.variables.get(var_name.as_str()) {
            if var_value.is_null() && ty.is_non_null() {
                errors.push(GraphQLError::field_error(
                    format!("null variable value for non-null {kind} {parent}{sep}{name}"),
                    path,
                    value.location(),
                    sources,
                ));
                return Err(PropagateNull);
            } else {
                return Ok(var_value.clone());
            }
        } else if ty.is_non_null() {
            errors.push(GraphQLError::field_error(
                format!("missing variable for non-null {kind} {parent}{sep}{name}"),
                path,
                value.location(),
                sources,
            ));
            return Err(PropagateNull);
        } else {
            return Ok(JsonValue::Null);
        }
    }
    let ty_name = match ty {
        Type::List(inner_ty) | Type::NonNullList(inner_ty) => {
            // https://spec.graphql.org/October2021/#sec-List.Input-Coercion
            return value
                .as_list()
                // If not an array, treat the value as an array of size one:
                .unwrap_or(std::slice::from_ref(value))
                .iter()
                .map(|item| {
                    coerce_argument_value(
                        ctx, path, kind, parent, sep, name, inner_ty, item, errors,
                    )
                })
                .collect();
        }
        Type::Named(ty_name) | Type::NonNullNamed(ty_name) => ty_name,
    };
    let Some(ty_def) = ctx.schema.types.get(ty_name) else {
        errors.push(
            GraphQLError::field_error(
                format!("Undefined type {ty_name} for {kind} {parent}{sep}{name}"),
                path,
                value.location(),
                sources,
            )
            .suspected_validation_bug(),
        );
        return Err(PropagateNull);
    };
    match ty_def {
        ExtendedType::InputObject(ty_def) => {
            // https://spec.graphql.org/October2021/#sec-Input-Objects.Input-Coercion
            if let Some(object) = value.as_object() {
                if let Some((key, _value)) = object
                    .iter()
                    .find(|(key, _value)| !ty_def.fields.contains_key(key))
                {
                    errors.push(GraphQLError::field_error(
                        format!("Input object has key {key} not in type {ty_name}"),
                        path,
                        value.location(),
                        sources,
                    ));
                    return Err(PropagateNull);
                }
                let object: HashMap<_, _> = object.iter().map(|(k, v)| (k, v)).collect();
                let mut coerced_object = JsonMap::new();
                for (field_name, field_def) in &ty_def.fields {
                    if let Some(field_value) = object.get(field_name) {
                        let coerced_value = coerce_argument_value(
                            ctx,
                            path,
                            "input field",
                            ty_name,
                            ".",
                            field_name,
                            &field_def.ty,
                            field_value,
                            errors,
                        )?;
                        coerced_object.insert(field_name.as_str(), coerced_value);
                    } else if let Some(default) = &field_def.default_value {
                        let default =
                            graphql_value_to_json("input field", ty_name, ".", field_name, default)
                                .map_err(|err| {
                                    errors.push(err.into_field_error(
                                        path,
                                        value.location(),
                                        sources,
                                    ));
                                    PropagateNull
                                })?;
                        coerced_object.insert(field_name.as_str(), default);
                    } else if field_def.ty.is_non_null() {
                        errors.push(GraphQLError::field_error(
                            format!(
                                "Missing value for non-null input object field {ty_name}.{field_name}"
                            ),
                            path,
                            value.location(),
                            sources,
                        ));
                        return Err(PropagateNull);
                    } else {
                        // Field not required
                    }
                }
                return Ok(coerced_object.into());
            }
        }
        _ => {
            // For scalars and enums, rely on validation and just convert
            // between representations
            return graphql_value_to_json(kind, parent, sep, name, value).map_err(|err| {
                errors.push(err.into_field_error(path, value.location(), sources));
                PropagateNull
            });
        }
    }
    errors.push(GraphQLError::field_error(
        format!("Could not coerce {kind} {parent}{sep}{name}: {value} to type {ty_name}"),
        path,
        value.location(),
        sources,
    ));
    Err(PropagateNull)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json_bytes::json;

    fn coerce(
        schema_sdl: &str,
        query: &str,
        values: JsonValue,
    ) -> Result<JsonValue, RequestError> {
        let schema =
            apollo_compiler::Schema::parse_and_validate(schema_sdl, "schema.graphql").unwrap();
        let document = apollo_compiler::ExecutableDocument::parse_and_validate(
            &schema,
            query,
            "query.graphql",
        )
        .unwrap();
        let operation = document.operations.get(None).unwrap();
        let values = values.as_object().unwrap().clone();
        VariableValues::coerce(&schema, operation, &values).map(|v| JsonValue::Object(v.0.clone()))
    }

    const SCHEMA: &str = r#"
        input Point { x: Int!, y: Int! = 0 }
        type Query {
            find(p: Point, limit: Int! = 10, tag: String): Int
        }
    "#;
    const QUERY: &str = r#"
        query Find($p: Point, $limit: Int! = 3, $tag: String) {
            find(p: $p, limit: $limit, tag: $tag)
        }
    "#;

    #[test]
    fn coerces_input_objects_and_defaults() {
        let coerced = coerce(SCHEMA, QUERY, json!({ "p": { "x": 1 } })).unwrap();
        assert_eq!(coerced, json!({ "p": { "x": 1, "y": 0 }, "limit": 3 }));
    }

    #[test]
    fn absent_nullable_variable_stays_absent() {
        let coerced = coerce(SCHEMA, QUERY, json!({})).unwrap();
        let map = coerced.as_object().unwrap();
        assert!(!map.contains_key("p"));
        assert!(!map.contains_key("tag"));
    }

    #[test]
    fn rejects_unknown_input_object_key() {
        let err = coerce(SCHEMA, QUERY, json!({ "p": { "x": 1, "z": 2 } })).unwrap_err();
        assert_eq!(err.message(), "Input object has key z not in type Point");
    }

    #[test]
    fn rejects_missing_non_null_variable() {
        let query = "query Find($limit: Int!) { find(limit: $limit) }";
        let err = coerce(SCHEMA, query, json!({})).unwrap_err();
        assert_eq!(err.message(), "missing value for non-null variable 'limit'");
    }

    #[test]
    fn rejects_int_overflow() {
        let err = coerce(SCHEMA, QUERY, json!({ "limit": 5_000_000_000_i64 })).unwrap_err();
        assert_eq!(
            err.message(),
            "Could not coerce variable limit: 5000000000 to type Int"
        );
    }
}
