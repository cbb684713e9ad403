//! Schema introspection: engine-side resolvers for the `__schema` and
//! `__type` meta-fields.
//!
//! `__typename` never reaches this module; the engine short-circuits it to
//! the current object type's name.

use crate::resolver::FieldError;
use crate::resolver::ObjectValue;
use crate::resolver::ResolveInfo;
use crate::resolver::ResolvedValue;
use crate::response::JsonMap;
use crate::result_coercion::possible_object_types;
use apollo_compiler::ast;
use apollo_compiler::schema;
use apollo_compiler::schema::ExtendedType;
use apollo_compiler::schema::Name;
use apollo_compiler::validation::Valid;
use apollo_compiler::Node;
use apollo_compiler::Schema;
use std::borrow::Cow;

/// The resolved value of the `__schema` meta-field.
pub(crate) fn schema_meta_field(schema: &Valid<Schema>) -> ResolvedValue<'_> {
    ResolvedValue::object(SchemaMetaField { schema })
}

/// The resolved value of the `__type(name:)` meta-field.
pub(crate) fn type_meta_field<'a>(
    schema: &'a Valid<Schema>,
    arguments: &JsonMap,
) -> Result<ResolvedValue<'a>, FieldError> {
    // `coerce_argument_values` conforms to `__type(name: String!): __Type`,
    // so a non-string here is a bug rather than a bad request
    match arguments.get("name").and_then(|value| value.as_str()) {
        Some(name) => Ok(type_def(schema, name)),
        None => Err(FieldError::new("expected string argument `name`")),
    }
}

struct SchemaMetaField<'a> {
    schema: &'a Valid<Schema>,
}

struct TypeDef<'a> {
    schema: &'a Valid<Schema>,
    name: &'a Name,
    def: &'a ExtendedType,
}

/// Only used for non-null and list types. `TypeDef` covers everything else.
struct WrappingType<'a> {
    schema: &'a Valid<Schema>,
    ty: Cow<'a, schema::Type>,
}

struct FieldDef<'a> {
    schema: &'a Valid<Schema>,
    def: &'a ast::FieldDefinition,
}

struct EnumValueDef<'a> {
    def: &'a ast::EnumValueDefinition,
}

struct InputValueDef<'a> {
    schema: &'a Valid<Schema>,
    def: &'a ast::InputValueDefinition,
}

struct DirectiveDef<'a> {
    schema: &'a Valid<Schema>,
    def: &'a ast::DirectiveDefinition,
}

fn type_def<'a>(schema: &'a Valid<Schema>, name: impl AsRef<str>) -> ResolvedValue<'a> {
    ResolvedValue::opt_object(
        schema
            .types
            .get_key_value(name.as_ref())
            .map(|(name, def)| TypeDef { schema, name, def }),
    )
}

fn type_def_opt<'a>(
    schema: &'a Valid<Schema>,
    name: &Option<impl AsRef<str>>,
) -> ResolvedValue<'a> {
    if let Some(name) = name.as_ref() {
        type_def(schema, name)
    } else {
        ResolvedValue::null()
    }
}

fn ty<'a>(schema: &'a Valid<Schema>, ty: &'a schema::Type) -> ResolvedValue<'a> {
    if let schema::Type::Named(name) = ty {
        type_def(schema, name)
    } else {
        ResolvedValue::object(WrappingType {
            schema,
            ty: Cow::Borrowed(ty),
        })
    }
}

fn deprecation_reason<'a>(opt_directive: Option<&'a Node<ast::Directive>>) -> ResolvedValue<'a> {
    ResolvedValue::leaf(opt_directive.map(|directive| {
        directive
            .specified_argument_by_name("reason")
            .and_then(|arg| arg.as_str())
            .unwrap_or("No longer supported")
    }))
}

/// Although it should be non-null, the `includeDeprecated: Boolean = false`
/// argument is nullable
fn include_deprecated(args: &JsonMap) -> bool {
    args["includeDeprecated"].as_bool().unwrap_or(false)
}

impl ObjectValue for SchemaMetaField<'_> {
    fn type_name(&self) -> Option<&str> {
        Some("__Schema")
    }

    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError> {
        match info.field_name() {
            "description" => Ok(ResolvedValue::leaf(
                self.schema.schema_definition.description.as_deref(),
            )),
            "types" => Ok(ResolvedValue::list(self.schema.types.iter().map(
                |(name, def)| {
                    ResolvedValue::object(TypeDef {
                        schema: self.schema,
                        name,
                        def,
                    })
                },
            ))),
            "directives" => Ok(ResolvedValue::list(
                self.schema.directive_definitions.values().map(|def| {
                    ResolvedValue::object(DirectiveDef {
                        schema: self.schema,
                        def,
                    })
                }),
            )),
            "queryType" => Ok(type_def_opt(
                self.schema,
                &self.schema.schema_definition.query,
            )),
            "mutationType" => Ok(type_def_opt(
                self.schema,
                &self.schema.schema_definition.mutation,
            )),
            "subscriptionType" => Ok(type_def_opt(
                self.schema,
                &self.schema.schema_definition.subscription,
            )),
            other => Err(FieldError::unknown_field(other, "__Schema")),
        }
    }
}

impl ObjectValue for TypeDef<'_> {
    fn type_name(&self) -> Option<&str> {
        Some("__Type")
    }

    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError> {
        match info.field_name() {
            "kind" => Ok(ResolvedValue::leaf(match self.def {
                ExtendedType::Scalar(_) => "SCALAR",
                ExtendedType::Object(_) => "OBJECT",
                ExtendedType::Interface(_) => "INTERFACE",
                ExtendedType::Union(_) => "UNION",
                ExtendedType::Enum(_) => "ENUM",
                ExtendedType::InputObject(_) => "INPUT_OBJECT",
            })),
            "name" => Ok(ResolvedValue::leaf(self.name.as_str())),
            "description" => Ok(ResolvedValue::leaf(
                self.def.description().map(|desc| desc.as_str()),
            )),
            "fields" => {
                let fields = match self.def {
                    ExtendedType::Object(def) => &def.fields,
                    ExtendedType::Interface(def) => &def.fields,
                    ExtendedType::Scalar(_)
                    | ExtendedType::Union(_)
                    | ExtendedType::Enum(_)
                    | ExtendedType::InputObject(_) => return Ok(ResolvedValue::null()),
                };
                let include_deprecated = include_deprecated(info.arguments());
                Ok(ResolvedValue::list(
                    fields
                        .values()
                        .filter(move |def| {
                            include_deprecated || def.directives.get("deprecated").is_none()
                        })
                        .map(|def| {
                            ResolvedValue::object(FieldDef {
                                schema: self.schema,
                                def,
                            })
                        }),
                ))
            }
            "interfaces" => {
                let implements_interfaces = match self.def {
                    ExtendedType::Object(def) => &def.implements_interfaces,
                    ExtendedType::Interface(def) => &def.implements_interfaces,
                    ExtendedType::Scalar(_)
                    | ExtendedType::Union(_)
                    | ExtendedType::Enum(_)
                    | ExtendedType::InputObject(_) => return Ok(ResolvedValue::null()),
                };
                Ok(ResolvedValue::list(implements_interfaces.iter().filter_map(
                    |name| {
                        self.schema.types.get(&name.name).map(|def| {
                            ResolvedValue::object(TypeDef {
                                schema: self.schema,
                                name: &name.name,
                                def,
                            })
                        })
                    },
                )))
            }
            "possibleTypes" => match self.def {
                ExtendedType::Interface(_) | ExtendedType::Union(_) => Ok(ResolvedValue::list(
                    possible_object_types(self.schema, self.name, self.def)
                        .into_iter()
                        .map(|(name, _)| type_def(self.schema, name)),
                )),
                ExtendedType::Object(_)
                | ExtendedType::Scalar(_)
                | ExtendedType::Enum(_)
                | ExtendedType::InputObject(_) => Ok(ResolvedValue::null()),
            },
            "enumValues" => {
                let ExtendedType::Enum(def) = self.def else {
                    return Ok(ResolvedValue::null());
                };
                let include_deprecated = include_deprecated(info.arguments());
                Ok(ResolvedValue::list(
                    def.values
                        .values()
                        .filter(move |def| {
                            include_deprecated || def.directives.get("deprecated").is_none()
                        })
                        .map(|def| ResolvedValue::object(EnumValueDef { def })),
                ))
            }
            "inputFields" => {
                let ExtendedType::InputObject(def) = self.def else {
                    return Ok(ResolvedValue::null());
                };
                let include_deprecated = include_deprecated(info.arguments());
                Ok(ResolvedValue::list(
                    def.fields
                        .values()
                        .filter(move |def| {
                            include_deprecated || def.directives.get("deprecated").is_none()
                        })
                        .map(|def| {
                            ResolvedValue::object(InputValueDef {
                                schema: self.schema,
                                def,
                            })
                        }),
                ))
            }
            "ofType" => Ok(ResolvedValue::null()),
            "specifiedByURL" => {
                let ExtendedType::Scalar(def) = self.def else {
                    return Ok(ResolvedValue::null());
                };
                Ok(ResolvedValue::leaf(
                    def.directives
                        .get("specifiedBy")
                        .and_then(|dir| dir.specified_argument_by_name("url"))
                        .and_then(|arg| arg.as_str()),
                ))
            }
            other => Err(FieldError::unknown_field(other, "__Type")),
        }
    }
}

impl ObjectValue for WrappingType<'_> {
    fn type_name(&self) -> Option<&str> {
        Some("__Type")
    }

    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError> {
        match info.field_name() {
            "kind" => Ok(ResolvedValue::leaf(match &*self.ty {
                schema::Type::Named(_) => unreachable!(),
                schema::Type::List(_) => "LIST",
                schema::Type::NonNullNamed(_) | schema::Type::NonNullList(_) => "NON_NULL",
            })),
            "ofType" => Ok(match &*self.ty {
                schema::Type::Named(_) => unreachable!(),
                schema::Type::List(inner) => ty(self.schema, inner),
                schema::Type::NonNullNamed(inner) => type_def(self.schema, inner),
                schema::Type::NonNullList(inner) => ResolvedValue::object(Self {
                    schema: self.schema,
                    ty: Cow::Owned(schema::Type::List(inner.clone())),
                }),
            }),
            "name" | "description" | "fields" | "interfaces" | "possibleTypes" | "enumValues"
            | "inputFields" | "specifiedByURL" => Ok(ResolvedValue::null()),
            other => Err(FieldError::unknown_field(other, "__Type")),
        }
    }
}

impl ObjectValue for FieldDef<'_> {
    fn type_name(&self) -> Option<&str> {
        Some("__Field")
    }

    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError> {
        match info.field_name() {
            "name" => Ok(ResolvedValue::leaf(self.def.name.as_str())),
            "description" => Ok(ResolvedValue::leaf(self.def.description.as_deref())),
            "args" => {
                let include_deprecated = include_deprecated(info.arguments());
                Ok(ResolvedValue::list(
                    self.def
                        .arguments
                        .iter()
                        .filter(move |def| {
                            include_deprecated || def.directives.get("deprecated").is_none()
                        })
                        .map(|def| {
                            ResolvedValue::object(InputValueDef {
                                schema: self.schema,
                                def,
                            })
                        }),
                ))
            }
            "type" => Ok(ty(self.schema, &self.def.ty)),
            "isDeprecated" => Ok(ResolvedValue::leaf(
                self.def.directives.get("deprecated").is_some(),
            )),
            "deprecationReason" => Ok(deprecation_reason(self.def.directives.get("deprecated"))),
            other => Err(FieldError::unknown_field(other, "__Field")),
        }
    }
}

impl ObjectValue for EnumValueDef<'_> {
    fn type_name(&self) -> Option<&str> {
        Some("__EnumValue")
    }

    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError> {
        match info.field_name() {
            "name" => Ok(ResolvedValue::leaf(self.def.value.as_str())),
            "description" => Ok(ResolvedValue::leaf(self.def.description.as_deref())),
            "isDeprecated" => Ok(ResolvedValue::leaf(
                self.def.directives.get("deprecated").is_some(),
            )),
            "deprecationReason" => Ok(deprecation_reason(self.def.directives.get("deprecated"))),
            other => Err(FieldError::unknown_field(other, "__EnumValue")),
        }
    }
}

impl ObjectValue for InputValueDef<'_> {
    fn type_name(&self) -> Option<&str> {
        Some("__InputValue")
    }

    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError> {
        match info.field_name() {
            "name" => Ok(ResolvedValue::leaf(self.def.name.as_str())),
            "description" => Ok(ResolvedValue::leaf(self.def.description.as_deref())),
            "type" => Ok(ty(self.schema, &self.def.ty)),
            "defaultValue" => Ok(ResolvedValue::leaf(
                self.def
                    .default_value
                    .as_ref()
                    .map(|val| val.serialize().no_indent().to_string()),
            )),
            "isDeprecated" => Ok(ResolvedValue::leaf(
                self.def.directives.get("deprecated").is_some(),
            )),
            "deprecationReason" => Ok(deprecation_reason(self.def.directives.get("deprecated"))),
            other => Err(FieldError::unknown_field(other, "__InputValue")),
        }
    }
}

impl ObjectValue for DirectiveDef<'_> {
    fn type_name(&self) -> Option<&str> {
        Some("__Directive")
    }

    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError> {
        match info.field_name() {
            "name" => Ok(ResolvedValue::leaf(self.def.name.as_str())),
            "description" => Ok(ResolvedValue::leaf(self.def.description.as_deref())),
            "args" => {
                let include_deprecated = include_deprecated(info.arguments());
                Ok(ResolvedValue::list(
                    self.def
                        .arguments
                        .iter()
                        .filter(move |def| {
                            include_deprecated || def.directives.get("deprecated").is_none()
                        })
                        .map(|def| {
                            ResolvedValue::object(InputValueDef {
                                schema: self.schema,
                                def,
                            })
                        }),
                ))
            }
            "locations" => Ok(ResolvedValue::list(
                self.def
                    .locations
                    .iter()
                    .map(|loc| ResolvedValue::leaf(loc.name())),
            )),
            "isRepeatable" => Ok(ResolvedValue::leaf(self.def.repeatable)),
            other => Err(FieldError::unknown_field(other, "__Directive")),
        }
    }
}
