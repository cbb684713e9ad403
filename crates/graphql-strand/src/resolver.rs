//! The resolver surface: how user code supplies values to the engine.

use crate::response::JsonMap;
use crate::response::JsonValue;
use crate::response::LinkedPath;
use crate::response::PathSegment;
use apollo_compiler::executable::Field;
use apollo_compiler::schema::Name;
use apollo_compiler::validation::Valid;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use futures::future::LocalBoxFuture;
use std::any::Any;
use std::future::Future;

/// An error returned by a resolver, converted by the engine into a located
/// field error.
#[derive(Debug, Clone)]
pub struct FieldError {
    pub message: String,
}

impl FieldError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn unknown_field(field_name: &str, type_name: &str) -> Self {
        Self {
            message: format!("unexpected field name: {field_name} in type {type_name}"),
        }
    }
}

impl From<String> for FieldError {
    fn from(message: String) -> Self {
        Self { message }
    }
}

impl From<&str> for FieldError {
    fn from(message: &str) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A concrete GraphQL object whose fields can be resolved during execution.
///
/// The root value passed to [`Execution::execute`][crate::Execution::execute]
/// implements this, as does every object handle returned through
/// [`ResolvedValue::Object`]. JSON objects can be used directly via
/// [`JsonObject`].
pub trait ObjectValue {
    /// The name of the concrete object type this value belongs to, when the
    /// value knows it.
    ///
    /// Consulted when the schema declares an abstract (interface or union)
    /// type. Returning `None` makes the engine fall back to probing
    /// [`is_type_of`][Self::is_type_of] on every possible type of the
    /// abstract type.
    fn type_name(&self) -> Option<&str> {
        None
    }

    /// Whether this value is an instance of the object type named
    /// `type_name`.
    ///
    /// `None` means the check is not implemented for this value. During
    /// abstract-type resolution every possible type is probed and the first
    /// `Some(true)` in schema definition order wins; on a concrete type a
    /// `Some(false)` answer is reported as a field error.
    fn is_type_of(&self, type_name: &str) -> Option<bool> {
        let _ = type_name;
        None
    }

    /// Resolves a field of this object.
    ///
    /// `info.arguments()` is the result of
    /// [CoerceArgumentValues()](https://spec.graphql.org/October2021/#sec-Coercing-Field-Arguments):
    /// its structure matches the argument definitions in the schema. The
    /// resolved value is expected to match the type of the corresponding
    /// field definition.
    ///
    /// This is *not* called for the `__typename`, `__schema` and `__type`
    /// meta-fields: those are handled by the engine.
    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError>;
}

/// The value of a resolved field.
///
/// This is the engine's runtime value model: null and leaves are JSON,
/// composites are [`ObjectValue`] handles, lists iterate lazily, and
/// asynchronous work is a [`Pending`][Self::Pending] future the scheduler
/// suspends on.
pub enum ResolvedValue<'a> {
    /// * JSON null represents GraphQL null
    /// * A GraphQL enum value is represented as a JSON string
    /// * Built-in scalars are checked against their respective *Result Coercion* rules
    /// * For custom scalars, any JSON value is passed through as-is
    Leaf(JsonValue),

    /// Expected where the schema declares an object, interface, or union type
    Object(Box<dyn ObjectValue + 'a>),

    /// Expected for list types
    List(Box<dyn Iterator<Item = Result<ResolvedValue<'a>, FieldError>> + 'a>),

    /// A value that is not available yet. The strand executing this field
    /// suspends until the future settles; the settled value is completed as
    /// usual (and may itself be `Pending` again).
    Pending(LocalBoxFuture<'a, Result<ResolvedValue<'a>, FieldError>>),
}

impl<'a> ResolvedValue<'a> {
    /// Construct a null leaf value.
    pub fn null() -> Self {
        Self::Leaf(JsonValue::Null)
    }

    /// Construct a leaf value from something convertible to JSON.
    pub fn leaf(json: impl Into<JsonValue>) -> Self {
        Self::Leaf(json.into())
    }

    /// Construct an object value.
    pub fn object(object: impl ObjectValue + 'a) -> Self {
        Self::Object(Box::new(object))
    }

    /// Construct an object value or null.
    pub fn opt_object(opt_object: Option<impl ObjectValue + 'a>) -> Self {
        match opt_object {
            Some(object) => Self::Object(Box::new(object)),
            None => Self::null(),
        }
    }

    /// Construct a list value from an iterator of element values.
    ///
    /// If errors can happen during iteration, construct the
    /// [`ResolvedValue::List`] variant directly instead.
    pub fn list<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Self>,
        I::IntoIter: 'a,
    {
        Self::List(Box::new(iter.into_iter().map(Ok)))
    }

    /// Construct a deferred value from a future.
    ///
    /// This is how resolvers hand asynchronous work to the engine.
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<ResolvedValue<'a>, FieldError>> + 'a,
    {
        Self::Pending(Box::pin(future))
    }

    /// Convert a plain JSON value into a resolved value: objects become
    /// [`JsonObject`] handles, arrays become lists, everything else a leaf.
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Object(map) => Self::Object(Box::new(JsonObject(map))),
            JsonValue::Array(items) => {
                Self::List(Box::new(items.into_iter().map(|item| Ok(Self::from_json(item)))))
            }
            leaf => Self::Leaf(leaf),
        }
    }
}

/// A JSON object used directly as a GraphQL object value.
///
/// Fields resolve by key lookup: a key equal to the field name provides the
/// field's value, a missing key resolves to null. The concrete type name, if
/// needed for an abstract position, is read from a `"__typename"` entry.
pub struct JsonObject(pub JsonMap);

impl ObjectValue for JsonObject {
    fn type_name(&self) -> Option<&str> {
        self.0.get("__typename").and_then(JsonValue::as_str)
    }

    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError> {
        match self.0.get(info.field_name()) {
            Some(value) => Ok(ResolvedValue::from_json(value.clone())),
            None => Ok(ResolvedValue::null()),
        }
    }
}

/// Everything a resolver may want to know about the field being resolved.
pub struct ResolveInfo<'a> {
    pub(crate) schema: &'a Valid<Schema>,
    pub(crate) document: &'a Valid<ExecutableDocument>,
    pub(crate) parent_type: &'a Name,
    pub(crate) response_key: &'a Name,
    pub(crate) fields: &'a [&'a Field],
    pub(crate) arguments: &'a JsonMap,
    pub(crate) path: LinkedPath<'a>,
    pub(crate) context: Option<&'a dyn Any>,
}

impl<'a> ResolveInfo<'a> {
    pub fn schema(&self) -> &'a Valid<Schema> {
        self.schema
    }

    pub fn document(&self) -> &'a Valid<ExecutableDocument> {
        self.document
    }

    /// Name of the object type the field is resolved on.
    pub fn parent_type(&self) -> &'a Name {
        self.parent_type
    }

    /// The field name (not the alias).
    pub fn field_name(&self) -> &'a str {
        self.fields[0].name.as_str()
    }

    /// The key under which the completed value appears in the response.
    pub fn response_key(&self) -> &'a str {
        self.response_key.as_str()
    }

    /// All merged occurrences of this field in the selection set.
    pub fn fields(&self) -> &'a [&'a Field] {
        self.fields
    }

    /// Coerced argument values, following the schema's argument definitions.
    pub fn arguments(&self) -> &'a JsonMap {
        self.arguments
    }

    /// The path from the response root to this field.
    pub fn path(&self) -> Vec<PathSegment> {
        crate::response::path_to_vec(self.path)
    }

    /// The context value passed to the execution, downcast to `T`.
    pub fn context<T: 'static>(&self) -> Option<&'a T> {
        self.context.and_then(|context| context.downcast_ref())
    }
}
