//! GraphQL [responses](https://spec.graphql.org/October2021/#sec-Response-Format)
//! and the errors they carry.

use apollo_compiler::parser::SourceMap;
use apollo_compiler::parser::SourceSpan;
use apollo_compiler::Name;
use serde::Serialize;

/// Re-export of the JSON value type used throughout this crate.
///
/// [`serde_json_bytes::Value`] is like `serde_json::Value` but uses
/// reference-counted strings for values and map keys, which makes response
/// trees cheap to share between strands.
pub type JsonValue = serde_json_bytes::Value;

/// A JSON object with string keys, preserving insertion order.
pub type JsonMap = serde_json_bytes::Map<serde_json_bytes::ByteString, JsonValue>;

/// A response to a request that started execution of the selected operation.
///
/// <https://spec.graphql.org/October2021/#sec-Response-Format>
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    // <https://spec.graphql.org/October2021/#note-6f005> suggests serializing errors first
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,

    /// `None` when a field error was propagated all the way to the root.
    /// This serializes as `"data": null`, which is different from a
    /// [request error][RequestError] response that has no `data` entry at all.
    pub data: Option<JsonMap>,
}

/// An [error](https://spec.graphql.org/October2021/#sec-Errors.Error-result-format)
/// as found in the `errors` list of a response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLError {
    pub message: String,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<Location>,

    /// Non-empty for [field errors], locating the field in [`Response::data`].
    ///
    /// [field errors]: https://spec.graphql.org/October2021/#sec-Errors.Field-errors
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub path: Vec<PathSegment>,

    #[serde(skip_serializing_if = "JsonMap::is_empty")]
    pub extensions: JsonMap,
}

/// A source location in the executed document, 1-indexed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    pub line: usize,
    pub column: usize,
}

/// One step of an error path: a response key in an object, or an index in a list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Field(Name),
    ListIndex(usize),
}

impl Serialize for PathSegment {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        match self {
            PathSegment::Field(name) => name.as_str().serialize(serializer),
            PathSegment::ListIndex(index) => index.serialize(serializer),
        }
    }
}

/// Extensions key set on errors that indicate a bug in upstream validation
/// rather than in the request itself.
pub const EXTENSION_SUSPECTED_VALIDATION_BUG: &str = "SUSPECTED_VALIDATION_BUG";

/// Linked-list version of `Vec<PathSegment>`, taking advantage of the call stack:
/// each strand owns the segment for its own field and links to its parent's.
pub(crate) type LinkedPath<'a> = Option<&'a LinkedPathElement<'a>>;

pub(crate) struct LinkedPathElement<'a> {
    pub(crate) element: PathSegment,
    pub(crate) next: LinkedPath<'a>,
}

pub(crate) fn path_to_vec(mut link: LinkedPath<'_>) -> Vec<PathSegment> {
    let mut path = Vec::new();
    while let Some(node) = link {
        path.push(node.element.clone());
        link = node.next;
    }
    path.reverse();
    path
}

impl GraphQLError {
    pub(crate) fn new(
        message: impl Into<String>,
        location: Option<SourceSpan>,
        sources: &SourceMap,
    ) -> Self {
        Self {
            message: message.into(),
            locations: location
                .into_iter()
                .filter_map(|location| location.line_column(sources))
                .map(|lc| Location {
                    line: lc.line,
                    column: lc.column,
                })
                .collect(),
            path: Vec::new(),
            extensions: JsonMap::new(),
        }
    }

    pub(crate) fn field_error(
        message: impl Into<String>,
        path: LinkedPath<'_>,
        location: Option<SourceSpan>,
        sources: &SourceMap,
    ) -> Self {
        let mut err = Self::new(message, location, sources);
        err.path = path_to_vec(path);
        err
    }

    pub(crate) fn suspected_validation_bug(mut self) -> Self {
        self.extensions
            .insert(EXTENSION_SUSPECTED_VALIDATION_BUG, true.into());
        self
    }
}

/// An error raised before execution of selection sets started, indicating that
/// the request as a whole is faulty.
///
/// A request error aborts execution entirely and results in a response with no
/// `data` entry, unlike a [field error] on a non-null field whose enclosing
/// fields are all non-null too: there the propagated `null` reaches the root
/// and the response has `"data": null`.
///
/// [field error]: https://spec.graphql.org/October2021/#sec-Errors.Field-errors
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct RequestError {
    pub(crate) message: String,
    pub(crate) location: Option<SourceSpan>,
    pub(crate) suspected_validation_bug: bool,
}

impl RequestError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            location: None,
            suspected_validation_bug: false,
        }
    }

    pub(crate) fn at(mut self, location: Option<SourceSpan>) -> Self {
        self.location = location;
        self
    }

    pub(crate) fn validation_bug(mut self) -> Self {
        self.suspected_validation_bug = true;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn location(&self) -> Option<SourceSpan> {
        self.location
    }

    pub fn to_graphql_error(&self, sources: &SourceMap) -> GraphQLError {
        let error = GraphQLError::new(&self.message, self.location, sources);
        if self.suspected_validation_bug {
            error.suspected_validation_bug()
        } else {
            error
        }
    }

    /// Re-issue as a field error at the given path, for value-coercion
    /// failures that happen after execution started.
    pub(crate) fn into_field_error(
        self,
        path: LinkedPath<'_>,
        fallback_location: Option<SourceSpan>,
        sources: &SourceMap,
    ) -> GraphQLError {
        let location = self.location.or(fallback_location);
        let mut error = GraphQLError::field_error(self.message, path, location, sources);
        if self.suspected_validation_bug {
            error = error.suspected_validation_bug();
        }
        error
    }
}
