//! Runtime GraphQL query execution over [`apollo-compiler`] schemas and
//! executable documents.
//!
//! The engine walks an operation's selection sets into merged field groups,
//! runs one cooperative *strand* per field (a future that resolves the field,
//! then completes its value, recursing into child selections), and assembles
//! the response tree with spec-compliant error handling and null
//! propagation. Resolvers supply values through the [`ObjectValue`] trait;
//! asynchronous work is handed over as [`ResolvedValue::pending`] futures
//! that strands suspend on.
//!
//! Queries execute their fields cooperatively; mutation root fields run
//! strictly one after another. A request without asynchronous resolvers
//! completes synchronously, which is what [`Execution::execute_sync`]
//! checks.
//!
//! [`apollo-compiler`]: https://crates.io/crates/apollo-compiler
//!
//! # Example
//!
//! ```
//! use apollo_compiler::ExecutableDocument;
//! use apollo_compiler::Schema;
//! use graphql_strand::Execution;
//! use graphql_strand::JsonObject;
//! use serde_json_bytes::json;
//!
//! let schema = Schema::parse_and_validate(
//!     "type Query { hello: String }",
//!     "schema.graphql",
//! ).unwrap();
//! let document = ExecutableDocument::parse_and_validate(
//!     &schema,
//!     "{ hello }",
//!     "query.graphql",
//! ).unwrap();
//!
//! let root = JsonObject(json!({ "hello": "world" }).as_object().unwrap().clone());
//! let response = Execution::new(&schema, &document).execute_sync(&root).unwrap();
//! assert_eq!(
//!     serde_json::to_string(&response).unwrap(),
//!     r#"{"data":{"hello":"world"}}"#,
//! );
//! ```

mod collect;
mod engine;
mod input_coercion;
mod introspection;
mod resolver;
mod response;
mod result_coercion;
mod strand;

pub use crate::input_coercion::VariableValues;
pub use crate::resolver::FieldError;
pub use crate::resolver::JsonObject;
pub use crate::resolver::ObjectValue;
pub use crate::resolver::ResolveInfo;
pub use crate::resolver::ResolvedValue;
pub use crate::response::GraphQLError;
pub use crate::response::JsonMap;
pub use crate::response::JsonValue;
pub use crate::response::Location;
pub use crate::response::PathSegment;
pub use crate::response::RequestError;
pub use crate::response::Response;
pub use crate::response::EXTENSION_SUSPECTED_VALIDATION_BUG;

use crate::engine::ExecutionContext;
use crate::engine::ExecutionMode;
use apollo_compiler::executable::OperationType;
use apollo_compiler::validation::Valid;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use futures::FutureExt;
use std::any::Any;

/// Error from [`Execution::execute_sync`].
#[derive(Debug, thiserror::Error)]
pub enum ExecuteSyncError {
    #[error(transparent)]
    Request(#[from] RequestError),
    /// A resolver returned a pending value that did not settle immediately.
    #[error("execution suspended on an asynchronous resolver")]
    Suspended,
}

/// Prepared execution of one operation of a document against a schema.
///
/// The schema and document are expected to be valid; execution of an invalid
/// request does not panic, but reports whatever it cannot make sense of as
/// errors in the response.
pub struct Execution<'a> {
    schema: &'a Valid<Schema>,
    document: &'a Valid<ExecutableDocument>,
    operation_name: Option<&'a str>,
    variables: Option<&'a JsonMap>,
    context: Option<&'a dyn Any>,
}

impl<'a> Execution<'a> {
    pub fn new(schema: &'a Valid<Schema>, document: &'a Valid<ExecutableDocument>) -> Self {
        Self {
            schema,
            document,
            operation_name: None,
            variables: None,
            context: None,
        }
    }

    /// Select the operation to execute by name.
    ///
    /// Without this, the document must contain exactly one operation.
    pub fn operation_name(mut self, name: &'a str) -> Self {
        self.operation_name = Some(name);
        self
    }

    /// Raw variable values; coerced against the operation's variable
    /// definitions when execution starts.
    pub fn variables(mut self, variables: &'a JsonMap) -> Self {
        self.variables = Some(variables);
        self
    }

    /// An arbitrary value made available to every resolver through
    /// [`ResolveInfo::context`].
    pub fn context(mut self, context: &'a dyn Any) -> Self {
        self.context = Some(context);
        self
    }

    /// Execute the operation with `root_value` as the initial object value.
    ///
    /// `Err` is a [request error][RequestError]: the operation could not be
    /// selected, a variable failed to coerce, or the root operation type is
    /// unusable. Everything after that point is reported through
    /// [`Response::errors`] instead.
    pub async fn execute(&self, root_value: &dyn ObjectValue) -> Result<Response, RequestError> {
        let operation = self
            .document
            .operations
            .get(self.operation_name)
            .map_err(|_| {
                if let Some(name) = self.operation_name {
                    RequestError::new(format!("no operation named '{name}'"))
                } else {
                    RequestError::new("multiple operations but no `operationName`")
                }
            })?;
        let (root, mode, kind) = match operation.operation_type {
            OperationType::Query => (
                self.schema.schema_definition.query.as_ref(),
                ExecutionMode::Normal,
                "query",
            ),
            OperationType::Mutation => (
                self.schema.schema_definition.mutation.as_ref(),
                ExecutionMode::Sequential,
                "mutation",
            ),
            OperationType::Subscription => {
                return Err(RequestError::new("subscription operations are not supported"))
            }
        };
        let Some(root_name) = root else {
            return Err(RequestError::new(format!(
                "schema does not define a {kind} root operation type"
            )));
        };
        let Some(object_type) = self.schema.get_object(root_name.name.as_str()) else {
            return Err(RequestError::new(format!(
                "root operation type {} is not an object type",
                root_name.name
            ))
            .validation_bug());
        };
        let empty = JsonMap::new();
        let variables = VariableValues::coerce(
            self.schema,
            operation,
            self.variables.unwrap_or(&empty),
        )?;
        let ctx = ExecutionContext {
            schema: self.schema,
            document: self.document,
            variables: &variables,
            context_value: self.context,
        };
        Ok(engine::execute_root_selection_set(ctx, mode, object_type, root_value, operation).await)
    }

    /// Execute the operation, requiring it to complete without suspending.
    ///
    /// Returns [`ExecuteSyncError::Suspended`] if any resolver produced a
    /// pending value that was not immediately ready; nothing is blocked on.
    pub fn execute_sync(&self, root_value: &dyn ObjectValue) -> Result<Response, ExecuteSyncError> {
        match self.execute(root_value).now_or_never() {
            Some(result) => Ok(result?),
            None => Err(ExecuteSyncError::Suspended),
        }
    }
}
