//! Scheduling, null propagation, and abstract-type resolution behavior.

use apollo_compiler::name;
use apollo_compiler::validation::Valid;
use apollo_compiler::ExecutableDocument;
use apollo_compiler::Schema;
use futures::executor::block_on;
use graphql_strand::ExecuteSyncError;
use graphql_strand::Execution;
use graphql_strand::FieldError;
use graphql_strand::JsonObject;
use graphql_strand::JsonValue;
use graphql_strand::ObjectValue;
use graphql_strand::PathSegment;
use graphql_strand::ResolveInfo;
use graphql_strand::ResolvedValue;
use graphql_strand::Response;
use serde_json_bytes::json;
use std::cell::RefCell;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::Context;
use std::task::Poll;

/// Ready on the second poll; proves a value actually went through a
/// suspension point.
#[derive(Default)]
struct YieldOnce {
    yielded: bool,
}

impl Future for YieldOnce {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            Poll::Ready(())
        } else {
            self.yielded = true;
            cx.waker().wake_by_ref();
            Poll::Pending
        }
    }
}

fn parse(schema_sdl: &str, query: &str) -> (Valid<Schema>, Valid<ExecutableDocument>) {
    let schema = Schema::parse_and_validate(schema_sdl, "schema.graphql").unwrap();
    let document =
        ExecutableDocument::parse_and_validate(&schema, query, "query.graphql").unwrap();
    (schema, document)
}

fn data_json(response: &Response) -> String {
    serde_json::to_string(&response.data).unwrap()
}

const COUNTER_SDL: &str = r#"
    type Query {
        getX(to: Int!): Int
        ready: Int
        greeting: String
    }
    type Mutation {
        setX(to: Int!): Int
    }
    type Subscription {
        ticks: Int
    }
"#;

/// Records resolver start and thenable settlement per field.
#[derive(Default)]
struct CounterRoot {
    log: RefCell<Vec<String>>,
}

impl ObjectValue for CounterRoot {
    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError> {
        match info.field_name() {
            "getX" | "setX" => {
                let to = info.arguments().get("to").and_then(JsonValue::as_i64).unwrap();
                self.log.borrow_mut().push(format!("start {to}"));
                let log = &self.log;
                Ok(ResolvedValue::pending(async move {
                    YieldOnce::default().await;
                    log.borrow_mut().push(format!("end {to}"));
                    Ok(ResolvedValue::leaf(to))
                }))
            }
            "ready" => Ok(ResolvedValue::pending(async { Ok(ResolvedValue::leaf(7)) })),
            other => Err(FieldError::unknown_field(other, "Query")),
        }
    }
}

#[test]
fn mutation_root_fields_run_serially() {
    let (schema, document) = parse(COUNTER_SDL, "mutation { a: setX(to: 1) b: setX(to: 2) }");
    let root = CounterRoot::default();
    let response = block_on(Execution::new(&schema, &document).execute(&root)).unwrap();
    assert!(response.errors.is_empty());
    assert_eq!(data_json(&response), r#"{"a":1,"b":2}"#);
    // b's resolver does not start until a's pending value has settled
    assert_eq!(
        *root.log.borrow(),
        ["start 1", "end 1", "start 2", "end 2"]
    );
}

#[test]
fn query_fields_interleave_across_suspension_points() {
    let (schema, document) = parse(COUNTER_SDL, "{ a: getX(to: 1) b: getX(to: 2) }");
    let root = CounterRoot::default();
    let response = block_on(Execution::new(&schema, &document).execute(&root)).unwrap();
    assert!(response.errors.is_empty());
    assert_eq!(data_json(&response), r#"{"a":1,"b":2}"#);
    // both resolvers start before either pending value settles
    assert_eq!(
        *root.log.borrow(),
        ["start 1", "start 2", "end 1", "end 2"]
    );
}

#[test]
fn execute_sync_refuses_suspended_executions() {
    let (schema, document) = parse(COUNTER_SDL, "{ getX(to: 1) }");
    let root = CounterRoot::default();
    let err = Execution::new(&schema, &document)
        .execute_sync(&root)
        .unwrap_err();
    assert!(matches!(err, ExecuteSyncError::Suspended));
}

#[test]
fn execute_sync_accepts_immediately_ready_pending_values() {
    let (schema, document) = parse(COUNTER_SDL, "{ ready }");
    let root = CounterRoot::default();
    let response = Execution::new(&schema, &document).execute_sync(&root).unwrap();
    assert!(response.errors.is_empty());
    assert_eq!(data_json(&response), r#"{"ready":7}"#);
}

const FENCE_SDL: &str = r#"
    type Query { q: Q, must: Int! }
    type Q { required: R! }
    type R { value: Int }
"#;

#[test]
fn null_for_non_nullable_field_nulls_the_nearest_nullable_ancestor() {
    let (schema, document) = parse(FENCE_SDL, "{ q { required { value } } }");
    let root = JsonObject(json!({ "q": { "required": null } }).as_object().unwrap().clone());
    let response = Execution::new(&schema, &document).execute_sync(&root).unwrap();
    assert_eq!(data_json(&response), r#"{"q":null}"#);
    assert_eq!(response.errors.len(), 1);
    let error = &response.errors[0];
    assert_eq!(
        error.message,
        "Cannot return null for non-nullable field Q.required."
    );
    assert_eq!(
        error.path,
        [
            PathSegment::Field(name!("q")),
            PathSegment::Field(name!("required")),
        ]
    );
}

#[test]
fn null_for_non_nullable_root_field_nulls_the_whole_data() {
    let (schema, document) = parse(FENCE_SDL, "{ must }");
    let root = JsonObject(json!({ "must": null }).as_object().unwrap().clone());
    let response = Execution::new(&schema, &document).execute_sync(&root).unwrap();
    assert!(response.data.is_none());
    assert_eq!(
        serde_json::to_string(&response.data).unwrap(),
        "null"
    );
    assert_eq!(response.errors.len(), 1);
    assert_eq!(
        response.errors[0].message,
        "Cannot return null for non-nullable field Query.must."
    );
}

#[test]
fn a_failing_sibling_does_not_discard_other_errors() {
    let (schema, document) = parse(
        FENCE_SDL,
        "{ first: must second: q { required { value } } }",
    );
    // `must` propagates to the root; `q`'s error must still be reported
    let root = JsonObject(
        json!({ "must": null, "q": { "required": null } })
            .as_object()
            .unwrap()
            .clone(),
    );
    let response = Execution::new(&schema, &document).execute_sync(&root).unwrap();
    assert!(response.data.is_none());
    let messages: Vec<&str> = response
        .errors
        .iter()
        .map(|error| error.message.as_str())
        .collect();
    assert_eq!(
        messages,
        [
            "Cannot return null for non-nullable field Query.must.",
            "Cannot return null for non-nullable field Q.required.",
        ]
    );
}

const UNION_SDL: &str = r#"
    union Pick = A | B | C
    type A { a: Int }
    type B { b: Int }
    type C { c: Int }
    type Query { pick: Pick }
"#;

struct Mystery {
    probes: Rc<RefCell<Vec<String>>>,
}

impl ObjectValue for Mystery {
    // No type name: forces the engine onto the probing path
    fn is_type_of(&self, type_name: &str) -> Option<bool> {
        self.probes.borrow_mut().push(type_name.to_owned());
        Some(type_name == "B")
    }

    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError> {
        match info.field_name() {
            "b" => Ok(ResolvedValue::leaf(42)),
            other => Err(FieldError::unknown_field(other, "B")),
        }
    }
}

struct PickRoot {
    probes: Rc<RefCell<Vec<String>>>,
}

impl ObjectValue for PickRoot {
    fn resolve_field<'a>(
        &'a self,
        info: &ResolveInfo<'a>,
    ) -> Result<ResolvedValue<'a>, FieldError> {
        match info.field_name() {
            "pick" => Ok(ResolvedValue::object(Mystery {
                probes: Rc::clone(&self.probes),
            })),
            other => Err(FieldError::unknown_field(other, "Query")),
        }
    }
}

#[test]
fn abstract_resolution_probes_every_possible_type_once() {
    let (schema, document) = parse(UNION_SDL, "{ pick { __typename b } }");
    let probes = Rc::new(RefCell::new(Vec::new()));
    let root = PickRoot {
        probes: Rc::clone(&probes),
    };
    let response = Execution::new(&schema, &document).execute_sync(&root).unwrap();
    assert!(response.errors.is_empty());
    assert_eq!(data_json(&response), r#"{"pick":{"__typename":"B","b":42}}"#);
    // every member probed exactly once, in schema order; B matched but the
    // scan did not stop there
    assert_eq!(*probes.borrow(), ["A", "B", "C"]);
}

const ITEMS_SDL: &str = r#"
    type Query { items: [Item] }
    type Item { name: String }
"#;

#[test]
fn child_collection_runs_once_across_list_siblings() {
    let schema = Schema::parse_and_validate(ITEMS_SDL, "schema.graphql").unwrap();
    // The unknown fragment is a collection-time error: reported once even
    // though three siblings execute the same selection set
    let document = ExecutableDocument::parse(
        &schema,
        "{ items { name ...Missing } }",
        "query.graphql",
    )
    .unwrap();
    let document = Valid::assume_valid(document);
    let root = JsonObject(
        json!({ "items": [{ "name": "one" }, { "name": "two" }, { "name": "three" }] })
            .as_object()
            .unwrap()
            .clone(),
    );
    let response = Execution::new(&schema, &document).execute_sync(&root).unwrap();
    assert_eq!(
        data_json(&response),
        r#"{"items":[{"name":"one"},{"name":"two"},{"name":"three"}]}"#
    );
    let messages: Vec<&str> = response
        .errors
        .iter()
        .map(|error| error.message.as_str())
        .collect();
    assert_eq!(messages, [r#"Unknown fragment "Missing"."#]);
}

#[test]
fn list_element_errors_are_located_by_index() {
    let (schema, document) = parse(ITEMS_SDL, "{ items { name } }");

    struct Failing;
    impl ObjectValue for Failing {
        fn resolve_field<'a>(
            &'a self,
            info: &ResolveInfo<'a>,
        ) -> Result<ResolvedValue<'a>, FieldError> {
            match info.field_name() {
                "items" => Ok(ResolvedValue::List(Box::new(
                    [
                        Ok(ResolvedValue::from_json(json!({ "name": "fine" }))),
                        Err(FieldError::new("broken element")),
                    ]
                    .into_iter(),
                ))),
                other => Err(FieldError::unknown_field(other, "Query")),
            }
        }
    }

    let response = Execution::new(&schema, &document).execute_sync(&Failing).unwrap();
    // an errored element nullifies the whole list value
    assert_eq!(data_json(&response), r#"{"items":null}"#);
    assert_eq!(response.errors.len(), 1);
    let error = &response.errors[0];
    assert_eq!(error.message, "resolver error: broken element");
    assert_eq!(
        error.path,
        [PathSegment::Field(name!("items")), PathSegment::ListIndex(1)]
    );
}

#[test]
fn unknown_operation_name_is_a_request_error() {
    let (schema, document) = parse(COUNTER_SDL, "query A { ready } query B { ready }");
    let root = CounterRoot::default();
    let err = block_on(
        Execution::new(&schema, &document)
            .operation_name("C")
            .execute(&root),
    )
    .unwrap_err();
    assert_eq!(err.message(), "no operation named 'C'");

    let err = block_on(Execution::new(&schema, &document).execute(&root)).unwrap_err();
    assert_eq!(err.message(), "multiple operations but no `operationName`");
}

#[test]
fn missing_non_null_variable_is_a_request_error() {
    let (schema, document) = parse(COUNTER_SDL, "query Q($x: Int!) { getX(to: $x) }");
    let root = CounterRoot::default();
    let err = block_on(Execution::new(&schema, &document).execute(&root)).unwrap_err();
    assert_eq!(err.message(), "missing value for non-null variable 'x'");
}

#[test]
fn subscriptions_are_rejected() {
    let (schema, document) = parse(COUNTER_SDL, "subscription { ticks }");
    let root = CounterRoot::default();
    let err = block_on(Execution::new(&schema, &document).execute(&root)).unwrap_err();
    assert_eq!(err.message(), "subscription operations are not supported");
}

#[test]
fn context_value_reaches_resolvers() {
    struct Greeting;
    impl ObjectValue for Greeting {
        fn resolve_field<'a>(
            &'a self,
            info: &ResolveInfo<'a>,
        ) -> Result<ResolvedValue<'a>, FieldError> {
            match info.field_name() {
                "greeting" => {
                    let greeting: &String = info.context().unwrap();
                    Ok(ResolvedValue::leaf(greeting.as_str()))
                }
                other => Err(FieldError::unknown_field(other, "Query")),
            }
        }
    }

    let (schema, document) = parse(COUNTER_SDL, "{ greeting }");
    let context = "hello".to_owned();
    let response = Execution::new(&schema, &document)
        .context(&context)
        .execute_sync(&Greeting)
        .unwrap();
    assert!(response.errors.is_empty());
    assert_eq!(data_json(&response), r#"{"greeting":"hello"}"#);
}
