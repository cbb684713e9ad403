//! The strand scheduler.
//!
//! A *strand* is the execution of one collected field group: resolve the
//! field, then complete the value, recursing into child selection sets. Each
//! strand is a boxed future; the only suspension points are awaits on
//! [`ResolvedValue::Pending`][crate::ResolvedValue::Pending] values, so a
//! request without asynchronous resolvers never leaves the current call
//! stack.
//!
//! Strands queue in collection order and drain in one of two disciplines:
//! concurrently for normal execution, where every strand makes progress as
//! its pending values settle, or serially for mutation root fields, where a
//! strand is not polled until its predecessor has fully finished. Either way
//! the outcomes come back in queue order, which keeps response keys and
//! error order deterministic.

use crate::engine::ExecutionMode;
use crate::engine::PropagateNull;
use crate::response::GraphQLError;
use crate::response::JsonValue;
use apollo_compiler::schema::Name;
use futures::future::join_all;
use futures::future::LocalBoxFuture;
use std::future::Future;

/// What a finished strand hands back to its selection set.
pub(crate) struct StrandOutput<'a> {
    pub(crate) response_key: &'a Name,
    pub(crate) value: Result<JsonValue, PropagateNull>,
    /// Errors are buffered per strand and merged in queue order, so the
    /// error list does not depend on settlement timing.
    pub(crate) errors: Vec<GraphQLError>,
}

/// FIFO queue of the strands spawned for one selection set.
pub(crate) struct Strands<'a> {
    queue: Vec<LocalBoxFuture<'a, StrandOutput<'a>>>,
}

impl<'a> Strands<'a> {
    pub(crate) fn new() -> Self {
        Self { queue: Vec::new() }
    }

    pub(crate) fn spawn(&mut self, strand: impl Future<Output = StrandOutput<'a>> + 'a) {
        self.queue.push(Box::pin(strand));
    }

    pub(crate) fn len(&self) -> usize {
        self.queue.len()
    }

    /// Run every queued strand to completion.
    ///
    /// `Normal` drives all strands cooperatively and a failing strand never
    /// cancels its peers. `Sequential` holds each strand back until the
    /// previous one has settled every value it produced, giving mutation
    /// root fields their serial semantics.
    pub(crate) async fn drain(self, mode: ExecutionMode) -> Vec<StrandOutput<'a>> {
        match mode {
            ExecutionMode::Normal => join_all(self.queue).await,
            ExecutionMode::Sequential => {
                let mut outputs = Vec::with_capacity(self.queue.len());
                for strand in self.queue {
                    outputs.push(strand.await);
                }
                outputs
            }
        }
    }
}
