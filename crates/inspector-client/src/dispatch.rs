//! Command correlation.
//!
//! Every sent command gets a fresh id and a continuation parked in the
//! [`CorrelationTable`]. The continuation runs at most once: when a response
//! with that id arrives, when the send itself fails, or when pending
//! commands are rejected. Ids start at 1 and are never reused for the
//! lifetime of a client.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde_json::Value;
use tokio::sync::oneshot;

use crate::error::ClientError;

/// Outcome delivered to a command's continuation.
pub type CommandResult = std::result::Result<CommandResponse, ClientError>;

/// Callback receiving a command's outcome.
pub type Continuation = Box<dyn FnOnce(CommandResult) + Send>;

/// A command's response.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandResponse {
    id: u64,
    result: Value,
}

impl CommandResponse {
    pub fn new(id: u64, result: Value) -> Self {
        Self { id, result }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// The response's `result` payload. Object payloads lacking a nested
    /// `result` carry the `{"type":"undefined"}` marker in its place.
    pub fn result(&self) -> &Value {
        &self.result
    }

    /// The nested `result` of an object payload, or the whole payload for
    /// any other shape.
    pub fn value(&self) -> &Value {
        match &self.result {
            Value::Object(map) => map.get("result").unwrap_or(&self.result),
            other => other,
        }
    }

    pub fn into_result(self) -> Value {
        self.result
    }
}

pub(crate) struct PendingCall {
    pub(crate) method: String,
    pub(crate) continuation: Continuation,
}

/// Pending commands by id.
pub(crate) struct CorrelationTable {
    next_id: u64,
    pending: HashMap<u64, PendingCall>,
}

impl Default for CorrelationTable {
    fn default() -> Self {
        Self {
            next_id: 1,
            pending: HashMap::new(),
        }
    }
}

impl CorrelationTable {
    /// Allocate the next id and park `continuation` under it.
    pub(crate) fn register(&mut self, method: String, continuation: Continuation) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.pending.insert(
            id,
            PendingCall {
                method,
                continuation,
            },
        );
        id
    }

    /// Remove and return the entry for `id`.
    pub(crate) fn take(&mut self, id: u64) -> Option<PendingCall> {
        self.pending.remove(&id)
    }

    /// Remove every entry, oldest id first.
    pub(crate) fn drain(&mut self) -> Vec<(u64, PendingCall)> {
        let mut drained: Vec<_> = self.pending.drain().collect();
        drained.sort_by_key(|(id, _)| *id);
        drained
    }

    pub(crate) fn ids(&self) -> Vec<u64> {
        let mut ids: Vec<u64> = self.pending.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }
}

/// Future resolving to a command's outcome.
///
/// Resolves with [`ClientError::NotConnected`] if the command was never
/// sent, and with [`ClientError::ConnectionClosed`] if the client went away
/// while the command was pending.
#[must_use = "a CommandCall does nothing unless awaited"]
#[derive(Debug)]
pub struct CommandCall {
    id: Option<u64>,
    warnings: Vec<ClientError>,
    rx: oneshot::Receiver<CommandResult>,
}

impl CommandCall {
    pub(crate) fn channel() -> (Continuation, Self) {
        let (tx, rx) = oneshot::channel();
        let continuation: Continuation = Box::new(move |outcome| {
            let _ = tx.send(outcome);
        });
        let call = Self {
            id: None,
            warnings: Vec::new(),
            rx,
        };
        (continuation, call)
    }

    /// A call that has already failed.
    pub(crate) fn failed(err: ClientError) -> Self {
        let (continuation, call) = Self::channel();
        continuation(Err(err));
        call
    }

    pub(crate) fn with_id(mut self, id: Option<u64>) -> Self {
        self.id = id;
        self
    }

    pub(crate) fn with_warnings(mut self, warnings: Vec<ClientError>) -> Self {
        self.warnings = warnings;
        self
    }

    /// Correlation id, if the command was handed to a transport.
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Argument problems found while binding the call.
    pub fn warnings(&self) -> &[ClientError] {
        &self.warnings
    }
}

impl Future for CommandCall {
    type Output = CommandResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let sent = self.id.is_some();
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) if sent => Poll::Ready(Err(ClientError::ConnectionClosed)),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ClientError::NotConnected)),
            Poll::Pending => Poll::Pending,
        }
    }
}
