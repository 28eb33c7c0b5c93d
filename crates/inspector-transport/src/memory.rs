//! In-process transport.
//!
//! [`MemoryConnector`] hands out [`MemoryHandle`]s whose far side is a
//! [`RemoteEnd`] owned by the embedding code: it sees every outbound
//! envelope and can inject inbound messages, errors, and remote closes
//! without any I/O. Connect attempts can be scripted to fail or to wait on a
//! [`ConnectGate`].

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use inspector_wire::{CommandEnvelope, InboundMessage};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{
    BoxFuture, Connector, Target, TransportEvent, TransportHandle, TransportListener,
};

/// Scripted outcome for one connect attempt.
enum ConnectPlan {
    Accept,
    Refuse(String),
    Gated(oneshot::Receiver<()>),
}

#[derive(Default)]
struct ConnectorState {
    plans: VecDeque<ConnectPlan>,
    remotes: Vec<RemoteEnd>,
    attempts: usize,
}

/// Connector producing in-memory channels.
///
/// Attempts with no scripted plan are accepted immediately.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    state: Arc<Mutex<ConnectorState>>,
}

/// Releases a gated connect attempt.
pub struct ConnectGate {
    release: oneshot::Sender<()>,
}

impl ConnectGate {
    /// Let the gated attempt complete successfully.
    pub fn open(self) {
        let _ = self.release.send(());
    }
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next unscripted attempt with `reason`.
    pub fn refuse_next(&self, reason: impl Into<String>) {
        self.state
            .lock()
            .plans
            .push_back(ConnectPlan::Refuse(reason.into()));
    }

    /// Accept the next unscripted attempt immediately.
    pub fn accept_next(&self) {
        self.state.lock().plans.push_back(ConnectPlan::Accept);
    }

    /// Hold the next unscripted attempt until the returned gate is opened.
    ///
    /// Dropping the gate without opening it fails the attempt.
    pub fn gate_next(&self) -> ConnectGate {
        let (release, wait) = oneshot::channel();
        self.state.lock().plans.push_back(ConnectPlan::Gated(wait));
        ConnectGate { release }
    }

    /// Number of connect attempts seen so far.
    pub fn attempts(&self) -> usize {
        self.state.lock().attempts
    }

    /// Remote ends of every channel established so far, oldest first.
    pub fn remotes(&self) -> Vec<RemoteEnd> {
        self.state.lock().remotes.clone()
    }

    /// Remote end of the most recently established channel.
    pub fn last_remote(&self) -> Option<RemoteEnd> {
        self.state.lock().remotes.last().cloned()
    }
}

impl Connector for MemoryConnector {
    fn connect(
        &self,
        target: &Target,
        listener: Arc<dyn TransportListener>,
    ) -> BoxFuture<'static, Result<Box<dyn TransportHandle>>> {
        let plan = {
            let mut state = self.state.lock();
            state.attempts += 1;
            state.plans.pop_front().unwrap_or(ConnectPlan::Accept)
        };
        let state = self.state.clone();
        let target = target.clone();

        Box::pin(async move {
            match plan {
                ConnectPlan::Accept => {}
                ConnectPlan::Refuse(reason) => {
                    return Err(refused(&target, reason));
                }
                ConnectPlan::Gated(wait) => {
                    if wait.await.is_err() {
                        return Err(refused(&target, "connect gate dropped".to_string()));
                    }
                }
            }

            let remote = RemoteEnd::new(target.clone(), listener);
            state.lock().remotes.push(remote.clone());
            debug!(%target, "in-memory channel established");
            Ok(Box::new(MemoryHandle { remote }) as Box<dyn TransportHandle>)
        })
    }
}

fn refused(target: &Target, reason: String) -> TransportError {
    TransportError::Connect {
        target: target.to_string(),
        source: io::Error::new(io::ErrorKind::ConnectionRefused, reason),
    }
}

struct RemoteShared {
    target: Target,
    listener: Arc<dyn TransportListener>,
    sent: Mutex<Vec<Bytes>>,
    closed_locally: AtomicBool,
    closed_remotely: AtomicBool,
    reject_sends: AtomicBool,
}

/// The endpoint side of an in-memory channel.
#[derive(Clone)]
pub struct RemoteEnd {
    shared: Arc<RemoteShared>,
}

impl RemoteEnd {
    fn new(target: Target, listener: Arc<dyn TransportListener>) -> Self {
        Self {
            shared: Arc::new(RemoteShared {
                target,
                listener,
                sent: Mutex::new(Vec::new()),
                closed_locally: AtomicBool::new(false),
                closed_remotely: AtomicBool::new(false),
                reject_sends: AtomicBool::new(false),
            }),
        }
    }

    pub fn target(&self) -> &Target {
        &self.shared.target
    }

    /// Raw payloads received from the client, in order.
    pub fn sent(&self) -> Vec<Bytes> {
        self.shared.sent.lock().clone()
    }

    /// Outbound payloads decoded as command envelopes; undecodable ones are skipped.
    pub fn sent_commands(&self) -> Vec<CommandEnvelope> {
        self.shared
            .sent
            .lock()
            .iter()
            .filter_map(|payload| CommandEnvelope::from_slice(payload).ok())
            .collect()
    }

    /// Deliver an inbound message to the client.
    pub fn deliver(&self, message: &InboundMessage) -> Result<()> {
        let payload = message.to_vec()?;
        self.deliver_raw(payload);
        Ok(())
    }

    /// Deliver raw bytes as one inbound envelope.
    pub fn deliver_raw(&self, payload: impl Into<Bytes>) {
        self.shared
            .listener
            .on_event(TransportEvent::Message(payload.into()));
    }

    /// Report a channel error to the client.
    pub fn fail(&self, reason: impl Into<String>) {
        let err = io::Error::new(io::ErrorKind::BrokenPipe, reason.into());
        self.shared
            .listener
            .on_event(TransportEvent::Error(TransportError::Io(err)));
    }

    /// Close the channel from the endpoint side.
    pub fn close(&self) {
        if !self.shared.closed_remotely.swap(true, Ordering::SeqCst) {
            self.shared.listener.on_event(TransportEvent::Closed);
        }
    }

    /// Make subsequent client sends fail with [`TransportError::Shutdown`].
    pub fn reject_sends(&self, reject: bool) {
        self.shared.reject_sends.store(reject, Ordering::SeqCst);
    }

    /// Whether the client closed its handle.
    pub fn closed_by_client(&self) -> bool {
        self.shared.closed_locally.load(Ordering::SeqCst)
    }
}

/// Client side of an in-memory channel.
pub struct MemoryHandle {
    remote: RemoteEnd,
}

impl TransportHandle for MemoryHandle {
    fn send(&mut self, payload: Bytes) -> Result<()> {
        let shared = &self.remote.shared;
        if shared.closed_locally.load(Ordering::SeqCst)
            || shared.closed_remotely.load(Ordering::SeqCst)
            || shared.reject_sends.load(Ordering::SeqCst)
        {
            return Err(TransportError::Shutdown);
        }
        shared.sent.lock().push(payload);
        Ok(())
    }

    fn close(&mut self) {
        self.remote
            .shared
            .closed_locally
            .store(true, Ordering::SeqCst);
    }

    fn transport_name(&self) -> &'static str {
        "in-memory"
    }
}
