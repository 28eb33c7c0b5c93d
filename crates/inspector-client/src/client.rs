use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use bytes::Bytes;
use inspector_schema::{CommandDescriptor, ProtocolSchema};
use inspector_transport::{Connector, Target, TransportEvent, TransportHandle, TransportListener};
use inspector_wire::CommandEnvelope;
use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};
use tokio::sync::{oneshot, Notify};
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

use crate::binder::{bind_arguments, Bindings, BoundArguments, BoundCommand, DomainHandle, Invocation};
use crate::config::ClientConfig;
use crate::dispatch::{CommandCall, CommandResult, Continuation, CorrelationTable};
use crate::error::{ClientError, Result};
use crate::events::{
    EventKey, EventListener, EventSubscribers, Notification, NotificationKind,
    NotificationListener, NotificationSubscribers,
};

/// Lifecycle of the client's single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Outstanding `connect_to_target` request.
struct ConnectIntent {
    serial: u64,
    done: oneshot::Sender<Result<()>>,
    task: Option<AbortHandle>,
}

impl ConnectIntent {
    fn cancel(self) {
        debug!(serial = self.serial, "cancelling superseded connect attempt");
        let _ = self.done.send(Err(ClientError::Cancelled));
        if let Some(task) = self.task {
            task.abort();
        }
    }
}

struct Link {
    state: ConnectionState,
    handle: Option<Box<dyn TransportHandle>>,
    /// Bumped on every connect attempt and teardown. Transport notifications
    /// carrying an older generation are dropped.
    generation: u64,
    intent_serial: u64,
    intent: Option<ConnectIntent>,
}

pub(crate) struct Shared {
    pub(crate) config: ClientConfig,
    connector: Arc<dyn Connector>,
    link: Mutex<Link>,
    /// Signalled whenever `Link::generation` moves.
    generation_moved: Notify,
    pub(crate) table: Mutex<CorrelationTable>,
    pub(crate) events: EventSubscribers,
    pub(crate) notifications: NotificationSubscribers,
    bindings: RwLock<Option<Arc<Bindings>>>,
}

/// Client for a remote debugging endpoint.
///
/// One client owns at most one channel at a time. Commands are sent as
/// `sendCommand` envelopes and correlated with their responses by id;
/// unsolicited events are fanned out to listeners registered per
/// `(domain, event)`. Cloning is cheap and every clone drives the same
/// channel.
///
/// Listeners and continuations run on whichever thread delivered the
/// inbound message, with no client lock held.
#[derive(Clone)]
pub struct Client {
    shared: Arc<Shared>,
}

impl Client {
    pub fn new(connector: impl Connector) -> Self {
        Self::with_config(connector, ClientConfig::default())
    }

    pub fn with_config(connector: impl Connector, config: ClientConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                connector: Arc::new(connector),
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    handle: None,
                    generation: 0,
                    intent_serial: 0,
                    intent: None,
                }),
                generation_moved: Notify::new(),
                table: Mutex::new(CorrelationTable::default()),
                events: EventSubscribers::default(),
                notifications: NotificationSubscribers::default(),
                bindings: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    // -- protocol description --------------------------------------------

    /// Install command bindings for `schema`, replacing any previous ones.
    pub fn init(&self, schema: ProtocolSchema) -> Arc<Bindings> {
        let domains = schema.domains().len();
        let commands = schema.command_count();
        let bindings = Arc::new(Bindings::bind(Arc::new(schema)));
        *self.shared.bindings.write() = Some(bindings.clone());
        info!(domains, commands, "protocol bindings installed");
        bindings
    }

    /// Parse a protocol document and install its bindings.
    pub fn init_from_str(&self, source: &str) -> Result<Arc<Bindings>> {
        let schema = ProtocolSchema::load(source)?;
        Ok(self.init(schema))
    }

    pub fn bindings(&self) -> Option<Arc<Bindings>> {
        self.shared.bindings.read().clone()
    }

    /// Bound command `domain.name`.
    pub fn command(&self, domain: &str, name: &str) -> Result<BoundCommand> {
        let bindings = self.bindings().ok_or(ClientError::NotInitialized)?;
        let descriptor = bindings
            .command(domain, name)
            .cloned()
            .ok_or_else(|| ClientError::UnknownCommand {
                method: format!("{domain}.{name}"),
            })?;
        Ok(BoundCommand::new(self.clone(), descriptor))
    }

    /// Handle for `domain`, if the loaded description declares it.
    pub fn domain(&self, name: &str) -> Option<DomainHandle> {
        let bindings = self.bindings()?;
        bindings
            .has_domain(name)
            .then(|| DomainHandle::new(self.clone(), name.to_string()))
    }

    /// Invoke `domain.command` with positional arguments.
    pub fn call<I>(&self, domain: &str, command: &str, args: I) -> CommandCall
    where
        I: IntoIterator<Item = Option<Value>>,
    {
        match self.command(domain, command) {
            Ok(bound) => bound.invoke(args),
            Err(err) => CommandCall::failed(err),
        }
    }

    /// Callback form of [`Client::call`]. Lookup failures reach `callback`
    /// immediately.
    pub fn call_with<I, F>(&self, domain: &str, command: &str, args: I, callback: F) -> Invocation
    where
        I: IntoIterator<Item = Option<Value>>,
        F: FnOnce(CommandResult) + Send + 'static,
    {
        match self.command(domain, command) {
            Ok(bound) => bound.invoke_with(args, callback),
            Err(err) => {
                callback(Err(err));
                Invocation {
                    id: None,
                    warnings: Vec::new(),
                }
            }
        }
    }

    pub(crate) fn invoke_descriptor(
        &self,
        descriptor: &CommandDescriptor,
        args: impl IntoIterator<Item = Option<Value>>,
        continuation: Continuation,
    ) -> Invocation {
        let BoundArguments { params, missing } = bind_arguments(descriptor, args);
        for err in &missing {
            warn!(error = %err, "argument check failed");
        }

        if self.shared.config.strict_arguments {
            if let Some(first) = missing.first() {
                continuation(Err(first.clone()));
                return Invocation {
                    id: None,
                    warnings: missing,
                };
            }
        }

        let id = self.shared.dispatch(descriptor.method(), params, continuation);
        Invocation {
            id,
            warnings: missing,
        }
    }

    // -- raw dispatch ----------------------------------------------------

    /// Send `method` with an explicit parameter object.
    ///
    /// While disconnected nothing is sent and the call resolves with
    /// [`ClientError::NotConnected`].
    pub fn send_command(&self, method: impl Into<String>, params: Map<String, Value>) -> CommandCall {
        let (continuation, call) = CommandCall::channel();
        let id = self.shared.dispatch(method.into(), params, continuation);
        call.with_id(id)
    }

    /// Callback form of [`Client::send_command`]. Returns the correlation id,
    /// or `None` if nothing was sent; in that case `callback` is dropped
    /// without being called.
    pub fn send_command_with<F>(
        &self,
        method: impl Into<String>,
        params: Map<String, Value>,
        callback: F,
    ) -> Option<u64>
    where
        F: FnOnce(CommandResult) + Send + 'static,
    {
        self.shared
            .dispatch(method.into(), params, Box::new(callback))
    }

    /// Ids of commands still awaiting a response, ascending.
    pub fn pending_ids(&self) -> Vec<u64> {
        self.shared.table.lock().ids()
    }

    pub fn pending_count(&self) -> usize {
        self.shared.table.lock().len()
    }

    /// Fail every pending command with [`ClientError::Rejected`]. Returns how
    /// many were failed.
    pub fn reject_pending(&self, reason: &str) -> usize {
        self.shared
            .fail_pending(ClientError::Rejected(reason.to_string()))
    }

    // -- listeners -------------------------------------------------------

    /// Register a client-level notification listener.
    pub fn on(&self, kind: NotificationKind, listener: NotificationListener) -> bool {
        self.shared.notifications.add(kind, listener)
    }

    pub fn off(&self, kind: NotificationKind, listener: &NotificationListener) -> bool {
        self.shared.notifications.remove(&kind, listener)
    }

    /// Register a listener for `domain.event`.
    pub fn on_event(&self, domain: &str, event: &str, listener: EventListener) -> bool {
        self.shared
            .events
            .add(EventKey::new(domain, event), listener)
    }

    pub fn off_event(&self, domain: &str, event: &str, listener: &EventListener) -> bool {
        self.shared
            .events
            .remove(&EventKey::new(domain, event), listener)
    }

    // -- lifecycle -------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.shared.link.lock().state
    }

    /// Whether a channel is currently open.
    pub fn connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Close any open channel, then open one to `target`.
    ///
    /// Resolves once the channel is open. A failure is also published as an
    /// `error` notification. If another connect or a disconnect overtakes
    /// this attempt, it resolves with [`ClientError::Cancelled`] right away,
    /// without waiting for the transport, and any channel it managed to open
    /// is closed.
    pub async fn connect(&self, target: impl Into<Target>) -> Result<()> {
        let target = target.into();
        let overtaking = self.state() == ConnectionState::Connecting;
        self.disconnect();

        let generation = self.shared.begin_attempt();
        let mut guard = AttemptGuard {
            shared: &self.shared,
            generation,
            settled: false,
        };
        if overtaking {
            // The overtaken attempt settles before this one can.
            tokio::task::yield_now().await;
        }
        info!(%target, "connecting");

        let listener: Arc<dyn TransportListener> = Arc::new(LinkListener {
            shared: Arc::downgrade(&self.shared),
            generation,
        });
        let attempt = self.shared.connector.connect(&target, listener);
        let bounded = async {
            match self.shared.config.connect_timeout {
                Some(limit) => match tokio::time::timeout(limit, attempt).await {
                    Ok(result) => result.map_err(ClientError::from),
                    Err(_) => Err(ClientError::Timeout(limit)),
                },
                None => attempt.await.map_err(ClientError::from),
            }
        };
        let outcome = tokio::select! {
            outcome = bounded => outcome,
            () = self.shared.overtaken(generation) => {
                guard.settled = true;
                debug!(%target, generation, "connect attempt overtaken");
                return Err(ClientError::Cancelled);
            }
        };

        guard.settled = true;
        self.shared.settle_connect(&target, generation, outcome)
    }

    /// Start connecting to `target` in the background.
    ///
    /// Any earlier attempt made through this method that is still
    /// outstanding resolves with [`ClientError::Cancelled`] before the new
    /// attempt starts. Needs a tokio runtime; without one the returned
    /// attempt resolves with [`ClientError::NoRuntime`].
    pub fn connect_to_target(&self, target: impl Into<Target>) -> ConnectAttempt {
        let target = target.into();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return ConnectAttempt::ready(Err(ClientError::NoRuntime));
        };

        let (done, rx) = oneshot::channel();
        let (serial, previous) = {
            let mut link = self.shared.link.lock();
            link.intent_serial += 1;
            let serial = link.intent_serial;
            let previous = link.intent.replace(ConnectIntent {
                serial,
                done,
                task: None,
            });
            (serial, previous)
        };
        if let Some(previous) = previous {
            previous.cancel();
        }

        let client = self.clone();
        let task = runtime.spawn(async move {
            let outcome = client.connect(target).await;
            client.shared.complete_intent(serial, outcome);
        });

        if let Some(intent) = self
            .shared
            .link
            .lock()
            .intent
            .as_mut()
            .filter(|intent| intent.serial == serial)
        {
            intent.task = Some(task.abort_handle());
        }

        ConnectAttempt { rx }
    }

    /// Close the channel, if any. Idempotent; takes effect immediately.
    ///
    /// A `disconnect` notification is published only when an open channel
    /// was actually closed. An in-flight connect attempt is abandoned.
    pub fn disconnect(&self) {
        let torn_down = {
            let mut link = self.shared.link.lock();
            if link.handle.is_none() && link.state == ConnectionState::Disconnected {
                return;
            }
            link.generation += 1;
            link.state = ConnectionState::Disconnected;
            link.handle.take()
        };
        self.shared.generation_moved.notify_waiters();

        if let Some(mut handle) = torn_down {
            handle.close();
            info!(transport = handle.transport_name(), "disconnected");
            self.shared.after_close();
        } else {
            debug!("abandoned in-flight connect attempt");
        }
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("state", &self.state())
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl Shared {
    fn begin_attempt(&self) -> u64 {
        let generation = {
            let mut link = self.link.lock();
            link.generation += 1;
            link.state = ConnectionState::Connecting;
            link.generation
        };
        self.generation_moved.notify_waiters();
        generation
    }

    fn is_current(&self, generation: u64) -> bool {
        self.link.lock().generation == generation
    }

    /// Completes once `generation` is no longer the current one.
    async fn overtaken(&self, generation: u64) {
        loop {
            // Registered before the check so a bump in between still wakes us.
            let notified = self.generation_moved.notified();
            if !self.is_current(generation) {
                return;
            }
            notified.await;
        }
    }

    fn settle_connect(
        &self,
        target: &Target,
        generation: u64,
        outcome: Result<Box<dyn TransportHandle>>,
    ) -> Result<()> {
        let mut link = self.link.lock();
        if link.generation != generation {
            drop(link);
            if let Ok(mut handle) = outcome {
                handle.close();
            }
            debug!(%target, "connect attempt superseded");
            return Err(ClientError::Cancelled);
        }

        match outcome {
            Ok(handle) => {
                let transport = handle.transport_name();
                link.handle = Some(handle);
                link.state = ConnectionState::Connected;
                drop(link);
                info!(%target, transport, "connected");
                self.notifications.publish(&Notification::Connect);
                Ok(())
            }
            Err(err) => {
                link.state = ConnectionState::Disconnected;
                drop(link);
                warn!(%target, error = %err, "connect failed");
                self.notifications.publish(&Notification::Error(err.clone()));
                Err(err)
            }
        }
    }

    fn complete_intent(&self, serial: u64, outcome: Result<()>) {
        let intent = {
            let mut link = self.link.lock();
            match &link.intent {
                Some(intent) if intent.serial == serial => link.intent.take(),
                _ => None,
            }
        };
        if let Some(intent) = intent {
            let _ = intent.done.send(outcome);
        }
    }

    /// Hand one command to the transport.
    ///
    /// The link lock is held across id allocation and the transport send so
    /// envelopes leave in id order.
    pub(crate) fn dispatch(
        &self,
        method: String,
        params: Map<String, Value>,
        continuation: Continuation,
    ) -> Option<u64> {
        let mut link = self.link.lock();
        let Some(handle) = link.handle.as_mut() else {
            debug!(%method, "not connected; command dropped");
            return None;
        };

        let id = self.table.lock().register(method.clone(), continuation);
        let sent = CommandEnvelope::new(id, method.clone(), params)
            .to_vec()
            .map_err(ClientError::from)
            .and_then(|payload| {
                handle
                    .send(Bytes::from(payload))
                    .map_err(ClientError::from)
            });
        drop(link);

        match sent {
            Ok(()) => trace!(id, %method, "command sent"),
            Err(err) => {
                warn!(id, %method, error = %err, "send failed");
                let pending = self.table.lock().take(id);
                if let Some(call) = pending {
                    (call.continuation)(Err(err.clone()));
                }
                self.notifications.publish(&Notification::Error(err));
            }
        }
        Some(id)
    }

    pub(crate) fn fail_pending(&self, err: ClientError) -> usize {
        let drained = self.table.lock().drain();
        let failed = drained.len();
        for (id, call) in drained {
            debug!(id, method = %call.method, error = %err, "failing pending command");
            (call.continuation)(Err(err.clone()));
        }
        failed
    }

    fn after_close(&self) {
        if self.config.reject_pending_on_disconnect {
            self.fail_pending(ClientError::ConnectionClosed);
        }
        self.notifications.publish(&Notification::Disconnect);
    }

    fn remote_closed(&self, generation: u64) {
        let torn_down = {
            let mut link = self.link.lock();
            if link.generation != generation {
                return;
            }
            link.generation += 1;
            link.state = ConnectionState::Disconnected;
            link.handle.take()
        };
        self.generation_moved.notify_waiters();

        if let Some(mut handle) = torn_down {
            handle.close();
        }
        info!("remote closed the channel");
        self.after_close();
    }
}

/// Resets `Connecting` if a connect future is dropped mid-attempt.
struct AttemptGuard<'a> {
    shared: &'a Shared,
    generation: u64,
    settled: bool,
}

impl Drop for AttemptGuard<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut link = self.shared.link.lock();
        if link.generation == self.generation && link.state == ConnectionState::Connecting {
            link.state = ConnectionState::Disconnected;
            debug!("connect attempt dropped");
        }
    }
}

/// Transport listener bound to one connect generation.
struct LinkListener {
    shared: Weak<Shared>,
    generation: u64,
}

impl TransportListener for LinkListener {
    fn on_event(&self, event: TransportEvent) {
        let Some(shared) = self.shared.upgrade() else {
            return;
        };
        if !shared.is_current(self.generation) {
            trace!(generation = self.generation, "ignoring detached transport");
            return;
        }

        match event {
            TransportEvent::Message(payload) => shared.route(&payload),
            TransportEvent::Closed => shared.remote_closed(self.generation),
            TransportEvent::Error(err) => {
                warn!(error = %err, "transport error");
                shared
                    .notifications
                    .publish(&Notification::Error(ClientError::from(err)));
            }
        }
    }
}

/// Completion of a [`Client::connect_to_target`] request.
#[must_use = "a ConnectAttempt reports nothing unless awaited"]
#[derive(Debug)]
pub struct ConnectAttempt {
    rx: oneshot::Receiver<Result<()>>,
}

impl ConnectAttempt {
    fn ready(outcome: Result<()>) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(outcome);
        Self { rx }
    }
}

impl Future for ConnectAttempt {
    type Output = Result<()>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(outcome)) => Poll::Ready(outcome),
            Poll::Ready(Err(_)) => Poll::Ready(Err(ClientError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
