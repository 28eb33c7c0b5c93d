use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{Result, TransportError};

/// Boxed, sendable future returned by [`Connector::connect`].
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Address of a remote debugging endpoint.
///
/// Interpretation is up to the [`Connector`]: a socket path for
/// [`UnixSocketConnector`](crate::UnixSocketConnector), a free-form label for
/// [`MemoryConnector`](crate::MemoryConnector).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(String);

impl Target {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self(endpoint.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Target {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Target {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Notification raised by a live transport.
#[derive(Debug)]
pub enum TransportEvent {
    /// One complete inbound envelope.
    Message(Bytes),
    /// The remote side closed the channel. Raised at most once per handle.
    Closed,
    /// The channel failed; a `Closed` may or may not follow.
    Error(TransportError),
}

/// Receives notifications from a transport handle.
///
/// Implementations must tolerate calls from any thread.
pub trait TransportListener: Send + Sync + 'static {
    fn on_event(&self, event: TransportEvent);
}

impl<F> TransportListener for F
where
    F: Fn(TransportEvent) + Send + Sync + 'static,
{
    fn on_event(&self, event: TransportEvent) {
        self(event)
    }
}

/// A live bidirectional channel to an endpoint.
///
/// `send` and `close` must not call back into the listener synchronously.
pub trait TransportHandle: Send {
    /// Queue one envelope for delivery. Payloads are delivered in call order.
    fn send(&mut self, payload: Bytes) -> Result<()>;

    /// Close the channel. Idempotent; no `Closed` notification is raised for a
    /// locally requested close.
    fn close(&mut self);

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

impl fmt::Debug for dyn TransportHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportHandle")
            .field("type", &self.transport_name())
            .finish()
    }
}

/// Establishes transport handles.
pub trait Connector: Send + Sync + 'static {
    /// Open a channel to `target`, reporting its notifications to `listener`.
    fn connect(
        &self,
        target: &Target,
        listener: Arc<dyn TransportListener>,
    ) -> BoxFuture<'static, Result<Box<dyn TransportHandle>>>;
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn closures_are_listeners() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = count.clone();
        let listener: Arc<dyn TransportListener> = Arc::new(move |event: TransportEvent| {
            if matches!(event, TransportEvent::Closed) {
                seen.fetch_add(1, Ordering::SeqCst);
            }
        });

        listener.on_event(TransportEvent::Closed);
        listener.on_event(TransportEvent::Message(Bytes::from_static(b"{}")));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn target_conversions() {
        let target = Target::from("/tmp/inspector.sock");
        assert_eq!(target.as_str(), "/tmp/inspector.sock");
        assert_eq!(target.to_string(), "/tmp/inspector.sock");
        assert_eq!(Target::from(String::from("x")), Target::new("x"));
    }
}
