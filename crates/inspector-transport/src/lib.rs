//! Transport handles for the inspector protocol client.
//!
//! A transport is an opaque bidirectional channel to a debugging endpoint:
//! [`Connector::connect`] opens it, [`TransportHandle`] sends and closes it,
//! and a [`TransportListener`] hears about inbound messages, errors, and
//! remote closes.
//!
//! Implementations:
//! - [`UnixSocketConnector`]: framed envelopes over a Unix domain socket
//! - [`MemoryConnector`]: in-process channel with a scriptable remote end

pub mod error;
pub mod memory;
pub mod traits;

#[cfg(unix)]
pub mod uds;

pub use error::{Result, TransportError};
pub use memory::{ConnectGate, MemoryConnector, MemoryHandle, RemoteEnd};
pub use traits::{BoxFuture, Connector, Target, TransportEvent, TransportHandle, TransportListener};

#[cfg(unix)]
pub use uds::{UnixSocketConnector, UnixSocketHandle};
