//! Client for remote debugging endpoints.
//!
//! A [`Client`] owns one channel to an endpoint, obtained through a
//! [`Connector`](inspector_transport::Connector). Commands go out as
//! `sendCommand` envelopes with a fresh id; responses come back through the
//! correlation table to a future ([`CommandCall`]) or a callback. Events are
//! fanned out to listeners keyed by `(domain, event)`, and lifecycle changes
//! are published as [`Notification`]s.
//!
//! Once a protocol description is loaded with [`Client::init`], commands can
//! be called by name with positional arguments:
//!
//! ```no_run
//! # async fn demo(schema: inspector_schema::ProtocolSchema) -> inspector_client::Result<()> {
//! use inspector_client::Client;
//! use inspector_transport::MemoryConnector;
//! use serde_json::json;
//!
//! let client = Client::new(MemoryConnector::new());
//! client.init(schema);
//! client.connect("page-1").await?;
//!
//! let response = client
//!     .call("Page", "navigate", [Some(json!("http://example.com"))])
//!     .await?;
//! println!("{}", response.value());
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
mod router;

pub use binder::{Bindings, BoundCommand, DomainHandle, Invocation};
pub use client::{Client, ConnectAttempt, ConnectionState};
pub use config::ClientConfig;
pub use dispatch::{CommandCall, CommandResponse, CommandResult, Continuation};
pub use error::{ClientError, Result};
pub use events::{
    event_listener, notification_listener, EventKey, EventListener, Notification,
    NotificationKind, NotificationListener,
};
