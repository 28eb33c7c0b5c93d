//! Client for remote debugging protocols.
//!
//! inspector talks to a debugging endpoint (a browser page, a script
//! runtime) over a bidirectional message channel. A JSON protocol
//! description lists the endpoint's domains, commands, and events; the
//! client turns it into callable command bindings, correlates responses to
//! requests by id, and fans out unsolicited events to listeners.
//!
//! # Crate Structure
//!
//! - [`wire`]: envelope shapes and stream framing
//! - [`transport`]: connectors and transport handles (Unix sockets, in-memory)
//! - [`schema`]: protocol description loading and lookups
//! - [`client`]: the client, command bindings, events, and lifecycle

/// Re-export wire types.
pub mod wire {
    pub use inspector_wire::*;
}

/// Re-export transport types.
pub mod transport {
    pub use inspector_transport::*;
}

/// Re-export schema types.
pub mod schema {
    pub use inspector_schema::*;
}

/// Re-export client types.
pub mod client {
    pub use inspector_client::*;
}

pub use inspector_client::{Client, ClientConfig, ClientError};
pub use inspector_schema::ProtocolSchema;
