use std::sync::Arc;
use std::time::Duration;

use inspector_schema::SchemaError;
use inspector_transport::TransportError;
use inspector_wire::WireError;
use serde_json::Value;

/// Errors that can occur in client operations.
///
/// Cloneable so one failure can reach both a caller and the `error`
/// notification listeners.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[source] Arc<TransportError>),

    /// Envelope encoding/decoding error.
    #[error("wire error: {0}")]
    Wire(#[source] Arc<WireError>),

    /// Protocol description could not be loaded.
    #[error("schema error: {0}")]
    Schema(#[source] Arc<SchemaError>),

    /// The endpoint sent a message carrying an `error` field.
    #[error("endpoint reported error{}: {error}", id.map(|id| format!(" for id {id}")).unwrap_or_default())]
    Protocol { id: Option<u64>, error: Value },

    /// A required parameter was not supplied.
    #[error("{method}: missing required argument '{parameter}'")]
    MissingArgument { method: String, parameter: String },

    /// No such command in the loaded protocol description.
    #[error("unknown command {method}")]
    UnknownCommand { method: String },

    /// No protocol description has been loaded.
    #[error("protocol description not initialized")]
    NotInitialized,

    /// The command was not sent because no channel is open.
    #[error("not connected")]
    NotConnected,

    /// The channel closed before the command was answered.
    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    /// Pending commands were rejected explicitly.
    #[error("command rejected: {0}")]
    Rejected(String),

    /// A newer connect attempt superseded this one.
    #[error("connect attempt cancelled")]
    Cancelled,

    /// Connecting took too long.
    #[error("connect timed out after {0:?}")]
    Timeout(Duration),

    /// `connect_to_target` was called outside a tokio runtime.
    #[error("no tokio runtime available to drive the connect attempt")]
    NoRuntime,
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        Self::Transport(Arc::new(err))
    }
}

impl From<WireError> for ClientError {
    fn from(err: WireError) -> Self {
        Self::Wire(Arc::new(err))
    }
}

impl From<SchemaError> for ClientError {
    fn from(err: SchemaError) -> Self {
        Self::Schema(Arc::new(err))
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Wire(Arc::new(WireError::Json(err)))
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn protocol_error_mentions_id_when_present() {
        let err = ClientError::Protocol {
            id: Some(4),
            error: json!({"code": -32601}),
        };
        assert_eq!(
            err.to_string(),
            r#"endpoint reported error for id 4: {"code":-32601}"#
        );

        let err = ClientError::Protocol {
            id: None,
            error: json!("boom"),
        };
        assert_eq!(err.to_string(), r#"endpoint reported error: "boom""#);
    }

    #[test]
    fn transport_errors_convert_and_clone() {
        let err: ClientError = TransportError::Shutdown.into();
        let copy = err.clone();
        assert!(matches!(copy, ClientError::Transport(_)));
        assert_eq!(copy.to_string(), "transport error: transport shut down");
    }
}
