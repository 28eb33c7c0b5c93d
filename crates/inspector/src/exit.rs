use std::fmt;
use std::io;

use inspector_client::ClientError;
use inspector_schema::SchemaError;
use inspector_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
/// The endpoint answered with an error payload.
pub const REMOTE_ERROR: i32 = 2;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: &io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::ConnectionRefused | io::ErrorKind::NotFound => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: &TransportError) -> CliError {
    match err {
        TransportError::Connect { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        TransportError::PathTooLong { .. } => CliError::new(USAGE, format!("{context}: {err}")),
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn schema_error(context: &str, err: &SchemaError) -> CliError {
    let code = if err.is_parse_error() {
        DATA_INVALID
    } else {
        FAILURE
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn client_error(context: &str, err: &ClientError) -> CliError {
    match err {
        ClientError::Transport(err) => transport_error(context, err),
        ClientError::Schema(err) => schema_error(context, err),
        ClientError::Wire(_) => CliError::new(DATA_INVALID, format!("{context}: {err}")),
        ClientError::Protocol { .. } => CliError::new(REMOTE_ERROR, format!("{context}: {err}")),
        ClientError::MissingArgument { .. }
        | ClientError::UnknownCommand { .. }
        | ClientError::NotInitialized => CliError::new(USAGE, format!("{context}: {err}")),
        ClientError::Timeout(_) => CliError::new(TIMEOUT, format!("{context}: {err}")),
        ClientError::NotConnected | ClientError::ConnectionClosed => {
            CliError::new(FAILURE, format!("{context}: {err}"))
        }
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn refused_connect_maps_to_failure() {
        let err = TransportError::Connect {
            target: "/tmp/x.sock".into(),
            source: io::Error::new(io::ErrorKind::ConnectionRefused, "refused"),
        };
        assert_eq!(transport_error("connect failed", &err).code, FAILURE);
    }

    #[test]
    fn client_errors_map_to_codes() {
        let remote = ClientError::Protocol {
            id: Some(1),
            error: json!({"message": "nope"}),
        };
        assert_eq!(client_error("call failed", &remote).code, REMOTE_ERROR);
        assert_eq!(
            client_error(
                "call failed",
                &ClientError::Timeout(std::time::Duration::from_secs(1))
            )
            .code,
            TIMEOUT
        );
        assert_eq!(
            client_error(
                "call failed",
                &ClientError::UnknownCommand {
                    method: "Page.bogus".into()
                }
            )
            .code,
            USAGE
        );
    }

    #[test]
    fn schema_parse_errors_are_data_invalid() {
        let err = SchemaError::Parse("missing domains".into());
        let mapped = schema_error("schema load failed", &err);
        assert_eq!(mapped.code, DATA_INVALID);
        assert!(mapped.message.starts_with("schema load failed: "));
    }
}
