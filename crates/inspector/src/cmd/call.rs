use std::time::Duration;

use inspector_client::{
    notification_listener, Client, ClientConfig, ClientError, Notification, NotificationKind,
};
use inspector_schema::ProtocolSchema;
use inspector_transport::UnixSocketConnector;
use inspector_wire::split_method;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cmd::schema::load_schema;
use crate::cmd::{parse_duration, runtime, CallArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_response, OutputFormat};

/// Literal argument that leaves a positional slot empty.
const ABSENT_ARGUMENT: &str = "undefined";

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let timeout = parse_duration(&args.timeout)?;
    let (domain, command) = split_method(&args.method).ok_or_else(|| {
        CliError::new(
            USAGE,
            format!("expected Domain.command, got '{}'", args.method),
        )
    })?;
    let schema = load_schema(&args.schema)?;
    let call_args: Vec<Option<Value>> = args
        .args
        .iter()
        .map(String::as_str)
        .map(parse_argument)
        .collect();

    runtime()?.block_on(invoke(
        &args, domain, command, schema, call_args, timeout, format,
    ))
}

/// JSON if it parses, otherwise the raw text as a string.
fn parse_argument(raw: &str) -> Option<Value> {
    if raw == ABSENT_ARGUMENT {
        return None;
    }
    Some(serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string())))
}

async fn invoke(
    args: &CallArgs,
    domain: &str,
    command: &str,
    schema: ProtocolSchema,
    call_args: Vec<Option<Value>>,
    timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    let config = ClientConfig::default()
        .with_connect_timeout(timeout)
        .with_strict_arguments(args.strict)
        .with_reject_pending_on_disconnect(true);
    let client = Client::with_config(UnixSocketConnector::new(), config);
    client.init(schema);
    let bound = client
        .command(domain, command)
        .map_err(|err| client_error("call failed", &err))?;

    // Error payloads never resolve the pending command; watch for them.
    let (errors_tx, mut errors_rx) = mpsc::unbounded_channel();
    client.on(
        NotificationKind::Error,
        notification_listener(move |notification| {
            if let Notification::Error(err) = notification {
                let _ = errors_tx.send(err.clone());
            }
        }),
    );

    let endpoint = args.endpoint.to_string_lossy().into_owned();
    client
        .connect(endpoint.as_str())
        .await
        .map_err(|err| client_error(&format!("connect to {endpoint} failed"), &err))?;
    // Drop anything published while connecting.
    while errors_rx.try_recv().is_ok() {}

    let call = bound.invoke(call_args);
    for warning in call.warnings() {
        eprintln!("warning: {warning}");
    }
    let id = call.id();
    debug!(?id, method = %args.method, "command dispatched");

    let watch_errors = async {
        while let Some(err) = errors_rx.recv().await {
            match &err {
                ClientError::Protocol { id: Some(other), .. } if Some(*other) != id => continue,
                _ => return err,
            }
        }
        ClientError::ConnectionClosed
    };

    let outcome = tokio::time::timeout(timeout, async {
        tokio::select! {
            outcome = call => outcome,
            err = watch_errors => Err(err),
        }
    })
    .await;
    client.disconnect();

    match outcome {
        Ok(Ok(response)) => {
            info!(id = response.id(), method = %args.method, "response received");
            print_response(&args.method, &response, format);
            Ok(SUCCESS)
        }
        Ok(Err(err)) => Err(client_error(&format!("{} failed", args.method), &err)),
        Err(_) => Err(CliError::new(
            TIMEOUT,
            format!("no response to {} within {timeout:?}", args.method),
        )),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn arguments_parse_as_json_or_text() {
        assert_eq!(parse_argument("42"), Some(json!(42)));
        assert_eq!(parse_argument("\"quoted\""), Some(json!("quoted")));
        assert_eq!(parse_argument("{\"a\":true}"), Some(json!({"a": true})));
        assert_eq!(
            parse_argument("http://example.com"),
            Some(json!("http://example.com"))
        );
    }

    #[test]
    fn undefined_leaves_slot_empty() {
        assert_eq!(parse_argument(ABSENT_ARGUMENT), None);
        assert_eq!(parse_argument("null"), Some(Value::Null));
    }
}
