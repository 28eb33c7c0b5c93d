use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use inspector_client::{
    event_listener, notification_listener, Client, ClientConfig, Notification, NotificationKind,
};
use inspector_transport::UnixSocketConnector;
use inspector_wire::{join_method, split_method, InboundMessage, MessageKind};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cmd::{parse_duration, runtime, ListenArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_event, OutputFormat};

enum Heard {
    Event { method: String, params: Value },
    Closed,
}

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let connect_timeout = parse_duration(&args.connect_timeout)?;
    let filters = args
        .events
        .as_deref()
        .map(parse_filters)
        .transpose()?;

    runtime()?.block_on(listen(
        args.endpoint,
        filters,
        args.count,
        connect_timeout,
        format,
    ))
}

fn parse_filters(events: &[String]) -> CliResult<Vec<(String, String)>> {
    events
        .iter()
        .map(|method| {
            split_method(method)
                .map(|(domain, event)| (domain.to_string(), event.to_string()))
                .ok_or_else(|| {
                    CliError::new(USAGE, format!("expected Domain.event, got '{method}'"))
                })
        })
        .collect()
}

/// Why [`relay`] returned.
#[derive(Debug, PartialEq, Eq)]
enum Stop {
    Interrupted,
    CountReached,
    Closed,
}

/// Emit heard events until `interrupted` fires, `count` events went out, or
/// the channel closes. An interrupt takes precedence over queued events.
async fn relay(
    rx: &mut mpsc::UnboundedReceiver<Heard>,
    interrupted: impl Future<Output = ()>,
    count: Option<usize>,
    mut emit: impl FnMut(&str, &Value),
) -> Stop {
    tokio::pin!(interrupted);

    let mut emitted = 0usize;
    loop {
        let heard = tokio::select! {
            biased;
            () = &mut interrupted => return Stop::Interrupted,
            heard = rx.recv() => heard,
        };
        match heard {
            Some(Heard::Event { method, params }) => {
                emit(&method, &params);
                emitted = emitted.saturating_add(1);
                if count.is_some_and(|count| emitted >= count) {
                    return Stop::CountReached;
                }
            }
            Some(Heard::Closed) | None => return Stop::Closed,
        }
    }
}

async fn listen(
    endpoint: PathBuf,
    filters: Option<Vec<(String, String)>>,
    count: Option<usize>,
    connect_timeout: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    let client = Client::with_config(
        UnixSocketConnector::new(),
        ClientConfig::default().with_connect_timeout(connect_timeout),
    );
    let (tx, mut rx) = mpsc::unbounded_channel();

    match filters {
        Some(filters) => {
            for (domain, event) in filters {
                let tx = tx.clone();
                let method = join_method(&domain, &event);
                client.on_event(
                    &domain,
                    &event,
                    event_listener(move |params| {
                        let _ = tx.send(Heard::Event {
                            method: method.clone(),
                            params: params.clone(),
                        });
                    }),
                );
            }
        }
        None => {
            let tx = tx.clone();
            client.on(
                NotificationKind::Message,
                notification_listener(move |notification| {
                    let Notification::Message(raw) = notification else {
                        return;
                    };
                    let Ok(message) = InboundMessage::from_value(raw) else {
                        return;
                    };
                    if let MessageKind::Event {
                        domain,
                        event,
                        params,
                    } = message.classify()
                    {
                        let _ = tx.send(Heard::Event {
                            method: join_method(&domain, &event),
                            params,
                        });
                    }
                }),
            );
        }
    }
    client.on(
        NotificationKind::Disconnect,
        notification_listener(move |_| {
            let _ = tx.send(Heard::Closed);
        }),
    );

    let endpoint = endpoint.to_string_lossy().into_owned();
    client
        .connect(endpoint.as_str())
        .await
        .map_err(|err| client_error(&format!("connect to {endpoint} failed"), &err))?;
    info!(%endpoint, "listening for events");

    let interrupted = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let stop = relay(&mut rx, interrupted, count, |method, params| {
        print_event(method, params, format);
    })
    .await;
    match stop {
        Stop::Interrupted => info!("interrupted"),
        Stop::Closed => info!("endpoint closed the channel"),
        Stop::CountReached => debug!(?count, "event count reached"),
    }

    client.disconnect();
    Ok(SUCCESS)
}
