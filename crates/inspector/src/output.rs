use std::io::IsTerminal;
use std::time::{SystemTime, UNIX_EPOCH};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use inspector_client::CommandResponse;
use inspector_schema::{CommandDescriptor, ParameterDescriptor, ProtocolSchema};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct SchemaOutput<'a> {
    domain_count: usize,
    command_count: usize,
    event_count: usize,
    domains: Vec<DomainOutput<'a>>,
}

#[derive(Serialize)]
struct DomainOutput<'a> {
    domain: &'a str,
    commands: Vec<String>,
    events: Vec<&'a str>,
}

#[derive(Serialize)]
struct ResponseOutput<'a> {
    method: &'a str,
    id: u64,
    result: &'a Value,
}

#[derive(Serialize)]
struct EventOutput<'a> {
    event: &'a str,
    params: &'a Value,
    timestamp: String,
}

/// `navigate(url, referrer?)`
pub fn signature(command: &CommandDescriptor) -> String {
    format!("{}({})", command.name, parameter_list(&command.parameters))
}

fn parameter_list(parameters: &[ParameterDescriptor]) -> String {
    parameters
        .iter()
        .map(|param| {
            if param.optional {
                format!("{}?", param.name)
            } else {
                param.name.clone()
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn print_schema(schema: &ProtocolSchema, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = SchemaOutput {
                domain_count: schema.domains().len(),
                command_count: schema.command_count(),
                event_count: schema.event_count(),
                domains: schema
                    .domains()
                    .iter()
                    .map(|domain| DomainOutput {
                        domain: &domain.name,
                        commands: domain.commands.iter().map(signature).collect(),
                        events: domain.events.iter().map(|e| e.name.as_str()).collect(),
                    })
                    .collect(),
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            let mut table = new_table(vec!["DOMAIN", "KIND", "NAME", "PARAMETERS"]);
            for domain in schema.domains() {
                for command in &domain.commands {
                    table.add_row(vec![
                        domain.name.clone(),
                        "command".to_string(),
                        command.name.clone(),
                        parameter_list(&command.parameters),
                    ]);
                }
                for event in &domain.events {
                    table.add_row(vec![
                        domain.name.clone(),
                        "event".to_string(),
                        event.name.clone(),
                        parameter_list(&event.parameters),
                    ]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for domain in schema.domains() {
                println!("{}", domain.name);
                for command in &domain.commands {
                    println!("  {}", signature(command));
                }
                for event in &domain.events {
                    println!("  event {}", event.name);
                }
            }
        }
    }
}

pub fn print_response(method: &str, response: &CommandResponse, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&ResponseOutput {
            method,
            id: response.id(),
            result: response.result(),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["METHOD", "ID", "RESULT"]);
            table.add_row(vec![
                method.to_string(),
                response.id().to_string(),
                response.result().to_string(),
            ]);
            println!("{table}");
        }
        OutputFormat::Pretty => {
            println!("{method} #{} ->", response.id());
            println!("{}", pretty(response.result()));
        }
    }
}

pub fn print_event(method: &str, params: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&EventOutput {
            event: method,
            params,
            timestamp: now_unix_seconds(),
        }),
        OutputFormat::Table => {
            let mut table = new_table(vec!["EVENT", "PARAMS"]);
            table.add_row(vec![method.to_string(), params.to_string()]);
            println!("{table}");
        }
        OutputFormat::Pretty => println!("{method} {}", pretty(params)),
    }
}

fn new_table(header: Vec<&str>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    table
}

fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_marks_optional_parameters() {
        let command = CommandDescriptor::new(
            "Page",
            "navigate",
            vec![
                ParameterDescriptor::required("url"),
                ParameterDescriptor::optional("referrer"),
            ],
        );
        assert_eq!(signature(&command), "navigate(url, referrer?)");
    }

    #[test]
    fn signature_without_parameters() {
        let command = CommandDescriptor::new("Page", "reload", Vec::new());
        assert_eq!(signature(&command), "reload()");
    }
}
