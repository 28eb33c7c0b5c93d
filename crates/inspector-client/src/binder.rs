//! Schema-driven command binding.
//!
//! [`Bindings`] indexes a loaded protocol description by domain and command.
//! A [`BoundCommand`] pairs one descriptor with a client and turns a
//! positional argument list into a named parameter object before handing
//! it to the dispatcher.

use std::collections::HashMap;
use std::sync::Arc;

use inspector_schema::{CommandDescriptor, ProtocolSchema};
use serde_json::{Map, Value};
use tracing::debug;

use crate::client::Client;
use crate::dispatch::{CommandCall, CommandResult};
use crate::error::ClientError;
use crate::events::EventListener;

/// Commands of a protocol description, by domain then name.
#[derive(Debug)]
pub struct Bindings {
    schema: Arc<ProtocolSchema>,
    commands: HashMap<String, HashMap<String, Arc<CommandDescriptor>>>,
}

impl Bindings {
    pub fn bind(schema: Arc<ProtocolSchema>) -> Self {
        let commands = schema
            .domains()
            .iter()
            .map(|domain| {
                let by_name = domain
                    .commands
                    .iter()
                    .map(|command| (command.name.clone(), Arc::new(command.clone())))
                    .collect();
                (domain.name.clone(), by_name)
            })
            .collect();
        Self { schema, commands }
    }

    pub fn schema(&self) -> &ProtocolSchema {
        &self.schema
    }

    pub fn has_domain(&self, domain: &str) -> bool {
        self.commands.contains_key(domain)
    }

    pub fn command(&self, domain: &str, name: &str) -> Option<&Arc<CommandDescriptor>> {
        self.commands.get(domain)?.get(name)
    }

    /// Commands of `domain` in declaration order.
    pub fn commands(&self, domain: &str) -> Vec<Arc<CommandDescriptor>> {
        let (Some(declared), Some(bound)) = (self.schema.domain(domain), self.commands.get(domain))
        else {
            return Vec::new();
        };
        declared
            .commands
            .iter()
            .filter_map(|command| bound.get(&command.name).cloned())
            .collect()
    }
}

/// Parameters built from a positional argument list.
#[derive(Debug, Default)]
pub(crate) struct BoundArguments {
    pub(crate) params: Map<String, Value>,
    pub(crate) missing: Vec<ClientError>,
}

/// Match positional arguments to the descriptor's parameter list.
///
/// Absent arguments are omitted from the parameter object; absent required
/// ones are reported. Arguments past the declared list are ignored.
pub(crate) fn bind_arguments(
    descriptor: &CommandDescriptor,
    args: impl IntoIterator<Item = Option<Value>>,
) -> BoundArguments {
    let mut bound = BoundArguments::default();
    let mut args = args.into_iter();

    for param in &descriptor.parameters {
        match args.next().flatten() {
            Some(value) => {
                bound.params.insert(param.name.clone(), value);
            }
            None if !param.optional => bound.missing.push(ClientError::MissingArgument {
                method: descriptor.method(),
                parameter: param.name.clone(),
            }),
            None => {}
        }
    }

    let extra = args.count();
    if extra > 0 {
        debug!(method = %descriptor.method(), extra, "ignoring surplus arguments");
    }

    bound
}

/// Result of a callback-style invocation.
#[derive(Debug)]
pub struct Invocation {
    /// Correlation id, if the command reached a transport.
    pub id: Option<u64>,
    /// Argument problems found while binding.
    pub warnings: Vec<ClientError>,
}

/// One command bound to a client.
#[derive(Clone)]
pub struct BoundCommand {
    client: Client,
    descriptor: Arc<CommandDescriptor>,
}

impl BoundCommand {
    pub(crate) fn new(client: Client, descriptor: Arc<CommandDescriptor>) -> Self {
        Self { client, descriptor }
    }

    pub fn descriptor(&self) -> &CommandDescriptor {
        &self.descriptor
    }

    pub fn method(&self) -> String {
        self.descriptor.method()
    }

    /// Send with positional arguments; the returned call resolves with the
    /// response.
    pub fn invoke<I>(&self, args: I) -> CommandCall
    where
        I: IntoIterator<Item = Option<Value>>,
    {
        let (continuation, call) = CommandCall::channel();
        let invocation = self
            .client
            .invoke_descriptor(&self.descriptor, args, continuation);
        call.with_id(invocation.id)
            .with_warnings(invocation.warnings)
    }

    /// Send with positional arguments, handing the outcome to `callback`.
    pub fn invoke_with<I, F>(&self, args: I, callback: F) -> Invocation
    where
        I: IntoIterator<Item = Option<Value>>,
        F: FnOnce(CommandResult) + Send + 'static,
    {
        self.client
            .invoke_descriptor(&self.descriptor, args, Box::new(callback))
    }
}

impl std::fmt::Debug for BoundCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundCommand")
            .field("method", &self.descriptor.method())
            .finish()
    }
}

/// A domain of the loaded description, bound to a client.
#[derive(Clone)]
pub struct DomainHandle {
    client: Client,
    name: String,
}

impl DomainHandle {
    pub(crate) fn new(client: Client, name: String) -> Self {
        Self { client, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn command(&self, name: &str) -> Option<BoundCommand> {
        self.client.command(&self.name, name).ok()
    }

    pub fn commands(&self) -> Vec<BoundCommand> {
        self.client
            .bindings()
            .map(|bindings| {
                bindings
                    .commands(&self.name)
                    .into_iter()
                    .map(|descriptor| BoundCommand::new(self.client.clone(), descriptor))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Listen for `event` in this domain.
    pub fn on(&self, event: &str, listener: EventListener) -> bool {
        self.client.on_event(&self.name, event, listener)
    }

    pub fn off(&self, event: &str, listener: &EventListener) -> bool {
        self.client.off_event(&self.name, event, listener)
    }
}

impl std::fmt::Debug for DomainHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomainHandle")
            .field("name", &self.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use inspector_schema::ParameterDescriptor;
    use serde_json::json;

    use super::*;

    fn evaluate() -> CommandDescriptor {
        CommandDescriptor::new(
            "Runtime",
            "evaluate",
            vec![
                ParameterDescriptor::required("expression"),
                ParameterDescriptor::optional("objectGroup"),
                ParameterDescriptor::optional("returnByValue"),
            ],
        )
    }

    #[test]
    fn positional_arguments_become_named_params() {
        let bound = bind_arguments(
            &evaluate(),
            [Some(json!("1+1")), None, Some(json!(true))],
        );
        assert!(bound.missing.is_empty());
        assert_eq!(
            Value::Object(bound.params),
            json!({"expression": "1+1", "returnByValue": true})
        );
    }

    #[test]
    fn missing_required_argument_is_reported() {
        let bound = bind_arguments(&evaluate(), Vec::new());
        assert!(bound.params.is_empty());
        assert_eq!(bound.missing.len(), 1);
        assert!(matches!(
            &bound.missing[0],
            ClientError::MissingArgument { method, parameter }
                if method == "Runtime.evaluate" && parameter == "expression"
        ));
    }

    #[test]
    fn surplus_arguments_are_ignored() {
        let bound = bind_arguments(
            &evaluate(),
            [
                Some(json!("x")),
                Some(json!("group")),
                Some(json!(false)),
                Some(json!("extra")),
            ],
        );
        assert_eq!(bound.params.len(), 3);
    }

    #[test]
    fn explicit_null_is_sent() {
        let bound = bind_arguments(&evaluate(), [Some(Value::Null)]);
        assert!(bound.missing.is_empty());
        assert_eq!(bound.params.get("expression"), Some(&Value::Null));
    }

    #[test]
    fn bindings_index_commands_in_declaration_order() {
        let schema = ProtocolSchema::load(
            r#"{"domains":[
                {"domain":"Page","commands":[{"name":"reload"},{"name":"navigate","parameters":[{"name":"url"}]}]},
                {"domain":"Network","commands":[]}
            ]}"#,
        )
        .expect("schema should load");
        let bindings = Bindings::bind(Arc::new(schema));

        assert!(bindings.has_domain("Network"));
        assert!(!bindings.has_domain("DOM"));
        assert_eq!(
            bindings.command("Page", "navigate").map(|c| c.method()),
            Some("Page.navigate".to_string())
        );
        let names: Vec<String> = bindings
            .commands("Page")
            .iter()
            .map(|c| c.name.clone())
            .collect();
        assert_eq!(names, vec!["reload", "navigate"]);
        assert!(bindings.commands("Network").is_empty());
    }
}
