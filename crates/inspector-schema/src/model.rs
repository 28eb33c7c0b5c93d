use serde::{Deserialize, Serialize};

/// One declared parameter of a command or event.
///
/// Type hints in the source are not kept; the endpoint validates types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
}

impl ParameterDescriptor {
    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: false,
        }
    }

    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            optional: true,
        }
    }
}

/// A command the endpoint accepts. Parameter order is the positional
/// argument order for bound calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandDescriptor {
    pub domain: String,
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
}

impl CommandDescriptor {
    pub fn new(
        domain: impl Into<String>,
        name: impl Into<String>,
        parameters: Vec<ParameterDescriptor>,
    ) -> Self {
        Self {
            domain: domain.into(),
            name: name.into(),
            parameters,
        }
    }

    /// Wire method name, e.g. `Page.navigate`.
    pub fn method(&self) -> String {
        format!("{}.{}", self.domain, self.name)
    }

    pub fn required_parameters(&self) -> impl Iterator<Item = &ParameterDescriptor> {
        self.parameters.iter().filter(|param| !param.optional)
    }
}

/// An event the endpoint may emit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventDescriptor {
    pub domain: String,
    pub name: String,
    pub parameters: Vec<ParameterDescriptor>,
}

impl EventDescriptor {
    pub fn method(&self) -> String {
        format!("{}.{}", self.domain, self.name)
    }
}

/// A named group of commands and events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Domain {
    pub name: String,
    pub commands: Vec<CommandDescriptor>,
    pub events: Vec<EventDescriptor>,
}

impl Domain {
    pub fn command(&self, name: &str) -> Option<&CommandDescriptor> {
        self.commands.iter().find(|command| command.name == name)
    }

    pub fn event(&self, name: &str) -> Option<&EventDescriptor> {
        self.events.iter().find(|event| event.name == name)
    }
}

/// Source shapes as they appear in the protocol document.
#[derive(Debug, Deserialize)]
pub(crate) struct SourceDocument {
    pub domains: Vec<SourceDomain>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SourceDomain {
    pub domain: String,
    #[serde(default)]
    pub commands: Vec<SourceMember>,
    #[serde(default)]
    pub events: Vec<SourceMember>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SourceMember {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
}

impl SourceDomain {
    pub(crate) fn into_domain(self) -> Domain {
        let name = self.domain;
        let commands = self
            .commands
            .into_iter()
            .map(|member| CommandDescriptor::new(name.clone(), member.name, member.parameters))
            .collect();
        let events = self
            .events
            .into_iter()
            .map(|member| EventDescriptor {
                domain: name.clone(),
                name: member.name,
                parameters: member.parameters,
            })
            .collect();
        Domain {
            name,
            commands,
            events,
        }
    }
}
