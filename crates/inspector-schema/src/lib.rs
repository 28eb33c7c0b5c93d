//! Protocol description registry for the inspector client.
//!
//! A debugging endpoint describes itself with a JSON document of domains,
//! each declaring commands (with ordered, possibly optional parameters) and
//! events. This crate turns that document into an immutable
//! [`ProtocolSchema`]. Only names and optionality are tracked; parameter
//! types are left for the endpoint to enforce.

pub mod config;
pub mod error;
pub mod model;
pub mod registry;
mod validator;

pub use config::RegistryConfig;
pub use error::{Result, SchemaError};
pub use model::{CommandDescriptor, Domain, EventDescriptor, ParameterDescriptor};
pub use registry::{ProtocolSchema, PROTOCOL_FILE_SUFFIX};
