use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::config::RegistryConfig;
use crate::error::{Result, SchemaError};
use crate::model::{CommandDescriptor, Domain, EventDescriptor, SourceDocument};
use crate::validator::validate_document;

/// File suffix picked up by [`ProtocolSchema::from_directory`].
pub const PROTOCOL_FILE_SUFFIX: &str = ".protocol.json";

/// Parsed protocol description: domains in declaration order.
///
/// Immutable once built; share it behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolSchema {
    domains: Vec<Domain>,
    index: HashMap<String, usize>,
}

impl ProtocolSchema {
    /// Parse a protocol description from JSON text.
    pub fn load(source: &str) -> Result<Self> {
        let document: Value = serde_json::from_str(source)?;
        Self::from_value(&document)
    }

    /// Parse a protocol description from an already decoded JSON value.
    pub fn from_value(document: &Value) -> Result<Self> {
        validate_document(document)?;
        let source = SourceDocument::deserialize_from(document)?;
        Self::from_domains(
            source
                .domains
                .into_iter()
                .map(|domain| domain.into_domain())
                .collect(),
        )
    }

    /// Build a schema from domains; domain names must be unique.
    pub fn from_domains(domains: Vec<Domain>) -> Result<Self> {
        let mut index = HashMap::with_capacity(domains.len());
        for (position, domain) in domains.iter().enumerate() {
            if index.insert(domain.name.clone(), position).is_some() {
                return Err(SchemaError::DuplicateDomain(domain.name.clone()));
            }
        }
        Ok(Self { domains, index })
    }

    /// Load a protocol description from a file.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::from_file_with_config(path, RegistryConfig::default())
    }

    /// Load a protocol description from a file with explicit limits.
    pub fn from_file_with_config(path: &Path, config: RegistryConfig) -> Result<Self> {
        let metadata = std::fs::symlink_metadata(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;
        if metadata.file_type().is_symlink() {
            return Err(SchemaError::LoadFailed(format!(
                "refusing to load protocol symlink: {}",
                path.display()
            )));
        }
        let content = read_bounded(path, &metadata, config.max_schema_file_size)?;
        Self::load(&content)
    }

    /// Merge every `*.protocol.json` file in a directory, in file name order.
    pub fn from_directory(path: &Path) -> Result<Self> {
        Self::from_directory_with_config(path, RegistryConfig::default())
    }

    /// Merge a directory of protocol files with explicit limits.
    pub fn from_directory_with_config(path: &Path, config: RegistryConfig) -> Result<Self> {
        let entries = std::fs::read_dir(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.ends_with(PROTOCOL_FILE_SUFFIX) {
                continue;
            }
            let entry_path = entry.path();
            let metadata = std::fs::symlink_metadata(&entry_path)
                .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;
            if metadata.file_type().is_symlink() {
                return Err(SchemaError::LoadFailed(format!(
                    "refusing to load protocol symlink: {file_name}"
                )));
            }
            if !metadata.file_type().is_file() {
                continue;
            }
            files.push((file_name, entry_path, metadata));
        }

        if files.len() > config.max_schema_files {
            return Err(SchemaError::LoadFailed(format!(
                "protocol file count exceeds configured max ({}): {}",
                config.max_schema_files,
                files.len()
            )));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut domains = Vec::new();
        for (file_name, entry_path, metadata) in files {
            let content = read_bounded(&entry_path, &metadata, config.max_schema_file_size)?;
            let part = Self::load(&content)?;
            debug!(file = %file_name, domains = part.domains.len(), "loaded protocol file");
            domains.extend(part.domains);
        }

        Self::from_domains(domains)
    }

    /// Domains in declaration order.
    pub fn domains(&self) -> &[Domain] {
        &self.domains
    }

    pub fn domain(&self, name: &str) -> Option<&Domain> {
        self.index.get(name).map(|position| &self.domains[*position])
    }

    pub fn command(&self, domain: &str, name: &str) -> Option<&CommandDescriptor> {
        self.domain(domain).and_then(|domain| domain.command(name))
    }

    pub fn event(&self, domain: &str, name: &str) -> Option<&EventDescriptor> {
        self.domain(domain).and_then(|domain| domain.event(name))
    }

    pub fn command_count(&self) -> usize {
        self.domains.iter().map(|domain| domain.commands.len()).sum()
    }

    pub fn event_count(&self) -> usize {
        self.domains.iter().map(|domain| domain.events.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

impl SourceDocument {
    fn deserialize_from(document: &Value) -> Result<Self> {
        <Self as serde::Deserialize>::deserialize(document)
            .map_err(|err| SchemaError::Parse(err.to_string()))
    }
}

fn read_bounded(path: &Path, path_metadata: &std::fs::Metadata, max_bytes: usize) -> Result<String> {
    let file = std::fs::File::open(path).map_err(|err| {
        SchemaError::LoadFailed(format!("failed opening protocol {}: {err}", path.display()))
    })?;
    let opened_metadata = file
        .metadata()
        .map_err(|err| SchemaError::LoadFailed(err.to_string()))?;

    #[cfg(unix)]
    {
        if !same_file_identity(path_metadata, &opened_metadata) {
            return Err(SchemaError::LoadFailed(format!(
                "protocol file changed during load: {}",
                path.display()
            )));
        }
    }
    #[cfg(not(unix))]
    let _ = path_metadata;

    if opened_metadata.len() > max_bytes as u64 {
        return Err(SchemaError::LoadFailed(format!(
            "protocol file too large ({} bytes): {}",
            opened_metadata.len(),
            path.display()
        )));
    }

    let read_limit = u64::try_from(max_bytes.saturating_add(1)).unwrap_or(u64::MAX);
    let mut content = String::new();
    file.take(read_limit)
        .read_to_string(&mut content)
        .map_err(|err| {
            SchemaError::LoadFailed(format!("failed reading protocol {}: {err}", path.display()))
        })?;
    if content.len() > max_bytes {
        return Err(SchemaError::LoadFailed(format!(
            "protocol file too large while reading: {}",
            path.display()
        )));
    }
    Ok(content)
}

#[cfg(unix)]
fn same_file_identity(
    path_metadata: &std::fs::Metadata,
    opened_metadata: &std::fs::Metadata,
) -> bool {
    use std::os::unix::fs::MetadataExt;
    path_metadata.dev() == opened_metadata.dev() && path_metadata.ino() == opened_metadata.ino()
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;
    use crate::model::ParameterDescriptor;

    const PAGE_PROTOCOL: &str = r#"{
        "domains": [{
            "domain": "Page",
            "commands": [
                { "name": "enable" },
                {
                    "name": "navigate",
                    "parameters": [
                        { "name": "url", "type": "string" },
                        { "name": "referrer", "type": "string", "optional": true }
                    ]
                }
            ],
            "events": [
                { "name": "loadEventFired", "parameters": [{ "name": "timestamp", "type": "number" }] }
            ]
        }]
    }"#;

    const RUNTIME_PROTOCOL: &str = r#"{
        "domains": [{
            "domain": "Runtime",
            "commands": [{ "name": "evaluate", "parameters": [{ "name": "expression" }] }]
        }]
    }"#;

    #[test]
    fn load_preserves_parameter_order_and_optionality() {
        let schema = ProtocolSchema::load(PAGE_PROTOCOL).unwrap();

        let navigate = schema.command("Page", "navigate").unwrap();
        assert_eq!(navigate.domain, "Page");
        assert_eq!(
            navigate.parameters,
            vec![
                ParameterDescriptor::required("url"),
                ParameterDescriptor::optional("referrer"),
            ]
        );
        assert!(schema.command("Page", "enable").unwrap().parameters.is_empty());
        assert_eq!(schema.event("Page", "loadEventFired").unwrap().method(), "Page.loadEventFired");
        assert_eq!(schema.command_count(), 2);
        assert_eq!(schema.event_count(), 1);
    }

    #[test]
    fn unknown_lookups_return_none() {
        let schema = ProtocolSchema::load(PAGE_PROTOCOL).unwrap();
        assert!(schema.domain("Network").is_none());
        assert!(schema.command("Page", "reload").is_none());
        assert!(schema.event("Page", "navigate").is_none());
    }

    #[test]
    fn non_json_source_fails() {
        let err = ProtocolSchema::load("domains: [").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidJson(_)));
        assert!(err.is_parse_error());
    }

    #[test]
    fn missing_domain_name_fails() {
        let err = ProtocolSchema::load(r#"{"domains":[{"commands":[]}]}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Parse(_)));
    }

    #[test]
    fn missing_command_name_fails() {
        let err =
            ProtocolSchema::load(r#"{"domains":[{"domain":"Page","commands":[{}]}]}"#).unwrap_err();
        assert!(matches!(err, SchemaError::Parse(_)));
    }

    #[test]
    fn duplicate_domain_fails() {
        let source = r#"{"domains":[{"domain":"Page"},{"domain":"Page"}]}"#;
        assert!(matches!(
            ProtocolSchema::load(source),
            Err(SchemaError::DuplicateDomain(name)) if name == "Page"
        ));
    }

    #[test]
    fn from_file_loads_schema() {
        let dir = make_temp_dir("from-file");
        let path = write_file(&dir, "page.protocol.json", PAGE_PROTOCOL);

        let schema = ProtocolSchema::from_file(&path).unwrap();
        assert!(schema.domain("Page").is_some());

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_file_enforces_size_limit() {
        let dir = make_temp_dir("file-size-limit");
        let path = write_file(&dir, "page.protocol.json", PAGE_PROTOCOL);

        let config = RegistryConfig {
            max_schema_file_size: 8,
            ..RegistryConfig::default()
        };
        let result = ProtocolSchema::from_file_with_config(&path, config);
        assert!(matches!(result, Err(SchemaError::LoadFailed(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_directory_merges_in_file_name_order() {
        let dir = make_temp_dir("merge");
        write_file(&dir, "b-runtime.protocol.json", RUNTIME_PROTOCOL);
        write_file(&dir, "a-page.protocol.json", PAGE_PROTOCOL);
        write_file(&dir, "notes.json", "not a protocol");

        let schema = ProtocolSchema::from_directory(&dir).unwrap();
        let names: Vec<&str> = schema.domains().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["Page", "Runtime"]);

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_directory_rejects_duplicate_domains_across_files() {
        let dir = make_temp_dir("dup");
        write_file(&dir, "one.protocol.json", PAGE_PROTOCOL);
        write_file(&dir, "two.protocol.json", PAGE_PROTOCOL);

        assert!(matches!(
            ProtocolSchema::from_directory(&dir),
            Err(SchemaError::DuplicateDomain(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn from_directory_enforces_file_count_limit() {
        let dir = make_temp_dir("count-limit");
        write_file(&dir, "a.protocol.json", PAGE_PROTOCOL);
        write_file(&dir, "b.protocol.json", RUNTIME_PROTOCOL);

        let config = RegistryConfig {
            max_schema_files: 1,
            ..RegistryConfig::default()
        };
        let result = ProtocolSchema::from_directory_with_config(&dir, config);
        assert!(matches!(result, Err(SchemaError::LoadFailed(_))));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_protocol_is_rejected() {
        let dir = make_temp_dir("symlink");
        let target = write_file(&dir, "target.json", PAGE_PROTOCOL);
        let link = dir.join("page.protocol.json");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        assert!(matches!(
            ProtocolSchema::from_directory(&dir),
            Err(SchemaError::LoadFailed(_))
        ));
        assert!(matches!(
            ProtocolSchema::from_file(&link),
            Err(SchemaError::LoadFailed(_))
        ));

        let _ = std::fs::remove_dir_all(&dir);
    }

    fn make_temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "inspector-schema-{tag}-{}-{}",
            std::process::id(),
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap()
                .as_nanos()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_file(dir: &Path, file_name: &str, contents: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, contents.as_bytes()).unwrap();
        path
    }
}
