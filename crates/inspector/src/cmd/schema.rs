use std::path::Path;

use inspector_schema::ProtocolSchema;
use tracing::debug;

use crate::cmd::SchemaArgs;
use crate::exit::{schema_error, CliResult, SUCCESS};
use crate::output::{print_schema, OutputFormat};

pub fn run(args: SchemaArgs, format: OutputFormat) -> CliResult<i32> {
    let schema = load_schema(&args.path)?;
    print_schema(&schema, format);
    Ok(SUCCESS)
}

/// Load a protocol description from a file or a directory of them.
pub fn load_schema(path: &Path) -> CliResult<ProtocolSchema> {
    let loaded = if path.is_dir() {
        ProtocolSchema::from_directory(path)
    } else {
        ProtocolSchema::from_file(path)
    };
    let schema =
        loaded.map_err(|err| schema_error(&format!("failed loading {}", path.display()), &err))?;
    debug!(
        path = %path.display(),
        domains = schema.domains().len(),
        commands = schema.command_count(),
        "protocol description loaded"
    );
    Ok(schema)
}
