use std::sync::OnceLock;

use jsonschema::Validator;
use serde_json::Value;

use crate::error::{Result, SchemaError};

/// Shape every protocol document must have. Only names and optionality are
/// constrained; type hints and descriptions pass through untouched.
const PROTOCOL_DOCUMENT_SCHEMA: &str = r##"{
    "type": "object",
    "required": ["domains"],
    "properties": {
        "domains": { "type": "array", "items": { "$ref": "#/$defs/domain" } }
    },
    "$defs": {
        "domain": {
            "type": "object",
            "required": ["domain"],
            "properties": {
                "domain": { "type": "string", "minLength": 1 },
                "commands": { "type": "array", "items": { "$ref": "#/$defs/member" } },
                "events": { "type": "array", "items": { "$ref": "#/$defs/member" } }
            }
        },
        "member": {
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": { "type": "string", "minLength": 1 },
                "parameters": { "type": "array", "items": { "$ref": "#/$defs/parameter" } }
            }
        },
        "parameter": {
            "type": "object",
            "required": ["name"],
            "properties": {
                "name": { "type": "string", "minLength": 1 },
                "optional": { "type": "boolean" }
            }
        }
    }
}"##;

fn document_validator() -> Result<&'static Validator> {
    static VALIDATOR: OnceLock<std::result::Result<Validator, String>> = OnceLock::new();
    VALIDATOR
        .get_or_init(|| {
            let schema: Value =
                serde_json::from_str(PROTOCOL_DOCUMENT_SCHEMA).map_err(|err| err.to_string())?;
            jsonschema::validator_for(&schema).map_err(|err| err.to_string())
        })
        .as_ref()
        .map_err(|err| SchemaError::Parse(format!("protocol meta-schema unusable: {err}")))
}

/// Check the structure of a protocol document before typed decoding.
pub(crate) fn validate_document(document: &Value) -> Result<()> {
    let validator = document_validator()?;

    let mut errors = validator.iter_errors(document);
    if let Some(first) = errors.next() {
        let mut message = first.to_string();
        for err in errors.take(3) {
            message.push_str("; ");
            message.push_str(&err.to_string());
        }
        return Err(SchemaError::Parse(message));
    }

    Ok(())
}
