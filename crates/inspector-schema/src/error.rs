/// Errors that can occur while loading a protocol description.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The protocol file could not be read.
    #[error("failed to load protocol schema: {0}")]
    LoadFailed(String),

    /// The source is not JSON.
    #[error("protocol schema is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The source is JSON but not a protocol description.
    #[error("malformed protocol schema: {0}")]
    Parse(String),

    /// Two sources declare the same domain.
    #[error("domain {0} declared more than once")]
    DuplicateDomain(String),
}

impl SchemaError {
    /// True for errors caused by the content of the source rather than by I/O.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            SchemaError::InvalidJson(_) | SchemaError::Parse(_) | SchemaError::DuplicateDomain(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;
