/// Limits applied when loading protocol descriptions from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Maximum bytes allowed per protocol file.
    pub max_schema_file_size: usize,
    /// Maximum number of protocol files merged from a directory.
    pub max_schema_files: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_schema_file_size: 8 * 1024 * 1024,
            max_schema_files: 64,
        }
    }
}
