//! Error types for ForgeSTIG

use thiserror::Error;

/// Result type alias using ForgeSTIG Error
pub type Result<T> = std::result::Result<T, Error>;

/// ForgeSTIG error types
#[derive(Error, Debug)]
pub enum Error {
    // === Rule Errors ===
    #[error("Rule not found: {rule_id}")]
    RuleNotFound { rule_id: String },

    #[error("Invalid rule definition: {path} - {message}")]
    InvalidRuleDefinition { path: String, message: String },

    // === Input Errors ===
    #[error("Missing input: {name}")]
    MissingInput { name: String },

    #[error("Invalid input {name}: {message}")]
    InvalidInput { name: String, message: String },

    // === Configuration Errors ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidConfig { key: String, message: String },

    // === IO Errors ===
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Get an error code for logging
    pub fn code(&self) -> &'static str {
        match self {
            Error::RuleNotFound { .. } => "RULE_NOT_FOUND",
            Error::InvalidRuleDefinition { .. } => "INVALID_RULE_DEF",
            Error::MissingInput { .. } => "MISSING_INPUT",
            Error::InvalidInput { .. } => "INVALID_INPUT",
            Error::Configuration(_) => "CONFIG_ERROR",
            Error::InvalidConfig { .. } => "INVALID_CONFIG",
            Error::Io(_) => "IO_ERROR",
            Error::FileNotFound { .. } => "FILE_NOT_FOUND",
            Error::Parse(_) => "PARSE_ERROR",
        }
    }
}
