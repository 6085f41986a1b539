//! Error types for rendering and deploying static websites

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StaticWebsiteError {
    #[error("Invalid resource name {0:?}\n{1}")]
    InvalidLogicalId(String, String),

    #[error("Duplicate resource name {0:?} in stack {1}")]
    DuplicateLogicalId(String, String),

    #[error("Invalid stack name {0}\nMust only consist of alphanumeric characters and hyphens, Must start with an alphabetical character, and cannot be longer than 128 characters.")]
    InvalidStackName(String),

    #[error("Invalid region code {0:?}\nMust be one of {1:?}")]
    InvalidRegion(String, &'static [&'static str]),

    #[error("Validation failed on resource '{name}'\n{reason}")]
    InvalidResource { name: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("AWS API error: {0}")]
    Aws(String),

    #[error("Failed to deploy stack {stack}\n{reason}")]
    StackFailed { stack: String, reason: String },

    #[error("Stack {stack} needs parameter {key} but no earlier stack produced an output with that name")]
    MissingOutput { stack: String, key: String },

    #[error("Failed to upload {path}\n{reason}")]
    Upload { path: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Failed to walk directory: {0}")]
    Walk(#[from] walkdir::Error),
}

pub type Result<T> = std::result::Result<T, StaticWebsiteError>;

/// the sdk errors carry most of their useful context in the debug output.
pub(crate) fn aws_error<E: std::fmt::Debug>(e: E) -> StaticWebsiteError {
    StaticWebsiteError::Aws(format!("{:#?}", e))
}
