//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;
use tilemosaic::backend::BackendError;
use tilemosaic::builder::BuildError;
use tilemosaic::config::ConfigFileError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Invalid command-line argument
    InvalidArgument(String),
    /// Failed to read an input file
    FileRead { path: String, error: std::io::Error },
    /// Failed to build an index
    Build(BuildError),
    /// Storage or query failure
    Backend(BackendError),
    /// Failed to render output
    Output(String),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        match self {
            CliError::Backend(BackendError::AlreadyExists { .. }) => {
                eprintln!();
                eprintln!("Pass --overwrite to replace the existing mosaic.");
            }
            CliError::Backend(BackendError::Unauthorized { .. })
            | CliError::Backend(BackendError::Forbidden { .. }) => {
                eprintln!();
                eprintln!("Check your credentials:");
                eprintln!("  1. AWS_PROFILE / AWS_ACCESS_KEY_ID are set for S3 and DynamoDB");
                eprintln!("  2. The region matches the bucket or table (aws.region)");
                eprintln!("  3. The endpoint is reachable (aws.endpoint)");
            }
            CliError::Backend(BackendError::NoAssetsFound { .. }) => process::exit(2),
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::FileRead { path, error } => {
                write!(f, "Failed to read '{}': {}", path, error)
            }
            CliError::Build(e) => write!(f, "Failed to build mosaic: {}", e),
            CliError::Backend(e) => write!(f, "{}", e),
            CliError::Output(msg) => write!(f, "Failed to write output: {}", msg),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::FileRead { error, .. } => Some(error),
            CliError::Build(e) => Some(e),
            CliError::Backend(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<BuildError> for CliError {
    fn from(e: BuildError) -> Self {
        CliError::Build(e)
    }
}

impl From<BackendError> for CliError {
    fn from(e: BackendError) -> Self {
        CliError::Backend(e)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Output(e.to_string())
    }
}
