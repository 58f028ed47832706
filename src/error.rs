// Error types for the policy route sync daemon

use thiserror::Error;

/// Main error type for the reconciliation core
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Failed to list routes: {0}")]
    RouteScan(String),

    #[error("Failed to list rules: {0}")]
    RuleScan(String),

    #[error("Failed to parse ip output: {0}")]
    OutputParse(String),

    #[error("Failed to execute command: {0}")]
    CommandExecution(String),

    #[error("Command `{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Invalid network identifier '{0}'")]
    InvalidNetwork(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;
