//! Error handling for the ionc CLI.

use thiserror::Error;

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;

/// CLI-specific errors
#[derive(Error, Debug)]
pub enum CliError {
    /// Frontend error (lexing or parsing)
    #[error("{0}")]
    Parse(#[from] ionc_lang::ParseError),

    /// Middle-end error (resolution, optimization, or solving)
    #[error("{0}")]
    Compile(#[from] ionc_compiler::CompileError),

    /// Back-end error (C++ emission)
    #[error("{0}")]
    Print(#[from] ionc_printer::PrintError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Generic error
    #[error("Error: {0}")]
    Generic(#[from] anyhow::Error),

    /// Invalid command arguments
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),
}

impl CliError {
    /// Create an invalid arguments error
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArgs(msg.into())
    }
}
