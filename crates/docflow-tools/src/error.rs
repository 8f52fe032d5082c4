//! Error types for tool execution.

use docflow_models::OptionError;
use thiserror::Error;

use crate::capability::Arity;

/// Result type for tool operations.
pub type ToolResult<T> = Result<T, ToolError>;

/// Errors that can occur while resolving or running a tool.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool '{0}' is already registered")]
    DuplicateTool(String),

    #[error("Tool '{tool}' takes {expected} file(s), got {got}")]
    Arity {
        tool: String,
        expected: Arity,
        got: usize,
    },

    #[error(transparent)]
    InvalidOption(#[from] OptionError),

    #[error("{0} not found in PATH")]
    ProgramNotFound(String),

    #[error("{program} failed: {message}")]
    CommandFailed {
        program: String,
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("{program} timed out after {secs} seconds")]
    Timeout { program: String, secs: u64 },

    #[error("Tool '{0}' produced no output")]
    NoOutput(String),

    #[error("Unexpected output from {program}: {message}")]
    UnexpectedOutput { program: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ToolError {
    /// Create a command failure error.
    pub fn command_failed(
        program: impl Into<String>,
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::CommandFailed {
            program: program.into(),
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    pub fn unexpected_output(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            program: program.into(),
            message: message.into(),
        }
    }

    /// True for failures detected before anything was run.
    pub fn is_dispatch(&self) -> bool {
        matches!(self, ToolError::UnknownTool(_) | ToolError::Arity { .. })
    }
}
