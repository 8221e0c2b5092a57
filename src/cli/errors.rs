//! CLI-specific error types
//!
//! Every CLI error is fatal: the process prints it and exits non-zero.

use std::fmt;
use std::io;

use crate::errors::EquipError;

/// CLI error codes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliErrorCode {
    /// Input file could not be read or parsed
    InputError,
    /// I/O error (stdout)
    IoError,
    /// Domain operation rejected the input
    Rejected,
}

impl CliErrorCode {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputError => "EQP_CLI_INPUT_ERROR",
            Self::IoError => "EQP_CLI_IO_ERROR",
            Self::Rejected => "EQP_CLI_REJECTED",
        }
    }
}

/// CLI error
#[derive(Debug)]
pub struct CliError {
    code: CliErrorCode,
    message: String,
}

impl CliError {
    /// Create a new CLI error
    pub fn new(code: CliErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn input_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::InputError, msg)
    }

    pub fn io_error(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::IoError, msg)
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::new(CliErrorCode::Rejected, msg)
    }

    /// Get the error code
    pub fn code(&self) -> &CliErrorCode {
        &self.code
    }

    /// Get the error code string
    pub fn code_str(&self) -> &'static str {
        self.code.code()
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.code(), self.message)
    }
}

impl std::error::Error for CliError {}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        Self::io_error(e.to_string())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        Self::input_error(format!("JSON error: {}", e))
    }
}

impl From<EquipError> for CliError {
    fn from(e: EquipError) -> Self {
        Self::rejected(format!("{} ({})", e, e.code()))
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
