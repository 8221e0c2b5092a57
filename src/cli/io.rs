//! JSON I/O handling for CLI
//!
//! - Input: JSON documents read from files
//! - Output: a single JSON object on stdout
//! - UTF-8 only

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::errors::{CliError, CliResult};

/// Read and deserialize a JSON document
pub fn read_json<T: DeserializeOwned>(path: &Path) -> CliResult<T> {
    let text = fs::read_to_string(path).map_err(|e| {
        CliError::input_error(format!("cannot read {}: {}", path.display(), e))
    })?;
    parse_json(&text)
        .map_err(|e| CliError::input_error(format!("{}: {}", path.display(), e.message())))
}

fn parse_json<T: DeserializeOwned>(text: &str) -> CliResult<T> {
    if text.trim().is_empty() {
        return Err(CliError::input_error("Empty input"));
    }
    Ok(serde_json::from_str(text)?)
}

/// Write a success response to stdout
pub fn write_response(data: Value) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "ok",
        "data": data
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}

/// Write an error response to stdout
pub fn write_error(code: &str, message: &str) -> CliResult<()> {
    let response = serde_json::json!({
        "status": "error",
        "code": code,
        "message": message
    });

    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, &response)?;
    writeln!(stdout)?;
    stdout.flush()?;

    Ok(())
}
