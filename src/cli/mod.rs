//! CLI module for equipgraph
//!
//! Offline tooling over the schema and query compilers:
//! - schema: Print base or per-type schema statements
//! - validate: Check a new equipment type against source columns
//! - list-query: Print the compiled listing query

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{list_query, run_command, schema, validate, DEFAULT_PAGE_SIZE};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_json, write_error, write_response};

use tracing_subscriber::EnvFilter;

/// Level used when `RUST_LOG` is unset, empty or unparseable
pub const DEFAULT_LOG_LEVEL: &str = "warn";

/// Log filter from `RUST_LOG`-style directives, falling back to warnings.
pub fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .filter(|d| !d.trim().is_empty())
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Parse arguments, run the command and print its JSON response.
///
/// Failures are also reported on stdout as an error object before being
/// returned to the caller.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    match run_command(cli.command) {
        Ok(data) => write_response(data),
        Err(e) => {
            write_error(e.code_str(), e.message())?;
            Err(e)
        }
    }
}
