//! CLI argument parsing using clap

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// equipgraph - equipment schema and query compiler
#[derive(Parser, Debug)]
#[command(name = "equipgraph")]
#[command(about = "Compile equipment type schemas and listing queries")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the schema statements of an equipment type, or the base
    /// statements when no definition is given
    Schema {
        /// Path to an equipment type definition (JSON)
        #[arg(long)]
        definition: Option<PathBuf>,
    },

    /// Validate a new equipment type against a metadata source
    Validate {
        /// Path to the candidate definition (JSON)
        #[arg(long)]
        definition: PathBuf,

        /// Columns provided by the metadata source
        #[arg(long, value_delimiter = ',', required = true)]
        columns: Vec<String>,

        /// Path to the already defined types (JSON array)
        #[arg(long)]
        existing: Option<PathBuf>,
    },

    /// Print the compiled listing query for an equipment type
    ListQuery {
        /// Path to the equipment type definition (JSON)
        #[arg(long)]
        definition: PathBuf,

        /// Path to the listing request (JSON); defaults to the first page
        #[arg(long)]
        spec: Option<PathBuf>,

        /// Scopes the listing is restricted to
        #[arg(long = "scope", required = true)]
        scopes: Vec<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
