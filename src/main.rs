//! equipgraph CLI entry point
//!
//! Installs the log subscriber, delegates to [`cli::run`], prints errors to
//! stderr and exits non-zero on failure.

use equipgraph::cli;

fn main() {
    let directives = std::env::var("RUST_LOG").ok();
    tracing_subscriber::fmt()
        .with_env_filter(cli::log_filter(directives.as_deref()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
