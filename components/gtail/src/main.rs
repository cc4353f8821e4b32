use anyhow::Result;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Main entrypoint simply delegates control to CLI layer.
    // The CLI parses user options, loads configuration and drives the tail loop.
    gtail::cli::cli::run().await
}
