use std::io;

use anyhow::Result;
use chessbot::cli::CliHandler;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let mut cli = CliHandler::new();
    println!("Type `help` for commands.");
    cli.run(io::stdin().lock(), io::stdout())
}
