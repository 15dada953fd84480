//! voice-studio entry point.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;
use voice_studio::cli::{Args, Command};
use voice_studio::{console, server};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match &args.command {
        Command::Serve(serve) => server::start_server(&args, serve).await,
        Command::Console(console_args) => console::run(&args, console_args).await,
    }
}
