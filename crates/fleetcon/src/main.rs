mod cli;
mod commands;
mod config;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::{CliError, exit_code};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.global.verbose);

    // Remote exit codes pass through; local failures use the exit_code table
    let code = match commands::dispatch(cli.command, &cli.global).await {
        Ok(code) => code,
        Err(err) => report(err),
    };

    if code != exit_code::SUCCESS {
        std::process::exit(code);
    }
}

fn report(err: CliError) -> i32 {
    let code = err.exit_code();
    eprintln!("{:?}", miette::Report::new(err));
    code
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
