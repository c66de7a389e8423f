mod cli;
mod commands;
mod config;
mod docker;
mod env;
mod error;
mod proc;
mod prompt;
mod router;
mod state;

use clap::Parser;
use colored::Colorize;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::{select_environment, StackConfig};
use crate::prompt::TermConfirm;
use crate::state::StackState;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code.clamp(0, u8::MAX as i32) as u8),
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> error::Result<i32> {
    let cfg = StackConfig::load(&cli.config)?;
    let env = select_environment(&cfg, &cli.env, cli.yes, &mut TermConfirm)?;
    let mut state = StackState::new(env);
    commands::dispatch(&mut state, cli.cmd).await
}
