#![doc = include_str!("../README.md")]

mod cli;
mod commands;
mod types;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Commands};
use commands::helpers::parse_output_format;
pub(crate) use types::OutputFormat;

fn main() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let format = parse_output_format(&cli.format)?;

    match cli.command {
        Commands::Verify(args) => commands::verify::run_verify_command(args, format)?,
        Commands::Explore {
            program,
            args,
            echo,
        } => commands::explore::run_explore_command(program, args, echo, format)?,
        Commands::Classify {
            log,
            properties,
            print_cause,
        } => commands::classify::run_classify_command(log, &properties, print_cause, format)?,
    }
    Ok(())
}
