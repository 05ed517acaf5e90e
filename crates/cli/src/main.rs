//! Matchup verification CLI - Main Entry Point
//!
//! Runs browser verification flows against the Matchup web app and
//! reports what passed, with screenshots as evidence.

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{list, run, script};

/// Matchup browser verification
#[derive(Parser)]
#[command(name = "matchup-verify")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run verification flows in the browser
    Run(run::RunArgs),

    /// List available flows
    List(list::ListArgs),

    /// Print the Playwright script generated for a flow
    Script(script::ScriptArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => {
            let passed = run::execute(args, cli.format).await?;
            if !passed {
                std::process::exit(1);
            }
        }
        Commands::List(args) => list::execute(args, cli.format)?,
        Commands::Script(args) => script::execute(args)?,
    }

    Ok(())
}
