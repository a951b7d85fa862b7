#![allow(clippy::uninlined_format_args)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use serde_json::json;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod errors;

use pagewatch::{ContextKind, OutputFormat};

#[derive(Parser)]
#[command(name = "pagewatch")]
#[command(about = "Browser telemetry monitors that produce LLM context blocks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (defaults to ~/.pagewatch/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a page, monitor it, and print context blocks
    Watch {
        /// URL to monitor
        url: String,

        /// How long to monitor, in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Context blocks to print (repeatable, defaults to all)
        #[arg(short, long)]
        context: Vec<ContextKind>,

        /// Print only the blocks this prompt mentions as @kind
        #[arg(long, conflicts_with = "context")]
        prompt: Option<String>,

        /// JSON file with the selected components
        #[arg(long)]
        components: Option<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "markdown")]
        format: OutputFormat,

        /// Browser to use (overrides configuration)
        #[arg(short, long)]
        browser: Option<String>,

        /// WebDriver endpoint (overrides configuration)
        #[arg(long)]
        webdriver_url: Option<String>,

        /// Polling interval in milliseconds (overrides configuration)
        #[arg(long)]
        poll_ms: Option<u64>,

        /// Set viewport size (WIDTHxHEIGHT, e.g., 1920x1080)
        #[arg(long)]
        viewport: Option<String>,

        /// Run browser in visible mode (disables headless)
        #[arg(long = "no-headless")]
        no_headless: bool,
    },

    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        let err = errors::PagewatchError::from(e);
        let error_json = json!({
            "error": true,
            "message": err.to_string(),
            "exit_code": err.exit_code()
        });
        println!(
            "{}",
            serde_json::to_string(&error_json).unwrap_or_else(|_| "{}".to_string())
        );

        // Also log to stderr for human reading
        eprintln!("Error: {}", err);
        std::process::exit(err.exit_code());
    }
}

async fn run() -> Result<()> {
    // Initialize tracing to stderr (so output to stdout remains clean)
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pagewatch=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Watch {
            url,
            duration,
            context,
            prompt,
            components,
            format,
            browser,
            webdriver_url,
            poll_ms,
            viewport,
            no_headless,
        } => {
            let options = commands::watch::WatchOptions {
                url,
                duration,
                context,
                prompt,
                components,
                format,
                browser,
                webdriver_url,
                poll_ms,
                viewport,
                headless: !no_headless,
            };
            commands::watch::handle_watch(cli.config, options).await?
        }

        Commands::Config => commands::config::handle_config(cli.config)?,
    }

    Ok(())
}
