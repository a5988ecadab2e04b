//! colonylab CLI: the main entry point.
//!
//! Commands:
//! - `serve`: Start the HTTP API
//! - `mcp`: Serve the lab database over MCP (stdio)
//! - `prompts`: Inspect and render the prompt templates
//! - `doctor`: Diagnose configuration and credentials
//! - `submit`: Send a plate photo to a running API

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "colonylab",
    about = "colonylab: agar plate photos in, laboratory reports out",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// TOML config file (defaults to $COLONYLAB_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Run the MCP database server on stdin/stdout
    Mcp,

    /// Inspect prompt templates
    Prompts {
        #[command(subcommand)]
        command: commands::prompts::PromptsCommand,
    },

    /// Diagnose configuration and credentials
    Doctor,

    /// Post a plate photo to a running API and print the answer
    Submit {
        /// JPEG or PNG file
        image: PathBuf,

        /// Base URL of the API
        #[arg(long, env = "COLONYLAB_API_URL", default_value = "http://localhost:8688")]
        api_url: String,

        /// Ask for the structured analysis instead of the Markdown report
        #[arg(long)]
        structured: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json_logs);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Serve { port } => commands::serve::run(config, port).await?,
        Commands::Mcp => commands::mcp::run(config).await?,
        Commands::Prompts { command } => commands::prompts::run(config, command)?,
        Commands::Doctor => commands::doctor::run(config).await?,
        Commands::Submit {
            image,
            api_url,
            structured,
        } => commands::submit::run(&image, &api_url, structured).await?,
    }

    Ok(())
}

/// Logs go to stderr so stdout stays clean for `mcp` and `submit`.
fn init_tracing(verbose: bool, json: bool) {
    let rust_log = std::env::var("RUST_LOG").ok();
    let directives = log_directives(verbose, rust_log.as_deref());
    let filter = tracing_subscriber::EnvFilter::try_new(directives)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// `--verbose` wins over `RUST_LOG`, which wins over the `info` default.
fn log_directives(verbose: bool, rust_log: Option<&str>) -> &str {
    if verbose {
        return "debug";
    }
    match rust_log.map(str::trim) {
        Some(directives) if !directives.is_empty() => directives,
        _ => "info",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbose_overrides_rust_log() {
        assert_eq!(log_directives(true, Some("info")), "debug");
        assert_eq!(log_directives(true, None), "debug");
    }

    #[test]
    fn rust_log_applies_without_verbose() {
        assert_eq!(log_directives(false, Some("colonylab=trace")), "colonylab=trace");
        assert_eq!(log_directives(false, Some("  ")), "info");
        assert_eq!(log_directives(false, None), "info");
    }

    #[test]
    fn cli_parses_global_verbose_after_subcommand() {
        let cli = Cli::try_parse_from(["colonylab", "doctor", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(cli.command, Commands::Doctor));
    }
}
