//! MCP server daemon.
//!
//! Usage:
//! cargo run --features http --bin agentryd                        # Env-only configuration
//! cargo run --features http --bin agentryd -- --config agentry.toml
//! cargo run --features http --bin agentryd -- --port 9090 --log-level debug
//! cargo run --features http --bin agentryd -- --json-logs        # Structured log output

use clap::Parser;
use std::path::PathBuf;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use agentry::config::{AgentryConfig, LoggingConfig};
use agentry::http::HttpServer;
use agentry::server::McpServer;
use agentry::toolsets::{github, slack};
use agentry::utils::logging::{obscure_credential, sanitize_for_logging};

#[derive(Debug, Parser)]
#[command(name = "agentryd", version, about = "MCP agent and tool execution server")]
struct Cli {
    /// Path to a TOML, YAML, or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the bind host
    #[arg(long)]
    host: Option<String>,

    /// Override the bind port
    #[arg(long)]
    port: Option<u16>,

    /// Override the log filter, e.g. "debug" or "agentry=debug,info"
    #[arg(long)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(config: &LoggingConfig) {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_target(true)
            .json()
            .with_filter(filter);
        tracing_subscriber::registry().with(layer).init();
    } else {
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(true)
            .with_filter(filter);
        tracing_subscriber::registry().with(layer).init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Environment overrides file values; CLI flags override both
    let mut config = match &cli.config {
        Some(path) => AgentryConfig::from_file(path)?.merge_with_env()?,
        None => AgentryConfig::from_env()?,
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    config.validate()?;

    init_logging(&config.logging);

    info!("Starting agentryd {}", McpServer::version());
    debug!(
        "Loaded configuration: {}",
        sanitize_for_logging(&format!("{:?}", config))
    );

    match &config.github.token {
        Some(token) => info!("GitHub token configured ({})", obscure_credential(token)),
        None => warn!("GitHub token not set; github tools will fail at call time"),
    }
    match &config.slack.bot_token {
        Some(token) => info!("Slack bot token configured ({})", obscure_credential(token)),
        None => warn!("Slack bot token not set; slack tools will fail at call time"),
    }

    let server = McpServer::new();
    github::register_tools(&server, &config.github).await?;
    slack::register_tools(&server, &config.slack).await?;
    server.start();

    HttpServer::new(server, config.server.clone()).start().await?;
    Ok(())
}
