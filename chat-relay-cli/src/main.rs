//! CLI entry point for chat-relay

mod client;

use anyhow::Result;
use chat_relay_agent::ChatRelay;
use chat_relay_core::config::{Config, ConfigLoader, LoggingConfig};
use chat_relay_core::session::SessionStore;
use chat_relay_core::utils::expand_tilde;
use chat_relay_providers::{OpenAICompatClient, ProviderRegistry};
use chat_relay_server::{run_server, AppState};
use clap::{Parser, Subcommand};
use console::style;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::client::RelayClient;

#[derive(Parser)]
#[command(name = "chat-relay")]
#[command(about = "A WebSocket relay between chat clients and a hosted LLM")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration directory
    #[arg(short, long, global = true)]
    config_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the relay server
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run one turn in-process and print the reply
    Chat {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Session id for conversation continuity
        #[arg(short, long, default_value = "cli")]
        session: String,
        /// Model to use
        #[arg(long)]
        model: Option<String>,
    },
    /// Send one message to a running relay over WebSocket
    Send {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Session id for conversation continuity
        #[arg(short, long, default_value = "test123")]
        session: String,
        /// WebSocket base URL, e.g. ws://127.0.0.1:8000
        #[arg(short, long)]
        url: Option<String>,
    },
    /// Show status information
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    // Create config loader
    let config_loader = if let Some(dir) = cli.config_dir {
        ConfigLoader::with_dir(dir)
    } else {
        ConfigLoader::new()
    };
    let config = config_loader.load()?;

    let _log_guard = chat_relay_core::logging::init_logging(&resolve_log_dir(
        &config.logging,
        config_loader.config_dir(),
    ));

    match cli.command {
        Commands::Serve { host, port } => {
            info!("Starting relay server");
            run_serve(config, host, port).await?;
        }
        Commands::Chat {
            message,
            session,
            model,
        } => {
            info!("Processing message for session {}", session);
            run_chat(&config, &message, &session, model).await?;
        }
        Commands::Send {
            message,
            session,
            url,
        } => {
            let url = url.unwrap_or_else(|| {
                format!("ws://{}:{}", config.gateway.host, config.gateway.port)
            });
            info!("Sending message to {}", url);
            let reply = RelayClient::new(Some(url)).send(&session, &message).await?;
            println!("{}", reply);
        }
        Commands::Status => {
            info!("Showing status");
            run_status(&config_loader, &config);
        }
    }

    Ok(())
}

/// Relative log directories live under the config directory
fn resolve_log_dir(logging: &LoggingConfig, config_dir: &Path) -> LoggingConfig {
    let mut logging = logging.clone();
    let dir = expand_tilde(&logging.dir);
    if dir.is_relative() {
        logging.dir = config_dir.join(dir).to_string_lossy().into_owned();
    }
    logging
}

fn build_provider(config: &Config, model: &str) -> Result<OpenAICompatClient> {
    let registry = ProviderRegistry::new();
    let spec = config
        .relay
        .provider
        .as_deref()
        .and_then(|name| registry.find_by_name(name))
        .or_else(|| registry.find_for_model(model))
        .ok_or_else(|| anyhow::anyhow!("No provider found for model: {}", model))?;
    let provider_config = config.providers.by_name(&spec.name);

    let api_key = provider_config
        .map(|cfg| cfg.api_key.clone())
        .filter(|key| !key.is_empty());
    let api_base = provider_config
        .and_then(|cfg| cfg.api_base.clone())
        .filter(|base| !base.trim().is_empty());
    let extra_headers = provider_config
        .and_then(|cfg| cfg.extra_headers.clone())
        .filter(|headers| !headers.is_empty());

    Ok(OpenAICompatClient::new(
        api_key,
        api_base,
        model.to_string(),
        extra_headers,
        Some(spec.name.clone()),
    )
    .with_timeout(Duration::from_secs(config.relay.request_timeout_secs)))
}

fn build_relay(config: &Config, model: Option<String>) -> Result<ChatRelay> {
    let model = model.unwrap_or_else(|| config.relay.model.clone());
    let provider = Arc::new(build_provider(config, &model)?);
    let sessions = Arc::new(SessionStore::new());
    Ok(ChatRelay::new(sessions, provider, &config.relay).with_model(model))
}

/// Run the relay server until Ctrl+C
async fn run_serve(config: Config, host: Option<String>, port: Option<u16>) -> Result<()> {
    let host = host.unwrap_or_else(|| config.gateway.host.clone());
    let port = port.unwrap_or(config.gateway.port);
    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;

    let relay = build_relay(&config, None)?;

    println!("{}", style("Starting chat-relay...").bold().cyan());
    println!("Model: {}", relay.model());
    println!("Endpoint: ws://{}/ws/{{session_id}}", addr);

    let state = AppState::new(relay, config.relay.on_provider_error);
    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut server = tokio::spawn(run_server(state, addr, shutdown_rx));

    println!(
        "\n{}",
        style("Relay is running. Press Ctrl+C to stop.").green()
    );

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result?;
            println!("\n{}", style("Shutting down...").yellow());
            let _ = shutdown_tx.send(());
        }
        // the server only returns early when it failed to bind or serve
        result = &mut server => {
            match result {
                Ok(Err(e)) => error!("Server error: {}", e),
                Err(e) => error!("Server task failed: {}", e),
                Ok(Ok(())) => {}
            }
            anyhow::bail!("Relay server stopped unexpectedly");
        }
    }

    if let Ok(Err(e)) = server.await {
        error!("Server error during shutdown: {}", e);
    }

    println!("{}", style("Relay stopped.").green());
    Ok(())
}

/// Run one turn in-process
async fn run_chat(
    config: &Config,
    message: &str,
    session: &str,
    model: Option<String>,
) -> Result<()> {
    let relay = build_relay(config, model)?;
    let reply = relay.process_turn(session, message).await?;
    println!("{}", reply);
    Ok(())
}

fn run_status(loader: &ConfigLoader, config: &Config) {
    let registry = ProviderRegistry::new();

    println!("{}", style("chat-relay Status").bold().cyan());
    println!("Version: {}\n", env!("CARGO_PKG_VERSION"));

    // Config info
    println!("{}", style("Configuration:").bold());
    println!("  Config directory: {}", loader.config_dir().display());
    println!("  Model: {}", config.relay.model);
    println!(
        "  Gateway: {}:{}",
        config.gateway.host, config.gateway.port
    );
    println!(
        "  On provider error: {:?}",
        config.relay.on_provider_error
    );
    println!();

    // Provider info
    println!("{}", style("Providers:").bold());
    for (name, provider) in config.providers.entries() {
        let spec = registry.find_by_name(name);
        let label = spec
            .map(|spec| spec.label())
            .unwrap_or_else(|| name.to_string());
        let env_key = spec.map(|spec| spec.env_key.as_str());
        let status = provider_status(&provider.api_key, env_key);
        let status = if provider.api_key.is_empty() {
            style(status).red()
        } else {
            style(status).green()
        };
        println!("  {}: {}", label, status);
    }
}

/// Key status for one provider, naming the env var that would supply a missing key
fn provider_status(api_key: &str, env_key: Option<&str>) -> String {
    if !api_key.is_empty() {
        return "configured".to_string();
    }
    match env_key.filter(|key| !key.is_empty()) {
        Some(key) => format!("not configured (set {})", key),
        None => "not configured".to_string(),
    }
}
