mod api;
mod commands;
mod gateway;
mod i18n;
mod provider_builder;

use clap::{Parser, Subcommand};
use linerelay_channels::line::LineChannel;
use linerelay_core::{
    config::{self, shellexpand, Config, RelayConfig},
    context::Context,
    traits::{Channel, Provider},
};
use linerelay_memory::{HistoryStore, PromptStore, SessionTracker};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(
    name = "linerelay",
    version,
    about = "LINE chatbot relay to generative-AI completion APIs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the webhook server.
    Start,
    /// Check configuration and provider availability.
    Status,
    /// Send a one-shot message to the provider (default prompt, no history).
    Ask {
        /// The message to send.
        #[arg(trailing_var_arg = true)]
        message: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing .env is fine; the process environment still applies.
    let _ = dotenvy::dotenv();
    let cfg = load_config(&cli.config)?;
    let _log_guard = init_tracing(&cfg.relay)?;

    match cli.command {
        Commands::Start => start(cfg).await?,
        Commands::Status => status(&cli.config, &cfg).await,
        Commands::Ask { message } => {
            if message.is_empty() {
                anyhow::bail!("no message provided. Usage: linerelay ask <message>");
            }
            let prompt = message.join(" ");
            let provider = provider_builder::build_provider(&cfg)?;
            let default_prompt = load_default_prompt(&cfg).await;

            let context = Context::new(&prompt).with_system_prompt(default_prompt);
            let response = provider.complete(&context).await?;
            println!("{}", response.text);
        }
    }

    Ok(())
}

/// TOML file (optional) overlaid by environment variables.
fn load_config(path: &str) -> anyhow::Result<Config> {
    let mut cfg = config::load(path)?;
    cfg.apply_env_overrides()?;
    Ok(cfg)
}

/// Stderr logging, plus a plain-text file when `log_file` is set.
///
/// `RUST_LOG` wins over the configured level. The returned guard must
/// live until exit so buffered file output is flushed.
fn init_tracing(relay: &RelayConfig) -> anyhow::Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&relay.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = fmt::layer().with_writer(std::io::stderr);

    let Some(log_file) = relay.log_file.as_deref() else {
        tracing_subscriber::registry()
            .with(filter)
            .with(stderr_layer)
            .init();
        return Ok(None);
    };

    let path = shellexpand(log_file);
    let path = Path::new(&path);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow::anyhow!("log_file has no file name: {log_file}"))?;
    std::fs::create_dir_all(dir)?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        dir, file_name,
    ));
    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
    Ok(Some(guard))
}

async fn load_default_prompt(cfg: &Config) -> String {
    let path = shellexpand(&cfg.memory.system_prompt_file);
    PromptStore::load_default(Path::new(&path)).await
}

async fn start(cfg: Config) -> anyhow::Result<()> {
    cfg.validate()?;

    let provider: Arc<dyn Provider> = provider_builder::build_provider(&cfg)?.into();
    if !provider.is_available().await {
        warn!(
            "provider '{}' failed its availability check, starting anyway",
            provider.name()
        );
    }

    let channel: Arc<dyn Channel> = Arc::new(LineChannel::new(cfg.channel.line.clone()));
    let default_prompt = load_default_prompt(&cfg).await;
    let history = HistoryStore::new(&cfg.memory).await?;
    let prompts = PromptStore::new(&cfg.memory, default_prompt).await?;

    info!("{} starting", cfg.relay.name);
    let gw = Arc::new(gateway::Gateway::new(
        provider,
        channel,
        history,
        prompts,
        SessionTracker::new(),
        cfg.relay.language.clone(),
    ));

    let (tx, rx) = mpsc::channel(gateway::QUEUE_CAPACITY);
    let gateway_handle = tokio::spawn(gw.run(rx));

    let state = api::ApiState::new(tx, &cfg.channel.line.channel_secret, &cfg.relay.language);
    api::serve(&cfg.server, state).await?;

    gateway_handle.await?;
    Ok(())
}

async fn status(config_path: &str, cfg: &Config) {
    println!("linerelay: status check\n");
    println!("Config: {config_path}");
    println!("Provider: {}", cfg.provider.default);
    println!("Listen: {}:{}", cfg.server.host, cfg.server.port);
    println!("History dir: {}", cfg.memory.history_dir);
    println!("Prompts dir: {}", cfg.memory.prompts_dir);
    println!("Image dir: {}", cfg.memory.image_dir);
    println!();

    match cfg.validate() {
        Ok(()) => println!("  config: ok"),
        Err(e) => println!("  config: {e}"),
    }

    match provider_builder::build_provider(cfg) {
        Ok(provider) => {
            let available = provider.is_available().await;
            println!(
                "  {}: {}",
                provider.name(),
                if available { "available" } else { "unavailable" }
            );
        }
        Err(e) => println!("  provider: {e}"),
    }

    println!(
        "  line: {}",
        if cfg.channel.line.access_token.is_empty() {
            "missing access token"
        } else {
            "configured"
        }
    );
}
