//! advbot
//!
//! Plays an interactive fiction game through a remote message service:
//! - `play`: run the game in this terminal
//! - `relay`: post game output as reply chains and take commands from mentions
//! - `post`: send a single message chain

mod relay;

use advbot_bridge::ProcessBridge;
use advbot_core::Credentials;
use advbot_remote::{HttpApi, RemoteClient};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay::RelayConfig;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Debug, Parser)]
#[command(name = "advbot", version, about = "Interactive fiction over a message service")]
struct Cli {
    /// JSON config file
    #[arg(long, global = true, env = "ADVBOT_CONFIG")]
    config: Option<PathBuf>,

    /// JSON key bundle for the message service
    #[arg(long, global = true, env = "ADVBOT_KEYS", default_value = "twitter_keys.json")]
    keys: PathBuf,

    /// Interpreter used to run the story file
    #[arg(long, global = true)]
    interpreter: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Play a story in this terminal
    Play {
        /// Story file
        story: String,
    },
    /// Relay a story to the message service
    Relay {
        /// Story file
        story: String,
    },
    /// Post text as a message chain and print the ids
    Post {
        /// Text to post
        #[arg(required = true)]
        text: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();
    let mut config = RelayConfig::load(cli.config.as_deref())?;
    if let Some(interpreter) = cli.interpreter {
        config.bridge.program = interpreter;
    }

    let code = match cli.command {
        Commands::Play { story } => {
            config.bridge.args = vec![story];
            let mut bridge = ProcessBridge::spawn(config.bridge.clone())?;
            let result = tokio::select! {
                result = relay::run_console(&mut bridge) => result,
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted");
                    Ok(130)
                }
            };
            bridge.teardown().await?;
            result?
        }
        Commands::Relay { story } => {
            config.bridge.args = vec![story];
            let client = connect(&cli.keys, &config).await?;
            let mut bridge = ProcessBridge::spawn(config.bridge.clone())?;
            let result = tokio::select! {
                result = relay::run_relay(&mut bridge, &client, config.poll_interval()) => result,
                _ = tokio::signal::ctrl_c() => {
                    warn!("Interrupted");
                    Ok(130)
                }
            };
            bridge.teardown().await?;
            result?
        }
        Commands::Post { text } => {
            let client = connect(&cli.keys, &config).await?;
            let ids = client.send_message_chain(&text, None).await?;
            for id in ids {
                println!("{}", id);
            }
            0
        }
    };

    info!("Exiting with code {}", code);
    std::process::exit(code);
}

async fn connect(keys: &Path, config: &RelayConfig) -> Result<RemoteClient<HttpApi>> {
    let credentials = Credentials::from_file(keys)?;
    let api = HttpApi::new(&config.api_base_url, config.remote.request_timeout())
        .context("creating HTTP client")?;
    let client = RemoteClient::authenticate(api, &credentials, config.remote.clone()).await?;
    Ok(client)
}
