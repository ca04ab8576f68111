//! Loops tying the game bridge to the console or the remote service

use advbot_bridge::ProcessBridge;
use advbot_core::{BridgeConfig, MessageId, RemoteConfig};
use advbot_remote::{DEFAULT_BASE_URL, RemoteApi, RemoteClient};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::sleep;
use tracing::info;
use uuid::Uuid;

/// Top-level configuration file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bridge: BridgeConfig,
    pub remote: RemoteConfig,
    /// Base URL of the message service
    pub api_base_url: String,
    /// Pause between relay iterations in milliseconds (default: 300)
    pub poll_interval_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bridge: BridgeConfig::default(),
            remote: RemoteConfig::default(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval_ms: 300,
        }
    }
}

impl RelayConfig {
    /// Load from a JSON file, or use defaults when no file is given
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&data).with_context(|| format!("parsing config {}", path.display()))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

/// Play in the terminal: print output, read commands from stdin.
///
/// Returns the game's exit code.
pub async fn run_console(bridge: &mut ProcessBridge) -> Result<i32> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    loop {
        for line in bridge.read_block().await {
            println!("{}", line);
        }

        if let Some(code) = bridge.exit_code() {
            println!("Game process has ended.");
            return Ok(code);
        }

        eprint!("Input >> ");
        let Some(command) = stdin.next_line().await.context("reading stdin")? else {
            info!("stdin closed");
            return Ok(bridge.exit_code().unwrap_or(0));
        };
        bridge.write_command(&command);
    }
}

/// Relay the game to the remote service until the game exits.
///
/// Output blocks are posted as reply chains under the latest header post;
/// every new mention becomes a command, announced with its own header.
/// Returns the game's exit code.
pub async fn run_relay<A: RemoteApi>(
    bridge: &mut ProcessBridge,
    client: &RemoteClient<A>,
    poll_interval: Duration,
) -> Result<i32> {
    let mut header = post_header(client, "Starting Adventure").await?;

    // skip everything said before we started
    client.get_latest_mentions().await;

    loop {
        post_output(bridge, client, header).await?;

        if let Some(code) = bridge.exit_code() {
            // anything queued between the last read and the exit
            post_output(bridge, client, header).await?;
            info!("Game ended with code {}", code);
            return Ok(code);
        }

        for mention in client.get_latest_mentions().await {
            let Some(command) = command_from_mention(&mention.text) else {
                continue;
            };
            info!("Command from {}: {}", mention.author, command);
            header = post_header(client, &format!("Sending Command: {}", command)).await?;
            bridge.write_command(&command);
        }

        sleep(poll_interval).await;
    }
}

async fn post_output<A: RemoteApi>(
    bridge: &mut ProcessBridge,
    client: &RemoteClient<A>,
    header: MessageId,
) -> Result<()> {
    let output = bridge.read_block().await;
    if !output.is_empty() {
        info!("Sending output:\n{}", output.join("\n"));
        client.send_message_chain(&output, Some(header)).await?;
    }
    Ok(())
}

/// Post a status line with a short unique suffix so repeats are accepted
pub async fn post_header<A: RemoteApi>(client: &RemoteClient<A>, text: &str) -> Result<MessageId> {
    let ids = client.send_message_chain(&[header_text(text)], None).await?;
    ids.first()
        .copied()
        .context("header post produced no message")
}

fn header_text(text: &str) -> String {
    let unique = Uuid::new_v4().simple().to_string();
    format!("{}\n\n{}", text, &unique[..8])
}

/// Turn a mention into a game command.
///
/// Leading `@handle` tokens are dropped and the first non-empty line is used.
pub fn command_from_mention(text: &str) -> Option<String> {
    let mut rest = text.trim_start();
    while rest.starts_with('@') {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }

    rest.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use advbot_core::{Credentials, MentionRecord};
    use advbot_remote::ApiError;
    use async_trait::async_trait;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_command_from_mention() {
        assert_eq!(command_from_mention("@advbot open mailbox"), Some("open mailbox".into()));
        assert_eq!(command_from_mention("  @advbot @friend  north \n"), Some("north".into()));
        assert_eq!(command_from_mention("@advbot\n\n take lamp\nlol"), Some("take lamp".into()));
        assert_eq!(command_from_mention("look"), Some("look".into()));
        assert_eq!(command_from_mention("@advbot"), None);
        assert_eq!(command_from_mention("   "), None);
    }

    #[test]
    fn test_header_text_is_unique() {
        let a = header_text("Starting Adventure");
        let b = header_text("Starting Adventure");
        assert!(a.starts_with("Starting Adventure\n\n"));
        assert_eq!(a.len(), "Starting Adventure\n\n".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_relay_config_from_json() {
        let json = r#"{
            "bridge": {"args": ["z8/advent.z8"]},
            "remote": {"message_limit": 280},
            "poll_interval_ms": 1000
        }"#;
        let config: RelayConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.bridge.args, vec!["z8/advent.z8"]);
        assert_eq!(config.remote.message_limit, 280);
        assert_eq!(config.remote.network_backoff_secs, 30);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.api_base_url, DEFAULT_BASE_URL);

        assert_eq!(RelayConfig::load(None).unwrap(), RelayConfig::default());
    }

    #[test]
    fn test_relay_config_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"api_base_url": "http://localhost:8080", "bridge": {{"program": "frotz"}}}}"#
        )
        .unwrap();
        let config = RelayConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.api_base_url, "http://localhost:8080");
        assert_eq!(config.bridge.program, std::path::PathBuf::from("frotz"));
        assert_eq!(config.poll_interval_ms, 300);

        let mut bad = tempfile::NamedTempFile::new().unwrap();
        write!(bad, "not json").unwrap();
        let err = RelayConfig::load(Some(bad.path())).unwrap_err();
        assert!(err.downcast_ref::<serde_json::Error>().is_some(), "{:?}", err);

        assert!(RelayConfig::load(Some(Path::new("/nonexistent/advbot.json"))).is_err());
    }

    #[derive(Default)]
    struct FakeState {
        posts: Vec<(MessageId, String, Option<MessageId>)>,
        list_calls: usize,
    }

    /// Service with one old mention and one that arrives after startup
    #[derive(Clone, Default)]
    struct FakeService {
        state: Arc<Mutex<FakeState>>,
    }

    #[async_trait]
    impl RemoteApi for FakeService {
        async fn authenticate(&mut self, _: &Credentials) -> std::result::Result<(), ApiError> {
            Ok(())
        }

        async fn post_message(
            &mut self,
            text: &str,
            reply_to: Option<MessageId>,
        ) -> std::result::Result<MessageId, ApiError> {
            let mut state = self.state.lock().unwrap();
            let id = MessageId(100 + state.posts.len() as u64);
            state.posts.push((id, text.to_string(), reply_to));
            Ok(id)
        }

        async fn list_mentions(
            &mut self,
            since: Option<MessageId>,
            _max_results: Option<usize>,
        ) -> std::result::Result<Vec<MentionRecord>, ApiError> {
            let mut state = self.state.lock().unwrap();
            state.list_calls += 1;
            let mut mentions = vec![MentionRecord::new(1, "@advbot quit", "early")];
            if state.list_calls > 1 {
                mentions.push(MentionRecord::new(2, "@advbot north", "player1"));
            }
            Ok(mentions
                .into_iter()
                .filter(|m| since.is_none_or(|s| m.id > s))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_relay_round_trip() {
        let service = FakeService::default();
        let client = RemoteClient::authenticate(
            service.clone(),
            &Credentials::with_token("token"),
            RemoteConfig::default(),
        )
        .await
        .unwrap();

        let mut config = BridgeConfig::with_command(
            "/bin/sh",
            &["-c", "echo Welcome; read cmd; echo \"You go $cmd\""],
        );
        config.read_retries = 50;
        config.read_interval_ms = 10;
        let mut bridge = ProcessBridge::spawn(config).unwrap();

        let code = tokio::time::timeout(
            Duration::from_secs(30),
            run_relay(&mut bridge, &client, Duration::from_millis(10)),
        )
        .await
        .expect("relay did not finish")
        .unwrap();
        assert_eq!(code, 0);

        let posts = service.state.lock().unwrap().posts.clone();
        let text_of = |needle: &str| {
            posts
                .iter()
                .find(|(_, text, _)| text.starts_with(needle))
                .cloned()
                .unwrap_or_else(|| panic!("no post starting with {:?} in {:?}", needle, posts))
        };

        let (start_id, _, start_reply) = text_of("Starting Adventure");
        assert_eq!(start_reply, None);
        assert_eq!(text_of("Welcome").2, Some(start_id));

        let (command_id, _, _) = text_of("Sending Command: north");
        assert_eq!(text_of("You go north").2, Some(command_id));

        // the mention that predates the relay is never replayed
        assert!(!posts.iter().any(|(_, text, _)| text.contains("quit")));

        bridge.teardown().await.unwrap();
    }
}
