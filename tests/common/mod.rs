//! Shared test fixtures: a scripted in-memory transport and config helpers
#![allow(dead_code)]

use async_trait::async_trait;
use botgate::config::{BotHandle, Config};
use botgate::dispatch::Dispatcher;
use botgate::error::AppResult;
use botgate::metrics::Metrics;
use botgate::registry::BlackoutRegistry;
use botgate::transport::{ChatTransport, InboundMessage, MediaRef};
use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

/// One scripted reply: sent `delay` after the dispatch that consumed the script
#[derive(Debug, Clone)]
pub struct ScriptedReply {
    pub delay: Duration,
    pub text: String,
    pub media: Option<MediaRef>,
}

pub fn reply(delay_secs: u64, text: &str) -> ScriptedReply {
    ScriptedReply {
        delay: Duration::from_secs(delay_secs),
        text: text.to_string(),
        media: None,
    }
}

/// In-memory transport driven by per-bot reply scripts
///
/// Every `send_command` consumes the next script queued for the target bot
/// and replays it into the broadcast channel on a background task, honoring
/// per-reply delays (which the paused test clock auto-advances through).
/// Bots without a script stay silent.
pub struct ScriptedTransport {
    tx: broadcast::Sender<InboundMessage>,
    scripts: Mutex<HashMap<BotHandle, VecDeque<Vec<ScriptedReply>>>>,
    dispatches: Mutex<Vec<(BotHandle, String)>>,
    next_id: AtomicU64,
}

impl ScriptedTransport {
    pub fn new() -> Arc<Self> {
        let (tx, _) = broadcast::channel(64);
        Arc::new(Self {
            tx,
            scripts: Mutex::new(HashMap::new()),
            dispatches: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        })
    }

    /// Queue one dispatch worth of replies for a bot
    pub fn script(&self, bot: &str, replies: Vec<ScriptedReply>) {
        self.scripts
            .lock()
            .expect("scripts lock")
            .entry(BotHandle::from(bot))
            .or_default()
            .push_back(replies);
    }

    /// Every dispatched `(bot, command)` pair, in order
    pub fn dispatches(&self) -> Vec<(BotHandle, String)> {
        self.dispatches.lock().expect("dispatches lock").clone()
    }

    /// Number of dispatches sent to one bot
    pub fn dispatch_count(&self, bot: &str) -> usize {
        let handle = BotHandle::from(bot);
        self.dispatches
            .lock()
            .expect("dispatches lock")
            .iter()
            .filter(|(b, _)| *b == handle)
            .count()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn connect(&self) -> AppResult<()> {
        Ok(())
    }

    async fn disconnect(&self) {}

    async fn send_command(&self, target: &BotHandle, text: &str) -> AppResult<()> {
        self.dispatches
            .lock()
            .expect("dispatches lock")
            .push((target.clone(), text.to_string()));

        let script = self
            .scripts
            .lock()
            .expect("scripts lock")
            .get_mut(target)
            .and_then(|queue| queue.pop_front());

        if let Some(replies) = script {
            let tx = self.tx.clone();
            let sender = target.clone();
            let base = self
                .next_id
                .fetch_add(replies.len() as u64 + 1, Ordering::SeqCst);
            tokio::spawn(async move {
                for (i, scripted) in replies.into_iter().enumerate() {
                    tokio::time::sleep(scripted.delay).await;
                    let _ = tx.send(InboundMessage {
                        id: base + i as u64,
                        sender: sender.clone(),
                        text: scripted.text,
                        media: scripted.media,
                    });
                }
            });
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.tx.subscribe()
    }

    async fn download_attachment(&self, media: &MediaRef) -> AppResult<PathBuf> {
        // No I/O: the dispatcher only uses the file name to build the URL
        Ok(PathBuf::from(format!(
            "downloads/1700000000_{}.{}",
            media.id,
            media.extension()
        )))
    }
}

/// Standard two-bot chain plus a prefixed single-bot chain
pub fn test_config() -> Config {
    parse_config(
        r#"
[server]
host = "127.0.0.1"
port = 8080
public_url = "http://localhost:8080"

[transport]
api_base = "http://localhost:9000"
session_token = "test-token"

[engine]
quiet_window_ms = 4500
cooldown_seconds = 5
blackout_hours = 3

[[chains]]
name = "lederdata"

[[chains.bots]]
handle = "@primary_bot"
timeout_seconds = 35
name_search_timeout_seconds = 50

[[chains.bots]]
handle = "@backup_bot"
timeout_seconds = 50
name_search_timeout_seconds = 65

[[chains]]
name = "azura"
route_prefix = "azura_"

[[chains.bots]]
handle = "@azura_bot"
timeout_seconds = 35
"#,
    )
}

pub fn parse_config(toml_str: &str) -> Config {
    let config: Config = toml::from_str(toml_str).expect("test config parses");
    config.validate().expect("test config validates");
    config
}

/// Dispatcher plus its collaborators, wired to a scripted transport
pub struct Harness {
    pub config: Config,
    pub transport: Arc<ScriptedTransport>,
    pub registry: Arc<BlackoutRegistry>,
    pub dispatcher: Dispatcher,
}

pub fn harness(config: Config) -> Harness {
    let transport = ScriptedTransport::new();
    let registry = Arc::new(BlackoutRegistry::new(config.engine.blackout()));
    let metrics = Metrics::new().expect("metrics register");
    let dispatcher = Dispatcher::new(
        &config,
        transport.clone() as Arc<dyn ChatTransport>,
        registry.clone(),
        metrics,
    );
    Harness {
        config,
        transport,
        registry,
        dispatcher,
    }
}
