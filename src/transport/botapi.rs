//! HTTP bot-gateway transport
//!
//! Talks to a bot-network gateway over plain HTTP: an authorization probe,
//! fire-and-forget message posting, a long-poll update loop that publishes
//! into the shared broadcast channel, and media download to the local
//! attachments directory.

use crate::config::{BotHandle, Config};
use crate::error::{AppError, AppResult};
use crate::transport::{ChatTransport, InboundMessage, MediaRef};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;

/// Capacity of the inbound broadcast channel
///
/// Bounds memory under a reply flood; a collector that falls this far behind
/// observes a `Lagged` error and logs the gap.
const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Long-poll hold time requested from the gateway, in seconds
const LONG_POLL_SECONDS: u64 = 25;

#[derive(Debug, Deserialize)]
struct UpdateBatch {
    #[serde(default)]
    updates: Vec<InboundMessage>,
}

/// Transport over an HTTP bot-gateway API
pub struct BotApiTransport {
    http: reqwest::Client,
    api_base: String,
    session_token: String,
    poll_interval: Duration,
    downloads_dir: PathBuf,
    inbound: broadcast::Sender<InboundMessage>,
    /// Next update id to request; advances past every published update
    offset: AtomicU64,
}

impl BotApiTransport {
    /// Build a transport from configuration
    ///
    /// # Errors
    /// Fails fast when the session token is missing (fatal configuration
    /// error) or the HTTP client cannot be constructed.
    pub fn new(config: &Config) -> AppResult<Self> {
        let session_token = config.transport.session_token()?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(LONG_POLL_SECONDS + 10))
            .build()
            .map_err(|e| AppError::Transport {
                reason: format!("failed to build HTTP client: {e}"),
            })?;
        let (inbound, _) = broadcast::channel(INBOUND_CHANNEL_CAPACITY);

        Ok(Self {
            http,
            api_base: config.transport.api_base().to_string(),
            session_token,
            poll_interval: Duration::from_millis(config.transport.poll_interval_ms),
            downloads_dir: config.server.downloads_dir.clone(),
            inbound,
            offset: AtomicU64::new(0),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/session/{}/{}", self.api_base, self.session_token, path)
    }

    /// Run one long-poll cycle and publish every received update
    ///
    /// Returns the number of updates published. Public so the poll loop and
    /// tests share the exact same code path.
    pub async fn poll_once(&self) -> AppResult<usize> {
        let offset = self.offset.load(Ordering::SeqCst);
        let response = self
            .http
            .get(self.url("updates"))
            .query(&[
                ("offset", offset.to_string()),
                ("timeout", LONG_POLL_SECONDS.to_string()),
            ])
            .send()
            .await
            .map_err(|e| AppError::Transport {
                reason: format!("update poll failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Transport {
                reason: format!("update poll returned {}", response.status()),
            });
        }

        let batch: UpdateBatch = response.json().await.map_err(|e| AppError::Transport {
            reason: format!("update poll returned malformed body: {e}"),
        })?;

        let count = batch.updates.len();
        for message in batch.updates {
            self.offset.fetch_max(message.id + 1, Ordering::SeqCst);
            // A send error only means no collector is currently listening,
            // which is the idle steady state.
            let _ = self.inbound.send(message);
        }
        Ok(count)
    }

    /// Start the background update poller
    ///
    /// Spawns the poll loop plus a monitor task that makes an unexpected
    /// termination loudly visible instead of silently starving every
    /// collector.
    pub fn spawn_poller(self: Arc<Self>) {
        let poll_interval = self.poll_interval;
        let handle = tokio::spawn(async move {
            tracing::info!("Starting inbound update poller");
            loop {
                match self.poll_once().await {
                    Ok(0) => tokio::time::sleep(poll_interval).await,
                    Ok(count) => {
                        tracing::debug!(count, "Published inbound updates");
                    }
                    Err(error) => {
                        tracing::warn!(%error, "Update poll failed, backing off");
                        tokio::time::sleep(poll_interval).await;
                    }
                }
            }
        });

        tokio::spawn(async move {
            match handle.await {
                Ok(()) => tracing::error!(
                    "Inbound update poller terminated unexpectedly. No further \
                    bot replies will be observed until restart."
                ),
                Err(e) => tracing::error!(
                    error = %e,
                    "Inbound update poller panicked. No further bot replies \
                    will be observed until restart."
                ),
            }
        });
    }
}

#[async_trait]
impl ChatTransport for BotApiTransport {
    /// Authorization probe; the gateway rejects stale or revoked sessions
    async fn connect(&self) -> AppResult<()> {
        let response = self
            .http
            .get(self.url("me"))
            .send()
            .await
            .map_err(|e| AppError::Transport {
                reason: format!("gateway unreachable: {e}"),
            })?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            Err(AppError::Unauthorized)
        } else {
            Err(AppError::Transport {
                reason: format!("authorization probe returned {status}"),
            })
        }
    }

    async fn disconnect(&self) {
        // The HTTP client pools connections; releasing a run's session is a
        // bookkeeping event only.
        tracing::debug!("Released transport session");
    }

    async fn send_command(&self, target: &BotHandle, text: &str) -> AppResult<()> {
        let response = self
            .http
            .post(self.url("messages"))
            .json(&serde_json::json!({ "to": target, "text": text }))
            .send()
            .await
            .map_err(|e| AppError::Transport {
                reason: format!("send to {target} failed: {e}"),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Transport {
                reason: format!("send to {target} returned {}", response.status()),
            });
        }
        tracing::debug!(bot = %target, "Command dispatched");
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<InboundMessage> {
        self.inbound.subscribe()
    }

    async fn download_attachment(&self, media: &MediaRef) -> AppResult<PathBuf> {
        let response = self
            .http
            .get(self.url(&format!("media/{}", media.id)))
            .send()
            .await
            .map_err(|e| AppError::Download {
                media_id: media.id.clone(),
                reason: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(AppError::Download {
                media_id: media.id.clone(),
                reason: format!("gateway returned {}", response.status()),
            });
        }

        let bytes = response.bytes().await.map_err(|e| AppError::Download {
            media_id: media.id.clone(),
            reason: e.to_string(),
        })?;

        let filename = format!(
            "{}_{}.{}",
            Utc::now().timestamp(),
            media.id,
            media.extension()
        );
        let path = self.downloads_dir.join(filename);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| AppError::Download {
                media_id: media.id.clone(),
                reason: format!("write to {} failed: {e}", path.display()),
            })?;

        tracing::info!(media_id = %media.id, path = %path.display(), "Attachment downloaded");
        Ok(path)
    }
}
