//! Fallback orchestration
//!
//! The top-level state machine behind every query: walks the configured bot
//! chain in order, dispatches the command exactly once per candidate, drives
//! the response collector, and turns the collected replies into one
//! aggregated result. Bots that never answer are recorded in the blackout
//! registry; bots that answer with an anti-spam notice are failed over
//! without blackout accounting, so blackouts measure outage rather than
//! overload.

use crate::classify::{ClassifiedReply, QueryMode, ReplyKind};
use crate::collector::{self, CollectExit, CollectorSettings};
use crate::config::{ChainConfig, Config};
use crate::metrics::{Metrics, Outcome};
use crate::middleware::RequestId;
use crate::registry::BlackoutRegistry;
use crate::transport::ChatTransport;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Result message when every candidate was exhausted without an answer
const NO_RESPONSE_MESSAGE: &str = "No se obtuvo respuesta de ningún bot.";
/// Result message when the final candidate was throttled by anti-spam
const RATE_LIMITED_MESSAGE: &str = "El bot está limitado por anti-spam. Intenta más tarde.";
/// Result message for a backend-reported empty result
const NOT_FOUND_MESSAGE: &str = "No se encontraron resultados.";
/// Result message for a backend-reported malformed command
const MALFORMED_MESSAGE: &str = "Formato incorrecto.";

/// Outcome status on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryStatus {
    Success,
    Error,
}

/// One downloaded attachment, addressable through the `/files` route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentUrl {
    pub url: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Merged field payload of a detail query
#[derive(Debug, Clone, Serialize)]
pub struct DetailPayload {
    #[serde(flatten)]
    pub fields: BTreeMap<String, String>,
    pub urls: Vec<AttachmentUrl>,
}

/// Aggregated result of one orchestrator run
///
/// Serializes to the wire contract: `{status, data}` for detail successes,
/// `{status, message}` for listing successes and every error.
#[derive(Debug, Clone, Serialize)]
pub struct AggregatedResult {
    pub status: QueryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<DetailPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AggregatedResult {
    /// Successful detail result with merged fields and attachment links
    pub fn detail(fields: BTreeMap<String, String>, urls: Vec<AttachmentUrl>) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(DetailPayload { fields, urls }),
            message: None,
        }
    }

    /// Successful listing result; an empty listing is still a success
    pub fn listing(text: String) -> Self {
        Self {
            status: QueryStatus::Success,
            data: None,
            message: Some(text),
        }
    }

    /// Error result with a caller-facing message
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: QueryStatus::Error,
            data: None,
            message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }
}

/// Drives one command through a bot chain until a terminal outcome
pub struct Dispatcher {
    transport: Arc<dyn ChatTransport>,
    registry: Arc<BlackoutRegistry>,
    metrics: Metrics,
    quiet_window: Duration,
    cooldown: Duration,
    public_url: String,
}

impl Dispatcher {
    /// Create a dispatcher bound to one transport and one registry
    pub fn new(
        config: &Config,
        transport: Arc<dyn ChatTransport>,
        registry: Arc<BlackoutRegistry>,
        metrics: Metrics,
    ) -> Self {
        Self {
            transport,
            registry,
            metrics,
            quiet_window: config.engine.quiet_window(),
            cooldown: config.engine.cooldown(),
            public_url: config.server.public_url.trim_end_matches('/').to_string(),
        }
    }

    /// Run one command against a chain and aggregate the response
    ///
    /// Never returns an error: every internal fault degrades into an
    /// `AggregatedResult` with `status = "error"`. The transport session is
    /// released on every exit path.
    pub async fn run(
        &self,
        chain: &ChainConfig,
        mode: QueryMode,
        command: &str,
        request_id: RequestId,
    ) -> AggregatedResult {
        let run_start = Instant::now();
        tracing::info!(
            request_id = %request_id,
            chain = chain.name(),
            mode = ?mode,
            command_verb = command.split_whitespace().next().unwrap_or(""),
            "Starting orchestrator run"
        );

        let result = match self.transport.connect().await {
            Ok(()) => {
                let result = self.run_chain(chain, mode, command, request_id).await;
                self.transport.disconnect().await;
                result
            }
            Err(error) => {
                tracing::error!(request_id = %request_id, %error, "Transport session unavailable");
                AggregatedResult::error(error.to_string())
            }
        };

        let outcome = if result.is_success() {
            Outcome::Success
        } else {
            Outcome::Error
        };
        self.metrics.record_command(chain.name(), outcome);
        self.metrics
            .observe_run_duration(chain.name(), run_start.elapsed().as_secs_f64());

        tracing::info!(
            request_id = %request_id,
            chain = chain.name(),
            outcome = outcome.as_str(),
            duration_ms = run_start.elapsed().as_millis() as u64,
            "Orchestrator run finished"
        );
        result
    }

    async fn run_chain(
        &self,
        chain: &ChainConfig,
        mode: QueryMode,
        command: &str,
        request_id: RequestId,
    ) -> AggregatedResult {
        let bots = chain.bots();
        let total = bots.len();

        for (index, bot) in bots.iter().enumerate() {
            let is_last = index + 1 == total;

            if self.registry.is_blocked(bot.handle()).await {
                if !is_last {
                    tracing::info!(
                        request_id = %request_id,
                        bot = %bot.handle(),
                        "Skipping bot inside blackout window"
                    );
                    continue;
                }
                // The last remaining candidate is always attempted: refusing
                // to try the only option guarantees failure, attempting it
                // costs one timeout and may find the bot recovered early.
                tracing::warn!(
                    request_id = %request_id,
                    bot = %bot.handle(),
                    "Last candidate is inside blackout window, attempting anyway"
                );
            }

            if index > 0 {
                self.metrics.record_fallback(chain.name());
            }

            // Subscribe before dispatching so a fast first reply cannot slip
            // past the collector.
            let rx = self.transport.subscribe();

            if let Err(error) = self.transport.send_command(bot.handle(), command).await {
                // Transport faults do not count against the bot's health.
                tracing::error!(
                    request_id = %request_id,
                    bot = %bot.handle(),
                    %error,
                    "Dispatch failed"
                );
                if is_last {
                    return AggregatedResult::error(NO_RESPONSE_MESSAGE);
                }
                continue;
            }

            let settings = CollectorSettings {
                attempt_timeout: bot.attempt_timeout(mode),
                quiet_window: self.quiet_window,
            };
            let collected = collector::collect(rx, bot.handle(), mode, &settings).await;

            match collected.exit {
                CollectExit::Timeout => {
                    tracing::warn!(
                        request_id = %request_id,
                        bot = %bot.handle(),
                        timeout_seconds = settings.attempt_timeout.as_secs(),
                        "No reply within attempt budget"
                    );
                    self.registry.record_failure(bot.handle()).await;
                    self.metrics.record_bot_timeout(bot.handle().as_str());
                    if is_last {
                        return AggregatedResult::error(NO_RESPONSE_MESSAGE);
                    }
                    // Give the network a beat before the next candidate; an
                    // immediate re-dispatch tends to trip duplicate-command
                    // detection on the backup.
                    tokio::time::sleep(self.cooldown).await;
                }
                CollectExit::Terminal(ReplyKind::RateLimited) => {
                    // Throttled is not unresponsive: no blackout accounting.
                    self.metrics.record_rate_limited(bot.handle().as_str());
                    if is_last {
                        return AggregatedResult::error(RATE_LIMITED_MESSAGE);
                    }
                    tracing::info!(
                        request_id = %request_id,
                        bot = %bot.handle(),
                        "Bot throttled by anti-spam, trying next candidate"
                    );
                }
                CollectExit::Terminal(_) | CollectExit::Quiet => {
                    // The bot answered; whatever the content says, it is
                    // alive.
                    self.registry.clear(bot.handle()).await;
                    return self.assemble(collected.replies, mode, request_id).await;
                }
            }
        }

        AggregatedResult::error(NO_RESPONSE_MESSAGE)
    }

    /// Turn a completed attempt's replies into the final result
    async fn assemble(
        &self,
        replies: Vec<ClassifiedReply>,
        mode: QueryMode,
        request_id: RequestId,
    ) -> AggregatedResult {
        match mode {
            QueryMode::NameSearch => assemble_listing(&replies),
            QueryMode::Detail => {
                if replies.iter().any(|r| r.kind == ReplyKind::MalformedInput) {
                    return AggregatedResult::error(MALFORMED_MESSAGE);
                }
                if replies.iter().any(|r| r.kind == ReplyKind::NotFound) {
                    return AggregatedResult::error(NOT_FOUND_MESSAGE);
                }
                let urls = self.download_attachments(&replies, request_id).await;
                assemble_detail(&replies, urls)
            }
        }
    }

    /// Fetch every attachment carried by the replies
    ///
    /// Runs only once a session reached a successful terminal state. A
    /// failed download is logged and skipped; it never sinks the
    /// aggregation.
    async fn download_attachments(
        &self,
        replies: &[ClassifiedReply],
        request_id: RequestId,
    ) -> Vec<AttachmentUrl> {
        let downloads = replies
            .iter()
            .filter_map(|reply| reply.attachment.as_ref())
            .map(|media| async move {
                match self.transport.download_attachment(media).await {
                    Ok(path) => {
                        let name = path.file_name().and_then(|n| n.to_str())?;
                        Some(AttachmentUrl {
                            url: format!("{}/files/{}", self.public_url, name),
                            kind: match media.kind {
                                crate::transport::MediaKind::Document => "document",
                                crate::transport::MediaKind::Photo => "photo",
                            },
                        })
                    }
                    Err(error) => {
                        tracing::error!(
                            request_id = %request_id,
                            media_id = %media.id,
                            %error,
                            "Attachment download failed, continuing without it"
                        );
                        None
                    }
                }
            });

        // Downloads are independent; arrival order of the URLs still follows
        // reply order because join_all preserves input order.
        futures::future::join_all(downloads)
            .await
            .into_iter()
            .flatten()
            .collect()
    }
}

/// Merge detail replies: field maps first-writer-wins in arrival order, the
/// residual texts joined into `mensaje_completo`
fn assemble_detail(replies: &[ClassifiedReply], urls: Vec<AttachmentUrl>) -> AggregatedResult {
    let mut fields: BTreeMap<String, String> = BTreeMap::new();
    let mut text_parts: Vec<&str> = Vec::new();

    for reply in replies {
        if !reply.text.is_empty() {
            text_parts.push(&reply.text);
        }
        for (key, value) in &reply.fields {
            if !value.is_empty() && !fields.contains_key(key) {
                fields.insert(key.clone(), value.clone());
            }
        }
    }

    if !text_parts.is_empty() {
        fields.insert("mensaje_completo".to_string(), text_parts.join("\n"));
    }

    AggregatedResult::detail(fields, urls)
}

/// Join listing replies in arrival order, scrubbing residual branding
fn assemble_listing(replies: &[ClassifiedReply]) -> AggregatedResult {
    let joined = replies
        .iter()
        .filter(|r| !r.text.is_empty())
        .map(|r| r.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    let text = crate::classify::clean_listing(&joined);
    AggregatedResult::listing(text)
}
