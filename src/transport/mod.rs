//! Chat-network transport abstraction
//!
//! The engine never talks to the bot network directly; it sees this trait.
//! The transport owns one process-wide inbound stream: every consumer
//! subscribes and receives every inbound message, filtering by sender. That
//! keeps subscription lifetime tied to the receiver handle instead of
//! registering and deregistering callbacks per attempt.

use crate::config::BotHandle;
use crate::error::AppResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::broadcast;

mod botapi;

pub use botapi::BotApiTransport;

/// Kind of binary media attached to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Document,
    Photo,
}

/// Opaque handle to a downloadable attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub id: String,
    pub kind: MediaKind,
}

impl MediaRef {
    /// File extension for the downloaded copy
    pub fn extension(&self) -> &'static str {
        match self.kind {
            MediaKind::Document => "pdf",
            MediaKind::Photo => "jpg",
        }
    }
}

/// One message received from the bot network
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: u64,
    #[serde(rename = "from")]
    pub sender: BotHandle,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub media: Option<MediaRef>,
}

/// Transport to the bot network
///
/// `send_command` is fire-and-forget: there is no acknowledgment beyond
/// transport-level delivery, and a sent command cannot be retracted. A
/// session is acquired with `connect` at the start of every orchestrator run
/// and must be released with `disconnect` on every exit path.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Acquire an authorized session to the bot network
    async fn connect(&self) -> AppResult<()>;

    /// Release the session; never fails
    async fn disconnect(&self);

    /// Dispatch one command to one bot
    async fn send_command(&self, target: &BotHandle, text: &str) -> AppResult<()>;

    /// Subscribe to the process-wide inbound stream
    fn subscribe(&self) -> broadcast::Receiver<InboundMessage>;

    /// Download an attachment to local storage, returning its path
    async fn download_attachment(&self, media: &MediaRef) -> AppResult<PathBuf>;
}
