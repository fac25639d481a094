//! Per-attempt response collection
//!
//! One collection run listens on the shared inbound stream, keeps only
//! messages from the attempt's target bot, classifies them in arrival order
//! and decides when the response is over. There is no explicit terminator on
//! the wire, so "over" means one of:
//!
//! - quiet: at least one reply arrived and the stream went silent for the
//!   configured quiet window (the normal multi-message completion path),
//! - terminal: a reply classified as rate-limited or not-found, after which
//!   the bot will not send further relevant content,
//! - timeout: the attempt deadline passed with zero replies, the signal that
//!   feeds the blackout registry.
//!
//! The wait is a deadline that is recomputed after every accepted message
//! (timer reset on activity), not a fixed-interval poll. Returning drops the
//! broadcast receiver, which detaches the subscription; late replies are
//! never observed.

use crate::classify::{self, ClassifiedReply, QueryMode, ReplyKind};
use crate::config::BotHandle;
use crate::transport::InboundMessage;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{Instant, timeout_at};

/// Timing knobs for one collection attempt
#[derive(Debug, Clone)]
pub struct CollectorSettings {
    /// Overall attempt budget, measured from dispatch
    pub attempt_timeout: Duration,
    /// Silence duration that completes a non-empty response
    pub quiet_window: Duration,
}

/// Why collection stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectExit {
    /// Quiet window elapsed with at least one reply buffered
    Quiet,
    /// A terminal notice ended the stream early
    Terminal(ReplyKind),
    /// Attempt deadline passed with zero replies
    Timeout,
}

/// Result of one collection attempt
#[derive(Debug)]
pub struct Collected {
    /// Classified replies in arrival order
    pub replies: Vec<ClassifiedReply>,
    pub exit: CollectExit,
}

/// Collect replies from `target` until quiescence, a terminal notice or the
/// attempt deadline
pub async fn collect(
    mut rx: broadcast::Receiver<InboundMessage>,
    target: &BotHandle,
    mode: QueryMode,
    settings: &CollectorSettings,
) -> Collected {
    let started = Instant::now();
    let attempt_deadline = started + settings.attempt_timeout;
    let mut last_activity = started;
    let mut replies: Vec<ClassifiedReply> = Vec::new();

    loop {
        // With no replies yet only the attempt deadline applies; afterwards
        // the quiet window (reset on every accepted message) can end the
        // attempt earlier.
        let deadline = if replies.is_empty() {
            attempt_deadline
        } else {
            attempt_deadline.min(last_activity + settings.quiet_window)
        };

        match timeout_at(deadline, rx.recv()).await {
            Ok(Ok(message)) => {
                if &message.sender != target {
                    continue;
                }
                last_activity = Instant::now();

                let reply = classify::classify(&message, mode);
                let kind = reply.kind;
                tracing::debug!(
                    bot = %target,
                    kind = ?kind,
                    message_id = message.id,
                    buffered = replies.len() + 1,
                    "Accepted reply"
                );
                replies.push(reply);

                if matches!(kind, ReplyKind::RateLimited | ReplyKind::NotFound) {
                    return Collected {
                        replies,
                        exit: CollectExit::Terminal(kind),
                    };
                }
            }
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                tracing::warn!(
                    bot = %target,
                    skipped,
                    "Inbound subscription lagged, messages were dropped"
                );
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => {
                tracing::warn!(bot = %target, "Inbound stream closed mid-collection");
                break;
            }
            Err(_elapsed) => break,
        }
    }

    let exit = if replies.is_empty() {
        CollectExit::Timeout
    } else {
        CollectExit::Quiet
    };
    Collected { replies, exit }
}
