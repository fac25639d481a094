//! Blackout registry for unresponsive bots
//!
//! Tracks, per bot handle, the moment it last failed to answer at all.
//! A bot inside its blackout window is skipped during dispatch; expired
//! records are removed lazily on the next check, there is no background
//! sweep. This map is the only state shared across concurrent commands,
//! so every access goes through this single owner.

use crate::config::BotHandle;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Single-owner map of bot handle -> last dispatch failure
pub struct BlackoutRegistry {
    blackout: Duration,
    failures: RwLock<HashMap<BotHandle, Instant>>,
}

impl BlackoutRegistry {
    /// Create a registry with the given blackout window
    pub fn new(blackout: Duration) -> Self {
        Self {
            blackout,
            failures: RwLock::new(HashMap::new()),
        }
    }

    /// Check whether a bot is currently inside its blackout window
    ///
    /// Removes the record as a side effect when the window has expired,
    /// so repeated checks stay idempotent and the map self-cleans.
    pub async fn is_blocked(&self, bot: &BotHandle) -> bool {
        let expired = {
            let failures = self.failures.read().await;
            match failures.get(bot) {
                None => return false,
                Some(failed_at) => failed_at.elapsed() >= self.blackout,
            }
        };

        if expired {
            let mut failures = self.failures.write().await;
            // Re-check under the write lock: a concurrent record_failure may
            // have re-stamped the entry between the two lock acquisitions.
            if let Some(failed_at) = failures.get(bot) {
                if failed_at.elapsed() >= self.blackout {
                    failures.remove(bot);
                    tracing::info!(bot = %bot, "Blackout window expired, bot eligible again");
                    return false;
                }
            }
            return failures.contains_key(bot);
        }
        true
    }

    /// Record that a bot did not answer at all
    ///
    /// Unconditionally re-stamps any existing record, restarting the window.
    pub async fn record_failure(&self, bot: &BotHandle) {
        let mut failures = self.failures.write().await;
        failures.insert(bot.clone(), Instant::now());
        tracing::warn!(
            bot = %bot,
            blackout_seconds = self.blackout.as_secs(),
            "Bot marked unresponsive, excluded from dispatch"
        );
    }

    /// Remove the record for a bot (called on any successful response)
    pub async fn clear(&self, bot: &BotHandle) {
        let mut failures = self.failures.write().await;
        if failures.remove(bot).is_some() {
            tracing::info!(bot = %bot, "Bot answered, blackout record cleared");
        }
    }

    /// Wall-clock end of the bot's current blackout window, if one is active
    ///
    /// Read-only view for the status endpoint; does not clean expired
    /// records (that is `is_blocked`'s job).
    pub async fn blocked_until(&self, bot: &BotHandle) -> Option<DateTime<Utc>> {
        let failures = self.failures.read().await;
        let failed_at = failures.get(bot)?;
        let remaining = self.blackout.checked_sub(failed_at.elapsed())?;
        let remaining = chrono::Duration::from_std(remaining).unwrap_or_default();
        Some(Utc::now() + remaining)
    }
}
