//! Blackout status endpoint
//!
//! Side channel reporting which bots are currently excluded from dispatch
//! and until when, per chain.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::handlers::AppState;

/// Per-chain view of the blackout registry
#[derive(Debug, Serialize)]
pub struct ChainStatus {
    pub chain: String,
    pub bots: Vec<String>,
    pub primary_blocked: bool,
    pub primary_blocked_until: Option<DateTime<Utc>>,
}

/// GET /status response
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub chains: Vec<ChainStatus>,
}

/// GET /status handler
pub async fn handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let registry = state.registry();
    let mut chains = Vec::new();

    for chain in &state.config().chains {
        let primary = chain.primary().handle();
        let primary_blocked = registry.is_blocked(primary).await;
        let primary_blocked_until = if primary_blocked {
            registry.blocked_until(primary).await
        } else {
            None
        };

        chains.push(ChainStatus {
            chain: chain.name().to_string(),
            bots: chain
                .bots()
                .iter()
                .map(|b| b.handle().to_string())
                .collect(),
            primary_blocked,
            primary_blocked_until,
        });
    }

    Json(StatusResponse {
        status: "online",
        chains,
    })
}
