//! Command-line interface for Botgate
//!
//! Provides argument parsing and subcommand handling for the Botgate binary.

use clap::{Parser, Subcommand};

/// HTTP gateway that aggregates multi-message chat-bot replies with failover
#[derive(Parser)]
#[command(name = "botgate")]
#[command(version)]
#[command(about = "HTTP gateway that aggregates multi-message chat-bot replies with failover")]
#[command(
    long_about = "Botgate exposes synchronous query endpoints on top of asynchronous \
    chat bots: commands are dispatched along a configured fallback chain, replies are \
    aggregated until they go quiet, and unresponsive bots are blacked out."
)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true)]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate a template configuration file
    Config {
        /// Output file path (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<String>,
    },
}

/// Generate template configuration content
pub fn generate_config_template() -> &'static str {
    r#"# Botgate Configuration
# =====================
#
# This file configures the HTTP server, the bot-gateway transport, the
# aggregation engine and the fallback chains.

# ─────────────────────────────────────────────────────────────────────────────
# SERVER CONFIGURATION
# ─────────────────────────────────────────────────────────────────────────────

[server]
# IP address to bind to (0.0.0.0 for all interfaces, 127.0.0.1 for localhost only)
host = "0.0.0.0"

# Port to listen on
port = 8080

# Externally reachable base URL; attachment links are built from it
public_url = "http://localhost:8080"

# Directory where downloaded attachments are stored and served from (/files)
downloads_dir = "downloads"

# ─────────────────────────────────────────────────────────────────────────────
# TRANSPORT
# ─────────────────────────────────────────────────────────────────────────────

[transport]
# Base URL of the bot-gateway API
api_base = "https://gateway.example.com"

# Session token. Leave empty and set BOTGATE_SESSION_TOKEN instead to keep
# credentials out of the config file.
session_token = ""

# Delay between long-poll cycles when the gateway returns no updates (ms)
poll_interval_ms = 500

# ─────────────────────────────────────────────────────────────────────────────
# AGGREGATION ENGINE
# ─────────────────────────────────────────────────────────────────────────────

[engine]
# Silence that completes a non-empty response (ms)
quiet_window_ms = 4500

# Pause between a timed-out attempt and the next candidate's dispatch (s)
cooldown_seconds = 5

# How long an unresponsive bot stays excluded from dispatch (h)
blackout_hours = 3

# Command verbs answered with long multi-record listings; these skip field
# extraction and aggressive cleanup
name_search_commands = ["nm", "nmv"]

# ─────────────────────────────────────────────────────────────────────────────
# FALLBACK CHAINS
# ─────────────────────────────────────────────────────────────────────────────
#
# Each chain is an ordered list of interchangeable bots: the first entry is
# the primary, the rest take over when it is blacked out or silent. Exactly
# one chain must omit route_prefix; it receives every endpoint that no
# prefix matches.

[[chains]]
name = "lederdata"

[[chains.bots]]
handle = "@LEDERDATA_OFC_BOT"
timeout_seconds = 35
name_search_timeout_seconds = 50

[[chains.bots]]
handle = "@lederdata_publico_bot"
timeout_seconds = 50
name_search_timeout_seconds = 65

# A prefixed chain: GET /azura_dni?dni=... sends "/dni ..." to this chain.
[[chains]]
name = "azura"
route_prefix = "azura_"

[[chains.bots]]
handle = "@AzuraSearchServices_bot"
timeout_seconds = 35

# ─────────────────────────────────────────────────────────────────────────────
# OBSERVABILITY
# ─────────────────────────────────────────────────────────────────────────────

[observability]
# Log level: "trace", "debug", "info", "warn", "error"
log_level = "info"

# Prometheus metrics are always available at /metrics on the server port
"#
}
