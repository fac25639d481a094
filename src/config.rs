//! Configuration management for Botgate
//!
//! Parses TOML configuration files and provides typed access to settings.
//!
//! Loading happens in three phases (read, parse, validate) so every failure
//! carries the file path and a concrete reason. Structures whose invariants
//! matter after startup keep their fields private and expose accessors,
//! so validated data cannot be mutated into an invalid state.

use crate::classify::QueryMode;
use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `[transport] session_token`
pub const SESSION_TOKEN_ENV: &str = "BOTGATE_SESSION_TOKEN";

/// Upper bound for any per-attempt timeout, in seconds
///
/// Also rejects extreme values like `u64::MAX`, which would overflow
/// deadline arithmetic inside the collector.
const MAX_TIMEOUT_SECONDS: u64 = 300;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub transport: TransportConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    pub chains: Vec<ChainConfig>,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL, used to build attachment links
    #[serde(default = "default_public_url")]
    pub public_url: String,
    /// Directory where downloaded attachments are stored and served from
    #[serde(default = "default_downloads_dir")]
    pub downloads_dir: PathBuf,
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_downloads_dir() -> PathBuf {
    PathBuf::from("downloads")
}

/// Bot-gateway transport configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TransportConfig {
    /// Base URL of the bot-gateway API
    pub api_base: String,
    /// Session token; may be left empty and supplied via `BOTGATE_SESSION_TOKEN`
    #[serde(default)]
    session_token: String,
    /// Delay between long-poll cycles when the gateway returns no updates
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_poll_interval_ms() -> u64 {
    500
}

impl TransportConfig {
    /// Resolve the session token, preferring the environment override
    ///
    /// # Errors
    /// Returns a fatal configuration error when neither the config file nor
    /// the `BOTGATE_SESSION_TOKEN` environment variable provides a token.
    pub fn session_token(&self) -> AppResult<String> {
        if let Ok(token) = std::env::var(SESSION_TOKEN_ENV) {
            if !token.trim().is_empty() {
                return Ok(token);
            }
        }
        if self.session_token.trim().is_empty() {
            return Err(AppError::Config(format!(
                "transport.session_token is not set (config file or {SESSION_TOKEN_ENV})"
            )));
        }
        Ok(self.session_token.clone())
    }

    /// Gateway base URL without a trailing slash
    pub fn api_base(&self) -> &str {
        self.api_base.trim_end_matches('/')
    }
}

/// Identity of one chat bot, e.g. `@LEDERDATA_OFC_BOT`
///
/// Opaque and defined at configuration time; the engine only ever compares
/// and displays it.
#[derive(Debug, Clone, Hash, Eq, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BotHandle(String);

impl BotHandle {
    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BotHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for BotHandle {
    fn from(handle: &str) -> Self {
        Self(handle.to_string())
    }
}

impl From<String> for BotHandle {
    fn from(handle: String) -> Self {
        Self(handle)
    }
}

/// One bot inside a fallback chain
///
/// Fields are private: timeouts are validated during `Config::validate()`
/// and must not change afterwards.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BotEndpoint {
    handle: BotHandle,
    /// Per-attempt timeout for detail queries
    timeout_seconds: u64,
    /// Per-attempt timeout for name-search queries, which produce larger
    /// listings and tolerate slower bots. Falls back to `timeout_seconds`.
    #[serde(default)]
    name_search_timeout_seconds: Option<u64>,
}

impl BotEndpoint {
    /// Get the bot handle
    pub fn handle(&self) -> &BotHandle {
        &self.handle
    }

    /// Attempt timeout for the given query mode
    pub fn attempt_timeout(&self, mode: QueryMode) -> Duration {
        let seconds = match mode {
            QueryMode::Detail => self.timeout_seconds,
            QueryMode::NameSearch => self
                .name_search_timeout_seconds
                .unwrap_or(self.timeout_seconds),
        };
        Duration::from_secs(seconds)
    }
}

/// An ordered fallback chain of interchangeable bots
///
/// The first entry is the primary; the rest are tried in order when the
/// primary is blacked out or does not answer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChainConfig {
    name: String,
    /// Endpoint names starting with this prefix route to this chain, with
    /// the prefix stripped from the command verb. Exactly one chain must
    /// omit the prefix and becomes the default route.
    #[serde(default)]
    route_prefix: Option<String>,
    bots: Vec<BotEndpoint>,
}

impl ChainConfig {
    /// Get the chain name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the route prefix, if this is a prefixed chain
    pub fn route_prefix(&self) -> Option<&str> {
        self.route_prefix.as_deref()
    }

    /// Get the ordered bot list
    pub fn bots(&self) -> &[BotEndpoint] {
        &self.bots
    }

    /// Get the primary (first) bot
    pub fn primary(&self) -> &BotEndpoint {
        self.bots
            .first()
            .expect("validated config has a non-empty bot list")
    }
}

/// Aggregation engine tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Silence duration that ends collection once at least one reply arrived
    quiet_window_ms: u64,
    /// Pause between a timed-out attempt and the next candidate's dispatch
    cooldown_seconds: u64,
    /// How long an unresponsive bot stays excluded from dispatch
    blackout_hours: u64,
    /// Command verbs handled in name-search (passthrough listing) mode
    name_search_commands: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            quiet_window_ms: 4500,
            cooldown_seconds: 5,
            blackout_hours: 3,
            name_search_commands: vec!["nm".to_string(), "nmv".to_string()],
        }
    }
}

impl EngineConfig {
    /// Quiet window used by the response collector
    pub fn quiet_window(&self) -> Duration {
        Duration::from_millis(self.quiet_window_ms)
    }

    /// Cooldown between failover attempts
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_seconds)
    }

    /// Blackout window applied to unresponsive bots
    pub fn blackout(&self) -> Duration {
        Duration::from_secs(self.blackout_hours * 3600)
    }

    /// Whether a command verb selects name-search mode
    pub fn is_name_search(&self, verb: &str) -> bool {
        self.name_search_commands.iter().any(|c| c == verb)
    }
}

/// Observability configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let path_display = path.as_ref().display().to_string();

        // Phase 1: Read file (preserves io::Error context)
        let content =
            std::fs::read_to_string(path.as_ref()).map_err(|source| AppError::ConfigFileRead {
                path: path_display.clone(),
                source,
            })?;

        // Phase 2: Parse TOML (preserves toml::de::Error context)
        let config: Self =
            toml::from_str(&content).map_err(|source| AppError::ConfigParseFailed {
                path: path_display.clone(),
                source,
            })?;

        // Phase 3: Validate parsed config (provides contextual reason)
        config
            .validate()
            .map_err(|e| AppError::ConfigValidationFailed {
                path: path_display,
                reason: e.to_string(),
            })?;

        Ok(config)
    }

    /// Validate cross-field invariants that serde cannot express
    pub fn validate(&self) -> AppResult<()> {
        if self.transport.api_base.trim().is_empty()
            || !self.transport.api_base.starts_with("http")
        {
            return Err(AppError::Config(
                "transport.api_base must be an http(s) URL".to_string(),
            ));
        }
        if !(100..=30_000).contains(&self.transport.poll_interval_ms) {
            return Err(AppError::Config(format!(
                "transport.poll_interval_ms must be within [100, 30000], got {}",
                self.transport.poll_interval_ms
            )));
        }

        if self.chains.is_empty() {
            return Err(AppError::Config(
                "at least one [[chains]] entry is required".to_string(),
            ));
        }
        let default_chains = self
            .chains
            .iter()
            .filter(|c| c.route_prefix.is_none())
            .count();
        if default_chains != 1 {
            return Err(AppError::Config(format!(
                "exactly one chain must omit route_prefix (the default route), found {default_chains}"
            )));
        }

        let mut names = std::collections::HashSet::new();
        let mut prefixes = std::collections::HashSet::new();
        for chain in &self.chains {
            if chain.name.trim().is_empty() {
                return Err(AppError::Config("chain name cannot be empty".to_string()));
            }
            if !names.insert(chain.name.as_str()) {
                return Err(AppError::Config(format!(
                    "duplicate chain name: {}",
                    chain.name
                )));
            }
            if let Some(prefix) = &chain.route_prefix {
                if prefix.trim().is_empty() {
                    return Err(AppError::Config(format!(
                        "chain {} has an empty route_prefix",
                        chain.name
                    )));
                }
                if !prefixes.insert(prefix.as_str()) {
                    return Err(AppError::Config(format!(
                        "duplicate route_prefix: {prefix}"
                    )));
                }
            }
            if chain.bots.is_empty() {
                return Err(AppError::Config(format!(
                    "chain {} has no bots configured",
                    chain.name
                )));
            }
            for bot in &chain.bots {
                if bot.handle.as_str().trim().is_empty() {
                    return Err(AppError::Config(format!(
                        "chain {} contains a bot with an empty handle",
                        chain.name
                    )));
                }
                for (label, seconds) in [
                    ("timeout_seconds", Some(bot.timeout_seconds)),
                    (
                        "name_search_timeout_seconds",
                        bot.name_search_timeout_seconds,
                    ),
                ] {
                    if let Some(seconds) = seconds {
                        if seconds == 0 || seconds > MAX_TIMEOUT_SECONDS {
                            return Err(AppError::Config(format!(
                                "{} for bot {} must be within (0, {MAX_TIMEOUT_SECONDS}], got {seconds}",
                                label, bot.handle
                            )));
                        }
                    }
                }
            }
        }

        if self.engine.quiet_window_ms == 0 {
            return Err(AppError::Config(
                "engine.quiet_window_ms must be greater than 0".to_string(),
            ));
        }
        let min_timeout_ms = self
            .chains
            .iter()
            .flat_map(|c| c.bots.iter())
            .map(|b| b.timeout_seconds * 1000)
            .min()
            .unwrap_or(u64::MAX);
        if self.engine.quiet_window_ms >= min_timeout_ms {
            return Err(AppError::Config(format!(
                "engine.quiet_window_ms ({}) must be smaller than the smallest attempt timeout ({min_timeout_ms} ms), or quiet completion could never happen",
                self.engine.quiet_window_ms
            )));
        }
        if self.engine.cooldown_seconds > 60 {
            return Err(AppError::Config(format!(
                "engine.cooldown_seconds cannot exceed 60, got {}",
                self.engine.cooldown_seconds
            )));
        }
        if self.engine.blackout_hours == 0 || self.engine.blackout_hours > 168 {
            return Err(AppError::Config(format!(
                "engine.blackout_hours must be within (0, 168], got {}",
                self.engine.blackout_hours
            )));
        }

        Ok(())
    }

    /// Resolve an endpoint name to its chain and command verb
    ///
    /// Prefixed chains win when the prefix matches and leaves a non-empty
    /// verb; everything else routes to the default chain with the endpoint
    /// name as the verb.
    pub fn route<'a>(&'a self, endpoint: &'a str) -> (&'a ChainConfig, &'a str) {
        for chain in &self.chains {
            if let Some(prefix) = chain.route_prefix() {
                if let Some(verb) = endpoint.strip_prefix(prefix) {
                    if !verb.is_empty() {
                        return (chain, verb);
                    }
                }
            }
        }
        (self.default_chain(), endpoint)
    }

    /// Get the default (prefix-less) chain
    pub fn default_chain(&self) -> &ChainConfig {
        self.chains
            .iter()
            .find(|c| c.route_prefix.is_none())
            .expect("validated config has exactly one default chain")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_toml() -> &'static str {
        r#"
[server]
host = "127.0.0.1"
port = 8080

[transport]
api_base = "http://localhost:9000"
session_token = "test-token"

[[chains]]
name = "lederdata"

[[chains.bots]]
handle = "@LEDERDATA_OFC_BOT"
timeout_seconds = 35
name_search_timeout_seconds = 50

[[chains.bots]]
handle = "@lederdata_publico_bot"
timeout_seconds = 50

[[chains]]
name = "azura"
route_prefix = "azura_"

[[chains.bots]]
handle = "@AzuraSearchServices_bot"
timeout_seconds = 35
"#
    }

    fn parse(toml_str: &str) -> Config {
        toml::from_str(toml_str).expect("should parse test config")
    }

    #[test]
    fn test_parses_and_validates_base_config() {
        let config = parse(base_toml());
        config.validate().expect("base config should validate");
        assert_eq!(config.chains.len(), 2);
        assert_eq!(config.default_chain().name(), "lederdata");
    }

    #[test]
    fn test_engine_defaults() {
        let config = parse(base_toml());
        assert_eq!(config.engine.quiet_window(), Duration::from_millis(4500));
        assert_eq!(config.engine.cooldown(), Duration::from_secs(5));
        assert_eq!(config.engine.blackout(), Duration::from_secs(3 * 3600));
        assert!(config.engine.is_name_search("nm"));
        assert!(config.engine.is_name_search("nmv"));
        assert!(!config.engine.is_name_search("dni"));
    }

    #[test]
    fn test_name_search_timeout_falls_back() {
        let config = parse(base_toml());
        let bots = config.default_chain().bots();
        assert_eq!(
            bots[0].attempt_timeout(QueryMode::NameSearch),
            Duration::from_secs(50)
        );
        // Second bot has no override
        assert_eq!(
            bots[1].attempt_timeout(QueryMode::NameSearch),
            Duration::from_secs(50)
        );
        assert_eq!(
            bots[0].attempt_timeout(QueryMode::Detail),
            Duration::from_secs(35)
        );
    }

    #[test]
    fn test_route_prefix_selects_chain_and_strips_verb() {
        let config = parse(base_toml());

        let (chain, verb) = config.route("azura_dni");
        assert_eq!(chain.name(), "azura");
        assert_eq!(verb, "dni");

        let (chain, verb) = config.route("cla");
        assert_eq!(chain.name(), "lederdata");
        assert_eq!(verb, "cla");

        // A bare prefix routes to the default chain rather than an empty verb
        let (chain, verb) = config.route("azura_");
        assert_eq!(chain.name(), "lederdata");
        assert_eq!(verb, "azura_");
    }

    #[test]
    fn test_rejects_zero_timeout() {
        let toml_str = base_toml().replace("timeout_seconds = 35", "timeout_seconds = 0");
        let config = parse(&toml_str);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_excessive_timeout() {
        let toml_str = base_toml().replace("timeout_seconds = 35", "timeout_seconds = 301");
        let config = parse(&toml_str);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_missing_default_chain() {
        let toml_str = base_toml().replace(
            "name = \"lederdata\"",
            "name = \"lederdata\"\nroute_prefix = \"leder_\"",
        );
        let config = parse(&toml_str);
        let err = config.validate().expect_err("two prefixed chains");
        assert!(err.to_string().contains("default route"));
    }

    #[test]
    fn test_rejects_duplicate_chain_name() {
        let toml_str = base_toml().replace("name = \"azura\"", "name = \"lederdata\"");
        let config = parse(&toml_str);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_quiet_window_wider_than_timeouts() {
        let toml_str = format!("{}\n[engine]\nquiet_window_ms = 40000\n", base_toml());
        let config = parse(&toml_str);
        let err = config.validate().expect_err("quiet window too wide");
        assert!(err.to_string().contains("quiet_window_ms"));
    }

    #[test]
    fn test_empty_session_token_is_fatal() {
        let toml_str = base_toml().replace("session_token = \"test-token\"", "");
        let config = parse(&toml_str);
        // Validation passes (token may come from the environment), but
        // resolving the token without the env var set is an error.
        assert!(config.transport.session_token().is_err());
    }

    #[test]
    fn test_api_base_trims_trailing_slash() {
        let toml_str = base_toml().replace(
            "api_base = \"http://localhost:9000\"",
            "api_base = \"http://localhost:9000/\"",
        );
        let config = parse(&toml_str);
        assert_eq!(config.transport.api_base(), "http://localhost:9000");
    }
}
