//! Prometheus metrics collection for Botgate
//!
//! Tracks command outcomes, failover activity, bot timeouts and anti-spam
//! throttling. Metrics are exposed via the `/metrics` endpoint in Prometheus
//! text format.
//!
//! Recording is deliberately infallible at the call site: label errors are
//! programming bugs, so they are logged and counted against nothing rather
//! than failing the request that tripped them.

use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;

/// Final outcome of one orchestrator run, as a metrics label
///
/// Restricting the label to two values at compile time keeps cardinality
/// bounded at `chains x 2`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    /// Convert outcome to Prometheus label string
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }
}

/// Metrics collector for Botgate
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,
    commands_total: CounterVec,
    fallbacks_total: CounterVec,
    bot_timeouts_total: CounterVec,
    rate_limited_total: CounterVec,
    run_duration: HistogramVec,
}

impl Metrics {
    /// Create a new Metrics instance
    ///
    /// # Errors
    /// Returns an error if metric registration fails (e.g., duplicate names).
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let commands_total = CounterVec::new(
            Opts::new(
                "botgate_commands_total",
                "Completed orchestrator runs by chain and outcome",
            ),
            &["chain", "outcome"],
        )?;

        let fallbacks_total = CounterVec::new(
            Opts::new(
                "botgate_fallbacks_total",
                "Attempts dispatched to a non-primary bot, by chain",
            ),
            &["chain"],
        )?;

        let bot_timeouts_total = CounterVec::new(
            Opts::new(
                "botgate_bot_timeouts_total",
                "Attempts that ended with zero replies, by bot",
            ),
            &["bot"],
        )?;

        let rate_limited_total = CounterVec::new(
            Opts::new(
                "botgate_rate_limited_total",
                "Attempts ended by an anti-spam notice, by bot",
            ),
            &["bot"],
        )?;

        let run_duration = HistogramVec::new(
            HistogramOpts::new(
                "botgate_run_duration_seconds",
                "Wall-clock duration of one orchestrator run",
            )
            .buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 60.0, 120.0]),
            &["chain"],
        )?;

        registry.register(Box::new(commands_total.clone()))?;
        registry.register(Box::new(fallbacks_total.clone()))?;
        registry.register(Box::new(bot_timeouts_total.clone()))?;
        registry.register(Box::new(rate_limited_total.clone()))?;
        registry.register(Box::new(run_duration.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            commands_total,
            fallbacks_total,
            bot_timeouts_total,
            rate_limited_total,
            run_duration,
        })
    }

    /// Record a completed orchestrator run
    pub fn record_command(&self, chain: &str, outcome: Outcome) {
        match self
            .commands_total
            .get_metric_with_label_values(&[chain, outcome.as_str()])
        {
            Ok(counter) => counter.inc(),
            Err(e) => Self::recording_failed("commands_total", &e),
        }
    }

    /// Record a dispatch to a non-primary candidate
    pub fn record_fallback(&self, chain: &str) {
        match self.fallbacks_total.get_metric_with_label_values(&[chain]) {
            Ok(counter) => counter.inc(),
            Err(e) => Self::recording_failed("fallbacks_total", &e),
        }
    }

    /// Record an attempt that timed out with zero replies
    pub fn record_bot_timeout(&self, bot: &str) {
        match self.bot_timeouts_total.get_metric_with_label_values(&[bot]) {
            Ok(counter) => counter.inc(),
            Err(e) => Self::recording_failed("bot_timeouts_total", &e),
        }
    }

    /// Record an attempt ended by an anti-spam notice
    pub fn record_rate_limited(&self, bot: &str) {
        match self.rate_limited_total.get_metric_with_label_values(&[bot]) {
            Ok(counter) => counter.inc(),
            Err(e) => Self::recording_failed("rate_limited_total", &e),
        }
    }

    /// Observe the wall-clock duration of one run
    pub fn observe_run_duration(&self, chain: &str, seconds: f64) {
        match self.run_duration.get_metric_with_label_values(&[chain]) {
            Ok(histogram) => histogram.observe(seconds),
            Err(e) => Self::recording_failed("run_duration", &e),
        }
    }

    fn recording_failed(metric: &str, error: &prometheus::Error) {
        // Observability must never break a request; label mismatches are
        // bugs worth a loud log line, nothing more.
        tracing::error!(metric, %error, "Metrics recording failed (non-fatal)");
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String, prometheus::Error> {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&families, &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}
