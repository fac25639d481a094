//! Botgate - resilient HTTP gateway for query bots on chat networks
//!
//! Exposes synchronous request/response endpoints on top of asynchronous,
//! best-effort chat bots: a command is dispatched to one bot of a configured
//! chain, the multi-message reply is aggregated until it goes quiet or a
//! terminal notice arrives, and unresponsive bots are placed in a blackout
//! window while the next candidate takes over.

pub mod classify;
pub mod cli;
pub mod collector;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod telemetry;
pub mod transport;
