//! Botgate HTTP server
//!
//! Starts an Axum web server that dispatches query commands to chat bots
//! and aggregates their replies.

use botgate::{
    cli::{Cli, Command, generate_config_template},
    config::Config,
    handlers::{self, AppState},
    telemetry,
    transport::BotApiTransport,
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(Command::Config { output }) = cli.command {
        let template = generate_config_template();
        match output {
            Some(path) => {
                std::fs::write(&path, template)?;
                println!("Configuration template written to {path}");
            }
            None => print!("{template}"),
        }
        return Ok(());
    }

    // Load configuration
    let config = Config::from_file(&cli.config)?;

    // Initialize telemetry
    telemetry::init(&config.observability.log_level);

    tracing::info!(
        "Starting Botgate server on {}:{}",
        config.server.host,
        config.server.port
    );

    // Attachments are served from this directory via /files
    tokio::fs::create_dir_all(&config.server.downloads_dir).await?;

    // Build transport and start the inbound update poller
    let transport = Arc::new(BotApiTransport::new(&config)?);
    transport.clone().spawn_poller();

    // Build router
    let state = AppState::new(Arc::new(config.clone()), transport)?;
    let app = handlers::router(state).layer(TraceLayer::new_for_http());

    // Create socket address
    let addr = SocketAddr::from((
        config
            .server
            .host
            .parse::<std::net::IpAddr>()
            .unwrap_or_else(|_| std::net::IpAddr::from([0, 0, 0, 0])),
        config.server.port,
    ));

    tracing::info!("Listening on {}", addr);
    tracing::info!("Blackout status available at http://{}/status", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
