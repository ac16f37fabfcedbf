//! airtrack-relay: headless UDP daemon relaying tracker air-interface
//! reports to an MQTT topic as JSON events.

use std::path::PathBuf;

use airtrack_core::config;
use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod publisher;
mod relay;

#[derive(Parser)]
#[command(
    name = "airtrack-relay",
    version,
    about = "Tracker air-interface to MQTT relay"
)]
struct Cli {
    /// Config file path (default: ~/.airtrack/config.yaml)
    #[arg(long, env = "AIRTRACK_CONFIG")]
    config: Option<PathBuf>,

    /// Listening UDP port, overrides config
    #[arg(long, env = "AIRTRACK_PORT")]
    port: Option<u16>,

    /// Publish topic, overrides config
    #[arg(long, env = "AIRTRACK_TOPIC")]
    topic: Option<String>,

    /// MQTT broker host, overrides config
    #[arg(long, env = "AIRTRACK_BROKER")]
    broker: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    };
    if let Some(port) = cli.port {
        config.relay.port = port;
    }
    if let Some(topic) = cli.topic {
        config.relay.topic = topic;
    }
    if let Some(broker) = cli.broker {
        config.broker.host = broker;
    }

    let registry = config.registry();
    if registry.is_empty() {
        warn!("no devices configured: every datagram will drop as unknown");
    } else {
        info!(devices = registry.len(), "device registry loaded");
    }

    let socket = relay::bind(config.relay.port).await?;
    let publisher = publisher::MqttPublisher::connect(
        &config.broker.host,
        config.broker.port,
        &config.relay.topic,
    );

    let token = CancellationToken::new();
    tokio::spawn(shutdown_signal(token.clone()));

    info!(topic = %config.relay.topic, "starting relay");
    let result = relay::run(socket, &registry, &publisher, token).await;

    // Flush queued events before exiting, on success and error paths alike
    publisher.shutdown().await;
    info!("relay stopped");
    result
}

/// Cancel the token on SIGINT or SIGTERM.
async fn shutdown_signal(token: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut term) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = term.recv() => {}
            }
            info!("termination requested");
            token.cancel();
            return;
        }
    }
    if tokio::signal::ctrl_c().await.is_err() {
        warn!("signal handler unavailable");
    }
    info!("termination requested");
    token.cancel();
}
