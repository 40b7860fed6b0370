//! `PushRelay` host
//!
//! Subscribes to the configured GraphQL endpoint and shows the newest pushed
//! notification. Ctrl-C tears the relay down; on Unix, SIGHUP forces a
//! resubscribe.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::info;

use pushrelay_client::sink::{NotificationSink, TracingSink};
use pushrelay_client::{LifecycleEvent, Relay};
use pushrelay_core::config::load_config;
use pushrelay_core::tracing_init::init_tracing;
use pushrelay_core::{RelayConfig, SlotId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SinkKind {
    /// Log notifications through tracing.
    Log,
    /// Show desktop notifications (requires the `desktop` feature).
    Desktop,
}

#[derive(Parser, Debug)]
#[command(name = "pushrelay")]
#[command(
    version,
    about = "Relay a GraphQL subscription to local notifications"
)]
struct Args {
    /// Settings file layered over the global settings.
    #[arg(long)]
    config: Option<PathBuf>,

    /// GraphQL WebSocket endpoint (ws:// or wss://).
    #[arg(long)]
    ws_endpoint: Option<String>,

    /// GraphQL HTTP endpoint (http:// or https://).
    #[arg(long)]
    http_endpoint: Option<String>,

    /// Title shown on every notification.
    #[arg(long)]
    title: Option<String>,

    /// Notification slot every display replaces.
    #[arg(long)]
    slot_id: Option<SlotId>,

    /// Extra upgrade-request header, as `Name: value`. Repeatable.
    #[arg(long = "header", value_parser = parse_header)]
    headers: Vec<(String, String)>,

    /// Where notifications are shown.
    #[arg(long, value_enum, default_value_t = SinkKind::Log)]
    sink: SinkKind,

    /// Log level for the relay crates (ignored when `RUST_LOG` is set).
    #[arg(long)]
    log_level: Option<String>,

    /// Output logs as JSON (for structured log aggregation).
    #[arg(long)]
    log_json: bool,
}

impl Args {
    /// Apply CLI overrides, the highest-priority configuration layer.
    fn apply(&self, config: &mut RelayConfig) {
        if let Some(v) = &self.ws_endpoint {
            config.websocket_endpoint.clone_from(v);
        }
        if let Some(v) = &self.http_endpoint {
            config.graphql_endpoint.clone_from(v);
        }
        if let Some(v) = &self.title {
            config.title.clone_from(v);
        }
        if let Some(v) = self.slot_id {
            config.slot_id = v;
        }
        if let Some(v) = &self.log_level {
            config.log_level.clone_from(v);
        }
        config.headers.extend(self.headers.iter().cloned());
    }
}

fn parse_header(raw: &str) -> Result<(String, String), String> {
    let (name, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected `Name: value`, got '{raw}'"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err("header name must not be empty".to_string());
    }
    Ok((name.to_string(), value.trim().to_string()))
}

fn build_sink(kind: SinkKind) -> anyhow::Result<Arc<dyn NotificationSink>> {
    match kind {
        SinkKind::Log => Ok(Arc::new(TracingSink)),
        #[cfg(feature = "desktop")]
        SinkKind::Desktop => Ok(Arc::new(pushrelay_client::sink::DesktopSink::default())),
        #[cfg(not(feature = "desktop"))]
        SinkKind::Desktop => {
            anyhow::bail!("pushrelay was built without the `desktop` feature")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = load_config(args.config.as_deref()).context("Failed to load configuration")?;
    args.apply(&mut config);
    config.validate()?;

    init_tracing(&config.log_level, args.log_json)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        endpoint = %config.websocket_endpoint,
        slot = config.slot_id,
        "Starting pushrelay"
    );

    let mut relay = Relay::from_config(&config, build_sink(args.sink)?)?;

    relay.on_lifecycle(LifecycleEvent::Created);
    let outcome = run_until_shutdown(&mut relay).await;
    relay.on_lifecycle(LifecycleEvent::Destroyed);

    info!("pushrelay stopped");
    outcome
}

#[cfg(unix)]
async fn run_until_shutdown(relay: &mut Relay) -> anyhow::Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup()).context("Failed to install SIGHUP handler")?;
    loop {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("Failed to listen for Ctrl-C")?;
                info!("Received shutdown signal");
                return Ok(());
            }
            _ = hangup.recv() => {
                info!("Received SIGHUP; resubscribing");
                relay.on_lifecycle(LifecycleEvent::Paused);
                relay.on_lifecycle(LifecycleEvent::Resumed);
            }
        }
    }
}

#[cfg(not(unix))]
async fn run_until_shutdown(_relay: &mut Relay) -> anyhow::Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    info!("Received shutdown signal");
    Ok(())
}
