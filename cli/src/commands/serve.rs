// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! `warden serve` - HTTP API server

use anyhow::{Context, Result};
use clap::Args;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

use warden_core::application::Warden;
use warden_core::domain::config::WardenConfig;
use warden_core::presentation::api::{app, AppState};

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Bind address (overrides spec.api.bind_address)
    #[arg(long)]
    pub host: Option<String>,

    /// Port (overrides spec.api.port)
    #[arg(long, env = "WARDEN_PORT")]
    pub port: Option<u16>,
}

pub async fn execute(args: ServeArgs, config: WardenConfig) -> Result<()> {
    config.validate().context("Configuration validation failed")?;
    let spec = &config.spec;

    if spec.observability.metrics.enabled {
        let addr: SocketAddr = ([0, 0, 0, 0], spec.observability.metrics.port).into();
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("Failed to start Prometheus exporter")?;
        info!(%addr, "Prometheus metrics exporter listening");
    }

    let warden = Warden::from_config(&config).await?;
    let state = Arc::new(AppState {
        agent: warden.agent.clone(),
        approvals: warden.approvals.clone(),
        events: warden.events.clone(),
    });

    let host = args.host.unwrap_or_else(|| spec.api.bind_address.clone());
    let port = args.port.unwrap_or(spec.api.port);
    let listener = TcpListener::bind((host.as_str(), port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", host, port))?;
    info!(
        address = %listener.local_addr().context("No local address")?,
        config = %config.metadata.name,
        "Warden API listening"
    );

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Warden API stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
