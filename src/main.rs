// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Territory API Server
//!
//! Serves the zone capture game: trek recording, zone claims and captures,
//! achievements, and the periodic expiry and proximity sweeps.

use std::sync::Arc;
use territory::{
    config::{Config, StoreBackend},
    db::{FirestoreDb, MemoryStore, Store},
    services::{notify, Delivery, NotificationQueue, WebhookClient},
    AppState,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(
        port = config.port,
        backend = ?config.store_backend,
        "Starting Territory API"
    );

    match config.store_backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; all state is lost on restart");
            serve(MemoryStore::new(), config).await
        }
        StoreBackend::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            serve(db, config).await
        }
    }
}

async fn serve<S: Store>(store: S, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    // Notification dispatcher
    let delivery = match &config.notify_webhook_url {
        Some(url) => {
            tracing::info!(url = %url, "Delivering notifications to webhook");
            Delivery::Webhook(WebhookClient::new(
                url.clone(),
                config.notify_webhook_secret.clone(),
            )?)
        }
        None => Delivery::Log,
    };
    let (notifications, rx) = NotificationQueue::new();
    tokio::spawn(notify::run_dispatcher(rx, delivery));

    let run_sweeps = config.run_sweeps;
    let state = Arc::new(AppState::new(config, store, notifications));

    if run_sweeps {
        let rules = &state.config.rules;
        tracing::info!(
            proximity_every_secs = rules.proximity_interval_secs,
            expiry_every_secs = rules.expiry_interval_secs,
            "Starting background sweeps"
        );
        state.sweeps.clone().spawn_background(rules);
    }

    // Build router
    let app = territory::routes::create_router(state.clone());

    // Start server
    let addr = format!("0.0.0.0:{}", state.config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("territory=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
