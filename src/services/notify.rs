// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Best-effort outbound notifications.
//!
//! Game code pushes [`Notification`]s onto a [`NotificationQueue`] and moves
//! on; a dispatcher task drains the queue and hands each one to the
//! configured [`Delivery`]. Delivery failures are logged and dropped.
//! Message wording is left to whoever receives the webhook.

use crate::models::Team;
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tokio::sync::mpsc;

type HmacSha256 = Hmac<Sha256>;

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(5);

/// Header carrying the hex HMAC-SHA256 of the request body.
pub const SIGNATURE_HEADER: &str = "x-territory-signature";

/// Something a player should hear about.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    /// A zone the recipient owned was taken by another player.
    ZoneCaptured {
        recipient: u64,
        zone_id: u64,
        zone_name: Option<String>,
        captured_by: u64,
        team: Team,
    },
    /// A rival player is trekking near one of the recipient's zones.
    ZoneThreatened {
        recipient: u64,
        zone_id: u64,
        intruder: u64,
        intruder_team: Team,
        distance_m: f64,
    },
    /// A zone the recipient owned went neutral after sitting untouched.
    ZoneExpired { recipient: u64, zone_id: u64 },
}

impl Notification {
    pub fn recipient(&self) -> u64 {
        match self {
            Notification::ZoneCaptured { recipient, .. }
            | Notification::ZoneThreatened { recipient, .. }
            | Notification::ZoneExpired { recipient, .. } => *recipient,
        }
    }
}

/// Sending half of the notification channel. Cheap to clone.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: mpsc::UnboundedSender<Notification>,
}

impl NotificationQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue without waiting. A closed dispatcher is logged, not an error.
    pub fn send(&self, notification: Notification) {
        if let Err(e) = self.tx.send(notification) {
            tracing::warn!(
                recipient = e.0.recipient(),
                "Notification dispatcher gone, dropping notification"
            );
        }
    }
}

/// Errors from notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    #[error("Webhook request failed: {0}")]
    Request(String),

    #[error("Webhook returned status {0}")]
    Status(u16),

    #[error("HMAC init failed: {0}")]
    Signing(String),

    #[error("Failed to encode notification: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Hex HMAC-SHA256 of `body` under `secret`.
pub fn sign_payload(secret: &[u8], body: &[u8]) -> Result<String, NotifyError> {
    let mut mac =
        HmacSha256::new_from_slice(secret).map_err(|e| NotifyError::Signing(e.to_string()))?;
    mac.update(body);
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// POSTs notifications as JSON to a configured URL.
#[derive(Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    url: String,
    secret: Option<Vec<u8>>,
}

impl WebhookClient {
    pub fn new(url: String, secret: Option<Vec<u8>>) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::Client(e.to_string()))?;
        Ok(Self { http, url, secret })
    }

    pub async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let body = serde_json::to_vec(notification)?;

        let mut request = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json");
        if let Some(secret) = &self.secret {
            request = request.header(SIGNATURE_HEADER, sign_payload(secret, &body)?);
        }

        let response = request
            .body(body)
            .send()
            .await
            .map_err(|e| NotifyError::Request(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Status(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Where dispatched notifications end up.
#[derive(Clone)]
pub enum Delivery {
    /// Structured log line only (local development).
    Log,
    Webhook(WebhookClient),
}

impl Delivery {
    pub async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        match self {
            Delivery::Log => {
                tracing::info!(
                    recipient = notification.recipient(),
                    notification = ?notification,
                    "Notification"
                );
                Ok(())
            }
            Delivery::Webhook(client) => client.deliver(notification).await,
        }
    }
}

/// Drain the queue until every sender is dropped.
pub async fn run_dispatcher(mut rx: mpsc::UnboundedReceiver<Notification>, delivery: Delivery) {
    while let Some(notification) = rx.recv().await {
        if let Err(e) = delivery.deliver(&notification).await {
            tracing::warn!(
                recipient = notification.recipient(),
                error = %e,
                "Notification delivery failed"
            );
        }
    }
    tracing::info!("Notification dispatcher stopped");
}
