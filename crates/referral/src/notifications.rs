//! Outbound notification queue.
//!
//! The workflow only ever touches [`NotificationPublisher`]; delivery happens on a
//! separate task driven by [`run_dispatcher`].

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use pitchlink_models::NotificationEvent;
use reqwest::Client;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

type HmacSha256 = Hmac<Sha256>;

const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Failed to serialize notification: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Webhook request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Webhook responded with status {0}")]
    Rejected(u16),

    #[error("Invalid webhook secret")]
    InvalidSecret,
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), DispatchError>;
}

pub type DynNotificationDispatcher = Arc<dyn NotificationDispatcher>;

/// Cloneable handle onto the outbound queue
#[derive(Debug, Clone)]
pub struct NotificationPublisher {
    sender: mpsc::UnboundedSender<NotificationEvent>,
}

impl NotificationPublisher {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }

    /// Never blocks and never fails; a closed queue is logged and the event dropped
    pub fn publish(&self, event: NotificationEvent) {
        let kind = event.kind.as_str();
        let request_id = event.request_id;

        if self.sender.send(event).is_err() {
            tracing::warn!(
                "Notification queue closed, dropping {} for join request {}",
                kind,
                request_id
            );
        }
    }

    /// Publisher plus a running dispatch task
    pub fn spawn(dispatcher: DynNotificationDispatcher) -> (Self, tokio::task::JoinHandle<()>) {
        let (publisher, receiver) = Self::channel();
        let handle = tokio::spawn(run_dispatcher(receiver, dispatcher));
        (publisher, handle)
    }
}

/// Drains the queue until every publisher is dropped
pub async fn run_dispatcher(
    mut receiver: mpsc::UnboundedReceiver<NotificationEvent>,
    dispatcher: DynNotificationDispatcher,
) {
    while let Some(event) = receiver.recv().await {
        if let Err(e) = dispatcher.notify(&event).await {
            tracing::warn!(
                "Failed to deliver {} notification {} to {:?} {}: {}",
                event.kind.as_str(),
                event.id,
                event.recipient_kind,
                event.recipient_id,
                e
            );
        }
    }

    tracing::debug!("Notification dispatcher stopped");
}

/// Writes each event as a structured log line
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingDispatcher;

#[async_trait]
impl NotificationDispatcher for TracingDispatcher {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), DispatchError> {
        tracing::info!(
            notification_id = %event.id,
            kind = event.kind.as_str(),
            recipient_kind = ?event.recipient_kind,
            recipient_id = %event.recipient_id,
            request_id = %event.request_id,
            title = %event.title,
            "{}",
            event.message
        );
        Ok(())
    }
}

/// POSTs each event as JSON, signed with HMAC-SHA256 over `{timestamp}.{body}`
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: Client,
    url: String,
    secret: String,
}

impl WebhookDispatcher {
    pub fn new(url: impl Into<String>, secret: impl Into<String>) -> Result<Self, DispatchError> {
        let client = Client::builder().timeout(WEBHOOK_TIMEOUT).build()?;

        Ok(Self {
            client,
            url: url.into(),
            secret: secret.into(),
        })
    }
}

/// Hex-encoded HMAC-SHA256 of `{timestamp}.{payload}`
pub fn sign_payload(secret: &str, timestamp: i64, payload: &str) -> Result<String, DispatchError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| DispatchError::InvalidSecret)?;
    mac.update(format!("{}.{}", timestamp, payload).as_bytes());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

#[async_trait]
impl NotificationDispatcher for WebhookDispatcher {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), DispatchError> {
        let body = serde_json::to_string(event)?;
        let timestamp = Utc::now().timestamp();
        let signature = sign_payload(&self.secret, timestamp, &body)?;

        let response = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .header("X-PitchLink-Signature", format!("sha256={}", signature))
            .header("X-PitchLink-Timestamp", timestamp.to_string())
            .header("X-PitchLink-Event-ID", event.id.to_string())
            .header("X-PitchLink-Event-Type", event.kind.as_str())
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::Rejected(status.as_u16()));
        }

        tracing::debug!("Webhook delivered {} ({})", event.id, status);
        Ok(())
    }
}
