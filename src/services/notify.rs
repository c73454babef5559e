//! Outbound notification collaborator. Fire-and-acknowledge: a failed
//! notification is logged and recorded as `notification_sent=false` on the
//! audit record, never rolled into the ledger mutation's outcome.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tokio::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::models::{Reservation, ReservationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReservationEventKind {
    Created,
    Modified,
    Cancelled,
    Refunded,
}

/// Public view of a reservation carried on notification events. Staff-only
/// internal notes are deliberately absent.
#[derive(Debug, Clone, Serialize)]
pub struct ReservationEvent {
    pub kind: ReservationEventKind,
    pub reference: String,
    pub table_id: Uuid,
    pub combined_with_table_id: Option<Uuid>,
    pub reservation_date: NaiveDate,
    pub arrival_slot: NaiveTime,
    pub party_size: i32,
    pub status: ReservationStatus,
    pub deposit_amount: i64,
    pub deposit_paid: bool,
    pub deposit_refunded: bool,
}

impl ReservationEvent {
    pub fn new(kind: ReservationEventKind, reservation: &Reservation) -> Self {
        Self {
            kind,
            reference: reservation.reference.clone(),
            table_id: reservation.table_id,
            combined_with_table_id: reservation.combined_with_table_id,
            reservation_date: reservation.reservation_date,
            arrival_slot: reservation.arrival_slot,
            party_size: reservation.party_size,
            status: reservation.status,
            deposit_amount: reservation.deposit_amount,
            deposit_paid: reservation.deposit_paid,
            deposit_refunded: reservation.deposit_refunded,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification endpoint unreachable: {0}")]
    Transport(String),
    #[error("notification endpoint answered {0}")]
    Rejected(u16),
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: &ReservationEvent) -> Result<(), NotifyError>;
}

/// POSTs events to a configured webhook.
pub struct WebhookNotifier {
    url: String,
    http_client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
            http_client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .expect("failed to create HTTP client"),
        }
    }
}

#[async_trait]
impl NotificationSink for WebhookNotifier {
    async fn publish(&self, event: &ReservationEvent) -> Result<(), NotifyError> {
        let response = self
            .http_client
            .post(&self.url)
            .json(event)
            .send()
            .await
            .map_err(|e| {
                warn!("notification delivery failed: {:?}", e);
                NotifyError::Transport(e.to_string())
            })?;

        if !response.status().is_success() {
            warn!("notification endpoint answered {}", response.status());
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

/// Sink used when no webhook is configured.
#[derive(Default)]
pub struct NullNotifier;

#[async_trait]
impl NotificationSink for NullNotifier {
    async fn publish(&self, event: &ReservationEvent) -> Result<(), NotifyError> {
        debug!(
            "notification suppressed (no sink configured): {:?} {}",
            event.kind, event.reference
        );
        Ok(())
    }
}
