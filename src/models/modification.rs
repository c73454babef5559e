use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Append-only audit record: one row per mutating ledger operation on an
/// existing reservation. `previous_values` / `new_values` are JSON objects
/// holding only the fields that actually changed.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReservationModification {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub actor: String,
    pub previous_values: serde_json::Value,
    pub new_values: serde_json::Value,
    pub reason: Option<String>,
    /// False when the outbound notification was skipped or failed; the
    /// mutation itself is unaffected either way.
    pub notification_sent: bool,
    pub created_at: DateTime<Utc>,
}

impl ReservationModification {
    pub fn new(
        reservation_id: Uuid,
        actor: &str,
        previous_values: serde_json::Value,
        new_values: serde_json::Value,
        reason: Option<&str>,
        notification_sent: bool,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            reservation_id,
            actor: actor.to_string(),
            previous_values,
            new_values,
            reason: reason.map(|r| r.to_string()),
            notification_sent,
            created_at: Utc::now(),
        }
    }
}
