use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Reservation lifecycle.
///
/// PENDING -> {CONFIRMED, CANCELLED}
/// CONFIRMED -> {CANCELLED, COMPLETED, NO_SHOW}
/// CANCELLED / COMPLETED / NO_SHOW are terminal; nothing re-enters PENDING.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
    NoShow,
}

impl ReservationStatus {
    /// Whether a reservation in this status keeps its table exclusively held
    /// for the whole evening.
    pub fn holds_table(&self) -> bool {
        matches!(self, Self::Pending | Self::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Completed | Self::NoShow)
    }

    pub fn can_transition_to(&self, next: ReservationStatus) -> bool {
        use ReservationStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, NoShow)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
            Self::NoShow => "no_show",
        }
    }
}

/// A booking of one table (or a combined pair) for an entire operating
/// session. The arrival slot only signals when the party shows up; it has no
/// bearing on how long the table is held.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    /// Short human-readable reference quoted in conflict messages and mails.
    pub reference: String,
    pub table_id: Uuid,
    /// Partner table when the booking was made against a combined pair. The
    /// row then occupies both tables for exclusivity purposes.
    pub combined_with_table_id: Option<Uuid>,
    pub customer_id: Uuid,
    pub reservation_date: NaiveDate,
    pub arrival_slot: NaiveTime,
    pub party_size: i32,
    pub status: ReservationStatus,
    /// Deposit in minor currency units.
    pub deposit_amount: i64,
    pub deposit_paid: bool,
    pub deposit_refunded: bool,
    pub refund_amount: Option<i64>,
    pub refund_date: Option<DateTime<Utc>>,
    /// External payment gateway reference; required before a refund.
    pub payment_ref: Option<String>,
    pub special_requests: Option<String>,
    /// Staff-only notes, never included in outbound notifications.
    pub internal_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Reservation {
    /// Table ids this reservation occupies for the evening.
    pub fn occupied_tables(&self) -> impl Iterator<Item = Uuid> + '_ {
        std::iter::once(self.table_id).chain(self.combined_with_table_id)
    }

    pub fn occupies(&self, table_id: Uuid) -> bool {
        self.table_id == table_id || self.combined_with_table_id == Some(table_id)
    }
}

/// Short reference code, e.g. `RSV-9F41C2`.
pub fn generate_reference() -> String {
    let raw = Uuid::new_v4().simple().to_string();
    format!("RSV-{}", raw[..6].to_uppercase())
}
