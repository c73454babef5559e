//! The transactional core. Create/modify run their check-and-write sequence
//! under a per-(table, date) advisory lock so two concurrent callers can
//! never both pass the exclusivity pre-check; refund calls the payment
//! collaborator with no lock held and only re-acquires the key for the final
//! mutation, guarded by the idempotent `deposit_refunded` flag.

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use serde_json::{json, Map, Value};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::{
    reservation::generate_reference, Reservation, ReservationModification, ReservationStatus,
    Table,
};
use crate::services::availability::{COMBINED_PARTY_MAX, COMBINED_PARTY_MIN};
use crate::services::calendar::OperatingCalendar;
use crate::services::notify::{NotificationSink, ReservationEvent, ReservationEventKind};
use crate::services::payment::{PaymentGateway, RefundReasonCode};
use crate::services::slots::SlotGenerator;
use crate::store::ReservationStore;

/// Keyed advisory locks. The resource is identified by the composite
/// (table, date) key; combined bookings acquire both constituents' keys in
/// canonical order so overlapping pairs cannot deadlock.
#[derive(Clone, Default)]
struct TableDateLocks {
    inner: Arc<StdMutex<HashMap<(Uuid, NaiveDate), Arc<AsyncMutex<()>>>>>,
}

impl TableDateLocks {
    fn handle(&self, table_id: Uuid, date: NaiveDate) -> Arc<AsyncMutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.entry((table_id, date)).or_default().clone()
    }

    async fn acquire(&self, mut keys: Vec<(Uuid, NaiveDate)>) -> Vec<OwnedMutexGuard<()>> {
        keys.sort();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for (table_id, date) in keys {
            guards.push(self.handle(table_id, date).lock_owned().await);
        }
        guards
    }
}

/// Guest identity as submitted with a booking; resolved against the
/// customer directory by email.
#[derive(Debug, Clone)]
pub struct CustomerRef {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Deposit state at booking time. `paid` means capture already succeeded,
/// which confirms the reservation immediately.
#[derive(Debug, Clone)]
pub struct DepositIntent {
    pub amount: i64,
    pub paid: bool,
    pub payment_ref: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateReservation {
    pub table_id: Uuid,
    /// Partner table id when booking the synthesized combined pair.
    pub combine_with: Option<Uuid>,
    pub date: NaiveDate,
    pub arrival_slot: NaiveTime,
    pub party_size: i32,
    pub customer: CustomerRef,
    pub deposit: DepositIntent,
    pub special_requests: Option<String>,
    pub internal_notes: Option<String>,
}

/// Partial change set accepted by `modify`.
#[derive(Debug, Clone, Default)]
pub struct ReservationChanges {
    pub date: Option<NaiveDate>,
    pub arrival_slot: Option<NaiveTime>,
    pub party_size: Option<i32>,
    pub table_id: Option<Uuid>,
}

#[derive(Debug)]
pub struct RefundOutcome {
    pub reservation: Reservation,
    pub refund_ref: String,
    pub amount: i64,
}

pub struct ReservationLedger {
    store: Arc<dyn ReservationStore>,
    slots: SlotGenerator,
    payments: Arc<dyn PaymentGateway>,
    notifier: Arc<dyn NotificationSink>,
    locks: TableDateLocks,
}

impl ReservationLedger {
    pub fn new(
        store: Arc<dyn ReservationStore>,
        calendar: Arc<OperatingCalendar>,
        payments: Arc<dyn PaymentGateway>,
        notifier: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            slots: SlotGenerator::new(calendar),
            store,
            payments,
            notifier,
            locks: TableDateLocks::default(),
        }
    }

    /// Books a table (or combined pair) for the whole evening of `date`.
    pub async fn create(&self, request: CreateReservation) -> Result<Reservation, EngineError> {
        if request.party_size <= 0 {
            return Err(EngineError::Validation(
                "party size must be positive".to_string(),
            ));
        }
        if !self.slots.is_valid_slot(request.date, request.arrival_slot) {
            return Err(EngineError::Validation(format!(
                "{} is not a bookable arrival time on {}",
                request.arrival_slot.format("%H:%M"),
                request.date
            )));
        }
        if request.deposit.amount < 0 {
            return Err(EngineError::Validation(
                "deposit amount cannot be negative".to_string(),
            ));
        }

        let table = self.active_table(request.table_id).await?;
        let partner = match request.combine_with {
            Some(partner_id) => Some(self.combined_partner(&table, partner_id, request.party_size).await?),
            None => None,
        };
        self.check_capacity(&table, partner.as_ref(), request.party_size)?;

        let customer = self
            .store
            .find_or_create_customer(
                &request.customer.name,
                &request.customer.email,
                request.customer.phone.as_deref(),
            )
            .await?;

        let mut keys = vec![(table.id, request.date)];
        if let Some(partner) = &partner {
            keys.push((partner.id, request.date));
        }
        let guards = self.locks.acquire(keys).await;

        // Re-checked under the lock: between the caller's availability query
        // and this point, another booking may have taken the table.
        self.ensure_table_free(table.id, request.date, None).await?;
        if let Some(partner) = &partner {
            self.ensure_table_free(partner.id, request.date, None).await?;
        }

        let now = Utc::now();
        let status = if request.deposit.paid {
            ReservationStatus::Confirmed
        } else {
            ReservationStatus::Pending
        };
        let reservation = Reservation {
            id: Uuid::new_v4(),
            reference: generate_reference(),
            table_id: table.id,
            combined_with_table_id: partner.as_ref().map(|p| p.id),
            customer_id: customer.id,
            reservation_date: request.date,
            arrival_slot: request.arrival_slot,
            party_size: request.party_size,
            status,
            deposit_amount: request.deposit.amount,
            deposit_paid: request.deposit.paid,
            deposit_refunded: false,
            refund_amount: None,
            refund_date: None,
            payment_ref: request.deposit.payment_ref.clone(),
            special_requests: request.special_requests.clone(),
            internal_notes: request.internal_notes.clone(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert_reservation(&reservation).await?;
        drop(guards);

        info!(
            "reservation {} created: table {} on {} for party of {}",
            reservation.reference, table.number, reservation.reservation_date,
            reservation.party_size
        );
        self.send_event(ReservationEventKind::Created, &reservation)
            .await;
        Ok(reservation)
    }

    /// Applies a partial change set after re-validating slot, capacity and
    /// availability for the proposed target, ignoring the reservation's own
    /// prior row. Appends one audit record on success.
    pub async fn modify(
        &self,
        id: Uuid,
        changes: ReservationChanges,
        actor: &str,
        reason: Option<&str>,
        notify: bool,
    ) -> Result<Reservation, EngineError> {
        let current = self
            .store
            .get_reservation(id)
            .await?
            .ok_or(EngineError::NotFound)?;
        if current.status.is_terminal() {
            return Err(EngineError::Validation(format!(
                "cannot modify a {} reservation",
                current.status.as_str()
            )));
        }

        let new_date = changes.date.unwrap_or(current.reservation_date);
        let new_slot = changes.arrival_slot.unwrap_or(current.arrival_slot);
        let new_party = changes.party_size.unwrap_or(current.party_size);
        let new_table_id = changes.table_id.unwrap_or(current.table_id);
        // Moving a combined booking to a different table dissolves the pair.
        let keeps_table = new_table_id == current.table_id;
        let new_partner_id = if keeps_table {
            current.combined_with_table_id
        } else {
            None
        };

        if new_party <= 0 {
            return Err(EngineError::Validation(
                "party size must be positive".to_string(),
            ));
        }
        if !self.slots.is_valid_slot(new_date, new_slot) {
            return Err(EngineError::Validation(format!(
                "{} is not a bookable arrival time on {}",
                new_slot.format("%H:%M"),
                new_date
            )));
        }

        let table = self.active_table(new_table_id).await?;
        let partner = match new_partner_id {
            Some(partner_id) => Some(
                self.store
                    .get_table(partner_id)
                    .await?
                    .ok_or_else(|| EngineError::Validation("unknown partner table".to_string()))?,
            ),
            None => None,
        };
        self.check_capacity(&table, partner.as_ref(), new_party)?;

        let mut keys = vec![(new_table_id, new_date)];
        if let Some(partner_id) = new_partner_id {
            keys.push((partner_id, new_date));
        }
        let guards = self.locks.acquire(keys).await;

        self.ensure_table_free(new_table_id, new_date, Some(id)).await?;
        if let Some(partner_id) = new_partner_id {
            self.ensure_table_free(partner_id, new_date, Some(id)).await?;
        }

        let mut updated = self
            .store
            .get_reservation(id)
            .await?
            .ok_or(EngineError::NotFound)?;

        let mut previous_values = Map::new();
        let mut new_values = Map::new();
        record_change(
            &mut previous_values,
            &mut new_values,
            "reservation_date",
            &updated.reservation_date,
            &new_date,
        );
        record_change(
            &mut previous_values,
            &mut new_values,
            "arrival_slot",
            &updated.arrival_slot,
            &new_slot,
        );
        record_change(
            &mut previous_values,
            &mut new_values,
            "party_size",
            &updated.party_size,
            &new_party,
        );
        record_change(
            &mut previous_values,
            &mut new_values,
            "table_id",
            &updated.table_id,
            &new_table_id,
        );
        record_change(
            &mut previous_values,
            &mut new_values,
            "combined_with_table_id",
            &updated.combined_with_table_id,
            &new_partner_id,
        );

        updated.reservation_date = new_date;
        updated.arrival_slot = new_slot;
        updated.party_size = new_party;
        updated.table_id = new_table_id;
        updated.combined_with_table_id = new_partner_id;
        updated.updated_at = Utc::now();
        self.store.update_reservation(&updated).await?;
        drop(guards);

        let sent = if notify {
            self.send_event(ReservationEventKind::Modified, &updated).await
        } else {
            false
        };
        let record = ReservationModification::new(
            id,
            actor,
            Value::Object(previous_values),
            Value::Object(new_values),
            reason,
            sent,
        );
        self.store.insert_modification(&record).await?;

        info!("reservation {} modified by {}", updated.reference, actor);
        Ok(updated)
    }

    /// Transitions the reservation to CANCELLED. Deposit and refund fields
    /// are left untouched; refunds are a separate operation.
    pub async fn cancel(
        &self,
        id: Uuid,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<Reservation, EngineError> {
        self.transition(
            id,
            ReservationStatus::Cancelled,
            actor,
            reason,
            ReservationEventKind::Cancelled,
        )
        .await
    }

    /// Closes out an honoured reservation at the end of the evening.
    pub async fn mark_completed(&self, id: Uuid, actor: &str) -> Result<Reservation, EngineError> {
        self.transition(
            id,
            ReservationStatus::Completed,
            actor,
            None,
            ReservationEventKind::Modified,
        )
        .await
    }

    /// Records that the party never arrived.
    pub async fn mark_no_show(&self, id: Uuid, actor: &str) -> Result<Reservation, EngineError> {
        self.transition(
            id,
            ReservationStatus::NoShow,
            actor,
            None,
            ReservationEventKind::Modified,
        )
        .await
    }

    /// Refunds the captured deposit through the payment collaborator.
    ///
    /// The gateway call is the one slow step and runs with no lock held; on
    /// gateway failure nothing is mutated and the failure reason is passed
    /// through verbatim. On success the final mutation re-checks the
    /// idempotency flag under the key lock, so a retried refund after a
    /// crash cannot pay out twice. A refunded PENDING reservation advances
    /// to CANCELLED; a CONFIRMED one keeps its status (house rule: the
    /// booking may still be honoured).
    pub async fn refund(
        &self,
        id: Uuid,
        amount: Option<i64>,
        actor: &str,
        reason: &str,
    ) -> Result<RefundOutcome, EngineError> {
        let reservation = self
            .store
            .get_reservation(id)
            .await?
            .ok_or(EngineError::NotFound)?;

        if !reservation.deposit_paid {
            return Err(EngineError::NotRefundable(
                "no deposit was captured".to_string(),
            ));
        }
        if reservation.deposit_refunded {
            return Err(EngineError::AlreadyRefunded);
        }
        let payment_ref = reservation
            .payment_ref
            .clone()
            .ok_or_else(|| EngineError::NotRefundable("no payment reference on file".to_string()))?;
        if reservation.status == ReservationStatus::Completed {
            return Err(EngineError::NotRefundable(
                "reservation was already completed".to_string(),
            ));
        }

        let amount = amount.unwrap_or(reservation.deposit_amount);
        if amount <= 0 || amount > reservation.deposit_amount {
            return Err(EngineError::Validation(
                "refund amount must be within the captured deposit".to_string(),
            ));
        }

        let reason_code = RefundReasonCode::from_free_text(reason);
        let receipt = match self.payments.refund(&payment_ref, amount, reason_code).await {
            Ok(receipt) => receipt,
            Err(e) => {
                // Operational visibility only; the ledger stays untouched.
                warn!(
                    "refund of {} for {} failed: {}",
                    amount, reservation.reference, e
                );
                return Err(EngineError::Payment(e.to_string()));
            }
        };

        let keys = reservation
            .occupied_tables()
            .map(|table_id| (table_id, reservation.reservation_date))
            .collect();
        let guards = self.locks.acquire(keys).await;

        let mut updated = self
            .store
            .get_reservation(id)
            .await?
            .ok_or(EngineError::NotFound)?;
        if updated.deposit_refunded {
            return Err(EngineError::AlreadyRefunded);
        }

        let mut previous_values = Map::new();
        let mut new_values = Map::new();
        let refund_date = Some(Utc::now());
        record_change(
            &mut previous_values,
            &mut new_values,
            "deposit_refunded",
            &updated.deposit_refunded,
            &true,
        );
        record_change(
            &mut previous_values,
            &mut new_values,
            "refund_amount",
            &updated.refund_amount,
            &Some(receipt.amount),
        );
        record_change(
            &mut previous_values,
            &mut new_values,
            "refund_date",
            &updated.refund_date,
            &refund_date,
        );

        updated.deposit_refunded = true;
        updated.refund_amount = Some(receipt.amount);
        updated.refund_date = refund_date;
        if updated.status == ReservationStatus::Pending {
            record_change(
                &mut previous_values,
                &mut new_values,
                "status",
                &ReservationStatus::Pending,
                &ReservationStatus::Cancelled,
            );
            updated.status = ReservationStatus::Cancelled;
        }
        updated.updated_at = Utc::now();
        self.store.update_reservation(&updated).await?;
        drop(guards);

        let sent = self
            .send_event(ReservationEventKind::Refunded, &updated)
            .await;
        let record = ReservationModification::new(
            id,
            actor,
            Value::Object(previous_values),
            Value::Object(new_values),
            Some(reason),
            sent,
        );
        self.store.insert_modification(&record).await?;

        info!(
            "reservation {} refunded {} (gateway ref {})",
            updated.reference, receipt.amount, receipt.refund_ref
        );
        Ok(RefundOutcome {
            reservation: updated,
            refund_ref: receipt.refund_ref,
            amount: receipt.amount,
        })
    }

    pub async fn get(&self, id: Uuid) -> Result<Reservation, EngineError> {
        self.store
            .get_reservation(id)
            .await?
            .ok_or(EngineError::NotFound)
    }

    /// Audit trail of a reservation, in insertion order.
    pub async fn history(&self, id: Uuid) -> Result<Vec<ReservationModification>, EngineError> {
        self.get(id).await?;
        Ok(self.store.modifications_for(id).await?)
    }

    // --- internals ---

    async fn transition(
        &self,
        id: Uuid,
        next: ReservationStatus,
        actor: &str,
        reason: Option<&str>,
        kind: ReservationEventKind,
    ) -> Result<Reservation, EngineError> {
        let mut reservation = self
            .store
            .get_reservation(id)
            .await?
            .ok_or(EngineError::NotFound)?;
        if !reservation.status.can_transition_to(next) {
            return Err(EngineError::Validation(format!(
                "cannot move a {} reservation to {}",
                reservation.status.as_str(),
                next.as_str()
            )));
        }

        let mut previous_values = Map::new();
        let mut new_values = Map::new();
        record_change(
            &mut previous_values,
            &mut new_values,
            "status",
            &reservation.status,
            &next,
        );

        reservation.status = next;
        reservation.updated_at = Utc::now();
        self.store.update_reservation(&reservation).await?;

        let sent = self.send_event(kind, &reservation).await;
        let record = ReservationModification::new(
            id,
            actor,
            Value::Object(previous_values),
            Value::Object(new_values),
            reason,
            sent,
        );
        self.store.insert_modification(&record).await?;

        info!(
            "reservation {} -> {} by {}",
            reservation.reference,
            next.as_str(),
            actor
        );
        Ok(reservation)
    }

    async fn active_table(&self, table_id: Uuid) -> Result<Table, EngineError> {
        let table = self
            .store
            .get_table(table_id)
            .await?
            .ok_or_else(|| EngineError::Validation("unknown table".to_string()))?;
        if !table.is_active {
            return Err(EngineError::TableUnavailable(format!(
                "table {} is deactivated",
                table.number
            )));
        }
        Ok(table)
    }

    async fn combined_partner(
        &self,
        table: &Table,
        partner_id: Uuid,
        party_size: i32,
    ) -> Result<Table, EngineError> {
        if partner_id == table.id {
            return Err(EngineError::Validation(
                "a table cannot be combined with itself".to_string(),
            ));
        }
        let partner = self.active_table(partner_id).await?;
        if !table.can_combine_with(&partner) {
            return Err(EngineError::Validation(format!(
                "tables {} and {} are not combinable",
                table.number, partner.number
            )));
        }
        if !(COMBINED_PARTY_MIN..=COMBINED_PARTY_MAX).contains(&party_size) {
            return Err(EngineError::Validation(format!(
                "combined tables are reserved for parties of {} to {}",
                COMBINED_PARTY_MIN, COMBINED_PARTY_MAX
            )));
        }
        Ok(partner)
    }

    fn check_capacity(
        &self,
        table: &Table,
        partner: Option<&Table>,
        party_size: i32,
    ) -> Result<(), EngineError> {
        match partner {
            Some(partner) => {
                let capacity_min = table.capacity_min.min(partner.capacity_min);
                let capacity_max = table.capacity_max + partner.capacity_max;
                if party_size < capacity_min || party_size > capacity_max {
                    return Err(EngineError::Validation(format!(
                        "party of {} is outside the combined capacity {}-{}",
                        party_size, capacity_min, capacity_max
                    )));
                }
            }
            None => {
                if !table.seats(party_size) {
                    return Err(EngineError::Validation(format!(
                        "party of {} is outside table {}'s capacity {}-{}",
                        party_size, table.number, table.capacity_min, table.capacity_max
                    )));
                }
            }
        }
        Ok(())
    }

    async fn ensure_table_free(
        &self,
        table_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<(), EngineError> {
        if let Some(existing) = self
            .store
            .active_reservation_for(table_id, date, exclude)
            .await?
        {
            return Err(self.conflict_for(&existing).await);
        }
        if self.store.is_blocked(table_id, date).await? {
            return Err(EngineError::TableUnavailable(
                "table is blocked for this date".to_string(),
            ));
        }
        Ok(())
    }

    /// Conflict detail the caller needs to render a useful message.
    async fn conflict_for(&self, existing: &Reservation) -> EngineError {
        let customer_name = match self.store.get_customer(existing.customer_id).await {
            Ok(Some(customer)) => customer.name,
            _ => "unknown guest".to_string(),
        };
        EngineError::AvailabilityConflict {
            reference: existing.reference.clone(),
            customer_name,
            party_size: existing.party_size,
        }
    }

    async fn send_event(&self, kind: ReservationEventKind, reservation: &Reservation) -> bool {
        let event = ReservationEvent::new(kind, reservation);
        match self.notifier.publish(&event).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "notification for {} failed (mutation unaffected): {}",
                    reservation.reference, e
                );
                false
            }
        }
    }
}

fn record_change<T: Serialize + PartialEq>(
    previous_values: &mut Map<String, Value>,
    new_values: &mut Map<String, Value>,
    field: &str,
    old: &T,
    new: &T,
) {
    if old != new {
        previous_values.insert(field.to_string(), json!(old));
        new_values.insert(field.to_string(), json!(new));
    }
}
