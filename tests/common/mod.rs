//! Shared fixtures for the integration suites: an in-memory floor plan, a
//! stub payment gateway and a counting notification sink.

#![allow(dead_code)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, Utc};
use uuid::Uuid;

use reservation_system::models::{Floor, Reservation, ReservationStatus, Table};
use reservation_system::services::calendar::OperatingCalendar;
use reservation_system::services::ledger::{
    CreateReservation, CustomerRef, DepositIntent, ReservationLedger,
};
use reservation_system::services::notify::{NotificationSink, NotifyError, ReservationEvent};
use reservation_system::services::payment::{
    PaymentError, PaymentGateway, RefundReasonCode, RefundReceipt,
};
use reservation_system::store::{MemoryStore, ReservationStore};

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn slot(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

pub fn table(number: i32, min: i32, max: i32, combinable: Vec<i32>) -> Table {
    Table {
        id: Uuid::new_v4(),
        number,
        floor: Floor::Main,
        capacity_min: min,
        capacity_max: max,
        is_vip: false,
        is_active: true,
        combinable_with: combinable,
        features: vec![],
    }
}

/// Four-table floor plan: two plain tables plus the combinable 7/8 pair.
pub fn floor_plan() -> Vec<Table> {
    vec![
        table(1, 2, 4, vec![]),
        table(2, 2, 6, vec![]),
        table(7, 4, 6, vec![8]),
        table(8, 4, 6, vec![7]),
    ]
}

/// Gateway stub: succeeds unless constructed with a rejection message, and
/// counts how often the ledger actually called out.
#[derive(Default)]
pub struct StubGateway {
    pub calls: AtomicU32,
    pub reject_with: Option<String>,
}

impl StubGateway {
    pub fn rejecting(message: &str) -> Self {
        Self {
            calls: AtomicU32::new(0),
            reject_with: Some(message.to_string()),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for StubGateway {
    async fn refund(
        &self,
        payment_ref: &str,
        amount_minor_units: i64,
        _reason: RefundReasonCode,
    ) -> Result<RefundReceipt, PaymentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reject_with {
            Some(message) => Err(PaymentError::Rejected(message.clone())),
            None => Ok(RefundReceipt {
                refund_ref: format!("ref-{payment_ref}"),
                amount: amount_minor_units,
                status: "REFUNDED".to_string(),
            }),
        }
    }
}

/// Notification sink that counts deliveries and can be told to fail.
#[derive(Default)]
pub struct CountingNotifier {
    pub delivered: AtomicU32,
    pub failing: bool,
}

impl CountingNotifier {
    pub fn failing() -> Self {
        Self {
            delivered: AtomicU32::new(0),
            failing: true,
        }
    }

    pub fn delivered_count(&self) -> u32 {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for CountingNotifier {
    async fn publish(&self, _event: &ReservationEvent) -> Result<(), NotifyError> {
        if self.failing {
            return Err(NotifyError::Transport("sink offline".to_string()));
        }
        self.delivered.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<ReservationLedger>,
    pub gateway: Arc<StubGateway>,
    pub notifier: Arc<CountingNotifier>,
    pub tables: Vec<Table>,
}

pub fn harness() -> Harness {
    harness_with(StubGateway::default(), CountingNotifier::default())
}

pub fn harness_with(gateway: StubGateway, notifier: CountingNotifier) -> Harness {
    let tables = floor_plan();
    let store = Arc::new(MemoryStore::with_tables(tables.clone()));
    let gateway = Arc::new(gateway);
    let notifier = Arc::new(notifier);
    let ledger = Arc::new(ReservationLedger::new(
        store.clone(),
        Arc::new(OperatingCalendar::default()),
        gateway.clone(),
        notifier.clone(),
    ));
    Harness {
        store,
        ledger,
        gateway,
        notifier,
        tables,
    }
}

impl Harness {
    pub fn table_no(&self, number: i32) -> &Table {
        self.tables
            .iter()
            .find(|t| t.number == number)
            .expect("table in fixture plan")
    }

    /// Seeds a reservation row directly, bypassing the ledger. Used for
    /// states create() cannot produce, e.g. a pending booking whose deposit
    /// was captured later.
    pub async fn seed_reservation(
        &self,
        table: &Table,
        on: NaiveDate,
        status: ReservationStatus,
        deposit_paid: bool,
        payment_ref: Option<&str>,
    ) -> Reservation {
        let now = Utc::now();
        let customer = self
            .store
            .find_or_create_customer("Seeded Guest", "seed@example.com", None)
            .await
            .unwrap();
        let reservation = Reservation {
            id: Uuid::new_v4(),
            reference: reservation_system::models::reservation::generate_reference(),
            table_id: table.id,
            combined_with_table_id: None,
            customer_id: customer.id,
            reservation_date: on,
            arrival_slot: slot(23, 0),
            party_size: 4,
            status,
            deposit_amount: 10_000,
            deposit_paid,
            deposit_refunded: false,
            refund_amount: None,
            refund_date: None,
            payment_ref: payment_ref.map(|r| r.to_string()),
            special_requests: None,
            internal_notes: None,
            created_at: now,
            updated_at: now,
        };
        self.store.insert_reservation(&reservation).await.unwrap();
        reservation
    }
}

pub fn booking(table: &Table, on: NaiveDate, arrival: NaiveTime, party: i32) -> CreateReservation {
    CreateReservation {
        table_id: table.id,
        combine_with: None,
        date: on,
        arrival_slot: arrival,
        party_size: party,
        customer: CustomerRef {
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            phone: Some("+44 20 7946 0000".to_string()),
        },
        deposit: DepositIntent {
            amount: 10_000,
            paid: false,
            payment_ref: None,
        },
        special_requests: None,
        internal_notes: None,
    }
}

pub fn paid_booking(
    table: &Table,
    on: NaiveDate,
    arrival: NaiveTime,
    party: i32,
) -> CreateReservation {
    let mut request = booking(table, on, arrival, party);
    request.deposit.paid = true;
    request.deposit.payment_ref = Some("pay-001".to_string());
    request
}
