pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::models::{Customer, Reservation, ReservationModification, Table, TableBlock};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("row not found")]
    RowNotFound,
}

/// Persistence seam of the engine. Implementations must be thread-safe;
/// serialization of check-and-write sequences is the ledger's job (it holds
/// a per-(table,date) lock around them), so these methods stay plain CRUD.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    // --- tables ---
    async fn list_tables(&self) -> Result<Vec<Table>, StoreError>;
    async fn get_table(&self, id: Uuid) -> Result<Option<Table>, StoreError>;
    async fn get_table_by_number(&self, number: i32) -> Result<Option<Table>, StoreError>;

    // --- customers (external directory collaborator, create-or-find) ---
    async fn find_or_create_customer(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<Customer, StoreError>;
    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError>;

    // --- reservations ---
    async fn insert_reservation(&self, reservation: &Reservation) -> Result<(), StoreError>;
    async fn update_reservation(&self, reservation: &Reservation) -> Result<(), StoreError>;
    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, StoreError>;
    /// All reservations on `date` whose status still holds a table.
    async fn active_reservations_on(&self, date: NaiveDate) -> Result<Vec<Reservation>, StoreError>;
    /// The active reservation occupying `table_id` on `date`, if any. A
    /// combined booking occupies both of its tables. `exclude` ignores one
    /// reservation id (a modification checking against its own prior row).
    async fn active_reservation_for(
        &self,
        table_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<Option<Reservation>, StoreError>;

    // --- blackout registry ---
    async fn insert_block(&self, block: &TableBlock) -> Result<(), StoreError>;
    async fn delete_block(&self, id: Uuid) -> Result<bool, StoreError>;
    async fn blocks_covering(&self, date: NaiveDate) -> Result<Vec<TableBlock>, StoreError>;
    async fn is_blocked(&self, table_id: Uuid, date: NaiveDate) -> Result<bool, StoreError>;

    // --- audit trail (append-only) ---
    async fn insert_modification(
        &self,
        modification: &ReservationModification,
    ) -> Result<(), StoreError>;
    async fn modifications_for(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<ReservationModification>, StoreError>;
}
