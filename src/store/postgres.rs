//! PostgreSQL store over the migration schema. Runtime-checked queries,
//! same style as the rest of the sqlx surface.

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::database::Database;
use crate::models::{Customer, Reservation, ReservationModification, Table, TableBlock};
use crate::store::{ReservationStore, StoreError};

#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ReservationStore for PgStore {
    async fn list_tables(&self) -> Result<Vec<Table>, StoreError> {
        let tables = sqlx::query_as::<_, Table>(
            "SELECT id, number, floor, capacity_min, capacity_max, is_vip, is_active,
                    combinable_with, features
             FROM venue_tables
             ORDER BY number",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(tables)
    }

    async fn get_table(&self, id: Uuid) -> Result<Option<Table>, StoreError> {
        let table = sqlx::query_as::<_, Table>(
            "SELECT id, number, floor, capacity_min, capacity_max, is_vip, is_active,
                    combinable_with, features
             FROM venue_tables
             WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(table)
    }

    async fn get_table_by_number(&self, number: i32) -> Result<Option<Table>, StoreError> {
        let table = sqlx::query_as::<_, Table>(
            "SELECT id, number, floor, capacity_min, capacity_max, is_vip, is_active,
                    combinable_with, features
             FROM venue_tables
             WHERE number = $1",
        )
        .bind(number)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(table)
    }

    async fn find_or_create_customer(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<Customer, StoreError> {
        let candidate = Customer::new(name, email, phone);
        // Upsert keyed by email; the no-op update makes RETURNING yield the
        // existing row on conflict.
        let customer = sqlx::query_as::<_, Customer>(
            "INSERT INTO customers (id, name, email, phone, created_at)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (email) DO UPDATE SET name = customers.name
             RETURNING id, name, email, phone, created_at",
        )
        .bind(candidate.id)
        .bind(&candidate.name)
        .bind(&candidate.email)
        .bind(&candidate.phone)
        .bind(candidate.created_at)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(customer)
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        let customer = sqlx::query_as::<_, Customer>(
            "SELECT id, name, email, phone, created_at FROM customers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(customer)
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO reservations
                 (id, reference, table_id, combined_with_table_id, customer_id,
                  reservation_date, arrival_slot, party_size, status,
                  deposit_amount, deposit_paid, deposit_refunded,
                  refund_amount, refund_date, payment_ref,
                  special_requests, internal_notes, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10,
                     $11, $12, $13, $14, $15, $16, $17, $18, $19)",
        )
        .bind(reservation.id)
        .bind(&reservation.reference)
        .bind(reservation.table_id)
        .bind(reservation.combined_with_table_id)
        .bind(reservation.customer_id)
        .bind(reservation.reservation_date)
        .bind(reservation.arrival_slot)
        .bind(reservation.party_size)
        .bind(reservation.status)
        .bind(reservation.deposit_amount)
        .bind(reservation.deposit_paid)
        .bind(reservation.deposit_refunded)
        .bind(reservation.refund_amount)
        .bind(reservation.refund_date)
        .bind(&reservation.payment_ref)
        .bind(&reservation.special_requests)
        .bind(&reservation.internal_notes)
        .bind(reservation.created_at)
        .bind(reservation.updated_at)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn update_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE reservations SET
                 table_id = $2, combined_with_table_id = $3,
                 reservation_date = $4, arrival_slot = $5, party_size = $6,
                 status = $7, deposit_amount = $8, deposit_paid = $9,
                 deposit_refunded = $10, refund_amount = $11, refund_date = $12,
                 payment_ref = $13, special_requests = $14, internal_notes = $15,
                 updated_at = $16
             WHERE id = $1",
        )
        .bind(reservation.id)
        .bind(reservation.table_id)
        .bind(reservation.combined_with_table_id)
        .bind(reservation.reservation_date)
        .bind(reservation.arrival_slot)
        .bind(reservation.party_size)
        .bind(reservation.status)
        .bind(reservation.deposit_amount)
        .bind(reservation.deposit_paid)
        .bind(reservation.deposit_refunded)
        .bind(reservation.refund_amount)
        .bind(reservation.refund_date)
        .bind(&reservation.payment_ref)
        .bind(&reservation.special_requests)
        .bind(&reservation.internal_notes)
        .bind(reservation.updated_at)
        .execute(&self.db.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::RowNotFound);
        }
        Ok(())
    }

    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let reservation =
            sqlx::query_as::<_, Reservation>("SELECT * FROM reservations WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.db.pool)
                .await?;
        Ok(reservation)
    }

    async fn active_reservations_on(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, StoreError> {
        let reservations = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations
             WHERE reservation_date = $1 AND status IN ('pending', 'confirmed')",
        )
        .bind(date)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(reservations)
    }

    async fn active_reservation_for(
        &self,
        table_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<Option<Reservation>, StoreError> {
        let reservation = sqlx::query_as::<_, Reservation>(
            "SELECT * FROM reservations
             WHERE reservation_date = $2
               AND status IN ('pending', 'confirmed')
               AND (table_id = $1 OR combined_with_table_id = $1)
               AND ($3::uuid IS NULL OR id <> $3)
             LIMIT 1",
        )
        .bind(table_id)
        .bind(date)
        .bind(exclude)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(reservation)
    }

    async fn insert_block(&self, block: &TableBlock) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO table_blocks
                 (id, table_id, start_date, end_date, reason, created_by, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(block.id)
        .bind(block.table_id)
        .bind(block.start_date)
        .bind(block.end_date)
        .bind(&block.reason)
        .bind(&block.created_by)
        .bind(block.created_at)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn delete_block(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM table_blocks WHERE id = $1")
            .bind(id)
            .execute(&self.db.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn blocks_covering(&self, date: NaiveDate) -> Result<Vec<TableBlock>, StoreError> {
        let blocks = sqlx::query_as::<_, TableBlock>(
            "SELECT * FROM table_blocks WHERE start_date <= $1 AND end_date >= $1",
        )
        .bind(date)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(blocks)
    }

    async fn is_blocked(&self, table_id: Uuid, date: NaiveDate) -> Result<bool, StoreError> {
        let blocked = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(
                 SELECT 1 FROM table_blocks
                 WHERE table_id = $1 AND start_date <= $2 AND end_date >= $2
             )",
        )
        .bind(table_id)
        .bind(date)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(blocked)
    }

    async fn insert_modification(
        &self,
        modification: &ReservationModification,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO reservation_modifications
                 (id, reservation_id, actor, previous_values, new_values,
                  reason, notification_sent, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(modification.id)
        .bind(modification.reservation_id)
        .bind(&modification.actor)
        .bind(&modification.previous_values)
        .bind(&modification.new_values)
        .bind(&modification.reason)
        .bind(modification.notification_sent)
        .bind(modification.created_at)
        .execute(&self.db.pool)
        .await?;
        Ok(())
    }

    async fn modifications_for(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<ReservationModification>, StoreError> {
        let modifications = sqlx::query_as::<_, ReservationModification>(
            "SELECT * FROM reservation_modifications
             WHERE reservation_id = $1
             ORDER BY created_at, id",
        )
        .bind(reservation_id)
        .fetch_all(&self.db.pool)
        .await?;
        Ok(modifications)
    }
}
