//! In-memory store for tests and single-node deployments, guarded by a
//! Tokio RwLock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{Customer, Reservation, ReservationModification, Table, TableBlock};
use crate::store::{ReservationStore, StoreError};

#[derive(Default)]
struct Inner {
    tables: Vec<Table>,
    customers: Vec<Customer>,
    reservations: HashMap<Uuid, Reservation>,
    blocks: Vec<TableBlock>,
    modifications: Vec<ReservationModification>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(tables: Vec<Table>) -> Self {
        Self {
            state: RwLock::new(Inner {
                tables,
                ..Inner::default()
            }),
        }
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn list_tables(&self) -> Result<Vec<Table>, StoreError> {
        let state = self.state.read().await;
        let mut tables = state.tables.clone();
        tables.sort_by_key(|t| t.number);
        Ok(tables)
    }

    async fn get_table(&self, id: Uuid) -> Result<Option<Table>, StoreError> {
        let state = self.state.read().await;
        Ok(state.tables.iter().find(|t| t.id == id).cloned())
    }

    async fn get_table_by_number(&self, number: i32) -> Result<Option<Table>, StoreError> {
        let state = self.state.read().await;
        Ok(state.tables.iter().find(|t| t.number == number).cloned())
    }

    async fn find_or_create_customer(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
    ) -> Result<Customer, StoreError> {
        let mut state = self.state.write().await;
        let needle = email.to_lowercase();
        if let Some(existing) = state.customers.iter().find(|c| c.email == needle) {
            return Ok(existing.clone());
        }
        let customer = Customer::new(name, email, phone);
        state.customers.push(customer.clone());
        Ok(customer)
    }

    async fn get_customer(&self, id: Uuid) -> Result<Option<Customer>, StoreError> {
        let state = self.state.read().await;
        Ok(state.customers.iter().find(|c| c.id == id).cloned())
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn update_reservation(&self, reservation: &Reservation) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        match state.reservations.get_mut(&reservation.id) {
            Some(slot) => {
                *slot = reservation.clone();
                Ok(())
            }
            None => Err(StoreError::RowNotFound),
        }
    }

    async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, StoreError> {
        let state = self.state.read().await;
        Ok(state.reservations.get(&id).cloned())
    }

    async fn active_reservations_on(
        &self,
        date: NaiveDate,
    ) -> Result<Vec<Reservation>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| r.reservation_date == date && r.status.holds_table())
            .cloned()
            .collect())
    }

    async fn active_reservation_for(
        &self,
        table_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<Option<Reservation>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .reservations
            .values()
            .find(|r| {
                r.reservation_date == date
                    && r.status.holds_table()
                    && r.occupies(table_id)
                    && Some(r.id) != exclude
            })
            .cloned())
    }

    async fn insert_block(&self, block: &TableBlock) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.blocks.push(block.clone());
        Ok(())
    }

    async fn delete_block(&self, id: Uuid) -> Result<bool, StoreError> {
        let mut state = self.state.write().await;
        let before = state.blocks.len();
        state.blocks.retain(|b| b.id != id);
        Ok(state.blocks.len() < before)
    }

    async fn blocks_covering(&self, date: NaiveDate) -> Result<Vec<TableBlock>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .blocks
            .iter()
            .filter(|b| b.covers(date))
            .cloned()
            .collect())
    }

    async fn is_blocked(&self, table_id: Uuid, date: NaiveDate) -> Result<bool, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .blocks
            .iter()
            .any(|b| b.table_id == table_id && b.covers(date)))
    }

    async fn insert_modification(
        &self,
        modification: &ReservationModification,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.modifications.push(modification.clone());
        Ok(())
    }

    async fn modifications_for(
        &self,
        reservation_id: Uuid,
    ) -> Result<Vec<ReservationModification>, StoreError> {
        let state = self.state.read().await;
        Ok(state
            .modifications
            .iter()
            .filter(|m| m.reservation_id == reservation_id)
            .cloned()
            .collect())
    }
}
