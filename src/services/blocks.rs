//! Blackout registry: staff-declared maintenance/closure windows per table,
//! consumed by the availability resolver.

use std::sync::Arc;

use chrono::NaiveDate;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::TableBlock;
use crate::store::ReservationStore;

#[derive(Clone)]
pub struct BlackoutRegistry {
    store: Arc<dyn ReservationStore>,
}

impl BlackoutRegistry {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    pub async fn add_block(
        &self,
        table_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: &str,
        created_by: &str,
    ) -> Result<TableBlock, EngineError> {
        if start_date > end_date {
            return Err(EngineError::Validation(
                "block start date must not be after its end date".to_string(),
            ));
        }
        if self.store.get_table(table_id).await?.is_none() {
            return Err(EngineError::Validation("unknown table".to_string()));
        }

        let block = TableBlock::new(table_id, start_date, end_date, reason, created_by);
        self.store.insert_block(&block).await?;
        tracing::info!(
            "table {} blocked {}..={} by {}: {}",
            table_id,
            start_date,
            end_date,
            created_by,
            reason
        );
        Ok(block)
    }

    pub async fn remove_block(&self, id: Uuid) -> Result<(), EngineError> {
        if self.store.delete_block(id).await? {
            Ok(())
        } else {
            Err(EngineError::NotFound)
        }
    }

    pub async fn blocks_covering(&self, date: NaiveDate) -> Result<Vec<TableBlock>, EngineError> {
        Ok(self.store.blocks_covering(date).await?)
    }

    pub async fn is_blocked(&self, table_id: Uuid, date: NaiveDate) -> Result<bool, EngineError> {
        Ok(self.store.is_blocked(table_id, date).await?)
    }
}
