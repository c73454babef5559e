use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Staff-declared maintenance/closure window for one table. Independent of
/// reservations; both boundary dates are inclusive.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct TableBlock {
    pub id: Uuid,
    pub table_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub reason: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TableBlock {
    pub fn new(
        table_id: Uuid,
        start_date: NaiveDate,
        end_date: NaiveDate,
        reason: &str,
        created_by: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            table_id,
            start_date,
            end_date,
            reason: reason.to_string(),
            created_by: created_by.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn covers(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }
}
