use std::collections::HashSet;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use uuid::Uuid;

use crate::error::EngineError;
use crate::models::Table;
use crate::store::ReservationStore;

/// Parties in this range may be offered the synthesized two-table pair.
pub const COMBINED_PARTY_MIN: i32 = 7;
pub const COMBINED_PARTY_MAX: i32 = 12;

/// An availability answer. The combined variant is synthesized per query and
/// never persisted as a table row.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TableCandidate {
    Single(Table),
    Combined {
        first: Table,
        second: Table,
        capacity_min: i32,
        capacity_max: i32,
        features: Vec<String>,
    },
}

impl TableCandidate {
    /// Deterministic ordering key: singles by table number, combined pairs
    /// by their lower constituent number then partner number.
    fn sort_key(&self) -> (i32, i32) {
        match self {
            Self::Single(table) => (table.number, 0),
            Self::Combined { first, second, .. } => (first.number, second.number),
        }
    }

    pub fn table_ids(&self) -> Vec<Uuid> {
        match self {
            Self::Single(table) => vec![table.id],
            Self::Combined { first, second, .. } => vec![first.id, second.id],
        }
    }

    pub fn capacity_range(&self) -> (i32, i32) {
        match self {
            Self::Single(table) => (table.capacity_min, table.capacity_max),
            Self::Combined {
                capacity_min,
                capacity_max,
                ..
            } => (*capacity_min, *capacity_max),
        }
    }
}

/// Union capacity range of a combinable pair: the weaker minimum, the sum of
/// maxima.
fn union_capacity(a: &Table, b: &Table) -> (i32, i32) {
    (a.capacity_min.min(b.capacity_min), a.capacity_max + b.capacity_max)
}

fn merged_features(a: &Table, b: &Table) -> Vec<String> {
    let mut features = a.features.clone();
    for feature in &b.features {
        if !features.contains(feature) {
            features.push(feature.clone());
        }
    }
    features
}

/// Computes which tables are free for a given evening, applying the
/// whole-evening exclusivity rule, blackout windows and the combined-pair
/// synthesis. Deterministic across calls for identical inputs.
#[derive(Clone)]
pub struct AvailabilityService {
    store: Arc<dyn ReservationStore>,
}

impl AvailabilityService {
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// Free candidates for `date` and `party_size`, ordered by table number.
    pub async fn find_free_tables(
        &self,
        date: NaiveDate,
        party_size: i32,
    ) -> Result<Vec<TableCandidate>, EngineError> {
        if party_size <= 0 {
            return Err(EngineError::Validation(
                "party size must be positive".to_string(),
            ));
        }

        let tables = self.store.list_tables().await?;

        // Arrival time is irrelevant here: any pending/confirmed reservation
        // holds its table(s) for the entire evening.
        let occupied: HashSet<Uuid> = self
            .store
            .active_reservations_on(date)
            .await?
            .iter()
            .flat_map(|r| r.occupied_tables())
            .collect();
        let blocked: HashSet<Uuid> = self
            .store
            .blocks_covering(date)
            .await?
            .iter()
            .map(|b| b.table_id)
            .collect();

        let is_free =
            |t: &Table| t.is_active && !occupied.contains(&t.id) && !blocked.contains(&t.id);

        let mut candidates: Vec<TableCandidate> = tables
            .iter()
            .filter(|t| is_free(t) && t.seats(party_size))
            .cloned()
            .map(TableCandidate::Single)
            .collect();

        if (COMBINED_PARTY_MIN..=COMBINED_PARTY_MAX).contains(&party_size) {
            // Both constituents must be independently free; capacity is
            // judged against the union range, not either table's own.
            for (i, first) in tables.iter().enumerate() {
                for second in &tables[i + 1..] {
                    if !first.can_combine_with(second) {
                        continue;
                    }
                    if !is_free(first) || !is_free(second) {
                        continue;
                    }
                    let (capacity_min, capacity_max) = union_capacity(first, second);
                    if party_size < capacity_min || party_size > capacity_max {
                        continue;
                    }
                    candidates.push(TableCandidate::Combined {
                        first: first.clone(),
                        second: second.clone(),
                        capacity_min,
                        capacity_max,
                        features: merged_features(first, second),
                    });
                }
            }
        }

        candidates.sort_by_key(|c| c.sort_key());
        Ok(candidates)
    }

    /// Re-runs only the exclusivity and blackout filters for one table.
    /// `exclude` lets a modification ignore its own prior row.
    pub async fn check_single_table(
        &self,
        table_id: Uuid,
        date: NaiveDate,
        exclude: Option<Uuid>,
    ) -> Result<bool, EngineError> {
        if self
            .store
            .active_reservation_for(table_id, date, exclude)
            .await?
            .is_some()
        {
            return Ok(false);
        }
        Ok(!self.store.is_blocked(table_id, date).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        reservation::generate_reference, Floor, Reservation, ReservationStatus, TableBlock,
    };
    use crate::store::MemoryStore;
    use chrono::{NaiveTime, Utc};

    fn table(number: i32, min: i32, max: i32, combinable: Vec<i32>) -> Table {
        Table {
            id: Uuid::new_v4(),
            number,
            floor: Floor::Main,
            capacity_min: min,
            capacity_max: max,
            is_vip: false,
            is_active: true,
            combinable_with: combinable,
            features: vec![format!("table {}", number)],
        }
    }

    fn floor_plan() -> Vec<Table> {
        vec![
            table(1, 2, 4, vec![]),
            table(2, 2, 6, vec![]),
            table(7, 4, 6, vec![8]),
            table(8, 4, 6, vec![7]),
        ]
    }

    fn reservation_on(table: &Table, date: NaiveDate) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: Uuid::new_v4(),
            reference: generate_reference(),
            table_id: table.id,
            combined_with_table_id: None,
            customer_id: Uuid::new_v4(),
            reservation_date: date,
            arrival_slot: NaiveTime::from_hms_opt(23, 0, 0).unwrap(),
            party_size: 4,
            status: ReservationStatus::Confirmed,
            deposit_amount: 0,
            deposit_paid: false,
            deposit_refunded: false,
            refund_amount: None,
            refund_date: None,
            payment_ref: None,
            special_requests: None,
            internal_notes: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn numbers(candidates: &[TableCandidate]) -> Vec<(i32, i32)> {
        candidates.iter().map(|c| c.sort_key()).collect()
    }

    #[tokio::test]
    async fn capacity_and_order_filters_apply() {
        let tables = floor_plan();
        let service = AvailabilityService::new(Arc::new(MemoryStore::with_tables(tables)));

        let candidates = service.find_free_tables(date("2025-06-20"), 4).await.unwrap();
        assert_eq!(numbers(&candidates), vec![(1, 0), (2, 0), (7, 0), (8, 0)]);

        let candidates = service.find_free_tables(date("2025-06-20"), 5).await.unwrap();
        assert_eq!(numbers(&candidates), vec![(2, 0), (7, 0), (8, 0)]);
    }

    #[tokio::test]
    async fn reserved_table_disappears_for_the_whole_evening() {
        let tables = floor_plan();
        let reserved = tables[1].clone();
        let store = Arc::new(MemoryStore::with_tables(tables));
        let d = date("2025-06-20");
        store
            .insert_reservation(&reservation_on(&reserved, d))
            .await
            .unwrap();

        let service = AvailabilityService::new(store.clone());
        let candidates = service.find_free_tables(d, 5).await.unwrap();
        assert_eq!(numbers(&candidates), vec![(7, 0), (8, 0)]);

        // Another evening is unaffected.
        let candidates = service.find_free_tables(date("2025-06-21"), 5).await.unwrap();
        assert_eq!(numbers(&candidates), vec![(2, 0), (7, 0), (8, 0)]);

        assert!(!service.check_single_table(reserved.id, d, None).await.unwrap());
    }

    #[tokio::test]
    async fn party_of_eight_gets_the_pair_only_when_both_sides_are_free() {
        let tables = floor_plan();
        let first = tables[2].clone();
        let second = tables[3].clone();
        let store = Arc::new(MemoryStore::with_tables(tables));
        let service = AvailabilityService::new(store.clone());
        let d = date("2025-06-20");

        // Neither table seats 8 alone; only the synthesized pair qualifies.
        let candidates = service.find_free_tables(d, 8).await.unwrap();
        assert_eq!(numbers(&candidates), vec![(7, 8)]);
        match &candidates[0] {
            TableCandidate::Combined {
                capacity_min,
                capacity_max,
                features,
                ..
            } => {
                assert_eq!((*capacity_min, *capacity_max), (4, 12));
                assert_eq!(features, &vec!["table 7".to_string(), "table 8".to_string()]);
            }
            other => panic!("expected combined candidate, got {:?}", other),
        }

        // One constituent reserved: the pair must vanish.
        store.insert_reservation(&reservation_on(&second, d)).await.unwrap();
        assert!(service.find_free_tables(d, 8).await.unwrap().is_empty());

        // A blocked constituent has the same effect on another date.
        let d2 = date("2025-06-22");
        store
            .insert_block(&TableBlock::new(first.id, d2, d2, "maintenance", "manager"))
            .await
            .unwrap();
        assert!(service.find_free_tables(d2, 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn blocked_table_is_unavailable_and_check_reflects_it() {
        let tables = floor_plan();
        let blocked = tables[0].clone();
        let store = Arc::new(MemoryStore::with_tables(tables));
        let d = date("2025-06-20");
        store
            .insert_block(&TableBlock::new(
                blocked.id,
                date("2025-06-19"),
                date("2025-06-21"),
                "deep clean",
                "ops",
            ))
            .await
            .unwrap();

        let service = AvailabilityService::new(store);
        let candidates = service.find_free_tables(d, 3).await.unwrap();
        assert_eq!(numbers(&candidates), vec![(2, 0)]);
        assert!(!service.check_single_table(blocked.id, d, None).await.unwrap());
    }

    #[tokio::test]
    async fn exclusion_lets_a_modification_see_past_its_own_row() {
        let tables = floor_plan();
        let target = tables[0].clone();
        let store = Arc::new(MemoryStore::with_tables(tables));
        let d = date("2025-06-20");
        let own = reservation_on(&target, d);
        store.insert_reservation(&own).await.unwrap();

        let service = AvailabilityService::new(store);
        assert!(!service.check_single_table(target.id, d, None).await.unwrap());
        assert!(service
            .check_single_table(target.id, d, Some(own.id))
            .await
            .unwrap());
    }
}
