use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Floor zones of the venue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "floor_zone", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Floor {
    Main,
    Mezzanine,
}

/// A physical table on the floor plan. Deactivation is a soft flag; rows are
/// never deleted while reservations reference them.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Table {
    pub id: Uuid,
    /// Stable human-facing table number.
    pub number: i32,
    pub floor: Floor,
    pub capacity_min: i32,
    pub capacity_max: i32,
    pub is_vip: bool,
    pub is_active: bool,
    /// Table numbers this table may be joined with for larger parties.
    pub combinable_with: Vec<i32>,
    pub features: Vec<String>,
}

impl Table {
    pub fn seats(&self, party_size: i32) -> bool {
        party_size >= self.capacity_min && party_size <= self.capacity_max
    }

    pub fn can_combine_with(&self, other: &Table) -> bool {
        self.combinable_with.contains(&other.number)
            || other.combinable_with.contains(&self.number)
    }
}
