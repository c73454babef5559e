pub mod availability;
pub mod reservations;
pub mod tables;

use axum::Router;
use chrono::{NaiveDate, NaiveTime};
use std::sync::Arc;

use crate::error::EngineError;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(availability::routes())
        .merge(reservations::routes())
        .merge(tables::routes())
}

/* ---------- shared parsing helpers ---------- */

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, EngineError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| EngineError::Validation(format!("malformed date '{raw}', expected YYYY-MM-DD")))
}

pub(crate) fn parse_slot(raw: &str) -> Result<NaiveTime, EngineError> {
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .map_err(|_| EngineError::Validation(format!("malformed time '{raw}', expected HH:MM")))
}
