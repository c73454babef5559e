use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::controllers::parse_date;
use crate::error::EngineError;
use crate::services::availability::TableCandidate;
use crate::services::calendar::ResolvedWindow;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/schedule/slots", get(get_slots))
        .route("/availability", get(get_free_tables))
        .route("/availability/table/{table_id}", get(check_table))
}

/* ---------- SLOTS ---------- */

// GET /api/schedule/slots?date=YYYY-MM-DD
#[derive(Debug, Deserialize)]
struct SlotsQuery {
    date: String,
}

#[derive(Debug, Serialize)]
struct SlotsResponse {
    date: chrono::NaiveDate,
    window: ResolvedWindow,
    slots: Vec<chrono::NaiveTime>,
}

async fn get_slots(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SlotsQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let date = parse_date(&params.date)?;
    let window = state.calendar.resolve_window(date);
    let slots = state.slots.generate_slots(date);

    Ok((StatusCode::OK, Json(SlotsResponse { date, window, slots })))
}

/* ---------- FREE TABLES ---------- */

// GET /api/availability?date=YYYY-MM-DD&party_size=N
#[derive(Debug, Deserialize)]
struct AvailabilityQuery {
    date: String,
    party_size: i32,
}

#[derive(Debug, Serialize)]
struct AvailabilityResponse {
    date: chrono::NaiveDate,
    party_size: i32,
    candidates: Vec<TableCandidate>,
}

async fn get_free_tables(
    State(state): State<Arc<AppState>>,
    Query(params): Query<AvailabilityQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let date = parse_date(&params.date)?;
    let candidates = state
        .availability
        .find_free_tables(date, params.party_size)
        .await?;

    Ok((
        StatusCode::OK,
        Json(AvailabilityResponse {
            date,
            party_size: params.party_size,
            candidates,
        }),
    ))
}

/* ---------- SINGLE TABLE CHECK ---------- */

// GET /api/availability/table/{table_id}?date=YYYY-MM-DD&exclude=<reservation_id>
#[derive(Debug, Deserialize)]
struct CheckQuery {
    date: String,
    exclude: Option<Uuid>,
}

async fn check_table(
    State(state): State<Arc<AppState>>,
    Path(table_id): Path<Uuid>,
    Query(params): Query<CheckQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let date = parse_date(&params.date)?;
    let available = state
        .availability
        .check_single_table(table_id, date, params.exclude)
        .await?;

    Ok((StatusCode::OK, Json(json!({ "available": available }))))
}
