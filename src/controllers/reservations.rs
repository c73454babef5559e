use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::{parse_date, parse_slot};
use crate::error::EngineError;
use crate::services::ledger::{
    CreateReservation, CustomerRef, DepositIntent, ReservationChanges,
};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/reservations", post(create_reservation))
        .route("/reservations/{id}", get(get_reservation))
        .route("/reservations/{id}", patch(modify_reservation))
        .route("/reservations/{id}/cancel", patch(cancel_reservation))
        .route("/reservations/{id}/complete", patch(complete_reservation))
        .route("/reservations/{id}/no-show", patch(mark_no_show))
        .route("/reservations/{id}/refund", post(refund_reservation))
        .route("/reservations/{id}/history", get(get_history))
}

fn invalid(e: validator::ValidationErrors) -> EngineError {
    EngineError::Validation(e.to_string())
}

/* ---------- CREATE ---------- */

// POST /api/reservations
#[derive(Debug, Deserialize, Validate)]
struct CustomerPayload {
    #[validate(length(min = 1))]
    name: String,
    #[validate(email)]
    email: String,
    phone: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct DepositPayload {
    #[validate(range(min = 0))]
    amount: i64,
    #[serde(default)]
    paid: bool,
    payment_ref: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
struct CreateReservationRequest {
    table_id: Uuid,
    combine_with: Option<Uuid>,
    date: String,
    arrival_slot: String,
    #[validate(range(min = 1))]
    party_size: i32,
    #[validate(nested)]
    customer: CustomerPayload,
    #[validate(nested)]
    deposit: DepositPayload,
    special_requests: Option<String>,
    internal_notes: Option<String>,
}

async fn create_reservation(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<impl IntoResponse, EngineError> {
    req.validate().map_err(invalid)?;

    let reservation = state
        .ledger
        .create(CreateReservation {
            table_id: req.table_id,
            combine_with: req.combine_with,
            date: parse_date(&req.date)?,
            arrival_slot: parse_slot(&req.arrival_slot)?,
            party_size: req.party_size,
            customer: CustomerRef {
                name: req.customer.name,
                email: req.customer.email,
                phone: req.customer.phone,
            },
            deposit: DepositIntent {
                amount: req.deposit.amount,
                paid: req.deposit.paid,
                payment_ref: req.deposit.payment_ref,
            },
            special_requests: req.special_requests,
            internal_notes: req.internal_notes,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(reservation)))
}

/* ---------- READ ---------- */

// GET /api/reservations/{id}
async fn get_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let reservation = state.ledger.get(id).await?;
    Ok((StatusCode::OK, Json(reservation)))
}

// GET /api/reservations/{id}/history
async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    let history = state.ledger.history(id).await?;
    Ok((StatusCode::OK, Json(history)))
}

/* ---------- MODIFY ---------- */

// PATCH /api/reservations/{id}
#[derive(Debug, Deserialize, Validate)]
struct ModifyReservationRequest {
    date: Option<String>,
    arrival_slot: Option<String>,
    #[validate(range(min = 1))]
    party_size: Option<i32>,
    table_id: Option<Uuid>,
    #[validate(length(min = 1))]
    actor: String,
    reason: Option<String>,
    #[serde(default = "default_notify")]
    notify: bool,
}

fn default_notify() -> bool {
    true
}

async fn modify_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ModifyReservationRequest>,
) -> Result<impl IntoResponse, EngineError> {
    req.validate().map_err(invalid)?;

    let changes = ReservationChanges {
        date: req.date.as_deref().map(parse_date).transpose()?,
        arrival_slot: req.arrival_slot.as_deref().map(parse_slot).transpose()?,
        party_size: req.party_size,
        table_id: req.table_id,
    };
    let reservation = state
        .ledger
        .modify(id, changes, &req.actor, req.reason.as_deref(), req.notify)
        .await?;

    Ok((StatusCode::OK, Json(reservation)))
}

/* ---------- STATUS TRANSITIONS ---------- */

#[derive(Debug, Deserialize, Validate)]
struct ActorRequest {
    #[validate(length(min = 1))]
    actor: String,
    reason: Option<String>,
}

// PATCH /api/reservations/{id}/cancel
async fn cancel_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Result<impl IntoResponse, EngineError> {
    req.validate().map_err(invalid)?;
    let reservation = state
        .ledger
        .cancel(id, &req.actor, req.reason.as_deref())
        .await?;
    Ok((StatusCode::OK, Json(reservation)))
}

// PATCH /api/reservations/{id}/complete
async fn complete_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Result<impl IntoResponse, EngineError> {
    req.validate().map_err(invalid)?;
    let reservation = state.ledger.mark_completed(id, &req.actor).await?;
    Ok((StatusCode::OK, Json(reservation)))
}

// PATCH /api/reservations/{id}/no-show
async fn mark_no_show(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<ActorRequest>,
) -> Result<impl IntoResponse, EngineError> {
    req.validate().map_err(invalid)?;
    let reservation = state.ledger.mark_no_show(id, &req.actor).await?;
    Ok((StatusCode::OK, Json(reservation)))
}

/* ---------- REFUND ---------- */

// POST /api/reservations/{id}/refund
#[derive(Debug, Deserialize, Validate)]
struct RefundRequest {
    #[validate(range(min = 1))]
    amount: Option<i64>,
    #[validate(length(min = 1))]
    actor: String,
    #[validate(length(min = 1))]
    reason: String,
}

async fn refund_reservation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(req): Json<RefundRequest>,
) -> Result<impl IntoResponse, EngineError> {
    req.validate().map_err(invalid)?;

    let outcome = state
        .ledger
        .refund(id, req.amount, &req.actor, &req.reason)
        .await?;

    Ok((
        StatusCode::OK,
        Json(json!({
            "reservation": outcome.reservation,
            "refund_ref": outcome.refund_ref,
            "amount": outcome.amount,
        })),
    ))
}
