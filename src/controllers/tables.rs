use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use crate::controllers::parse_date;
use crate::error::EngineError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tables", get(list_tables))
        .route("/blocks", get(list_blocks))
        .route("/blocks", post(create_block))
        .route("/blocks/{id}", delete(delete_block))
}

/* ---------- TABLES ---------- */

// GET /api/tables
async fn list_tables(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, EngineError> {
    let tables = state.store.list_tables().await.map_err(EngineError::from)?;
    Ok((StatusCode::OK, Json(tables)))
}

/* ---------- BLACKOUT WINDOWS ---------- */

// GET /api/blocks?date=YYYY-MM-DD
#[derive(Debug, Deserialize)]
struct BlocksQuery {
    date: String,
}

async fn list_blocks(
    State(state): State<Arc<AppState>>,
    Query(params): Query<BlocksQuery>,
) -> Result<impl IntoResponse, EngineError> {
    let date = parse_date(&params.date)?;
    let blocks = state.blocks.blocks_covering(date).await?;
    Ok((StatusCode::OK, Json(blocks)))
}

// POST /api/blocks
#[derive(Debug, Deserialize, Validate)]
struct CreateBlockRequest {
    table_id: Uuid,
    start_date: String,
    end_date: String,
    #[validate(length(min = 1))]
    reason: String,
    #[validate(length(min = 1))]
    created_by: String,
}

async fn create_block(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateBlockRequest>,
) -> Result<impl IntoResponse, EngineError> {
    req.validate()
        .map_err(|e| EngineError::Validation(e.to_string()))?;

    let block = state
        .blocks
        .add_block(
            req.table_id,
            parse_date(&req.start_date)?,
            parse_date(&req.end_date)?,
            &req.reason,
            &req.created_by,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(block)))
}

// DELETE /api/blocks/{id}
async fn delete_block(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, EngineError> {
    state.blocks.remove_block(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
