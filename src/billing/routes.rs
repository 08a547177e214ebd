//! HTTP routes for the billing engine.

use axum::{
    extract::State,
    routing::{delete, get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::error::Result;
use crate::extract::{JsonBody, PathParam, QueryParams};
use crate::AppState;

use super::requests::{ListBillsQuery, PreviewBillRequest, SaveBillRequest};
use super::responses::{
    ApproveBillResponse, BillReviewResponse, BillSummaryResponse, DeleteChargeResponse,
    PreviewResponse, SaveBillResponse,
};
use super::services;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/billing/bills", get(list_bills))
        .route("/api/billing/preview", post(preview))
        .route("/api/billing/units/:unit_id", get(review))
        .route("/api/billing/units/:unit_id/save", post(save))
        .route("/api/billing/units/:unit_id/approve", post(approve))
        .route("/api/billing/charges/:charge_id", delete(delete_charge))
}

/// Landlord overview of bills
async fn list_bills(
    State(state): State<AppState>,
    QueryParams(query): QueryParams<ListBillsQuery>,
) -> Result<Json<Vec<BillSummaryResponse>>> {
    Ok(Json(services::list_bills(&state.db, query).await?))
}

/// Breakdown of a unit's current bill
async fn review(
    State(state): State<AppState>,
    PathParam(unit_id): PathParam<Uuid>,
) -> Result<Json<BillReviewResponse>> {
    let review = services::load_review(&state.db, &state.cache, &state.config.currency, unit_id)
        .await?;
    Ok(Json((*review).clone()))
}

/// Stateless breakdown for unsaved edits
async fn preview(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<PreviewBillRequest>,
) -> Json<PreviewResponse> {
    Json(services::preview_bill(request, &state.config.currency))
}

async fn save(
    State(state): State<AppState>,
    PathParam(unit_id): PathParam<Uuid>,
    JsonBody(request): JsonBody<SaveBillRequest>,
) -> Result<Json<SaveBillResponse>> {
    let saved = services::save_bill(
        &state.db,
        &state.cache,
        &state.config.currency,
        unit_id,
        request,
    )
    .await?;
    Ok(Json(saved))
}

async fn approve(
    State(state): State<AppState>,
    PathParam(unit_id): PathParam<Uuid>,
) -> Result<Json<ApproveBillResponse>> {
    Ok(Json(
        services::approve_bill(&state.db, &state.cache, unit_id).await?,
    ))
}

async fn delete_charge(
    State(state): State<AppState>,
    PathParam(charge_id): PathParam<Uuid>,
) -> Result<Json<DeleteChargeResponse>> {
    Ok(Json(
        services::delete_charge(&state.db, &state.cache, charge_id).await?,
    ))
}
