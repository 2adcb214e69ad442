//! Scheduling collaborator surface: the projection upsert and the read-only
//! grid. The upsert touches the Local Projection Store and nothing else; it
//! never triggers an MRP run.

use axum::{
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::errors::ServiceError;
use crate::events::Event;
use crate::services::mrp::aggregate::{self, GridRow};
use crate::services::projections::{RiskType, UserProjection};
use crate::{ApiResponse, AppState};

/// Identity is supplied by the auth collaborator in front of this service.
const ACTOR_HEADER: &str = "x-portal-user";

pub fn scheduling_routes() -> Router<AppState> {
    Router::new()
        .route("/update-projection", post(update_projection))
        .route("/grid", get(grid))
}

fn actor_from(headers: &HeaderMap) -> String {
    headers
        .get(ACTOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("unknown")
        .to_string()
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateProjectionRequest {
    pub so_number: String,
    pub part_number: String,
    /// `NoLowRisk` or `HighRisk`.
    pub risk_type: String,
    pub quantity: Decimal,
}

/// Upserts one projection quantity. Idempotent on an identical payload.
#[utoipa::path(
    post,
    path = "/scheduling/api/update-projection",
    request_body = UpdateProjectionRequest,
    responses(
        (status = 200, description = "Stored projection echoed back"),
        (status = 400, description = "Invalid payload", body = crate::errors::ErrorResponse),
        (status = 503, description = "Projection store unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "scheduling"
)]
pub async fn update_projection(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<UpdateProjectionRequest>,
) -> Result<Json<ApiResponse<UserProjection>>, ServiceError> {
    let risk_type = RiskType::parse(&request.risk_type).ok_or_else(|| {
        ServiceError::ValidationError(format!("unknown risk type '{}'", request.risk_type))
    })?;
    let actor = actor_from(&headers);

    let stored = state
        .projections
        .upsert(
            &request.so_number,
            &request.part_number,
            risk_type,
            request.quantity,
            &actor,
        )
        .await?;

    state
        .event_sender
        .send(Event::ProjectionUpdated {
            so_number: stored.so_number.clone(),
            part_number: stored.part_number.clone(),
            risk_type,
            quantity: stored.quantity,
            actor,
            timestamp: Utc::now(),
        })
        .await;

    Ok(Json(ApiResponse::success(stored)))
}

/// Read-only scheduling grid: open orders joined with stored projections and
/// their priced extensions.
#[utoipa::path(
    get,
    path = "/scheduling/api/grid",
    responses(
        (status = 200, description = "Grid rows", body = [GridRow]),
        (status = 502, description = "ERP unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "scheduling"
)]
pub async fn grid(State(state): State<AppState>) -> Result<Json<Vec<GridRow>>, ServiceError> {
    let run = state.mrp.current_run().await?;
    Ok(Json(aggregate::scheduling_grid(&run)))
}
