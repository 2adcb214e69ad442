//! Liveness and readiness probes.
//!
//! `/health` answers as long as the process is up; `/health/ready` pings the
//! local store and the ERP read pool so the load balancer stops routing to an
//! instance that cannot serve a run.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::gateway::ErpReadGateway;

#[derive(Clone)]
pub struct HealthState {
    pub db: Arc<DatabaseConnection>,
    pub erp: Arc<dyn ErpReadGateway>,
}

#[derive(Serialize)]
struct ReadinessDetail {
    local_store: &'static str,
    erp_gateway: &'static str,
}

pub fn health_routes(state: HealthState) -> Router {
    Router::new()
        .route("/", get(liveness))
        .route("/ready", get(readiness))
        .with_state(state)
}

async fn liveness() -> impl IntoResponse {
    Json(json!({ "status": "up" }))
}

async fn readiness(State(state): State<HealthState>) -> impl IntoResponse {
    let local_ok = match state.db.ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(%err, "local store ping failed");
            false
        }
    };
    let erp_ok = match state.erp.ping().await {
        Ok(()) => true,
        Err(err) => {
            warn!(%err, "ERP gateway ping failed");
            false
        }
    };

    let detail = ReadinessDetail {
        local_store: if local_ok { "up" } else { "down" },
        erp_gateway: if erp_ok { "up" } else { "down" },
    };
    let status = if local_ok && erp_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "status": detail })))
}
