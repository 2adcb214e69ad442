//! Production Portal MRP service.
//!
//! Hosts the MRP allocation engine behind a JSON read surface: per-SO
//! dispositions, customer summaries and the purchasing shortage report,
//! computed on demand from ERP snapshots and cached process-wide.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod gateway;
pub mod handlers;
pub mod health;
pub mod openapi;
pub mod services;

use std::sync::Arc;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::json;
use utoipa::ToSchema;

use crate::gateway::ErpReadGateway;
use crate::services::mrp::MrpService;
use crate::services::projections::ProjectionStore;

/// Shared application state. Every dependency is constructed once at startup
/// and passed in explicitly; there are no process-global singletons.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub erp: Arc<dyn ErpReadGateway>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub mrp: Arc<MrpService>,
    pub projections: Arc<ProjectionStore>,
}

/// Envelope for write responses.
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Assembles the full application router.
pub fn app_router(state: AppState) -> Router {
    let health_state = health::HealthState {
        db: state.db.clone(),
        erp: state.erp.clone(),
    };

    Router::new()
        .nest("/mrp", handlers::mrp::mrp_routes().with_state(state.clone()))
        .nest(
            "/scheduling/api",
            handlers::scheduling::scheduling_routes().with_state(state),
        )
        .nest("/health", health::health_routes(health_state))
        .route("/api-docs/openapi.json", get(openapi::openapi_json))
        .fallback(fallback_handler)
}

async fn fallback_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "not_found", "message": "no such route" })),
    )
}
