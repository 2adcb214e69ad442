//! Read surface for the MRP views.
//!
//! Stateless: each handler validates its query parameters, asks the service
//! for the current (possibly cached) run, derives the requested view in
//! memory and serializes it. No handler writes anything.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use utoipa::IntoParams;

use crate::errors::ServiceError;
use crate::services::mrp::aggregate::{
    self, ComponentShortage, CustomerSummaryResponse, DashboardFilter, DashboardResponse,
    DueShipFilter, ShortageFilter, StatusBucket,
};
use crate::AppState;

pub fn mrp_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard))
        .route("/summary", get(customer_summary))
        .route("/buyer-view", get(buyer_view))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct DashboardQuery {
    /// Business unit filter.
    pub bu: Option<String>,
    pub customer: Option<String>,
    /// Finished-good part filter.
    pub fg: Option<String>,
    /// `MM/YYYY`, or `Blank` for undated orders.
    pub due_ship: Option<String>,
    /// One of `ready-to-ship`, `production-needed`, `action-required`, or
    /// empty for all.
    pub status: Option<String>,
}

impl DashboardQuery {
    fn into_filter(self) -> Result<DashboardFilter, ServiceError> {
        let due_ship = match non_empty(self.due_ship) {
            Some(raw) => Some(DueShipFilter::parse(&raw)?),
            None => None,
        };
        let status_bucket = match self.status {
            Some(raw) => StatusBucket::parse(raw.trim())?,
            None => None,
        };
        Ok(DashboardFilter {
            business_unit: non_empty(self.bu),
            customer: non_empty(self.customer),
            fg_part: non_empty(self.fg),
            due_ship,
            status_bucket,
        })
    }
}

/// Full dashboard snapshot with per-SO dispositions and summary counts.
#[utoipa::path(
    get,
    path = "/mrp",
    params(DashboardQuery),
    responses(
        (status = 200, description = "Dashboard snapshot", body = DashboardResponse),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 502, description = "ERP unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "mrp"
)]
pub async fn dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardResponse>, ServiceError> {
    let filter = query.into_filter()?;
    let run = state.mrp.current_run().await?;
    Ok(Json(aggregate::dashboard(&run, &filter)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct CustomerSummaryQuery {
    pub customer: Option<String>,
}

/// Per-customer rollup of On-Track / At-Risk / Critical orders.
///
/// Without a `customer` the counts are empty but the customer list still
/// comes back, which is what the picker needs on first load.
#[utoipa::path(
    get,
    path = "/mrp/summary",
    params(CustomerSummaryQuery),
    responses(
        (status = 200, description = "Customer summary", body = CustomerSummaryResponse),
        (status = 502, description = "ERP unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "mrp"
)]
pub async fn customer_summary(
    State(state): State<AppState>,
    Query(query): Query<CustomerSummaryQuery>,
) -> Result<Json<CustomerSummaryResponse>, ServiceError> {
    let run = state.mrp.current_run().await?;
    let customer = non_empty(query.customer).unwrap_or_default();
    Ok(Json(aggregate::customer_summary(&run, &customer)))
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct BuyerViewQuery {
    /// `all`, or an integer horizon in days from today (UTC).
    pub urgency_days: Option<String>,
    pub customer: Option<String>,
    /// Case-insensitive match against part number or description.
    pub q: Option<String>,
}

impl BuyerViewQuery {
    fn into_filter(self) -> Result<ShortageFilter, ServiceError> {
        let urgency_days = match non_empty(self.urgency_days) {
            None => None,
            Some(raw) if raw.eq_ignore_ascii_case("all") => None,
            Some(raw) => {
                let days: i64 = raw.parse().map_err(|_| {
                    ServiceError::ValidationError(format!(
                        "urgency_days must be 'all' or a number of days, got '{raw}'"
                    ))
                })?;
                if days < 0 {
                    return Err(ServiceError::ValidationError(
                        "urgency_days must not be negative".into(),
                    ));
                }
                Some(days)
            }
        };
        Ok(ShortageFilter {
            urgency_days,
            customer: non_empty(self.customer),
            query: non_empty(self.q),
        })
    }
}

/// Consolidated component shortage report for purchasing.
#[utoipa::path(
    get,
    path = "/mrp/buyer-view",
    params(BuyerViewQuery),
    responses(
        (status = 200, description = "Shortage report", body = [ComponentShortage]),
        (status = 400, description = "Invalid filter", body = crate::errors::ErrorResponse),
        (status = 502, description = "ERP unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "mrp"
)]
pub async fn buyer_view(
    State(state): State<AppState>,
    Query(query): Query<BuyerViewQuery>,
) -> Result<Json<Vec<ComponentShortage>>, ServiceError> {
    let filter = query.into_filter()?;
    let run = state.mrp.current_run().await?;
    let report = aggregate::shortage_report(
        &run,
        state.mrp.settings(),
        &filter,
        Utc::now().date_naive(),
    );
    Ok(Json(report))
}
