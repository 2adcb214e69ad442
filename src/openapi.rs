use axum::Json;
use utoipa::OpenApi;

use crate::errors::ErrorResponse;
use crate::gateway::{OpenJob, SalesOrderLine};
use crate::handlers;
use crate::services::mrp::aggregate::{
    AffectedOrder, ComponentShortage, CustomerSummaryResponse, DashboardResponse, DashboardRow,
    GridRow, StatusSummary,
};
use crate::services::mrp::result::{ComponentDetail, PriorAllocation, SoStatus};
use crate::services::projections::{RiskType, UserProjection};

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::mrp::dashboard,
        handlers::mrp::customer_summary,
        handlers::mrp::buyer_view,
        handlers::scheduling::update_projection,
        handlers::scheduling::grid,
    ),
    components(schemas(
        DashboardResponse,
        DashboardRow,
        StatusSummary,
        CustomerSummaryResponse,
        ComponentShortage,
        AffectedOrder,
        ComponentDetail,
        PriorAllocation,
        SoStatus,
        GridRow,
        OpenJob,
        SalesOrderLine,
        UserProjection,
        RiskType,
        ErrorResponse,
    )),
    tags(
        (name = "mrp", description = "MRP dashboard, customer summary and purchasing views"),
        (name = "scheduling", description = "Scheduling projections")
    ),
    info(
        title = "Production Portal MRP API",
        description = "Material requirements planning over the ERP read replica"
    )
)]
pub struct ApiDoc;

pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
