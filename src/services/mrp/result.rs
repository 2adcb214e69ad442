use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::gateway::{OpenJob, SalesOrderLine};

/// Disposition of one sales order after the allocation run.
///
/// Exactly one status applies; the tie-break precedence is the order of the
/// variants here, first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SoStatus {
    /// Net quantity fully covered by approved finished-goods stock.
    ReadyToShip,
    /// An open production job already exists for this SO and part.
    JobCreated,
    /// Part ships from stock now, the remainder is fully producible.
    PartialShip,
    /// Nothing ships yet, but on-hand plus QC-held stock covers the order.
    PendingQc,
    /// Nothing ships from stock; components cover the full net quantity.
    FullProductionReady,
    /// Components cover part of the needed production.
    PartialProductionReady,
    /// Nothing can be produced; a component (or the BOM itself) is missing.
    CriticalShortage,
}

/// Consumption recorded against one pool by one earlier SO, rendered as a
/// hover tooltip in the dashboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PriorAllocation {
    pub so_number: String,
    pub qty: Decimal,
}

/// Per-component outcome of the producibility passes for one SO.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ComponentDetail {
    pub component: String,
    pub description: String,
    /// Requirement for the production remainder, scrap included.
    pub required: Decimal,
    pub approved_consumed: Decimal,
    pub qc_consumed: Decimal,
    pub po_consumed: Decimal,
    /// How far availability fell short of the full production requirement.
    pub shortfall: Decimal,
    pub prior_allocations: Vec<PriorAllocation>,
}

/// The engine's emitted record for one sales-order line.
#[derive(Debug, Clone, PartialEq)]
pub struct SoResult {
    pub so: SalesOrderLine,
    pub status: SoStatus,
    pub job_created: bool,
    pub jobs: Vec<OpenJob>,
    pub shippable_from_stock: Decimal,
    pub producible_qty: Decimal,
    pub total_deliverable: Decimal,
    pub bottleneck_components: Vec<String>,
    pub components: Vec<ComponentDetail>,
    /// User projections joined for display; never part of allocation.
    pub no_low_risk_qty: Decimal,
    pub high_risk_qty: Decimal,
}
