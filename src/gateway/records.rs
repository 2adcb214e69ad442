use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One open sales-order line, normalized at the gateway boundary.
///
/// `net_qty` is `required_qty - shipped_qty`, clamped at zero; lines that net
/// to zero never leave the gateway. Downstream code never indexes ERP rows by
/// column name; these value types are the contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct SalesOrderLine {
    pub so_number: String,
    pub line_key: String,
    pub part_number: String,
    pub customer: String,
    pub business_unit: String,
    pub so_type: String,
    pub facility: String,
    pub due_ship: Option<NaiveDate>,
    pub unit_price: Decimal,
    pub required_qty: Decimal,
    pub shipped_qty: Decimal,
    pub net_qty: Decimal,
}

/// An open production job, used to tag sales orders as already covered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OpenJob {
    pub job_number: String,
    pub so_number: Option<String>,
    pub part_number: String,
    pub required_qty: Decimal,
    pub completed_qty: Decimal,
}

/// A single-level BOM row as read from the ERP: parent, component and the
/// nominal per-unit quantity before scrap uplift.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BomRow {
    pub parent_part: String,
    pub component_part: String,
    pub description: String,
    pub qty_per_unit: Decimal,
    pub scrap_percent: Decimal,
}
