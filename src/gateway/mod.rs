//! Read-side boundary to the ERP.
//!
//! Six snapshot reads, each self-consistent and normalized into the value
//! types in [`records`]. A failed or timed-out read surfaces as
//! `UpstreamUnavailable` and aborts the caller's run; partial snapshots are
//! never returned.

pub mod records;
pub mod sql;

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::ServiceError;
pub use records::{BomRow, OpenJob, SalesOrderLine};
pub use sql::SqlErpGateway;

#[async_trait]
pub trait ErpReadGateway: Send + Sync {
    /// Open SO lines where shipped < required, with unit price (zero if
    /// unknown).
    async fn open_sales_orders(&self) -> Result<Vec<SalesOrderLine>, ServiceError>;

    /// Approved on-hand quantity per part: unrestricted, unallocated, not
    /// issued to a job.
    async fn inventory_approved(&self) -> Result<HashMap<String, Decimal>, ServiceError>;

    /// Received-but-ungated quantity per part, awaiting quality inspection.
    async fn inventory_qc_pending(&self) -> Result<HashMap<String, Decimal>, ServiceError>;

    /// Sum of open purchase-order quantities per part.
    async fn open_po_quantities(&self) -> Result<HashMap<String, Decimal>, ServiceError>;

    /// Open production jobs with their SO linkage.
    async fn open_jobs(&self) -> Result<Vec<OpenJob>, ServiceError>;

    /// Single-level BOM rows for every parent part, batched in one read.
    async fn bom_rows(&self) -> Result<Vec<BomRow>, ServiceError>;

    /// Cheap connectivity probe for the readiness endpoint.
    async fn ping(&self) -> Result<(), ServiceError>;
}
