//! The MRP engine and everything around one run: input snapshots, the live
//! inventory ledger, the sequential allocator, the derived views and the
//! process-wide run cache.

pub mod aggregate;
pub mod cache;
pub mod engine;
pub mod inputs;
pub mod live_inventory;
pub mod result;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::instrument;

use crate::config::EngineSettings;
use crate::errors::ServiceError;
use crate::gateway::ErpReadGateway;
use crate::services::projections::ProjectionStore;
use cache::MrpRunCache;
use engine::{AllocationEngine, MrpRun};
use inputs::MrpSnapshot;

/// Orchestrates MRP runs: snapshot the ERP, join projections, allocate, and
/// cache the result behind a single-flight gate.
pub struct MrpService {
    erp: Arc<dyn ErpReadGateway>,
    projections: Arc<ProjectionStore>,
    cache: MrpRunCache,
    settings: EngineSettings,
}

impl MrpService {
    pub fn new(
        erp: Arc<dyn ErpReadGateway>,
        projections: Arc<ProjectionStore>,
        cache_ttl: Duration,
        settings: EngineSettings,
    ) -> Self {
        Self {
            erp,
            projections,
            cache: MrpRunCache::new(cache_ttl),
            settings,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// The current run: cached if fresh, otherwise recomputed. Concurrent
    /// callers share one in-flight computation.
    #[instrument(skip(self))]
    pub async fn current_run(&self) -> Result<Arc<MrpRun>, ServiceError> {
        self.cache.get_or_refresh(|| self.compute_run()).await
    }

    async fn compute_run(&self) -> Result<MrpRun, ServiceError> {
        let snapshot = self.take_snapshot().await?;

        let so_numbers: Vec<String> = snapshot
            .sales_orders
            .iter()
            .map(|so| so.so_number.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let projections = self.projections.read_for_so_numbers(&so_numbers).await?;

        AllocationEngine::new(snapshot, projections, self.settings.clone()).run()
    }

    /// Pulls the six input sets in one pass. Any failed read aborts the
    /// snapshot; nothing partial escapes.
    async fn take_snapshot(&self) -> Result<MrpSnapshot, ServiceError> {
        let sales_orders = self.erp.open_sales_orders().await?;
        let approved = self.erp.inventory_approved().await?;
        let qc_pending = self.erp.inventory_qc_pending().await?;
        let open_po = self.erp.open_po_quantities().await?;
        let open_jobs = self.erp.open_jobs().await?;
        let bom_rows = self.erp.bom_rows().await?;

        MrpSnapshot::assemble(
            Utc::now(),
            sales_orders,
            approved,
            qc_pending,
            open_po,
            open_jobs,
            bom_rows,
            &self.settings,
        )
    }
}
