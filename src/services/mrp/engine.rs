use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use metrics::histogram;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::inputs::{BomComponent, MrpSnapshot};
use super::live_inventory::{LiveInventory, PoolPreference};
use super::result::{ComponentDetail, PriorAllocation, SoResult, SoStatus};
use crate::config::EngineSettings;
use crate::errors::ServiceError;
use crate::gateway::SalesOrderLine;
use crate::services::projections::{RiskType, UserProjection};

/// Output of one complete engine invocation. The initial pool totals ride
/// along so the aggregator can publish on-hand columns without re-querying
/// the gateway.
#[derive(Debug, Clone)]
pub struct MrpRun {
    pub started_at: DateTime<Utc>,
    pub results: Vec<SoResult>,
    pub initial_approved: HashMap<String, Decimal>,
    pub initial_open_po: HashMap<String, Decimal>,
}

/// The deterministic sequential allocator.
///
/// Consumes open SOs in priority order against one shared [`LiveInventory`];
/// allocation effects of earlier SOs are visible to later ones, never the
/// reverse. Recreated per run; no state survives.
pub struct AllocationEngine {
    snapshot: MrpSnapshot,
    projections: HashMap<(String, String), (Decimal, Decimal)>,
    settings: EngineSettings,
}

impl AllocationEngine {
    pub fn new(
        snapshot: MrpSnapshot,
        projections: Vec<UserProjection>,
        settings: EngineSettings,
    ) -> Self {
        let mut joined: HashMap<(String, String), (Decimal, Decimal)> = HashMap::new();
        for p in projections {
            let slot = joined
                .entry((p.so_number.clone(), p.part_number.clone()))
                .or_default();
            match p.risk_type {
                RiskType::NoLowRisk => slot.0 = p.quantity,
                RiskType::HighRisk => slot.1 = p.quantity,
            }
        }
        Self {
            snapshot,
            projections: joined,
            settings,
        }
    }

    /// Runs the full allocation. Sort order: due-to-ship ascending with
    /// missing dates last, then SO number, then line key, which makes the
    /// comparator total.
    pub fn run(mut self) -> Result<MrpRun, ServiceError> {
        let started = std::time::Instant::now();

        let mut orders = std::mem::take(&mut self.snapshot.sales_orders);
        orders.sort_by(|a, b| {
            let ka = (
                a.due_ship.unwrap_or(NaiveDate::MAX),
                a.so_number.as_str(),
                a.line_key.as_str(),
            );
            let kb = (
                b.due_ship.unwrap_or(NaiveDate::MAX),
                b.so_number.as_str(),
                b.line_key.as_str(),
            );
            ka.cmp(&kb)
        });

        let mut live = LiveInventory::new(
            &self.snapshot.approved,
            &self.snapshot.qc_pending,
            &self.snapshot.open_po,
        );

        let mut results = Vec::with_capacity(orders.len());
        for so in orders {
            results.push(self.process(so, &mut live));
        }

        live.verify_conservation(self.settings.qty_tolerance)
            .map_err(ServiceError::InvariantViolation)?;

        histogram!("mrp_run_duration_seconds").record(started.elapsed().as_secs_f64());
        info!(orders = results.len(), "MRP allocation run complete");

        Ok(MrpRun {
            started_at: self.snapshot.taken_at,
            results,
            initial_approved: self.snapshot.approved.clone(),
            initial_open_po: self.snapshot.open_po.clone(),
        })
    }

    fn process(&self, so: SalesOrderLine, live: &mut LiveInventory) -> SoResult {
        let tol = self.settings.qty_tolerance;
        let net = so.net_qty;

        // Finished-good pass: approved stock only.
        let fg_draw = live.consume(&so.part_number, net, PoolPreference::ApprovedOnly);
        let shippable = fg_draw.total();
        if shippable > Decimal::ZERO {
            live.record_allocation(&so.part_number, &so.so_number, fg_draw);
        }

        let jobs = self
            .snapshot
            .jobs
            .get(&(so.so_number.clone(), so.part_number.clone()))
            .cloned()
            .unwrap_or_default();
        let job_created = !jobs.is_empty();

        let base = |so: SalesOrderLine, status: SoStatus, producible: Decimal| {
            let (no_low, high) = self
                .projections
                .get(&(so.so_number.clone(), so.part_number.clone()))
                .copied()
                .unwrap_or_default();
            SoResult {
                status,
                job_created,
                jobs: jobs.clone(),
                shippable_from_stock: shippable,
                producible_qty: producible,
                total_deliverable: shippable + producible,
                bottleneck_components: Vec::new(),
                components: Vec::new(),
                no_low_risk_qty: no_low,
                high_risk_qty: high,
                so,
            }
        };

        if net - shippable <= tol {
            return base(so, SoStatus::ReadyToShip, Decimal::ZERO);
        }

        // An open job for this SO and part is assumed to cover the
        // remainder; the component pools stay untouched. Any approved stock
        // drawn above is still reported as shippable on hand.
        if job_created {
            debug!(so = %so.so_number, part = %so.part_number, "job already covers remainder");
            return base(so, SoStatus::JobCreated, Decimal::ZERO);
        }

        // Nothing shippable, but on-hand plus QC-held covers the order:
        // blocked on inspection, not on material. Probe only, no draw.
        if shippable <= tol
            && live.available(&so.part_number, PoolPreference::ApprovedAndQc) + tol >= net
        {
            return base(so, SoStatus::PendingQc, Decimal::ZERO);
        }

        let remaining = net - shippable;
        let (producible, bottlenecks, components) = self.component_passes(&so, remaining, live);

        let status = if producible + tol >= remaining {
            if shippable > tol {
                SoStatus::PartialShip
            } else {
                SoStatus::FullProductionReady
            }
        } else if producible > tol {
            SoStatus::PartialProductionReady
        } else {
            SoStatus::CriticalShortage
        };

        let mut result = base(so, status, producible);
        result.bottleneck_components = bottlenecks;
        result.components = components;
        result
    }

    /// Two-pass producibility on the single-level BOM of the SO's part.
    ///
    /// Pass A discovers the constraining component without touching state;
    /// pass B consumes exactly what the constrained build needs and records
    /// the allocations. A missing or empty BOM produces nothing.
    fn component_passes(
        &self,
        so: &SalesOrderLine,
        remaining: Decimal,
        live: &mut LiveInventory,
    ) -> (Decimal, Vec<String>, Vec<ComponentDetail>) {
        let tol = self.settings.qty_tolerance;
        let Some(bom) = self.snapshot.boms.get(&so.part_number).filter(|b| !b.is_empty()) else {
            debug!(so = %so.so_number, part = %so.part_number, "no BOM found");
            return (Decimal::ZERO, Vec::new(), Vec::new());
        };

        // Pass A: discovery, non-destructive.
        let calcs: Vec<(&BomComponent, Decimal, Decimal)> = bom
            .iter()
            .map(|c| {
                let avail = live.available(&c.part, PoolPreference::AllPools);
                let max_units = (avail / c.per_unit).trunc_with_scale(2);
                (c, avail, max_units)
            })
            .collect();

        let constrained = calcs
            .iter()
            .map(|(_, _, max_units)| *max_units)
            .min()
            .unwrap_or(Decimal::ZERO);
        let producible = constrained.min(remaining);

        // Pass B: allocation, destructive.
        let mut bottlenecks = Vec::new();
        let mut details = Vec::with_capacity(calcs.len());
        for (component, avail, max_units) in calcs {
            let draw = live.consume(
                &component.part,
                producible * component.per_unit,
                PoolPreference::AllPools,
            );
            live.record_allocation(&component.part, &so.so_number, draw);

            let required = remaining * component.per_unit;
            let prior_allocations = live
                .prior_allocations(&component.part, &so.so_number)
                .into_iter()
                .map(|(so_number, qty)| PriorAllocation { so_number, qty })
                .collect();

            details.push(ComponentDetail {
                component: component.part.clone(),
                description: component.description.clone(),
                required,
                approved_consumed: draw.approved,
                qc_consumed: draw.qc,
                po_consumed: draw.po,
                shortfall: (required - avail).max(Decimal::ZERO),
                prior_allocations,
            });

            if max_units <= producible + tol {
                bottlenecks.push(component.part.clone());
            }
        }

        (producible, bottlenecks, details)
    }
}
