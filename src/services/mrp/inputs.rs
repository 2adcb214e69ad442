use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::config::EngineSettings;
use crate::errors::ServiceError;
use crate::gateway::{BomRow, OpenJob, SalesOrderLine};

/// One validated BOM component with its effective per-unit requirement,
/// scrap uplift already applied. Computed once at ingest.
#[derive(Debug, Clone, PartialEq)]
pub struct BomComponent {
    pub part: String,
    pub description: String,
    pub per_unit: Decimal,
}

/// The six ERP input sets for one run, normalized and integrity-checked.
/// Valid for exactly one engine invocation.
#[derive(Debug)]
pub struct MrpSnapshot {
    pub taken_at: DateTime<Utc>,
    pub sales_orders: Vec<SalesOrderLine>,
    pub approved: HashMap<String, Decimal>,
    pub qc_pending: HashMap<String, Decimal>,
    pub open_po: HashMap<String, Decimal>,
    /// Open jobs keyed by (so_number, part_number).
    pub jobs: HashMap<(String, String), Vec<OpenJob>>,
    /// Single-level BOM per parent part, in ERP sequence order.
    pub boms: HashMap<String, Vec<BomComponent>>,
}

impl MrpSnapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        taken_at: DateTime<Utc>,
        sales_orders: Vec<SalesOrderLine>,
        approved: HashMap<String, Decimal>,
        qc_pending: HashMap<String, Decimal>,
        open_po: HashMap<String, Decimal>,
        open_jobs: Vec<OpenJob>,
        bom_rows: Vec<BomRow>,
        settings: &EngineSettings,
    ) -> Result<Self, ServiceError> {
        let mut jobs: HashMap<(String, String), Vec<OpenJob>> = HashMap::new();
        for job in open_jobs {
            let Some(so_number) = job.so_number.clone() else {
                continue;
            };
            jobs.entry((so_number, job.part_number.clone()))
                .or_default()
                .push(job);
        }

        let mut boms: HashMap<String, Vec<BomComponent>> = HashMap::new();
        let mut seen: HashSet<(String, String)> = HashSet::new();
        for row in bom_rows {
            if row.component_part.is_empty() {
                return Err(ServiceError::DataIntegrityError(format!(
                    "BOM for {} references a component with no part number",
                    row.parent_part
                )));
            }
            if row.qty_per_unit <= Decimal::ZERO {
                return Err(ServiceError::DataIntegrityError(format!(
                    "BOM line {} -> {} has non-positive quantity per unit",
                    row.parent_part, row.component_part
                )));
            }
            if row.scrap_percent > settings.scrap_cap_percent {
                return Err(ServiceError::DataIntegrityError(format!(
                    "BOM line {} -> {} scrap {}% exceeds the {}% cap",
                    row.parent_part, row.component_part, row.scrap_percent,
                    settings.scrap_cap_percent
                )));
            }
            if !seen.insert((row.parent_part.clone(), row.component_part.clone())) {
                return Err(ServiceError::DataIntegrityError(format!(
                    "duplicate BOM line {} -> {}",
                    row.parent_part, row.component_part
                )));
            }

            let hundred = Decimal::ONE_HUNDRED;
            let per_unit = row.qty_per_unit * (Decimal::ONE + row.scrap_percent / hundred);
            boms.entry(row.parent_part).or_default().push(BomComponent {
                part: row.component_part,
                description: row.description,
                per_unit,
            });
        }

        Ok(Self {
            taken_at,
            sales_orders,
            approved,
            qc_pending,
            open_po,
            jobs,
            boms,
        })
    }
}
