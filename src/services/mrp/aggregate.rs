use std::collections::BTreeMap;

use chrono::{Datelike, Days, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::engine::MrpRun;
use super::result::{ComponentDetail, SoResult, SoStatus};
use crate::config::EngineSettings;
use crate::errors::ServiceError;
use crate::gateway::OpenJob;

/// Status buckets the dashboard filters on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum StatusBucket {
    ReadyToShip,
    ProductionNeeded,
    ActionRequired,
}

impl StatusBucket {
    pub fn parse(value: &str) -> Result<Option<Self>, ServiceError> {
        match value {
            "" => Ok(None),
            "ready-to-ship" => Ok(Some(StatusBucket::ReadyToShip)),
            "production-needed" => Ok(Some(StatusBucket::ProductionNeeded)),
            "action-required" => Ok(Some(StatusBucket::ActionRequired)),
            other => Err(ServiceError::ValidationError(format!(
                "unknown status bucket '{other}'"
            ))),
        }
    }

    fn matches(&self, status: SoStatus) -> bool {
        match self {
            StatusBucket::ReadyToShip => status == SoStatus::ReadyToShip,
            StatusBucket::ProductionNeeded => matches!(
                status,
                SoStatus::FullProductionReady
                    | SoStatus::PartialProductionReady
                    | SoStatus::PartialShip
                    | SoStatus::JobCreated
            ),
            StatusBucket::ActionRequired => {
                matches!(status, SoStatus::CriticalShortage | SoStatus::PendingQc)
            }
        }
    }
}

/// Due-to-ship filter: a month/year, or explicitly the undated orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueShipFilter {
    Month { month: u32, year: i32 },
    Blank,
}

impl DueShipFilter {
    /// Accepts `MM/YYYY` or the literal `Blank`.
    pub fn parse(value: &str) -> Result<Self, ServiceError> {
        if value.eq_ignore_ascii_case("blank") {
            return Ok(DueShipFilter::Blank);
        }
        let invalid =
            || ServiceError::ValidationError(format!("due_ship must be MM/YYYY or Blank, got '{value}'"));
        let (month_s, year_s) = value.split_once('/').ok_or_else(invalid)?;
        let month: u32 = month_s.parse().map_err(|_| invalid())?;
        let year: i32 = year_s.parse().map_err(|_| invalid())?;
        if !(1..=12).contains(&month) {
            return Err(invalid());
        }
        Ok(DueShipFilter::Month { month, year })
    }

    fn matches(&self, due: Option<NaiveDate>) -> bool {
        match (self, due) {
            (DueShipFilter::Blank, None) => true,
            (DueShipFilter::Month { month, year }, Some(d)) => {
                d.month() == *month && d.year() == *year
            }
            _ => false,
        }
    }
}

/// All dashboard filters, already validated.
#[derive(Debug, Clone, Default)]
pub struct DashboardFilter {
    pub business_unit: Option<String>,
    pub customer: Option<String>,
    pub fg_part: Option<String>,
    pub due_ship: Option<DueShipFilter>,
    pub status_bucket: Option<StatusBucket>,
}

impl DashboardFilter {
    fn matches(&self, result: &SoResult) -> bool {
        if let Some(bu) = &self.business_unit {
            if !result.so.business_unit.eq_ignore_ascii_case(bu) {
                return false;
            }
        }
        if let Some(customer) = &self.customer {
            if !result.so.customer.eq_ignore_ascii_case(customer) {
                return false;
            }
        }
        if let Some(fg) = &self.fg_part {
            if !result.so.part_number.eq_ignore_ascii_case(fg) {
                return false;
            }
        }
        if let Some(due) = &self.due_ship {
            if !due.matches(result.so.due_ship) {
                return false;
            }
        }
        if let Some(bucket) = &self.status_bucket {
            if !bucket.matches(result.status) {
                return false;
            }
        }
        true
    }
}

/// One dashboard row; quantities rounded to display precision.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardRow {
    pub so_number: String,
    pub line_key: String,
    pub customer: String,
    pub business_unit: String,
    pub facility: String,
    pub fg_part: String,
    pub due_ship: Option<NaiveDate>,
    pub required: Decimal,
    pub shippable: Decimal,
    pub producible: Decimal,
    pub total_deliverable: Decimal,
    pub status: SoStatus,
    pub bottleneck_components: Vec<String>,
    pub job_created: bool,
    pub jobs: Vec<OpenJob>,
    pub components: Vec<ComponentDetail>,
    pub no_low_risk_qty: Decimal,
    pub high_risk_qty: Decimal,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct StatusSummary {
    pub total: usize,
    pub ready_to_ship: usize,
    pub pending_qc: usize,
    pub job_created: usize,
    pub full_production: usize,
    pub partial_production: usize,
    pub partial_ship: usize,
    pub critical: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub orders: Vec<DashboardRow>,
    pub summary: StatusSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CustomerSummaryResponse {
    pub customer: String,
    pub total: usize,
    pub on_track: usize,
    pub at_risk: usize,
    pub critical: usize,
    pub orders: Vec<DashboardRow>,
    /// Distinct customers across the whole run, for the picker.
    pub customers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AffectedOrder {
    pub so_number: String,
    pub customer: String,
    pub shortfall: Decimal,
    pub due_ship: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ComponentShortage {
    pub component_part: String,
    pub description: String,
    pub on_hand_approved: Decimal,
    pub open_po_qty: Decimal,
    pub total_shortfall: Decimal,
    pub affected: Vec<AffectedOrder>,
    pub affected_customers: Vec<String>,
    pub earliest_due_ship: Option<NaiveDate>,
}

/// Read-only scheduling grid row: the open order joined with stored
/// projections and their priced extensions.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct GridRow {
    pub so_number: String,
    pub line_key: String,
    pub part_number: String,
    pub customer: String,
    pub due_ship: Option<NaiveDate>,
    pub net_qty: Decimal,
    pub unit_price: Decimal,
    pub no_low_risk_qty: Decimal,
    pub high_risk_qty: Decimal,
    pub no_low_risk_value: Decimal,
    pub high_risk_value: Decimal,
}

fn display(d: Decimal) -> Decimal {
    d.round_dp(2)
}

fn row_for(result: &SoResult) -> DashboardRow {
    DashboardRow {
        so_number: result.so.so_number.clone(),
        line_key: result.so.line_key.clone(),
        customer: result.so.customer.clone(),
        business_unit: result.so.business_unit.clone(),
        facility: result.so.facility.clone(),
        fg_part: result.so.part_number.clone(),
        due_ship: result.so.due_ship,
        required: display(result.so.net_qty),
        shippable: display(result.shippable_from_stock),
        producible: display(result.producible_qty),
        total_deliverable: display(result.total_deliverable),
        status: result.status,
        bottleneck_components: result.bottleneck_components.clone(),
        job_created: result.job_created,
        jobs: result.jobs.clone(),
        components: result
            .components
            .iter()
            .map(|c| ComponentDetail {
                component: c.component.clone(),
                description: c.description.clone(),
                required: display(c.required),
                approved_consumed: display(c.approved_consumed),
                qc_consumed: display(c.qc_consumed),
                po_consumed: display(c.po_consumed),
                shortfall: display(c.shortfall),
                prior_allocations: c.prior_allocations.clone(),
            })
            .collect(),
        no_low_risk_qty: display(result.no_low_risk_qty),
        high_risk_qty: display(result.high_risk_qty),
    }
}

fn summarize(rows: &[DashboardRow]) -> StatusSummary {
    let mut summary = StatusSummary {
        total: rows.len(),
        ..StatusSummary::default()
    };
    for row in rows {
        match row.status {
            SoStatus::ReadyToShip => summary.ready_to_ship += 1,
            SoStatus::PendingQc => summary.pending_qc += 1,
            SoStatus::JobCreated => summary.job_created += 1,
            SoStatus::FullProductionReady => summary.full_production += 1,
            SoStatus::PartialProductionReady => summary.partial_production += 1,
            SoStatus::PartialShip => summary.partial_ship += 1,
            SoStatus::CriticalShortage => summary.critical += 1,
        }
    }
    summary
}

/// Dashboard view: the run filtered down, with counts over the visible rows.
pub fn dashboard(run: &MrpRun, filter: &DashboardFilter) -> DashboardResponse {
    let orders: Vec<DashboardRow> = run
        .results
        .iter()
        .filter(|r| filter.matches(r))
        .map(row_for)
        .collect();
    let summary = summarize(&orders);
    DashboardResponse { orders, summary }
}

/// Distinct customer names across the run, sorted.
pub fn customer_names(run: &MrpRun) -> Vec<String> {
    let mut names: Vec<String> = run
        .results
        .iter()
        .map(|r| r.so.customer.clone())
        .filter(|c| !c.is_empty())
        .collect();
    names.sort();
    names.dedup();
    names
}

/// Per-customer rollup: On-Track, At-Risk and Critical counts.
pub fn customer_summary(run: &MrpRun, customer: &str) -> CustomerSummaryResponse {
    let orders: Vec<DashboardRow> = run
        .results
        .iter()
        .filter(|r| r.so.customer.eq_ignore_ascii_case(customer))
        .map(row_for)
        .collect();

    let mut on_track = 0;
    let mut at_risk = 0;
    let mut critical = 0;
    for row in &orders {
        match row.status {
            SoStatus::ReadyToShip | SoStatus::FullProductionReady | SoStatus::JobCreated => {
                on_track += 1
            }
            SoStatus::PartialShip | SoStatus::PartialProductionReady | SoStatus::PendingQc => {
                at_risk += 1
            }
            SoStatus::CriticalShortage => critical += 1,
        }
    }

    CustomerSummaryResponse {
        customer: customer.to_string(),
        total: orders.len(),
        on_track,
        at_risk,
        critical,
        orders,
        customers: customer_names(run),
    }
}

/// Filters applied to the purchasing shortage report.
#[derive(Debug, Clone, Default)]
pub struct ShortageFilter {
    /// Only shortages whose earliest due date falls within this many days of
    /// `today`; `None` keeps everything.
    pub urgency_days: Option<i64>,
    pub customer: Option<String>,
    /// Case-insensitive match against part number or description.
    pub query: Option<String>,
}

/// Consolidated purchasing shortage report.
///
/// Aggregates every per-SO component shortfall by component part, sorted by
/// earliest due date, then part. Operates purely on the engine's output.
pub fn shortage_report(
    run: &MrpRun,
    settings: &EngineSettings,
    filter: &ShortageFilter,
    today: NaiveDate,
) -> Vec<ComponentShortage> {
    let tol = settings.qty_tolerance;
    let mut by_part: BTreeMap<String, ComponentShortage> = BTreeMap::new();

    for result in &run.results {
        if let Some(customer) = &filter.customer {
            if !result.so.customer.eq_ignore_ascii_case(customer) {
                continue;
            }
        }
        for component in &result.components {
            if component.shortfall <= tol {
                continue;
            }
            if settings
                .shortage_exclude_prefixes
                .iter()
                .any(|p| component.component.starts_with(p.as_str()))
            {
                continue;
            }

            let entry = by_part
                .entry(component.component.clone())
                .or_insert_with(|| ComponentShortage {
                    component_part: component.component.clone(),
                    description: component.description.clone(),
                    on_hand_approved: display(
                        run.initial_approved
                            .get(&component.component)
                            .copied()
                            .unwrap_or_default(),
                    ),
                    open_po_qty: display(
                        run.initial_open_po
                            .get(&component.component)
                            .copied()
                            .unwrap_or_default(),
                    ),
                    total_shortfall: Decimal::ZERO,
                    affected: Vec::new(),
                    affected_customers: Vec::new(),
                    earliest_due_ship: None,
                });

            entry.total_shortfall += display(component.shortfall);
            entry.affected.push(AffectedOrder {
                so_number: result.so.so_number.clone(),
                customer: result.so.customer.clone(),
                shortfall: display(component.shortfall),
                due_ship: result.so.due_ship,
            });
            if let Some(due) = result.so.due_ship {
                entry.earliest_due_ship = Some(match entry.earliest_due_ship {
                    Some(existing) => existing.min(due),
                    None => due,
                });
            }
        }
    }

    let mut shortages: Vec<ComponentShortage> = by_part
        .into_values()
        .map(|mut s| {
            let mut customers: Vec<String> = s
                .affected
                .iter()
                .map(|a| a.customer.clone())
                .filter(|c| !c.is_empty())
                .collect();
            customers.sort();
            customers.dedup();
            s.affected_customers = customers;
            s
        })
        .collect();

    if let Some(q) = filter.query.as_deref().filter(|q| !q.is_empty()) {
        let needle = q.to_ascii_lowercase();
        shortages.retain(|s| {
            s.component_part.to_ascii_lowercase().contains(&needle)
                || s.description.to_ascii_lowercase().contains(&needle)
        });
    }
    if let Some(days) = filter.urgency_days {
        let horizon = today
            .checked_add_days(Days::new(days.max(0) as u64))
            .unwrap_or(NaiveDate::MAX);
        shortages.retain(|s| s.earliest_due_ship.is_some_and(|d| d <= horizon));
    }

    shortages.sort_by(|a, b| {
        let ka = (a.earliest_due_ship.unwrap_or(NaiveDate::MAX), &a.component_part);
        let kb = (b.earliest_due_ship.unwrap_or(NaiveDate::MAX), &b.component_part);
        ka.cmp(&kb)
    });
    shortages
}

/// Scheduling grid rows, derived from the cached run.
pub fn scheduling_grid(run: &MrpRun) -> Vec<GridRow> {
    run.results
        .iter()
        .map(|r| GridRow {
            so_number: r.so.so_number.clone(),
            line_key: r.so.line_key.clone(),
            part_number: r.so.part_number.clone(),
            customer: r.so.customer.clone(),
            due_ship: r.so.due_ship,
            net_qty: display(r.so.net_qty),
            unit_price: display(r.so.unit_price),
            no_low_risk_qty: display(r.no_low_risk_qty),
            high_risk_qty: display(r.high_risk_qty),
            no_low_risk_value: display(r.no_low_risk_qty * r.so.unit_price),
            high_risk_value: display(r.high_risk_qty * r.so.unit_price),
        })
        .collect()
}
