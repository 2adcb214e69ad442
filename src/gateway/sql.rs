use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseConnection, FromQueryResult, Statement};
use tracing::instrument;

use super::records::{BomRow, OpenJob, SalesOrderLine};
use super::ErpReadGateway;
use crate::errors::ServiceError;

/// Quantities arrive from the ERP with mixed scales and occasional negative
/// adjustment rows; normalize once at the boundary.
fn non_neg(value: Option<Decimal>) -> Decimal {
    value.unwrap_or_default().max(Decimal::ZERO).round_dp(4)
}

#[derive(Debug, FromQueryResult)]
struct SoRow {
    so_number: String,
    line_id: i64,
    part_number: String,
    customer: Option<String>,
    business_unit: Option<String>,
    so_type: Option<String>,
    facility: Option<String>,
    due_ship: Option<NaiveDate>,
    unit_price: Option<Decimal>,
    required_qty: Option<Decimal>,
    shipped_qty: Option<Decimal>,
}

#[derive(Debug, FromQueryResult)]
struct PartQtyRow {
    part_number: String,
    quantity: Option<Decimal>,
}

#[derive(Debug, FromQueryResult)]
struct JobRow {
    job_number: String,
    so_number: Option<String>,
    part_number: String,
    required_qty: Option<Decimal>,
    completed_qty: Option<Decimal>,
}

#[derive(Debug, FromQueryResult)]
struct BomQueryRow {
    parent_part: String,
    component_part: String,
    description: Option<String>,
    qty_per_unit: Option<Decimal>,
    scrap_percent: Option<Decimal>,
}

/// ERP read gateway over the pooled replica connection.
///
/// Each snapshot read is one statement; a read that errors or exceeds the
/// per-call timeout aborts the whole snapshot.
pub struct SqlErpGateway {
    db: Arc<DatabaseConnection>,
    call_timeout: Duration,
}

impl SqlErpGateway {
    pub fn new(db: Arc<DatabaseConnection>, call_timeout: Duration) -> Self {
        Self { db, call_timeout }
    }

    fn statement(&self, sql: &str) -> Statement {
        Statement::from_string(self.db.get_database_backend(), sql.to_owned())
    }

    async fn timed<T, F>(&self, query: &'static str, fut: F) -> Result<T, ServiceError>
    where
        F: Future<Output = Result<T, sea_orm::DbErr>>,
    {
        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(self.call_timeout, fut).await;
        histogram!("erp_gateway_query_duration_seconds", "query" => query)
            .record(started.elapsed().as_secs_f64());

        match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => {
                counter!("erp_gateway_query_errors_total", "query" => query).increment(1);
                Err(ServiceError::upstream(err))
            }
            Err(_) => {
                counter!("erp_gateway_query_timeouts_total", "query" => query).increment(1);
                Err(ServiceError::UpstreamUnavailable(format!(
                    "{query} exceeded the {}s upstream call timeout",
                    self.call_timeout.as_secs()
                )))
            }
        }
    }
}

#[async_trait]
impl ErpReadGateway for SqlErpGateway {
    #[instrument(skip(self))]
    async fn open_sales_orders(&self) -> Result<Vec<SalesOrderLine>, ServiceError> {
        let stmt = self.statement(
            r#"
            SELECT
                CAST(t.to_ordnum AS VARCHAR(50)) AS so_number,
                o.or_id AS line_id,
                p.pr_codenum AS part_number,
                b.bi_name AS customer,
                p.pr_busunit AS business_unit,
                t.to_ordtype AS so_type,
                w.wa_name AS facility,
                t.to_wanted AS due_ship,
                o.or_price AS unit_price,
                o.or_quant AS required_qty,
                o.or_shipquant AS shipped_qty
            FROM dttord t
            INNER JOIN dtord o ON o.or_toid = t.to_id
            INNER JOIN dmprod p ON o.or_prid = p.pr_id
            LEFT JOIN dmbill b ON t.to_biid = b.bi_id
            LEFT JOIN dmware w ON o.or_waid = w.wa_id
            WHERE t.to_ordtype IN ('s', 'h', 'd', 'm', 'l')
              AND t.to_closed IS NULL
              AND COALESCE(o.or_shipquant, 0) < COALESCE(o.or_quant, 0)
            ORDER BY t.to_ordnum ASC, o.or_id ASC
            "#,
        );

        let rows = self
            .timed("open_sales_orders", SoRow::find_by_statement(stmt).all(self.db.as_ref()))
            .await?;

        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            let required = non_neg(row.required_qty);
            let shipped = non_neg(row.shipped_qty);
            let net = (required - shipped).max(Decimal::ZERO);
            if net.is_zero() {
                continue;
            }
            lines.push(SalesOrderLine {
                so_number: row.so_number.trim().to_string(),
                line_key: row.line_id.to_string(),
                part_number: row.part_number.trim().to_string(),
                customer: row.customer.unwrap_or_default().trim().to_string(),
                business_unit: row.business_unit.unwrap_or_default().trim().to_string(),
                so_type: row.so_type.unwrap_or_default(),
                facility: row.facility.unwrap_or_default().trim().to_string(),
                due_ship: row.due_ship,
                unit_price: non_neg(row.unit_price),
                required_qty: required,
                shipped_qty: shipped,
                net_qty: net,
            });
        }
        Ok(lines)
    }

    #[instrument(skip(self))]
    async fn inventory_approved(&self) -> Result<HashMap<String, Decimal>, ServiceError> {
        // Approved = on hand, past QC, and not quarantined, staged or issued
        // to a job. Issued-to-job balances are WIP and never enter a pool.
        let stmt = self.statement(
            r#"
            SELECT
                p.pr_codenum AS part_number,
                SUM(CASE
                        WHEN f.fi_type NOT IN ('quarantine', 'job', 'staging')
                         AND (f.fi_qc IS NULL OR f.fi_qc <> 'Pending')
                        THEN f.fi_balance ELSE 0
                    END) AS quantity
            FROM dtfifo f
            INNER JOIN dmprod p ON f.fi_prid = p.pr_id
            WHERE f.fi_balance > 0
            GROUP BY p.pr_codenum
            "#,
        );
        let rows = self
            .timed(
                "inventory_approved",
                PartQtyRow::find_by_statement(stmt).all(self.db.as_ref()),
            )
            .await?;
        Ok(collect_part_map(rows))
    }

    #[instrument(skip(self))]
    async fn inventory_qc_pending(&self) -> Result<HashMap<String, Decimal>, ServiceError> {
        let stmt = self.statement(
            r#"
            SELECT
                p.pr_codenum AS part_number,
                SUM(CASE WHEN f.fi_qc = 'Pending' THEN f.fi_balance ELSE 0 END) AS quantity
            FROM dtfifo f
            INNER JOIN dmprod p ON f.fi_prid = p.pr_id
            WHERE f.fi_balance > 0
            GROUP BY p.pr_codenum
            "#,
        );
        let rows = self
            .timed(
                "inventory_qc_pending",
                PartQtyRow::find_by_statement(stmt).all(self.db.as_ref()),
            )
            .await?;
        Ok(collect_part_map(rows))
    }

    #[instrument(skip(self))]
    async fn open_po_quantities(&self) -> Result<HashMap<String, Decimal>, ServiceError> {
        let stmt = self.statement(
            r#"
            SELECT
                pur.pu_ourcode AS part_number,
                SUM(COALESCE(pur.pu_quant, 0) - COALESCE(pur.pu_recman, 0)) AS quantity
            FROM dtpur pur
            INNER JOIN dttpur tp ON pur.pu_purnum = tp.tp_purnum
            WHERE (COALESCE(pur.pu_quant, 0) - COALESCE(pur.pu_recman, 0)) > 0
              AND tp.tp_ordtype = 'p'
              AND tp.tp_recevd IS NULL
            GROUP BY pur.pu_ourcode
            "#,
        );
        let rows = self
            .timed(
                "open_po_quantities",
                PartQtyRow::find_by_statement(stmt).all(self.db.as_ref()),
            )
            .await?;
        Ok(collect_part_map(rows))
    }

    #[instrument(skip(self))]
    async fn open_jobs(&self) -> Result<Vec<OpenJob>, ServiceError> {
        let stmt = self.statement(
            r#"
            SELECT
                CAST(j.jo_jobnum AS VARCHAR(50)) AS job_number,
                CAST(lj.lj_ordnum AS VARCHAR(50)) AS so_number,
                p.pr_codenum AS part_number,
                lj.lj_quant AS required_qty,
                (SELECT SUM(COALESCE(j4.j4_quant, 0))
                   FROM dtjob4 j4 WHERE j4.j4_jobnum = j.jo_jobnum) AS completed_qty
            FROM dtjob j
            INNER JOIN dtljob lj ON lj.lj_jobnum = j.jo_jobnum
            INNER JOIN dmprod p ON lj.lj_prid = p.pr_id
            WHERE j.jo_closed IS NULL
              AND j.jo_type = 'a'
            ORDER BY j.jo_jobnum ASC
            "#,
        );
        let rows = self
            .timed("open_jobs", JobRow::find_by_statement(stmt).all(self.db.as_ref()))
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| OpenJob {
                job_number: row.job_number.trim().to_string(),
                so_number: row
                    .so_number
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty()),
                part_number: row.part_number.trim().to_string(),
                required_qty: non_neg(row.required_qty),
                completed_qty: non_neg(row.completed_qty),
            })
            .collect())
    }

    #[instrument(skip(self))]
    async fn bom_rows(&self) -> Result<Vec<BomRow>, ServiceError> {
        // Latest active revision per parent, single level.
        let stmt = self.statement(
            r#"
            WITH latest_revisions AS (
                SELECT bom.bo_bomfor AS parent_id, MAX(bom.bo_reid) AS revision_id
                FROM dmbom bom
                INNER JOIN dmprod parent ON bom.bo_bomfor = parent.pr_id
                WHERE parent.pr_active = 1
                GROUP BY bom.bo_bomfor
            )
            SELECT
                parent.pr_codenum AS parent_part,
                comp.pr_codenum AS component_part,
                comp.pr_descrip AS description,
                bom.bo_quant AS qty_per_unit,
                bom.bo_scrap AS scrap_percent
            FROM dmbom bom
            INNER JOIN dmprod comp ON bom.bo_prid = comp.pr_id
            INNER JOIN dmprod parent ON bom.bo_bomfor = parent.pr_id
            INNER JOIN latest_revisions lr
                    ON bom.bo_bomfor = lr.parent_id AND bom.bo_reid = lr.revision_id
            WHERE bom.bo_costonly IS NULL OR bom.bo_costonly = 0
            ORDER BY parent.pr_codenum ASC, bom.bo_seq ASC
            "#,
        );
        let rows = self
            .timed("bom_rows", BomQueryRow::find_by_statement(stmt).all(self.db.as_ref()))
            .await?;

        Ok(rows
            .into_iter()
            .map(|row| BomRow {
                parent_part: row.parent_part.trim().to_string(),
                component_part: row.component_part.trim().to_string(),
                description: row.description.unwrap_or_default().trim().to_string(),
                qty_per_unit: row.qty_per_unit.unwrap_or_default().round_dp(4),
                scrap_percent: non_neg(row.scrap_percent),
            })
            .collect())
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        self.timed("ping", self.db.ping()).await
    }
}

fn collect_part_map(rows: Vec<PartQtyRow>) -> HashMap<String, Decimal> {
    rows.into_iter()
        .map(|row| (row.part_number.trim().to_string(), non_neg(row.quantity)))
        .collect()
}
