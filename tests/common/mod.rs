use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use production_portal_api::{
    app_router,
    config::AppConfig,
    db,
    errors::ServiceError,
    events::{self, EventSender},
    gateway::{BomRow, ErpReadGateway, OpenJob, SalesOrderLine},
    services::mrp::MrpService,
    services::projections::ProjectionStore,
    AppState,
};

static DB_SEQ: AtomicUsize = AtomicUsize::new(0);

/// In-memory stand-in for the ERP read gateway. Snapshot data is fixed at
/// construction; `fail` flips every read into an upstream outage.
#[derive(Default)]
pub struct FixtureGateway {
    pub sales_orders: Vec<SalesOrderLine>,
    pub approved: HashMap<String, Decimal>,
    pub qc_pending: HashMap<String, Decimal>,
    pub open_po: HashMap<String, Decimal>,
    pub open_jobs: Vec<OpenJob>,
    pub bom_rows: Vec<BomRow>,
    pub fail: AtomicBool,
    pub snapshot_reads: AtomicUsize,
}

impl FixtureGateway {
    fn check_up(&self) -> Result<(), ServiceError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(ServiceError::UpstreamUnavailable("fixture offline".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ErpReadGateway for FixtureGateway {
    async fn open_sales_orders(&self) -> Result<Vec<SalesOrderLine>, ServiceError> {
        self.check_up()?;
        self.snapshot_reads.fetch_add(1, Ordering::SeqCst);
        Ok(self.sales_orders.clone())
    }

    async fn inventory_approved(&self) -> Result<HashMap<String, Decimal>, ServiceError> {
        self.check_up()?;
        Ok(self.approved.clone())
    }

    async fn inventory_qc_pending(&self) -> Result<HashMap<String, Decimal>, ServiceError> {
        self.check_up()?;
        Ok(self.qc_pending.clone())
    }

    async fn open_po_quantities(&self) -> Result<HashMap<String, Decimal>, ServiceError> {
        self.check_up()?;
        Ok(self.open_po.clone())
    }

    async fn open_jobs(&self) -> Result<Vec<OpenJob>, ServiceError> {
        self.check_up()?;
        Ok(self.open_jobs.clone())
    }

    async fn bom_rows(&self) -> Result<Vec<BomRow>, ServiceError> {
        self.check_up()?;
        Ok(self.bom_rows.clone())
    }

    async fn ping(&self) -> Result<(), ServiceError> {
        self.check_up()
    }
}

/// Test application over an in-memory SQLite projection store and a fixture
/// gateway.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub gateway: Arc<FixtureGateway>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new(gateway: FixtureGateway) -> Self {
        Self::with_cache_ttl(gateway, Duration::from_secs(60)).await
    }

    pub async fn with_cache_ttl(gateway: FixtureGateway, cache_ttl: Duration) -> Self {
        // A named shared-cache memory database: every pooled connection sees
        // the same schema, each TestApp gets its own.
        let url = format!(
            "sqlite:file:portal_test_{}?mode=memory&cache=shared",
            DB_SEQ.fetch_add(1, Ordering::SeqCst)
        );
        let local_db = Arc::new(db::connect_local(&url).await.expect("test database"));

        let projections = Arc::new(ProjectionStore::new(local_db.clone()));
        projections.ensure_schema().await.expect("schema");

        let gateway = Arc::new(gateway);
        let erp: Arc<dyn ErpReadGateway> = gateway.clone();

        let cfg = AppConfig {
            local_database_url: url.clone(),
            erp_database_url: url,
            host: "127.0.0.1".into(),
            port: 0,
            log_level: "info".into(),
            cache_ttl_secs: cache_ttl.as_secs().max(1),
            request_deadline_secs: 30,
            upstream_call_timeout_secs: 10,
            qty_tolerance: Decimal::new(1, 2),
            scrap_cap_percent: Decimal::new(100, 0),
            shortage_exclude_prefixes: vec!["W".into()],
        };

        let mrp = Arc::new(MrpService::new(
            erp.clone(),
            projections.clone(),
            cache_ttl,
            cfg.engine_settings(),
        ));

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let state = AppState {
            db: local_db,
            erp,
            config: cfg,
            event_sender: EventSender::new(event_tx),
            mrp,
            projections,
        };

        Self {
            router: app_router(state.clone()),
            state,
            gateway,
            _event_task: event_task,
        }
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.request(Method::GET, uri, None).await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.request(Method::POST, uri, Some(body)).await
    }

    async fn request(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(json) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .header("x-portal-user", "tester")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }
}

/// Parses a JSON quantity (rust_decimal serializes as a string).
pub fn qty(value: &Value) -> Decimal {
    match value {
        Value::String(s) => s.parse().expect("decimal string"),
        Value::Number(n) => n.to_string().parse().expect("decimal number"),
        other => panic!("not a quantity: {other:?}"),
    }
}

pub fn so_line(so: &str, part: &str, customer: &str, net: Decimal, due: Option<&str>) -> SalesOrderLine {
    SalesOrderLine {
        so_number: so.to_string(),
        line_key: format!("{so}-1"),
        part_number: part.to_string(),
        customer: customer.to_string(),
        business_unit: "WEST".to_string(),
        so_type: "s".to_string(),
        facility: "DUARTE".to_string(),
        due_ship: due.map(|d| d.parse().unwrap()),
        unit_price: Decimal::new(10, 0),
        required_qty: net,
        shipped_qty: Decimal::ZERO,
        net_qty: net,
    }
}

pub fn bom_row(parent: &str, component: &str, qty_per_unit: Decimal, scrap: Decimal) -> BomRow {
    BomRow {
        parent_part: parent.to_string(),
        component_part: component.to_string(),
        description: format!("{component} component"),
        qty_per_unit,
        scrap_percent: scrap,
    }
}
