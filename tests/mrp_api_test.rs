mod common;

use std::sync::atomic::Ordering;
use std::time::Duration;

use axum::http::StatusCode;
use rust_decimal_macros::dec;
use serde_json::json;

use common::{bom_row, qty, so_line, FixtureGateway, TestApp};
use production_portal_api::gateway::OpenJob;

/// Two orders for the same finished good: the earlier one ships clean, the
/// later one part-ships and produces the rest from component C.
fn partial_ship_fixture() -> FixtureGateway {
    let mut fx = FixtureGateway::default();
    fx.sales_orders.push(so_line("SO2", "P", "ACME", dec!(20), Some("2025-02-01")));
    fx.sales_orders.push(so_line("SO1", "P", "ACME", dec!(20), Some("2025-01-10")));
    fx.approved.insert("P".into(), dec!(30));
    fx.approved.insert("C".into(), dec!(10));
    fx.bom_rows.push(bom_row("P", "C", dec!(1), dec!(0)));
    fx
}

#[tokio::test]
async fn dashboard_orders_come_back_in_priority_order() {
    let app = TestApp::new(partial_ship_fixture()).await;

    let (status, body) = app.get("/mrp").await;
    assert_eq!(status, StatusCode::OK);

    let orders = body["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["so_number"], "SO1");
    assert_eq!(orders[0]["status"], "ready-to-ship");
    assert_eq!(qty(&orders[0]["shippable"]), dec!(20));

    assert_eq!(orders[1]["so_number"], "SO2");
    assert_eq!(orders[1]["status"], "partial-ship");
    assert_eq!(qty(&orders[1]["shippable"]), dec!(10));
    assert_eq!(qty(&orders[1]["producible"]), dec!(10));
    assert_eq!(qty(&orders[1]["total_deliverable"]), dec!(20));
    assert_eq!(orders[1]["bottleneck_components"], json!(["C"]));

    let summary = &body["summary"];
    assert_eq!(summary["total"], 2);
    assert_eq!(summary["ready_to_ship"], 1);
    assert_eq!(summary["partial_ship"], 1);
}

#[tokio::test]
async fn dashboard_status_bucket_and_due_ship_filters_apply() {
    let app = TestApp::new(partial_ship_fixture()).await;

    let (status, body) = app.get("/mrp?status=ready-to-ship").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);
    assert_eq!(body["orders"][0]["so_number"], "SO1");

    let (status, body) = app.get("/mrp?due_ship=02/2025").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orders"].as_array().unwrap().len(), 1);
    assert_eq!(body["orders"][0]["so_number"], "SO2");

    // production-needed unions the partial-ship status.
    let (status, body) = app.get("/mrp?status=production-needed").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orders"][0]["so_number"], "SO2");
}

#[tokio::test]
async fn unknown_status_bucket_is_rejected_with_the_error_envelope() {
    let app = TestApp::new(partial_ship_fixture()).await;

    let (status, body) = app.get("/mrp?status=everything").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
    assert!(body["request_id"].as_str().is_some());
    assert!(body["message"].as_str().unwrap().contains("everything"));
}

#[tokio::test]
async fn malformed_due_ship_is_rejected() {
    let app = TestApp::new(partial_ship_fixture()).await;
    let (status, body) = app.get("/mrp?due_ship=2025-01").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn pending_qc_orders_land_in_the_action_required_bucket() {
    let mut fx = FixtureGateway::default();
    fx.sales_orders.push(so_line("SO1", "P", "ACME", dec!(5), Some("2025-01-10")));
    fx.qc_pending.insert("P".into(), dec!(5));
    let app = TestApp::new(fx).await;

    let (status, body) = app.get("/mrp?status=action-required").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orders"][0]["status"], "pending-qc");
    assert_eq!(body["summary"]["pending_qc"], 1);
}

#[tokio::test]
async fn job_created_orders_skip_component_allocation() {
    let mut fx = FixtureGateway::default();
    fx.sales_orders.push(so_line("SO1", "P", "ACME", dec!(50), Some("2025-01-10")));
    fx.approved.insert("P".into(), dec!(20));
    fx.open_jobs.push(OpenJob {
        job_number: "J1".into(),
        so_number: Some("SO1".into()),
        part_number: "P".into(),
        required_qty: dec!(50),
        completed_qty: dec!(10),
    });
    let app = TestApp::new(fx).await;

    let (status, body) = app.get("/mrp").await;
    assert_eq!(status, StatusCode::OK);
    let order = &body["orders"][0];
    assert_eq!(order["status"], "job-created");
    assert_eq!(order["job_created"], true);
    assert_eq!(qty(&order["shippable"]), dec!(20));
    assert_eq!(order["jobs"][0]["job_number"], "J1");
    assert_eq!(order["components"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn customer_summary_counts_and_picker_list() {
    let mut fx = partial_ship_fixture();
    fx.sales_orders.push(so_line("SO3", "Q", "GLOBEX", dec!(5), Some("2025-01-15")));
    let app = TestApp::new(fx).await;

    let (status, body) = app.get("/mrp/summary?customer=ACME").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["customer"], "ACME");
    assert_eq!(body["total"], 2);
    assert_eq!(body["on_track"], 1);
    assert_eq!(body["at_risk"], 1);
    assert_eq!(body["critical"], 0);
    assert_eq!(body["customers"], json!(["ACME", "GLOBEX"]));

    // No selection: empty counts, but the picker list still comes back.
    let (status, body) = app.get("/mrp/summary").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["customers"], json!(["ACME", "GLOBEX"]));
}

#[tokio::test]
async fn buyer_view_consolidates_shortages_across_orders() {
    let mut fx = FixtureGateway::default();
    fx.sales_orders.push(so_line("SO1", "P", "ACME", dec!(10), Some("2025-01-10")));
    fx.sales_orders.push(so_line("SO2", "P", "GLOBEX", dec!(10), Some("2025-01-05")));
    fx.bom_rows.push(bom_row("P", "C", dec!(1), dec!(0)));
    fx.open_po.insert("C".into(), dec!(3));
    let app = TestApp::new(fx).await;

    let (status, body) = app.get("/mrp/buyer-view").await;
    assert_eq!(status, StatusCode::OK);
    let rows = body.as_array().unwrap();
    assert_eq!(rows.len(), 1);
    let row = &rows[0];
    assert_eq!(row["component_part"], "C");
    assert_eq!(qty(&row["open_po_qty"]), dec!(3));
    // SO2 (due first) consumes the 3 on PO and is short 7; SO1 is short 10.
    assert_eq!(qty(&row["total_shortfall"]), dec!(17));
    assert_eq!(row["affected"].as_array().unwrap().len(), 2);
    assert_eq!(row["earliest_due_ship"], "2025-01-05");

    let (status, body) = app.get("/mrp/buyer-view?customer=ACME").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(qty(&body[0]["total_shortfall"]), dec!(10));

    let (status, body) = app.get("/mrp/buyer-view?q=bracket").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn buyer_view_urgency_must_be_all_or_days() {
    let app = TestApp::new(partial_ship_fixture()).await;

    let (status, _) = app.get("/mrp/buyer-view?urgency_days=all").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/mrp/buyer-view?urgency_days=soon").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn fresh_requests_share_one_cached_run() {
    let app = TestApp::new(partial_ship_fixture()).await;

    for _ in 0..3 {
        let (status, _) = app.get("/mrp").await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = app.get("/mrp/buyer-view").await;
    assert_eq!(status, StatusCode::OK);

    assert_eq!(app.gateway.snapshot_reads.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn zero_ttl_forces_a_snapshot_per_request() {
    let app = TestApp::with_cache_ttl(partial_ship_fixture(), Duration::ZERO).await;

    let _ = app.get("/mrp").await;
    let _ = app.get("/mrp").await;
    assert_eq!(app.gateway.snapshot_reads.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn upstream_outage_aborts_the_run_with_no_partial_view() {
    let app = TestApp::new(partial_ship_fixture()).await;
    app.gateway.fail.store(true, Ordering::SeqCst);

    let (status, body) = app.get("/mrp").await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "upstream_unavailable");

    // Recovery: the failed refresh cached nothing, the next call recomputes.
    app.gateway.fail.store(false, Ordering::SeqCst);
    let (status, body) = app.get("/mrp").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["orders"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn duplicate_bom_lines_surface_as_422() {
    let mut fx = partial_ship_fixture();
    fx.bom_rows.push(bom_row("P", "C", dec!(2), dec!(0)));
    let app = TestApp::new(fx).await;

    let (status, body) = app.get("/mrp").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "data_integrity_error");
}

#[tokio::test]
async fn health_and_openapi_endpoints_respond() {
    let app = TestApp::new(FixtureGateway::default()).await;

    let (status, body) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");

    let (status, _) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get("/api-docs/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/mrp"].is_object());
}

#[tokio::test]
async fn readiness_reports_downstream_outage() {
    let app = TestApp::new(FixtureGateway::default()).await;
    app.gateway.fail.store(true, Ordering::SeqCst);

    let (status, body) = app.get("/health/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"]["erp_gateway"], "down");
}
