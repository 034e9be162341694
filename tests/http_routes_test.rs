mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{FakeCrm, FakeDocs, FakeWarehouse, integrations};
use portfolio_gateway::adapters::http::{AppState, router};
use portfolio_gateway::shared::config::AppConfig;
use portfolio_gateway::usecases::{EventHub, PortfolioService};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

fn app(cfg: &AppConfig, tasks_db: Option<&str>) -> axum::Router {
    let hub = EventHub::new(16);
    let service = PortfolioService::new(
        integrations(
            cfg,
            Arc::new(FakeCrm::default()),
            Arc::new(FakeDocs::default()),
            Arc::new(FakeWarehouse::default()),
        ),
        hub.clone(),
        tasks_db.map(str::to_string),
        "expansion".to_string(),
    );
    router(AppState {
        service: Arc::new(service),
        hub,
    })
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_integration_status_lists_missing_keys() {
    let cfg = AppConfig {
        hubspot_access_token: Some("pat-1".into()),
        ..Default::default()
    };
    let resp = app(&cfg, None)
        .oneshot(Request::get("/api/integrations/status").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_json(resp).await;
    assert_eq!(body["configured"]["hubspot"], true);
    assert_eq!(body["configured"]["stripe"], false);
    let missing = body["missing"].as_array().unwrap();
    assert!(missing.contains(&json!("STRIPE_SECRET_KEY")));
    assert!(!missing.contains(&json!("HUBSPOT_ACCESS_TOKEN")));
}

#[tokio::test]
async fn test_expansion_without_deals_has_null_summary() {
    let resp = app(&AppConfig::default(), None)
        .oneshot(Request::get("/api/expansion?limit=5").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["opportunities"], json!([]));
    assert!(body["summary"].is_null());
}

#[tokio::test]
async fn test_blank_account_search_is_empty() {
    let resp = app(&AppConfig::default(), None)
        .oneshot(Request::get("/api/accounts/search?q=%20%20").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["companies"], json!([]));
    assert_eq!(body["tasks"], json!([]));
}

#[tokio::test]
async fn test_create_task_without_database_is_unavailable() {
    let resp = app(&AppConfig::default(), None)
        .oneshot(post_json("/api/tasks", json!({ "name": "Follow up" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = body_json(resp).await;
    assert_eq!(body["provider"], "notion");
    assert!(body["error"].as_str().unwrap().contains("NOTION_TASKS_DATABASE_ID"));
}

#[tokio::test]
async fn test_create_task_returns_created() {
    let resp = app(&AppConfig::default(), Some("tasks-db"))
        .oneshot(post_json(
            "/api/tasks",
            json!({ "name": "Follow up", "priority": "Low" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["name"], "Follow up");
    assert_eq!(body["priority"], "Low");
}

#[tokio::test]
async fn test_roi_report_is_csv_download() {
    let resp = app(&AppConfig::default(), None)
        .oneshot(
            Request::get("/api/reports/roi/op_7")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()[header::CONTENT_TYPE],
        "text/csv; charset=utf-8"
    );
    assert_eq!(
        resp.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"roi-op_7.csv\""
    );
    let body = String::from_utf8(body_bytes(resp).await).unwrap();
    assert_eq!(body, "month,bookings,gross_volume\n2026-01-01,12,4800\n");
}

#[tokio::test]
async fn test_workflow_without_webhook_is_unavailable() {
    let resp = app(&AppConfig::default(), None)
        .oneshot(post_json(
            "/api/workflows",
            json!({
                "action": "flag_churn_risk",
                "payload": { "operator_id": "op_1", "reason": "usage down 40%" }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(resp).await["provider"], "n8n");
}

#[tokio::test]
async fn test_unknown_workflow_action_is_rejected() {
    let resp = app(&AppConfig::default(), None)
        .oneshot(post_json(
            "/api/workflows",
            json!({ "action": "delete_everything", "payload": {} }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_event_stream_headers() {
    let resp = app(&AppConfig::default(), None)
        .oneshot(Request::get("/events").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "text/event-stream");
}

#[tokio::test]
async fn test_path_escaping_customer_id_is_bad_request() {
    let resp = app(&AppConfig::default(), None)
        .oneshot(
            Request::get("/api/billing/customers/..%2Fbalance")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await["provider"], "stripe");
}
