use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use actix_web::{
    body::to_bytes,
    dev::ServiceResponse,
    http::{header, StatusCode},
    test, web, App,
};
use async_trait::async_trait;
use dotm_domain::clock::{Clock, ManualClock};
use dotm_domain::keys::{
    connection_key, node_key, service_key, MONITORING_CONFIG_KEY, NODES_LIST_KEY,
    REFRESH_CLOCK_FIELD,
};
use dotm_domain::services::telemetry::{init_telemetry, TelemetryConfig, TelemetryGuard};
use dotm_domain::storage::{KeyValueStore, ListRetention, MemoryStore};
use dotm_monitor::{MonitorRecords, MonitorSource, RefreshCoordinator, RefreshPolicy, SourceError};
use serde_json::{json, Value};

use crate::application::routes;
use crate::state::{AppState, SharedLock, SharedSource, SharedStore};

const START: i64 = 1_700_000_000;

#[derive(Default)]
struct StubSource {
    down: AtomicBool,
}

#[async_trait]
impl MonitorSource for StubSource {
    async fn fetch_nodes(&self) -> Result<MonitorRecords, SourceError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(SourceError::Request("connection refused".into()));
        }
        Ok(MonitorRecords::from([(
            "web1".to_string(),
            json!({"status": "UP", "plugin_output": "PING OK"}),
        )]))
    }

    async fn fetch_services(&self) -> Result<MonitorRecords, SourceError> {
        Ok(MonitorRecords::from([(
            "web1".to_string(),
            json!([{"service_description": "HTTP", "status": "OK"}]),
        )]))
    }
}

struct Harness {
    store: MemoryStore,
    clock: Arc<ManualClock>,
    source: Arc<StubSource>,
    state: AppState,
}

fn telemetry() -> TelemetryGuard {
    let config = TelemetryConfig::from_env("API_TEST");
    init_telemetry(&config).expect("telemetry inits")
}

fn harness() -> Harness {
    let clock = Arc::new(ManualClock::new(START));
    let store = MemoryStore::with_clock(clock.clone());
    let source = Arc::new(StubSource::default());

    let shared: SharedStore = Arc::new(store.clone());
    let lock: SharedLock = Arc::new(store.clone());
    let monitor: SharedSource = source.clone();
    let coordinator_clock: Arc<dyn Clock> = clock.clone();
    let coordinator = RefreshCoordinator::new(
        shared.clone(),
        lock,
        monitor,
        coordinator_clock,
        RefreshPolicy::new(std::time::Duration::from_secs(86_400)),
    );
    let state = AppState::new(shared, coordinator, telemetry());

    Harness {
        store,
        clock,
        source,
        state,
    }
}

async fn seed_topology(store: &MemoryStore) {
    for node in ["web1", "db1"] {
        store
            .list_push(NODES_LIST_KEY, node, ListRetention::default())
            .await
            .unwrap();
    }
    store.hash_set(&node_key("web1"), "status", "up").await.unwrap();
    store
        .hash_set(&service_key("web1", "nginx"), "port", "443")
        .await
        .unwrap();
    store
        .hash_set(&connection_key("web1", "443", "db1"), "count", "3")
        .await
        .unwrap();
    store
        .hash_set(&connection_key("web1", "8080", "127.0.0.1"), "count", "1")
        .await
        .unwrap();
}

macro_rules! app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state.clone()))
                .configure(routes),
        )
        .await
    };
}

async fn json_body(resp: ServiceResponse) -> Value {
    let body = to_bytes(resp.into_body()).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn text_body(resp: ServiceResponse) -> String {
    let body = to_bytes(resp.into_body()).await.unwrap();
    String::from_utf8(body.to_vec()).unwrap()
}

#[actix_web::test]
async fn lists_nodes_without_internal_connections() {
    let h = harness();
    seed_topology(&h.store).await;
    let app = app!(h.state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/nodes").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get(header::CACHE_CONTROL)
            .and_then(|v| v.to_str().ok()),
        Some("max-age=30, must-revalidate")
    );
    assert_eq!(
        json_body(resp).await,
        json!({
            "nodes": ["db1", "web1"],
            "connections": [{"source": "web1", "destination": "db1"}],
        })
    );
}

#[actix_web::test]
async fn node_detail_includes_local_connections_and_default_settings() {
    let h = harness();
    seed_topology(&h.store).await;
    let app = app!(h.state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/nodes/web1").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = json_body(resp).await;
    assert_eq!(body["name"], "web1");
    assert_eq!(body["status"], json!({"status": "up"}));
    assert_eq!(body["services"]["nginx"], json!({"port": "443"}));
    assert_eq!(body["connections"]["8080::127.0.0.1"]["remoteHost"], "127.0.0.1");
    assert_eq!(body["connections"]["443::db1"]["localPort"], "443");
    assert_eq!(body["monitoring"], Value::Null);
    assert_eq!(
        body["settings"],
        json!({"service_aging": "300", "connection_aging": "300"})
    );
}

#[actix_web::test]
async fn settings_catalog_is_served_in_order() {
    let h = harness();
    let app = app!(h.state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/settings").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = text_body(resp).await;
    let first = body.find("other_internal_networks").unwrap();
    let last = body.find("connection_hiding").unwrap();
    assert!(first < last);

    let parsed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(parsed["service_aging"]["type"], "single_value");
    assert_eq!(parsed["service_aging"]["values"], "300");
    assert_eq!(parsed["user_node_aliases"]["type"], "hash");
}

#[actix_web::test]
async fn reload_lifecycle_feeds_monitoring_routes() {
    let h = harness();
    let app = app!(h.state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/mon/nodes").to_request()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        json_body(resp).await,
        json!({"error": {"message": "Not Found", "status_code": 404}})
    );

    let reload = || test::TestRequest::post().uri("/mon/reload").to_request();
    let resp = test::call_service(&app, reload()).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        h.store
            .hash_get(MONITORING_CONFIG_KEY, REFRESH_CLOCK_FIELD)
            .await
            .unwrap()
            .as_deref(),
        Some("0")
    );

    let resp = test::call_service(&app, reload()).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({"last_updated": START}));

    h.clock.advance(10);
    let resp = test::call_service(&app, reload()).await;
    assert_eq!(json_body(resp).await, json!({"last_updated": START}));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/mon/nodes").to_request()).await;
    assert_eq!(json_body(resp).await, json!(["web1"]));

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/mon/nodes/web1").to_request(),
    )
    .await;
    assert_eq!(json_body(resp).await["plugin_output"], "PING OK");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/mon/nodes/web1/status").to_request(),
    )
    .await;
    assert_eq!(json_body(resp).await, json!({"status": "UP"}));

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/mon/nodes/web1/missing").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/mon/services/web1").to_request(),
    )
    .await;
    assert_eq!(
        json_body(resp).await,
        json!([[{"service_description": "HTTP", "status": "OK"}]])
    );

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/mon/services/db1").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn failed_refresh_is_service_unavailable() {
    let h = harness();
    h.store
        .hash_set(MONITORING_CONFIG_KEY, REFRESH_CLOCK_FIELD, "0")
        .await
        .unwrap();
    h.source.down.store(true, Ordering::SeqCst);
    let app = app!(h.state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post().uri("/mon/reload").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(json_body(resp).await["error"]["status_code"], 503);
}

#[actix_web::test]
async fn config_round_trip_updates_node_settings() {
    let h = harness();
    let app = app!(h.state);

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/config")
            .set_json(json!({"service_aging": "120", "nagios_use_aliases": true}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        json_body(resp).await,
        json!({"service_aging": "120", "nagios_use_aliases": true})
    );

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/config/service_aging").to_request(),
    )
    .await;
    assert_eq!(json_body(resp).await, json!({"service_aging": "120"}));

    let resp = test::call_service(&app, test::TestRequest::get().uri("/config").to_request()).await;
    assert_eq!(
        json_body(resp).await,
        json!({"nagios_use_aliases": "1", "service_aging": "120"})
    );

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/nodes/web1").to_request(),
    )
    .await;
    assert_eq!(json_body(resp).await["settings"]["service_aging"], "120");

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/config/unknown").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn empty_config_value_is_not_found() {
    let h = harness();
    h.store
        .hash_set("dotm::config", "blank", "")
        .await
        .unwrap();
    let app = app!(h.state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/config/blank").to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn rejects_malformed_config_payloads() {
    let h = harness();
    let app = app!(h.state);

    for payload in ["[1, 2]", "{}", "not json", r#"{"a": {"nested": 1}}"#] {
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/config")
                .insert_header((header::CONTENT_TYPE, "application/json"))
                .set_payload(payload)
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "payload {payload}");
        let body = json_body(resp).await;
        assert_eq!(body["error"]["status_code"], 400);
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Wrong POST data format"));
    }
    assert!(h.store.hash_get_all("dotm::config").await.unwrap().is_empty());
}

#[actix_web::test]
async fn jsonp_wraps_body_in_callback() {
    let h = harness();
    seed_topology(&h.store).await;
    let app = app!(h.state);

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/nodes?callback=render")
            .insert_header((header::ACCEPT, "application/javascript"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        resp.headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok()),
        Some("application/javascript")
    );
    let body = text_body(resp).await;
    assert!(body.starts_with("render({"));
    assert!(body.ends_with("})"));

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/nodes?callback=my%5Fcb")
            .insert_header((header::ACCEPT, "application/javascript"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(text_body(resp).await.starts_with("my_cb({"));

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/mon/nodes?callback=render")
            .insert_header((header::ACCEPT, "application/javascript"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert_eq!(
        text_body(resp).await,
        r#"render({"error":{"message":"Not Found","status_code":404}})"#
    );

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/nodes")
            .insert_header((header::ACCEPT, "application/javascript"))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn metrics_endpoint_renders() {
    let h = harness();
    let app = app!(h.state);

    let resp = test::call_service(&app, test::TestRequest::get().uri("/metrics").to_request()).await;
    assert_eq!(resp.status(), StatusCode::OK);
}
