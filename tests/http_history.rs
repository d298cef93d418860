use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use terrarium_telemetry::application::history_cache::{
    CacheSettings, ChartRenderer, HistoryCache, Served,
};
use terrarium_telemetry::application::history_source::HistorySource;
use terrarium_telemetry::domain::telemetry::{ChartKind, DerivedSeriesSet, POWER_WATTAGE, STATE};
use terrarium_telemetry::error::HistoryError;
use terrarium_telemetry::infrastructure::http_history::HttpHistorySource;

async fn switch_history(State(hits): State<Arc<AtomicUsize>>) -> Json<Value> {
    hits.fetch_add(1, Ordering::SeqCst);
    let now = chrono::Utc::now().timestamp();
    Json(json!({
        "switches": {
            "pump": {
                "state": [[now - 7200, true], [now - 3600, false]],
                "power_wattage": [[now - 7200, 30], [now - 3600, 30]],
                "water_flow": [[now - 7200, 4], [now - 3600, 4]]
            }
        }
    }))
}

async fn door_history() -> Json<Value> {
    Json(json!({
        "door": {
            "front": {"state": [[1700000000, "closed"], [1700000100, "open"], [1700000200, "open"], [1700000300, "closed"]]},
            "back": {"state": [[1700000150, "open"]]}
        }
    }))
}

async fn serve() -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let app = Router::new()
        .route("/api/history/switches/pump", get(switch_history))
        .route("/api/history/doors", get(door_history))
        .route(
            "/api/history/broken",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database locked") }),
        )
        .with_state(hits.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{}/api/history", addr), hits)
}

struct NullRenderer;

impl ChartRenderer for NullRenderer {
    fn render(&self, _chart_id: &str, _kind: &ChartKind, _series: &DerivedSeriesSet) {}
}

#[tokio::test]
async fn test_fetch_parses_channels() {
    let (base_url, _) = serve().await;
    let source = HttpHistorySource::new(base_url.clone());

    let raw = source
        .fetch(&format!("{}/switches/pump", base_url))
        .await
        .unwrap();

    assert_eq!(raw.channel(STATE).len(), 2);
    assert_eq!(raw.channel(POWER_WATTAGE)[0].value, 30.0);
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (base_url, _) = serve().await;
    let source = HttpHistorySource::new(base_url.clone());

    let result = source.fetch(&format!("{}/broken", base_url)).await;
    match result {
        Err(HistoryError::Status { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "database locked");
        }
        other => panic!("unexpected result: {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn test_door_events_are_merged_and_deduplicated() {
    let (base_url, _) = serve().await;
    let source = HttpHistorySource::new(base_url);

    let events = source.fetch_door_events().await.unwrap();
    let summary: Vec<(i64, bool)> = events.iter().map(|e| (e.time_ms, e.open)).collect();

    assert_eq!(
        summary,
        vec![
            (1_700_000_000_000, false),
            (1_700_000_100_000, true),
            (1_700_000_150_000, true),
            (1_700_000_300_000, false),
        ]
    );
}

#[tokio::test]
async fn test_cache_serves_switch_chart_from_http() {
    let (base_url, hits) = serve().await;
    let source = Arc::new(HttpHistorySource::new(base_url.clone()));
    let cache = HistoryCache::new(source, Arc::new(NullRenderer), CacheSettings::default());
    let url = format!("{}/switches/pump", base_url);

    assert_eq!(cache.request("pump", ChartKind::Switch, &url, false).await, Served::Fetched);
    assert_eq!(cache.request("pump", ChartKind::Switch, &url, false).await, Served::Cached);
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let derived = cache.cached("pump").unwrap();
    // One hour at 30 W and 4 L/min
    assert!((derived.totals.total_power_usage - 30.0).abs() < 1e-6);
    assert!((derived.totals.total_water_usage - 240.0).abs() < 1e-6);

    cache.clear();
}
