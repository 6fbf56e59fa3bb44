//! Failures surface only as log records; these tests read them back from the
//! run's `events.jsonl`.

use std::path::PathBuf;
use std::sync::OnceLock;

use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::{json, Value};
use tempfile::TempDir;
use url::Url;

use sim_notifier::config::Config;
use sim_notifier::dispatch::Dispatcher;
use sim_notifier::events::Category;
use sim_notifier::market::StaticMarket;
use sim_notifier::scheduler::Scheduler;
use sim_notifier::state::{GuardedState, SimulationState};

const RUN_ID: &str = "logging-it";

static LOG_ROOT: OnceLock<TempDir> = OnceLock::new();

/// Point the log sinks at a private directory before anything logs.
fn events_file() -> PathBuf {
    let root = LOG_ROOT.get_or_init(|| {
        let dir = TempDir::new().unwrap();
        std::env::set_var("LOG_DIR", dir.path());
        std::env::set_var("RUN_ID", RUN_ID);
        dir
    });
    root.path().join(RUN_ID).join("events.jsonl")
}

fn records(event: &str) -> Vec<Value> {
    std::fs::read_to_string(events_file())
        .unwrap_or_default()
        .lines()
        .filter_map(|l| serde_json::from_str::<Value>(l).ok())
        .filter(|r| r["event"] == event)
        .collect()
}

fn url(server: &MockServer, path: &str) -> Url {
    Url::parse(&server.url(path)).unwrap()
}

#[tokio::test]
async fn failing_target_logs_exactly_one_delivery_failure() {
    events_file();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/ok");
            then.status(200);
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/broken");
            then.status(503);
        })
        .await;
    let targets = vec![url(&server, "/ok"), url(&server, "/broken"), url(&server, "/ok")];

    let report = Dispatcher::plain()
        .unwrap()
        .broadcast(Category::RateUpdate, &targets, &json!({ "primeRate": 6.5 }))
        .await;
    assert_eq!(report.failed(), 1);

    let prefix = server.url("/");
    let failures: Vec<Value> = records("delivery_failed")
        .into_iter()
        .filter(|r| r["target"].as_str().is_some_and(|t| t.starts_with(&prefix)))
        .collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["target"], targets[1].as_str());
    assert_eq!(failures[0]["category"], "rate_update");
    assert_eq!(failures[0]["run_id"], RUN_ID);
    assert_eq!(failures[0]["data"]["status"], 503);
}

#[tokio::test]
async fn missing_subscribers_are_logged_as_a_dispatch_skip() {
    events_file();
    // Only truck subscribers: the machine round has nowhere to go.
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/truck");
            then.status(200);
        })
        .await;
    let cfg = Config {
        truck_failure_urls: vec![url(&server, "/truck")],
        sim_seed: Some(5),
        ..Config::default()
    };
    let market: StaticMarket = serde_json::from_value(json!({
        "trucks": [{ "id": 1, "staticCatalogId": 9, "sold": false }],
        "vehicleCatalog": [{ "id": 9, "displayName": "small_truck" }],
    }))
    .unwrap();
    let mut scheduler = Scheduler::new(cfg, market);
    let state = GuardedState::new(SimulationState { current_day: 14, ..SimulationState::new(0) });

    scheduler.on_day_advanced(&state).await;

    let skips = records("build_skipped");
    let machine = skips
        .iter()
        .find(|r| r["category"] == "machine_failure" && r["msg"] == "no subscribers configured")
        .expect("no skip record for the machine round");
    assert_eq!(machine["component"], "dispatch");
}
