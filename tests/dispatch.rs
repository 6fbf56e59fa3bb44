//! Fan-out behavior against live mock subscribers.

use std::time::{Duration, Instant};

use httpmock::Method::POST;
use httpmock::MockServer;
use serde_json::json;
use url::Url;

use sim_notifier::dispatch::{DeliveryOutcome, Dispatcher};
use sim_notifier::events::Category;

fn url(server: &MockServer, path: &str) -> Url {
    Url::parse(&server.url(path)).unwrap()
}

#[tokio::test]
async fn every_target_gets_exactly_one_json_post() {
    let server = MockServer::start_async().await;
    let mut hooks = Vec::new();
    for i in 0..3 {
        let path = format!("/hook{}", i);
        let hook = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path(path.as_str())
                    .header("content-type", "application/json")
                    .json_body(json!({ "epochStartTime": 1234 }));
                then.status(200);
            })
            .await;
        hooks.push(hook);
    }
    let targets: Vec<Url> = (0..3).map(|i| url(&server, &format!("/hook{}", i))).collect();

    let d = Dispatcher::plain().unwrap();
    let report = d
        .broadcast(Category::Epoch, &targets, &json!({ "epochStartTime": 1234 }))
        .await;

    assert_eq!(report.attempted(), 3);
    assert_eq!(report.delivered(), 3);
    assert_eq!(report.failed(), 0);
    for hook in &hooks {
        assert_eq!(hook.hits_async().await, 1);
    }
}

#[tokio::test]
async fn one_failing_target_does_not_affect_the_others() {
    let server = MockServer::start_async().await;
    let ok_a = server
        .mock_async(|when, then| {
            when.method(POST).path("/a");
            then.status(200);
        })
        .await;
    let broken = server
        .mock_async(|when, then| {
            when.method(POST).path("/broken");
            then.status(500).body("boom");
        })
        .await;
    let ok_b = server
        .mock_async(|when, then| {
            when.method(POST).path("/b");
            then.status(204);
        })
        .await;
    let targets = vec![url(&server, "/a"), url(&server, "/broken"), url(&server, "/b")];

    let report = Dispatcher::plain()
        .unwrap()
        .broadcast(Category::RateUpdate, &targets, &json!({ "primeRate": 5.5 }))
        .await;

    assert_eq!(report.attempted(), 3);
    assert_eq!(report.delivered(), 2);
    assert_eq!(report.failed(), 1);
    assert_eq!(report.failed_targets(), vec![targets[1].as_str()]);
    assert_eq!(report.outcomes[1].outcome, DeliveryOutcome::Rejected { status: 500 });
    assert_eq!(ok_a.hits_async().await, 1);
    assert_eq!(broken.hits_async().await, 1);
    assert_eq!(ok_b.hits_async().await, 1);
}

#[tokio::test]
async fn unreachable_target_is_a_transport_failure() {
    let server = MockServer::start_async().await;
    let ok = server
        .mock_async(|when, then| {
            when.method(POST).path("/ok");
            then.status(200);
        })
        .await;
    // Port 1 on loopback refuses connections.
    let targets = vec![Url::parse("http://127.0.0.1:1/dead").unwrap(), url(&server, "/ok")];

    let report = Dispatcher::plain()
        .unwrap()
        .broadcast(Category::Epoch, &targets, &json!({ "epochStartTime": 1 }))
        .await;

    assert!(matches!(report.outcomes[0].outcome, DeliveryOutcome::Transport { .. }));
    assert!(report.outcomes[1].outcome.is_delivered());
    assert_eq!(ok.hits_async().await, 1);
}

#[tokio::test]
async fn deliveries_run_concurrently() {
    let server = MockServer::start_async().await;
    let slow = server
        .mock_async(|when, then| {
            when.method(POST).path("/slow");
            then.status(200).delay(Duration::from_millis(400));
        })
        .await;
    let targets: Vec<Url> = (0..5).map(|_| url(&server, "/slow")).collect();

    let started = Instant::now();
    let report = Dispatcher::plain()
        .unwrap()
        .broadcast(Category::Epoch, &targets, &json!({ "epochStartTime": 1 }))
        .await;
    let elapsed = started.elapsed();

    assert_eq!(report.delivered(), 5);
    assert_eq!(slow.hits_async().await, 5);
    // Sequential delivery would take at least 2s.
    assert!(elapsed < Duration::from_millis(1_600), "round took {:?}", elapsed);
}

#[tokio::test]
async fn per_target_builds_can_skip_individual_targets() {
    let server = MockServer::start_async().await;
    let hook = server
        .mock_async(|when, then| {
            when.method(POST).path("/hook");
            then.status(200);
        })
        .await;
    let targets = vec![url(&server, "/hook"), url(&server, "/hook"), url(&server, "/hook")];

    let mut n = 0;
    let report = Dispatcher::plain()
        .unwrap()
        .fan_out(Category::MachineFailure, &targets, |_| {
            n += 1;
            if n == 2 {
                Err("no catalog entry".to_string())
            } else {
                Ok(json!({ "draw": n }))
            }
        })
        .await;

    assert_eq!(report.outcomes.len(), 3);
    assert_eq!(report.attempted(), 2);
    assert_eq!(report.skipped(), 1);
    assert!(matches!(report.outcomes[1].outcome, DeliveryOutcome::Skipped { .. }));
    assert_eq!(hook.hits_async().await, 2);
}
