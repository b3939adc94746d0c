//! End-to-end tests for the delegated execution path: real WebSockets, a
//! scripted browser double, and the JSON API in front.

use std::time::{Duration, Instant};

use serde_json::{json, Value};

mod common;
use common::*;

fn execute_body(user_id: &str, endpoint: &str, params: Value, timeout_ms: u64) -> Value {
    json!({
        "user_id": user_id,
        "endpoint": endpoint,
        "params": params,
        "policy": "delegate",
        "timeout_ms": timeout_ms,
    })
}

#[tokio::test]
async fn delegated_feed_call_resolves_with_payload() {
    let (addr, _shutdown) = spawn_gateway(test_config()).await;
    let mut delegate = connect_delegate(addr, "tok-u1").await;
    wait_for_connections(addr, 1).await;

    // Browser double: answer the feed request 200ms after it arrives.
    let browser = tokio::spawn(async move {
        let (request_id, endpoint, params) = next_request(&mut delegate).await;
        assert_eq!(endpoint, "feed");
        assert_eq!(
            params,
            vec![("count".to_string(), "10".to_string()), ("start".to_string(), "0".to_string())]
        );
        tokio::time::sleep(Duration::from_millis(200)).await;
        send_response(&mut delegate, &request_id, true, json!({"items": ["a", "b"]}), None).await;
        delegate
    });

    let started = Instant::now();
    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/execute"))
        .json(&execute_body("u1", "feed", json!([["count", "10"], ["start", "0"]]), 5000))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["policy"], json!("delegate"));
    assert_eq!(body["payload"], json!({"items": ["a", "b"]}));
    assert!(started.elapsed() >= Duration::from_millis(200));

    browser.await.unwrap();
}

#[tokio::test]
async fn no_delegate_fails_immediately_without_wire_traffic() {
    let (addr, _shutdown) = spawn_gateway(test_config()).await;
    // u1 is connected; the call targets u2, who is not.
    let mut bystander = connect_delegate(addr, "tok-u1").await;
    wait_for_connections(addr, 1).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/execute"))
        .json(&execute_body("u2", "comments", json!([["updateId", "u-9"]]), 5000))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 503);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("no_delegate"));

    // The connected bystander saw no request frame.
    let quiet = tokio::time::timeout(Duration::from_millis(150), next_request(&mut bystander)).await;
    assert!(quiet.is_err(), "bystander should receive nothing");
}

#[tokio::test]
async fn timed_out_call_reports_504_and_late_response_is_discarded() {
    let (addr, _shutdown) = spawn_gateway(test_config()).await;
    let mut delegate = connect_delegate(addr, "tok-u1").await;
    wait_for_connections(addr, 1).await;

    let client = reqwest::Client::new();

    let browser = tokio::spawn(async move {
        let (request_id, _, _) = next_request(&mut delegate).await;
        // Answer well past the caller's 200ms deadline.
        tokio::time::sleep(Duration::from_millis(600)).await;
        send_response(&mut delegate, &request_id, true, json!("too late"), None).await;

        // The connection must survive the discard and serve the next call.
        let (request_id, _, _) = next_request(&mut delegate).await;
        send_response(&mut delegate, &request_id, true, json!("fresh"), None).await;
    });

    let response = client
        .post(format!("http://{addr}/api/execute"))
        .json(&execute_body("u1", "feed", json!([]), 200))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 504);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("timeout"));

    // Give the late response time to arrive and be discarded.
    tokio::time::sleep(Duration::from_millis(700)).await;

    let response = client
        .post(format!("http://{addr}/api/execute"))
        .json(&execute_body("u1", "feed", json!([]), 5000))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["payload"], json!("fresh"));

    browser.await.unwrap();
}

#[tokio::test]
async fn concurrent_calls_resolve_out_of_order_to_their_own_callers() {
    let (addr, _shutdown) = spawn_gateway(test_config()).await;
    let mut delegate = connect_delegate(addr, "tok-u1").await;
    wait_for_connections(addr, 1).await;

    // Browser double: collect three requests, answer them in reverse,
    // echoing each request's `start` parameter into its payload.
    let browser = tokio::spawn(async move {
        let mut pending = Vec::new();
        for _ in 0..3 {
            let (request_id, _, params) = next_request(&mut delegate).await;
            let start = params
                .iter()
                .find(|(name, _)| name == "start")
                .map(|(_, value)| value.clone())
                .unwrap();
            pending.push((request_id, start));
        }
        for (request_id, start) in pending.into_iter().rev() {
            send_response(&mut delegate, &request_id, true, json!({ "start": start }), None).await;
        }
    });

    let client = reqwest::Client::new();
    let mut calls = Vec::new();
    for start in 0..3 {
        let client = client.clone();
        calls.push(tokio::spawn(async move {
            let response = client
                .post(format!("http://{addr}/api/execute"))
                .json(&execute_body(
                    "u1",
                    "feed",
                    json!([["count", "10"], ["start", start.to_string()]]),
                    5000,
                ))
                .send()
                .await
                .unwrap();
            (start, response.json::<Value>().await.unwrap())
        }));
    }

    for call in calls {
        let (start, body) = call.await.unwrap();
        assert_eq!(
            body["payload"]["start"],
            json!(start.to_string()),
            "caller {start} must get its own payload"
        );
    }

    browser.await.unwrap();
}

#[tokio::test]
async fn disconnect_mid_call_fails_the_caller() {
    let (addr, _shutdown) = spawn_gateway(test_config()).await;
    let mut delegate = connect_delegate(addr, "tok-u1").await;
    wait_for_connections(addr, 1).await;

    let browser = tokio::spawn(async move {
        let _ = next_request(&mut delegate).await;
        drop(delegate);
    });

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/execute"))
        .json(&execute_body("u1", "feed", json!([]), 5000))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("disconnected"));

    browser.await.unwrap();
    wait_for_connections(addr, 0).await;
}

#[tokio::test]
async fn delegate_reported_failure_surfaces_its_error() {
    let (addr, _shutdown) = spawn_gateway(test_config()).await;
    let mut delegate = connect_delegate(addr, "tok-u1").await;
    wait_for_connections(addr, 1).await;

    let browser = tokio::spawn(async move {
        let (request_id, _, _) = next_request(&mut delegate).await;
        send_response(
            &mut delegate,
            &request_id,
            false,
            Value::Null,
            Some("page session expired".to_string()),
        )
        .await;
    });

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/execute"))
        .json(&execute_body("u1", "profile", json!([["memberId", "m-1"]]), 5000))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 502);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"], json!("delegate_failed"));
    assert!(body["message"].as_str().unwrap().contains("page session expired"));

    browser.await.unwrap();
}

#[tokio::test]
async fn reconnect_supersedes_previous_connection() {
    let (addr, _shutdown) = spawn_gateway(test_config()).await;
    let mut first = connect_delegate(addr, "tok-u1").await;
    wait_for_connections(addr, 1).await;

    let mut second = connect_delegate(addr, "tok-u1").await;

    // The stale connection is closed by the gateway.
    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while next_wire(&mut first).await.is_some() {}
    })
    .await;
    assert!(closed.is_ok(), "superseded connection should close");

    // Calls for u1 now reach the replacement.
    let browser = tokio::spawn(async move {
        let (request_id, _, _) = next_request(&mut second).await;
        send_response(&mut second, &request_id, true, json!("via replacement"), None).await;
    });

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/execute"))
        .json(&execute_body("u1", "feed", json!([]), 5000))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["payload"], json!("via replacement"));

    browser.await.unwrap();
}

#[tokio::test]
async fn unknown_auth_token_is_rejected() {
    let (addr, _shutdown) = spawn_gateway(test_config()).await;
    let mut socket = connect_delegate(addr, "not-a-token").await;

    match next_wire(&mut socket).await {
        Some(session_gateway::protocol::WireMessage::Error { message, .. }) => {
            assert!(message.contains("unknown auth token"));
        }
        other => panic!("expected error frame, got {other:?}"),
    }
    // Connection is then closed; no registration happened.
    assert!(next_wire(&mut socket).await.is_none());
    wait_for_connections(addr, 0).await;
}

#[tokio::test]
async fn shutdown_drains_delegate_connections() {
    let (addr, shutdown) = spawn_gateway(test_config()).await;
    let mut delegate = connect_delegate(addr, "tok-u1").await;
    wait_for_connections(addr, 1).await;

    shutdown.trigger();

    let closed = tokio::time::timeout(Duration::from_secs(2), async {
        while next_wire(&mut delegate).await.is_some() {}
    })
    .await;
    assert!(closed.is_ok(), "connections drain on shutdown");
}

#[tokio::test]
async fn notification_reaches_connected_delegate() {
    let (addr, _shutdown) = spawn_gateway(test_config()).await;
    let mut delegate = connect_delegate(addr, "tok-u1").await;
    wait_for_connections(addr, 1).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/api/notify"))
        .json(&json!({"user_id": "u1", "message": "refresh your session", "level": "warning"}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 202);

    match next_wire(&mut delegate).await {
        Some(session_gateway::protocol::WireMessage::Notification { message, .. }) => {
            assert_eq!(message, "refresh your session");
        }
        other => panic!("expected notification frame, got {other:?}"),
    }
}
