//! Contact submission handler, in-process and over a real socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tower::ServiceExt;

use portfolio_edge::config::EdgeConfig;
use portfolio_edge::security::Interceptor;
use portfolio_edge::{EdgeServer, Shutdown};

mod common;
use common::{body_string, contact_from, FailingMailer, RecordingMailer, TestEdge};

fn post_json(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn json_body(response: axum::http::Response<Body>) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

#[tokio::test]
async fn test_valid_submission_is_mailed() {
    let edge = TestEdge::with_config(|c| {
        c.mail.from = "site@example.com".into();
        c.mail.to = "owner@example.com".into();
    });

    let body = json!({
        "name": "<b>Mallory</b>",
        "email": "mallory@example.com",
        "subject": "Project",
        "message": "Hello\n<script>alert(1)</script>",
    });
    let res = edge.send(post_json(&body.to_string())).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(json_body(res).await, json!({ "success": true }));

    let sent = edge.mailer.sent();
    assert_eq!(sent.len(), 1);
    let mail = &sent[0];
    assert_eq!(mail.from, "site@example.com");
    assert_eq!(mail.to, "owner@example.com");
    assert_eq!(mail.subject, "Contact Form: Project");
    assert_eq!(mail.reply_to(), "\"<b>Mallory</b>\" <mallory@example.com>");
    assert_eq!(mail.text, "Hello\n<script>alert(1)</script>");
    assert!(mail.html.contains("Hello<br/>&lt;script&gt;alert(1)&lt;&#x2F;script&gt;"));
    assert!(mail.html.contains("From: &lt;b&gt;Mallory&lt;&#x2F;b&gt; &lt;mallory@example.com&gt;"));
    assert!(!mail.html.contains("<script>"));
}

#[tokio::test]
async fn test_validation_issues_are_listed() {
    let edge = TestEdge::new();

    let body = json!({
        "name": "x".repeat(101),
        "email": "invalid-email",
        "subject": "",
        "message": "ok",
    });
    let res = edge.send(post_json(&body.to_string())).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let payload = json_body(res).await;
    assert_eq!(payload["error"], "Validation failed.");
    let fields: Vec<&str> = payload["issues"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["name", "email", "subject"]);
    assert!(edge.mailer.sent().is_empty());
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let edge = TestEdge::new();

    let res = edge.send(post_json("{not json")).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let payload = json_body(res).await;
    assert_eq!(payload["error"], "Invalid request body.");
    assert_eq!(payload["issues"][0]["field"], "body");

    let no_content_type = Request::builder()
        .method("POST")
        .uri("/api/contact")
        .body(Body::from(common::contact_body()))
        .unwrap();
    assert_eq!(edge.send(no_content_type).await.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_wrong_field_type_is_bad_request() {
    let edge = TestEdge::new();
    let res = edge.send(post_json(r#"{"name": 5}"#)).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_transport_failure_is_generic_500() {
    let site = common::site_dir();
    let mut config = EdgeConfig::default();
    config.site.public_dir = site.path().to_string_lossy().into_owned();
    let interceptor = Arc::new(Interceptor::from_config(&config).unwrap());
    let server = EdgeServer::with_parts(config, interceptor, Arc::new(FailingMailer));

    let res = server.router().oneshot(contact_from("1.2.3.4")).await.unwrap();
    assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let payload = json_body(res).await;
    assert_eq!(payload, json!({ "error": "Internal Server Error" }));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let edge = TestEdge::with_config(|c| c.limits.max_body_bytes = 256);
    let body = json!({
        "name": "a",
        "email": "a@example.com",
        "subject": "s",
        "message": "m".repeat(1000),
    })
    .to_string();
    let req = Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header("content-type", "application/json")
        .header("content-length", body.len())
        .header("x-forwarded-for", "1.2.3.4")
        .body(Body::from(body))
        .unwrap();

    let res = edge.send(req).await;
    assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(res.headers()["x-frame-options"], "DENY");
    assert_eq!(res.headers()["x-content-type-options"], "nosniff");
    assert!(res.headers().contains_key("content-security-policy"));
    assert!(res.headers().contains_key("referrer-policy"));
    assert!(edge.mailer.sent().is_empty());

    // The attempt still counts against the client.
    assert_eq!(edge.interceptor.limiter().recent_requests("1.2.3.4"), 1);
}

#[tokio::test]
async fn test_end_to_end_over_tcp() {
    let site = common::site_dir();
    let mut config = EdgeConfig::default();
    config.site.public_dir = site.path().to_string_lossy().into_owned();
    config.rate_limit.max_requests = 2;

    let mailer = RecordingMailer::default();
    let interceptor = Arc::new(Interceptor::from_config(&config).unwrap());
    let server = EdgeServer::with_parts(config, interceptor.clone(), Arc::new(mailer.clone()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (_updates_tx, updates) = mpsc::unbounded_channel();
    let handle = tokio::spawn(server.run(listener, updates, shutdown.clone()));

    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let url = format!("http://{}/api/contact", addr);
    let body = json!({
        "name": "Ada",
        "email": "ada@example.com",
        "subject": "Hi",
        "message": "Hello",
    });

    let mut statuses = Vec::new();
    for _ in 0..3 {
        // A spoofed header must not split the peer's counter.
        let res = client
            .post(&url)
            .header("x-forwarded-for", format!("10.0.0.{}", statuses.len()))
            .json(&body)
            .send()
            .await
            .unwrap();
        statuses.push(res.status().as_u16());
    }
    assert_eq!(statuses, vec![200, 200, 429]);
    assert_eq!(mailer.sent().len(), 2);
    assert_eq!(interceptor.limiter().recent_requests("127.0.0.1"), 2);

    let page = client.get(format!("http://{}/", addr)).send().await.unwrap();
    assert_eq!(page.status(), 200);
    assert_eq!(page.headers()["x-frame-options"], "DENY");

    shutdown.trigger();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap()
        .unwrap();
}

#[tokio::test]
async fn test_reload_channel_updates_running_server() {
    let site = common::site_dir();
    let mut config = EdgeConfig::default();
    config.site.public_dir = site.path().to_string_lossy().into_owned();
    config.rate_limit.max_requests = 1;

    let interceptor = Arc::new(Interceptor::from_config(&config).unwrap());
    let server = EdgeServer::with_parts(
        config.clone(),
        interceptor.clone(),
        Arc::new(RecordingMailer::default()),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let shutdown = Shutdown::new();
    let (updates_tx, updates) = mpsc::unbounded_channel();
    let handle = tokio::spawn(server.run(listener, updates, shutdown.clone()));

    config.rate_limit.max_requests = 9;
    updates_tx.send(config).unwrap();

    let mut applied = false;
    for _ in 0..50 {
        if interceptor.limiter().policy().max_requests == 9 {
            applied = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(applied, "reloaded config was not applied");

    shutdown.trigger();
    handle.await.unwrap().unwrap();
}
