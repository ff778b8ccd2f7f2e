//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{Request, Response};
use axum::Router;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tempfile::TempDir;
use tower::ServiceExt;

use portfolio_edge::config::EdgeConfig;
use portfolio_edge::contact::{MailError, Mailer, OutgoingMail};
use portfolio_edge::security::{Interceptor, ManualClock, RateLimitPolicy, SlidingWindowLimiter};
use portfolio_edge::EdgeServer;

/// Collects every mail instead of sending it.
#[derive(Clone, Default)]
pub struct RecordingMailer {
    sent: Arc<Mutex<Vec<OutgoingMail>>>,
}

impl RecordingMailer {
    pub fn sent(&self) -> Vec<OutgoingMail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send<'a>(&'a self, mail: &'a OutgoingMail) -> BoxFuture<'a, Result<(), MailError>> {
        async move {
            self.sent.lock().unwrap().push(mail.clone());
            Ok(())
        }
        .boxed()
    }
}

/// Fails every delivery, like an unreachable relay.
pub struct FailingMailer;

impl Mailer for FailingMailer {
    fn send<'a>(&'a self, _mail: &'a OutgoingMail) -> BoxFuture<'a, Result<(), MailError>> {
        async { Err(MailError::Connect("relay unreachable".into())) }.boxed()
    }
}

/// A built static site with an index page, a favicon and a bundled asset.
pub fn site_dir() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>portfolio</h1>").unwrap();
    std::fs::write(dir.path().join("favicon.ico"), [0u8, 1, 2, 3]).unwrap();
    std::fs::create_dir_all(dir.path().join("_next/static")).unwrap();
    std::fs::write(dir.path().join("_next/static/app.js"), "console.log(1)").unwrap();
    dir
}

/// A router under test plus handles on its injected collaborators.
pub struct TestEdge {
    pub router: Router,
    pub clock: ManualClock,
    pub mailer: RecordingMailer,
    pub interceptor: Arc<Interceptor>,
    pub server: EdgeServer,
    _site: TempDir,
}

impl TestEdge {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(tweak: impl FnOnce(&mut EdgeConfig)) -> Self {
        let site = site_dir();
        let mut config = EdgeConfig::default();
        config.site.public_dir = site.path().to_string_lossy().into_owned();
        tweak(&mut config);

        let clock = ManualClock::new();
        let limiter = Arc::new(SlidingWindowLimiter::with_clock(
            RateLimitPolicy::from(&config.rate_limit),
            Arc::new(clock.clone()),
        ));
        let interceptor = Arc::new(Interceptor::with_limiter(&config, limiter).unwrap());
        let mailer = RecordingMailer::default();
        let server = EdgeServer::with_parts(config, interceptor.clone(), Arc::new(mailer.clone()));

        Self {
            router: server.router(),
            clock,
            mailer,
            interceptor,
            server,
            _site: site,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

pub fn contact_body() -> String {
    serde_json::json!({
        "name": "Test User",
        "email": "test@example.com",
        "subject": "Hello",
        "message": "Nice site!",
    })
    .to_string()
}

/// POST a valid submission as `client` (sent via `x-forwarded-for`).
pub fn contact_from(client: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/contact")
        .header("content-type", "application/json")
        .header("x-forwarded-for", client)
        .body(Body::from(contact_body()))
        .unwrap()
}

pub fn get(path: &str) -> Request<Body> {
    Request::builder().uri(path).body(Body::empty()).unwrap()
}

/// Attach a peer address the way `into_make_service_with_connect_info` does.
pub fn with_peer(mut request: Request<Body>, peer: &str) -> Request<Body> {
    let addr: SocketAddr = peer.parse().unwrap();
    request.extensions_mut().insert(ConnectInfo(addr));
    request
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
