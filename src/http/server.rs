//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router: contact route plus static site fallback
//! - Wire up middleware (request ID, tracing, interceptor, timeout, body limit)
//! - Run background tasks (ledger sweeper, config reload)
//! - Serve until the shutdown broadcast fires

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{middleware, routing::post, Router};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::EdgeConfig;
use crate::contact::{build_mailer, submit_contact, ContactState, Mailer};
use crate::http::request::make_request_span;
use crate::lifecycle::Shutdown;
use crate::security::headers::InvalidHeader;
use crate::security::{intercept, spawn_sweeper, Interceptor};

/// HTTP server for the site edge.
pub struct EdgeServer {
    router: Router,
    config: EdgeConfig,
    interceptor: Arc<Interceptor>,
}

impl EdgeServer {
    /// Create a server with the transport and limiter named in the config.
    pub fn new(config: EdgeConfig) -> Result<Self, InvalidHeader> {
        let interceptor = Arc::new(Interceptor::from_config(&config)?);
        let mailer = build_mailer(&config.mail);
        Ok(Self::with_parts(config, interceptor, mailer))
    }

    /// Create a server around injected collaborators.
    pub fn with_parts(
        config: EdgeConfig,
        interceptor: Arc<Interceptor>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let contact_state = ContactState::new(mailer, config.mail.clone());
        let router = Self::build_router(&config, interceptor.clone(), contact_state);
        Self {
            router,
            config,
            interceptor,
        }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &EdgeConfig,
        interceptor: Arc<Interceptor>,
        contact_state: ContactState,
    ) -> Router {
        let contact = Router::new()
            .route(&config.interceptor.contact_prefix, post(submit_contact))
            .with_state(contact_state);

        Router::new()
            .merge(contact)
            .fallback_service(ServeDir::new(&config.site.public_dir))
            .layer(RequestBodyLimitLayer::new(config.limits.max_body_bytes))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            // Outside the limit and timeout layers so their 413/408 answers
            // are counted and get the security headers.
            .layer(middleware::from_fn_with_state(interceptor, intercept))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The fully layered router, for driving requests in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn interceptor(&self) -> &Arc<Interceptor> {
        &self.interceptor
    }

    pub fn config(&self) -> &EdgeConfig {
        &self.config
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<EdgeConfig>,
        shutdown: Shutdown,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = spawn_sweeper(
            self.interceptor.limiter().clone(),
            Duration::from_secs(self.config.rate_limit.sweep_interval_secs),
            shutdown.subscribe(),
        );
        let reloader = spawn_reloader(
            self.interceptor.clone(),
            config_updates,
            shutdown.subscribe(),
        );

        let mut server_shutdown = shutdown.subscribe();
        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = server_shutdown.recv().await;
            })
            .await;

        // Stop background tasks even when serve ended on its own.
        shutdown.trigger();
        let _ = tokio::join!(sweeper, reloader);

        served?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Apply reloaded configs to the live interceptor until shutdown.
fn spawn_reloader(
    interceptor: Arc<Interceptor>,
    mut updates: mpsc::UnboundedReceiver<EdgeConfig>,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(config) = updates.recv() => {
                    match interceptor.reload(&config) {
                        Ok(()) => tracing::info!(
                            max_requests = config.rate_limit.max_requests,
                            window_secs = config.rate_limit.window_secs,
                            test_hooks = config.interceptor.test_hooks,
                            "Interceptor configuration reloaded"
                        ),
                        Err(e) => tracing::error!(error = %e, "Rejected reloaded configuration"),
                    }
                }
                _ = shutdown.recv() => break,
                else => break,
            }
        }
    })
}
