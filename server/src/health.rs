//! Minimal liveness/readiness HTTP surface (spec.md §1: the CRUD API over
//! subscriptions/entities is explicitly out of scope; this is process
//! health only), grounded on the teacher's `axum::Router` + `TraceLayer`
//! wiring in `server/src/server.rs`.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{http::StatusCode, routing::get, Router};
use tower_http::trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer};
use tracing::Level;

/// Flipped to `true` once startup (pool connect, initial subscription load)
/// has finished; `/readyz` reports 503 until then.
#[derive(Clone, Default)]
pub struct ReadinessFlag(Arc<AtomicBool>);

impl ReadinessFlag {
    pub fn mark_ready(&self) { self.0.store(true, Ordering::SeqCst); }

    fn is_ready(&self) -> bool { self.0.load(Ordering::SeqCst) }
}

pub async fn serve(bind_address: String, readiness: ReadinessFlag) -> anyhow::Result<()> {
    let app = Router::new()
        .route("/healthz", get(|| async { StatusCode::OK }))
        .route(
            "/readyz",
            get(move || {
                let readiness = readiness.clone();
                async move { if readiness.is_ready() { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE } }
            }),
        )
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::DEBUG))
                .on_response(DefaultOnResponse::new().level(Level::DEBUG)),
        );

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %bind_address, "health endpoint listening");
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
