use axum::{
    Json, Router,
    extract::State,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::AppState;
use crate::clock::SystemClock;
use crate::companion::{Companion, CompanionSettings};
use crate::config::AppConfig;
use crate::conversation::{IgnoreReason, SubmitOutcome};
use crate::events::{CompanionEvent, CompanionSnapshot, sse_event};
use crate::page;
use crate::responder::{RandomSource, RngSource};
use crate::scheduler::TokioScheduler;

/// Build the production companion described by `config`.
pub fn build_companion(config: &AppConfig) -> Companion {
    let rng: Box<dyn RandomSource> = match config.companion.seed {
        Some(seed) => Box::new(RngSource::seeded(seed)),
        None => Box::new(RngSource::from_os()),
    };

    Companion::start(
        CompanionSettings::from(&config.companion),
        Arc::new(SystemClock),
        Arc::new(TokioScheduler),
        rng,
    )
}

/// Routes for the rendering surface.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/health", get(health_handler))
        .route("/api/state", get(api_state))
        .route("/api/messages", post(api_submit))
        .route("/api/events", get(api_events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Axum server with the provided configuration.
pub async fn start_server(config: Arc<AppConfig>) -> anyhow::Result<()> {
    let state = AppState {
        companion: build_companion(&config),
    };

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(crate::error::Error::from)?;

    info!(
        name: "server.started",
        address = %addr,
        "Server started"
    );

    serve(listener, state, shutdown_signal()).await
}

/// Serve `state` on `listener` until `signal` resolves.
///
/// The companion is shut down as soon as the signal fires, which ends every
/// open event stream so the graceful drain can finish.
pub async fn serve(
    listener: tokio::net::TcpListener,
    state: AppState,
    signal: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let companion = state.companion.clone();
    let app = build_router(state);

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            signal.await;
            info!(name: "server.stopping", "Shutdown requested");
            companion.shutdown();
        })
        .await?;

    info!(name: "server.stopped", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// Request body for the submit API.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    /// Raw input box text.
    pub text: String,
}

/// Response from the submit API.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SubmitResponse {
    /// Whether the message was appended.
    pub accepted: bool,
    /// Why it was not, for ignored submissions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignored: Option<String>,
}

/// GET / - Chat page.
async fn index_handler() -> impl IntoResponse {
    Html(page::html_shell("Chat", page::chat_content()))
}

/// GET /health - Liveness probe.
async fn health_handler() -> &'static str {
    "ok"
}

/// GET /api/state - Current snapshot.
async fn api_state(State(state): State<AppState>) -> Json<CompanionSnapshot> {
    Json(state.companion.snapshot())
}

/// POST /api/messages - Submit user text.
///
/// Ignored submissions are not errors; the caller just gets `accepted: false`.
async fn api_submit(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Json<SubmitResponse> {
    let response = match state.companion.submit(req.text) {
        SubmitOutcome::Accepted(_) => SubmitResponse {
            accepted: true,
            ignored: None,
        },
        SubmitOutcome::Ignored(reason) => SubmitResponse {
            accepted: false,
            ignored: Some(
                match reason {
                    IgnoreReason::Empty => "empty",
                    IgnoreReason::ReplyPending => "reply_pending",
                }
                .to_string(),
            ),
        },
    };
    Json(response)
}

/// GET /api/events - SSE stream of companion events.
async fn api_events(State(state): State<AppState>) -> Response {
    tracing::debug!("Starting SSE stream");
    let body = axum::body::Body::from_stream(event_stream(state.companion));
    build_sse_response(body)
}

/// SSE frames for `companion`: a snapshot, then every change as it happens.
///
/// A subscriber that falls behind gets a fresh snapshot instead of the
/// events it missed. The stream ends when the companion shuts down.
pub fn event_stream(companion: Companion) -> impl Stream<Item = Result<String, Infallible>> {
    async_stream::stream! {
        let (snapshot, mut receiver) = companion.subscribe_with_snapshot();
        yield Ok::<String, Infallible>(sse_event(&CompanionEvent::Snapshot(snapshot)));

        let stopped = companion.stopped();
        tokio::pin!(stopped);

        loop {
            let received = tokio::select! {
                biased;
                () = &mut stopped => break,
                received = receiver.recv() => received,
            };

            match received {
                Ok(event) => yield Ok(sse_event(&event)),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "SSE subscriber lagged, resending snapshot");
                    let snapshot = companion.snapshot();
                    yield Ok(sse_event(&CompanionEvent::Snapshot(snapshot)));
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}

fn build_sse_response(body: axum::body::Body) -> Response {
    let mut resp = Response::new(body);
    let h = resp.headers_mut();
    h.insert(
        axum::http::header::CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/event-stream"),
    );
    h.insert(
        axum::http::header::CACHE_CONTROL,
        axum::http::HeaderValue::from_static("no-cache"),
    );
    h.insert(
        axum::http::header::CONNECTION,
        axum::http::HeaderValue::from_static("keep-alive"),
    );
    h.insert("X-Accel-Buffering", axum::http::HeaderValue::from_static("no"));
    resp
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::scheduler::{Scheduler, VirtualScheduler};
    use futures::StreamExt;

    fn companion() -> Companion {
        let clock = Arc::new(ManualClock::default());
        let scheduler: Arc<dyn Scheduler> = Arc::new(VirtualScheduler::new(Arc::clone(&clock)));
        Companion::start(
            CompanionSettings::default(),
            clock,
            scheduler,
            Box::new(RngSource::seeded(11)),
        )
    }

    #[tokio::test]
    async fn test_event_stream_starts_with_snapshot() {
        let companion = companion();
        let stream = event_stream(companion.clone());
        futures::pin_mut!(stream);

        let first = stream.next().await.unwrap().unwrap();
        assert!(first.starts_with("event: snapshot\n"));
        assert!(first.contains("Hi there!"));

        let _ = companion.submit("hello");
        let second = stream.next().await.unwrap().unwrap();
        assert!(second.starts_with("event: message.appended\n"));
        let third = stream.next().await.unwrap().unwrap();
        assert!(third.starts_with("event: typing\n"));
    }

    #[tokio::test]
    async fn test_event_stream_ends_on_shutdown() {
        let companion = companion();
        let stream = event_stream(companion.clone());
        futures::pin_mut!(stream);

        let first = stream.next().await.unwrap().unwrap();
        assert!(first.starts_with("event: snapshot\n"));

        companion.shutdown();
        let end = tokio::time::timeout(std::time::Duration::from_secs(1), stream.next())
            .await
            .expect("stream should end after shutdown");
        assert!(end.is_none());
    }

    #[test]
    fn test_sse_headers() {
        let resp = build_sse_response(axum::body::Body::empty());
        assert_eq!(
            resp.headers()[axum::http::header::CONTENT_TYPE],
            "text/event-stream"
        );
        assert_eq!(resp.headers()["X-Accel-Buffering"], "no");
    }
}
