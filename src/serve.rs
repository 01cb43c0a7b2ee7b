//! Purpose: HTTP driver that streams the event feed as framed JSON.
//! Exports: `ServeConfig`, `serve`, `validate_config`, `router`.
//! Role: Axum server; `GET /events` runs a `StreamEncoder` on a blocking task.
//! Invariants: Every encoded record is flushed into the response body before the next.
//! Invariants: Loopback-only unless explicitly allowed.
//! Notes: A client disconnect closes the body channel; the encoder's next flush fails
//! and the producer stops.

use std::future::IntoFuture;
use std::io::{self, Write};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use bytes::Bytes;
use serde::Serialize;
use serde_json::json;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Duration;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use jsonframe::api::{Error, ErrorKind, FrameStyle, StreamEncoder, sample_events};

pub const DEFAULT_BIND: &str = "127.0.0.1:8080";
pub const DEFAULT_INTERVAL_MS: u64 = 100;
pub const DEFAULT_MAX_STREAMS: usize = 64;

// Body chunks buffered between the producer and the connection.
const BODY_CHANNEL_CAPACITY: usize = 16;

#[derive(Clone, Debug)]
pub struct ServeConfig {
    pub bind: SocketAddr,
    pub interval_ms: u64,
    pub allow_non_loopback: bool,
    pub max_concurrent_streams: usize,
}

#[derive(Clone)]
struct AppState {
    interval: Duration,
    stream_semaphore: Arc<Semaphore>,
}

pub async fn serve(config: ServeConfig) -> Result<(), Error> {
    validate_config(&config)?;

    init_tracing();

    let app = router(&config);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .map_err(|err| {
            Error::new(ErrorKind::Io)
                .with_message("failed to bind server")
                .with_source(err)
        })?;
    tracing::info!(address = %config.bind, "server starting");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = shutdown_rx.await;
        })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => {
            result.map_err(server_error)?;
        }
        _ = shutdown_signal() => {
            tracing::info!("shutting down");
            let _ = shutdown_tx.send(());
            match tokio::time::timeout(Duration::from_secs(10), &mut server).await {
                Ok(result) => result.map_err(server_error)?,
                Err(_) => {
                    return Err(Error::new(ErrorKind::Io).with_message("server shutdown timed out"));
                }
            }
        }
    };
    Ok(())
}

pub fn router(config: &ServeConfig) -> Router {
    let state = Arc::new(AppState {
        interval: Duration::from_millis(config.interval_ms),
        stream_semaphore: Arc::new(Semaphore::new(config.max_concurrent_streams)),
    });
    Router::new()
        .route("/healthz", get(healthz))
        .route("/events", get(events))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn server_error(err: io::Error) -> Error {
    Error::new(ErrorKind::Io)
        .with_message("server failed")
        .with_source(err)
}

fn is_loopback(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => addr.is_loopback(),
        IpAddr::V6(addr) => addr.is_loopback(),
    }
}

pub fn validate_config(config: &ServeConfig) -> Result<(), Error> {
    if !is_loopback(config.bind.ip()) && !config.allow_non_loopback {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("non-loopback bind requires explicit opt-in")
            .with_hint("Re-run with --allow-non-loopback or use a loopback address."));
    }

    if config.interval_ms > 60_000 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--interval-ms must be at most 60000")
            .with_hint("Use a value like 100."));
    }

    if config.max_concurrent_streams == 0 {
        return Err(Error::new(ErrorKind::Usage)
            .with_message("--max-streams must be greater than zero")
            .with_hint("Use a positive value like 64."));
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    #[cfg(not(unix))]
    ctrl_c.await;
}

async fn healthz() -> Response {
    Json(json!({ "ok": true })).into_response()
}

/// `Write` sink whose flushed bytes become one response body chunk.
struct BodySink {
    tx: mpsc::Sender<Result<Bytes, Error>>,
    pending: Vec<u8>,
}

impl BodySink {
    fn new(tx: mpsc::Sender<Result<Bytes, Error>>) -> Self {
        Self {
            tx,
            pending: Vec::new(),
        }
    }
}

impl Write for BodySink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let chunk = Bytes::from(std::mem::take(&mut self.pending));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client disconnected"))
    }
}

async fn events(State(state): State<Arc<AppState>>) -> Response {
    let permit = match state.stream_semaphore.clone().try_acquire_owned() {
        Ok(permit) => permit,
        Err(_) => {
            return error_response_with_status(
                Error::new(ErrorKind::Io)
                    .with_message("too many concurrent event streams")
                    .with_hint("Try again later."),
                StatusCode::SERVICE_UNAVAILABLE,
            );
        }
    };
    let interval = state.interval;

    let (tx, rx) = mpsc::channel::<Result<Bytes, Error>>(BODY_CHANNEL_CAPACITY);
    tokio::task::spawn_blocking(move || {
        let _permit = permit;
        let mut encoder =
            StreamEncoder::with_style(BodySink::new(tx.clone()), FrameStyle::Lines);
        for (index, event) in sample_events().iter().enumerate() {
            if index > 0 && !interval.is_zero() {
                std::thread::sleep(interval);
            }
            if let Err(err) = encoder.encode(event) {
                if err.kind() == ErrorKind::Io {
                    tracing::debug!(error = %err, "event stream closed by client");
                } else {
                    tracing::error!(error = %err, "failed to encode event");
                    let _ = tx.blocking_send(Err(err));
                }
                return;
            }
        }
        tracing::debug!(records = encoder.records_written(), "event stream finished");
    });

    let stream = ReceiverStream::new(rx)
        .map(|result| result.map_err(|err| std::io::Error::other(err.to_string())));

    let mut response = Response::new(Body::from_stream(stream));
    response.headers_mut().insert(
        "content-type",
        HeaderValue::from_static("application/jsonl"),
    );
    response
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    kind: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

fn error_response_with_status(err: Error, status: StatusCode) -> Response {
    let body = ErrorEnvelope {
        error: ErrorBody {
            kind: format!("{:?}", err.kind()),
            message: err.message().unwrap_or("error").to_string(),
            hint: err.hint().map(str::to_string),
        },
    };
    (status, Json(body)).into_response()
}
