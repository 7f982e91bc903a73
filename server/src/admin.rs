//! HTTP admin server.
//!
//! - `GET /health` - liveness, always 200
//! - `GET /ready` - 200 while relaying, 503 once shutdown has been requested
//! - `GET /metrics` - every registered metriken metric in Prometheus text
//!   format, kernel and relay alike

use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Running admin server. Dropping it without [`shutdown`](Self::shutdown)
/// leaves the thread serving until the process exits.
pub struct AdminHandle {
    local_addr: SocketAddr,
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
    join_handle: std::thread::JoinHandle<()>,
}

impl AdminHandle {
    /// The bound address, after port 0 has been resolved.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stop serving and wait for the admin thread.
    pub fn shutdown(self) {
        let _ = self.shutdown_tx.send(());
        let _ = self.join_handle.join();
    }
}

pub struct AdminConfig {
    pub address: SocketAddr,
    /// Raised when the relay is shutting down; flips `/ready` to 503.
    pub shutdown: Arc<AtomicBool>,
}

/// Bind the admin socket and serve it on a dedicated thread with a
/// current-thread Tokio runtime, away from the selector.
///
/// Binding happens here, so an address conflict is reported to the caller.
pub fn start(config: AdminConfig) -> std::io::Result<AdminHandle> {
    let listener = std::net::TcpListener::bind(config.address)?;
    listener.set_nonblocking(true)?;
    let local_addr = listener.local_addr()?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let shutdown = config.shutdown;

    let join_handle = std::thread::Builder::new()
        .name("admin".to_string())
        .spawn(move || {
            runtime.block_on(serve(listener, shutdown, shutdown_rx));
        })?;

    tracing::info!(addr = %local_addr, "admin server listening");

    Ok(AdminHandle {
        local_addr,
        shutdown_tx,
        join_handle,
    })
}

async fn serve(
    listener: std::net::TcpListener,
    shutdown: Arc<AtomicBool>,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) {
    let listener = match tokio::net::TcpListener::from_std(listener) {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, "failed to register admin listener");
            return;
        }
    };

    let app = Router::new()
        .route("/health", get(|| async { (StatusCode::OK, "OK") }))
        .route(
            "/ready",
            get(move || {
                let shutdown = shutdown.clone();
                async move { ready(&shutdown) }
            }),
        )
        .route("/metrics", get(metrics_handler));

    tokio::select! {
        result = axum::serve(listener, app) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "admin server error");
            }
        }
        _ = shutdown_rx => {}
    }

    tracing::debug!("admin server stopped");
}

fn ready(shutdown: &AtomicBool) -> (StatusCode, &'static str) {
    if shutdown.load(Ordering::Relaxed) {
        (StatusCode::SERVICE_UNAVAILABLE, "Shutting down")
    } else {
        (StatusCode::OK, "OK")
    }
}

async fn metrics_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4; charset=utf-8")],
        render_metrics(),
    )
}

/// Counters and gauges from the metriken registry in Prometheus text
/// format. Other metric kinds are skipped.
pub fn render_metrics() -> String {
    let mut output = String::with_capacity(2048);

    for metric in metriken::metrics().iter() {
        let name = prometheus_name(metric.name());
        if name.is_empty() {
            continue;
        }

        match metric.value() {
            Some(metriken::Value::Counter(v)) => {
                let _ = writeln!(output, "# TYPE {name} counter\n{name} {v}");
            }
            Some(metriken::Value::Gauge(v)) => {
                let _ = writeln!(output, "# TYPE {name} gauge\n{name} {v}");
            }
            _ => {}
        }
    }

    output
}

fn prometheus_name(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
