//! Sample target service with three latency profiles.
//!
//! # Endpoints
//!
//! - `GET /api/fast` - answers immediately
//! - `GET /api/slow` - answers after a 500ms async delay
//! - `GET /api/heavy` - answers after a CPU-bound loop on the blocking pool
//! - `GET /health` - liveness probe

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use serde_json::json;
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Delay of the slow endpoint.
pub const SLOW_DELAY: Duration = Duration::from_millis(500);

/// Loop length of the heavy endpoint.
pub const HEAVY_ITERATIONS: u32 = 1_000_000;

/// Builds the router with request tracing.
pub fn router() -> Router {
    Router::new()
        .route("/api/fast", get(fast_handler))
        .route("/api/slow", get(slow_handler))
        .route("/api/heavy", get(heavy_handler))
        .route("/health", get(health_handler))
        .layer(TraceLayer::new_for_http())
}

/// Serves the router until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
}

/// Sum of `sqrt(i * PI)` for `i < iterations`.
pub fn heavy_computation(iterations: u32) -> f64 {
    (0..iterations)
        .map(|i| (f64::from(i) * std::f64::consts::PI).sqrt())
        .sum()
}

async fn fast_handler() -> &'static str {
    "fast response"
}

async fn slow_handler() -> &'static str {
    tokio::time::sleep(SLOW_DELAY).await;
    "slow response"
}

async fn heavy_handler() -> Result<String, StatusCode> {
    let result = tokio::task::spawn_blocking(|| heavy_computation(HEAVY_ITERATIONS))
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Heavy computation failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(format!("processing complete {result}"))
}

async fn health_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use tokio::sync::oneshot;

    async fn start() -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<std::io::Result<()>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(listener, async move {
            let _ = rx.await;
        }));
        (addr, tx, handle)
    }

    #[test]
    fn test_heavy_computation() {
        let pi = std::f64::consts::PI;
        let expected = pi.sqrt() + (2.0 * pi).sqrt();
        assert!((heavy_computation(3) - expected).abs() < 1e-12);
        assert_eq!(heavy_computation(0), 0.0);
    }

    #[tokio::test]
    async fn test_endpoints() {
        let (addr, shutdown, handle) = start().await;
        let client = reqwest::Client::new();

        let fast = client.get(format!("http://{addr}/api/fast")).send().await.unwrap();
        assert_eq!(fast.status(), 200);
        assert_eq!(fast.text().await.unwrap(), "fast response");

        let started = std::time::Instant::now();
        let slow = client.get(format!("http://{addr}/api/slow")).send().await.unwrap();
        assert_eq!(slow.status(), 200);
        assert!(started.elapsed() >= SLOW_DELAY);

        let heavy = client.get(format!("http://{addr}/api/heavy")).send().await.unwrap();
        assert_eq!(heavy.status(), 200);
        assert!(heavy.text().await.unwrap().starts_with("processing complete "));

        let health: serde_json::Value = client
            .get(format!("http://{addr}/health"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(health["status"], "healthy");

        let missing = client.get(format!("http://{addr}/api/other")).send().await.unwrap();
        assert_eq!(missing.status(), 404);

        shutdown.send(()).unwrap();
        handle.await.unwrap().unwrap();
    }
}
