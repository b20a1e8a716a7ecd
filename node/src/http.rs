//! HTTP surface for the chainpulse daemon.
//!
//! Serves readiness, the last committed snapshot, and Prometheus metrics
//! on a loopback port for monitoring and orchestration systems.

use crate::metrics;
use chainpulse_stats::StatsState;
use hyper::{
    service::{make_service_fn, service_fn},
    Body, Method, Request, Response, Server, StatusCode,
};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;

#[derive(Serialize)]
struct HealthStatus {
    status: &'static str,
    version: &'static str,
    ready: bool,
    latest_height: u64,
    commits: u64,
    stale_discards: u64,
}

/// Serves the HTTP surface until the process exits.
pub async fn serve(addr: SocketAddr, state: Arc<StatsState>) -> anyhow::Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let state = state.clone();
        async move {
            Ok::<_, hyper::Error>(service_fn(move |req| {
                let state = state.clone();
                async move { handle_request(req, state).await }
            }))
        }
    });

    Server::bind(&addr).serve(make_svc).await?;
    Ok(())
}

async fn handle_request(
    req: Request<Body>,
    state: Arc<StatsState>,
) -> Result<Response<Body>, hyper::Error> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/healthz") | (&Method::GET, "/readyz") => {
            // Ready once the first snapshot has been committed.
            let ready = state.is_ready();
            let body = HealthStatus {
                status: if ready { "ok" } else { "starting" },
                version: env!("CARGO_PKG_VERSION"),
                ready,
                latest_height: state.latest_height(),
                commits: state.commits(),
                stale_discards: state.stale_discards(),
            };
            let json = serde_json::to_string(&body).unwrap_or_else(|_| r#"{"status":"ok"}"#.into());
            let mut resp = Response::new(Body::from(json));
            if !ready {
                *resp.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
            }
            Ok(resp)
        }
        (&Method::GET, "/stats") => match state.last_stats() {
            Some(stats) => {
                let json = serde_json::to_string(&stats).unwrap_or_else(|_| "{}".into());
                Ok(Response::new(Body::from(json)))
            }
            None => {
                let mut resp = Response::new(Body::from("no snapshot committed yet"));
                *resp.status_mut() = StatusCode::SERVICE_UNAVAILABLE;
                Ok(resp)
            }
        },
        (&Method::GET, "/metrics") => {
            let body = metrics::gather();
            Ok(Response::new(Body::from(body)))
        }
        _ => {
            let mut not_found = Response::new(Body::from("not found"));
            *not_found.status_mut() = StatusCode::NOT_FOUND;
            Ok(not_found)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chainpulse_stats::{LogPublisher, Stats};

    fn committed_state() -> Arc<StatsState> {
        let state = Arc::new(StatsState::new());
        let stats = Stats {
            latest_height: 1000,
            window_size: 9,
            elapsed_seconds: 90.0,
            total_transactions: 50,
            tx_per_second: 0.56,
            block_time_seconds: 10.0,
            seconds_since_last_block: 12.0,
        };
        assert!(state.try_commit(stats, &LogPublisher));
        state
    }

    async fn get(path: &str, state: Arc<StatsState>) -> (StatusCode, String) {
        let req = Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let resp = handle_request(req, state).await.unwrap();
        let status = resp.status();
        let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn healthz_reports_starting_before_first_commit() {
        let state = Arc::new(StatsState::new());

        let (status, body) = get("/healthz", state).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body.contains(r#""status":"starting""#));
        assert!(body.contains(r#""ready":false"#));
    }

    #[tokio::test]
    async fn healthz_reports_ok_after_first_commit() {
        let (status, body) = get("/healthz", committed_state()).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#""status":"ok""#));
        assert!(body.contains(r#""latest_height":1000"#));
    }

    #[tokio::test]
    async fn stats_returns_503_before_first_commit() {
        let (status, _) = get("/stats", Arc::new(StatsState::new())).await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn stats_returns_the_last_snapshot() {
        let (status, body) = get("/stats", committed_state()).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains(r#""latestHeight":1000"#));
        assert!(body.contains(r#""txPerSecond":0.56"#));
    }

    #[tokio::test]
    async fn metrics_returns_prometheus_text() {
        let (status, body) = get("/metrics", committed_state()).await;

        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("chainpulse_commits_total"));
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let (status, _) = get("/nope", committed_state()).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
