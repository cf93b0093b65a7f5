//! Prometheus metrics and health/metrics HTTP endpoints

#[cfg(feature = "metrics")]
mod inner {
    use axum::{routing::get, Router};
    use once_cell::sync::Lazy;
    use prometheus::{IntCounter, IntGauge, Registry, TextEncoder};
    use std::net::SocketAddr;
    use tokio::sync::watch;
    use tracing::{error, info};

    pub static REGISTRY: Lazy<Registry> = Lazy::new(Registry::new);

    fn counter(name: &str, help: &str) -> IntCounter {
        let counter = IntCounter::new(name, help).unwrap();
        REGISTRY.register(Box::new(counter.clone())).unwrap();
        counter
    }

    fn gauge(name: &str, help: &str) -> IntGauge {
        let gauge = IntGauge::new(name, help).unwrap();
        REGISTRY.register(Box::new(gauge.clone())).unwrap();
        gauge
    }

    pub static LINES_READ: Lazy<IntCounter> =
        Lazy::new(|| counter("failwatch_lines_read_total", "Log lines read by all followers"));

    pub static FAILURES_SEEN: Lazy<IntCounter> =
        Lazy::new(|| counter("failwatch_failures_total", "Lines classified as failed logins"));

    pub static ALERTS_TOTAL: Lazy<IntCounter> =
        Lazy::new(|| counter("failwatch_alerts_total", "Alerts raised"));

    pub static TRACKED_KEYS: Lazy<IntGauge> =
        Lazy::new(|| gauge("failwatch_tracked_keys", "Source keys with a live window"));

    pub static ACTIVE_FOLLOWERS: Lazy<IntGauge> =
        Lazy::new(|| gauge("failwatch_active_followers", "Log files being followed"));

    pub static START_TIME: Lazy<IntGauge> = Lazy::new(|| {
        let gauge = gauge("failwatch_start_time_seconds", "Unix timestamp when failwatch started");
        gauge.set(chrono::Utc::now().timestamp());
        gauge
    });

    async fn health_handler() -> &'static str { "OK" }

    async fn metrics_handler() -> String {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        encoder.encode_to_string(&metric_families).unwrap_or_default()
    }

    async fn ready_handler(ready: axum::extract::State<watch::Receiver<bool>>) -> (axum::http::StatusCode, &'static str) {
        if *ready.borrow() {
            (axum::http::StatusCode::OK, "READY")
        } else {
            (axum::http::StatusCode::SERVICE_UNAVAILABLE, "NOT READY")
        }
    }

    pub async fn start_server(addr: SocketAddr, ready_rx: watch::Receiver<bool>) {
        let _ = &*START_TIME;
        let _ = &*ACTIVE_FOLLOWERS;
        let _ = &*TRACKED_KEYS;

        let app = Router::new()
            .route("/health", get(health_handler))
            .route("/ready", get(ready_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(ready_rx);

        info!("Metrics server listening on {}", addr);

        let listener = match tokio::net::TcpListener::bind(addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind metrics server to {}: {}", addr, e);
                return;
            }
        };

        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    }
}

#[cfg(feature = "metrics")]
pub use inner::*;

// Stub implementations when metrics feature is disabled
#[cfg(not(feature = "metrics"))]
pub mod stubs {
    use std::net::SocketAddr;
    use tokio::sync::watch;

    pub struct NoOpCounter;
    impl NoOpCounter {
        pub fn inc(&self) {}
    }

    pub struct NoOpGauge;
    impl NoOpGauge {
        pub fn inc(&self) {}
        pub fn dec(&self) {}
        pub fn set(&self, _: i64) {}
    }

    pub static LINES_READ: NoOpCounter = NoOpCounter;
    pub static FAILURES_SEEN: NoOpCounter = NoOpCounter;
    pub static ALERTS_TOTAL: NoOpCounter = NoOpCounter;
    pub static TRACKED_KEYS: NoOpGauge = NoOpGauge;
    pub static ACTIVE_FOLLOWERS: NoOpGauge = NoOpGauge;

    pub async fn start_server(_addr: SocketAddr, _ready_rx: watch::Receiver<bool>) {}
}

#[cfg(not(feature = "metrics"))]
pub use stubs::*;
