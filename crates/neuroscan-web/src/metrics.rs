//! Prometheus指标

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use neuroscan_core::{NeuroscanError, Result};
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

use crate::state::AppState;

/// 服务指标
#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    http_requests_total: IntCounterVec,
    mutations_total: IntCounterVec,
    backend_failures_total: IntCounterVec,
    active_sessions: IntGauge,
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("neuroscan_http_requests_total", "Total number of HTTP requests"),
            &["method", "status"],
        )?;

        let mutations_total = IntCounterVec::new(
            Opts::new("neuroscan_mutations_total", "Form submissions by kind and outcome"),
            &["kind", "outcome"],
        )?;

        let backend_failures_total = IntCounterVec::new(
            Opts::new(
                "neuroscan_backend_failures_total",
                "Failed reads against the data backend",
            ),
            &["operation"],
        )?;

        let active_sessions = IntGauge::with_opts(Opts::new(
            "neuroscan_active_sessions",
            "Number of open dashboard sessions",
        ))?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(mutations_total.clone()))?;
        registry.register(Box::new(backend_failures_total.clone()))?;
        registry.register(Box::new(active_sessions.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            mutations_total,
            backend_failures_total,
            active_sessions,
        })
    }

    pub fn record_request(&self, method: &str, status: u16) {
        self.http_requests_total
            .with_label_values(&[method, &status.to_string()])
            .inc();
    }

    pub fn record_mutation(&self, kind: &str, outcome: &str) {
        self.mutations_total.with_label_values(&[kind, outcome]).inc();
    }

    pub fn record_backend_failure(&self, operation: &str) {
        self.backend_failures_total
            .with_label_values(&[operation])
            .inc();
    }

    pub fn set_active_sessions(&self, count: usize) {
        self.active_sessions.set(count as i64);
    }

    /// 文本格式导出
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| NeuroscanError::Internal(format!("Failed to encode metrics: {}", e)))?;

        String::from_utf8(buffer)
            .map_err(|e| NeuroscanError::Internal(format!("Metrics are not valid UTF-8: {}", e)))
    }
}

/// 请求计数中间件
pub async fn track_requests(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let method = request.method().as_str().to_string();
    let response = next.run(request).await;
    state
        .metrics()
        .record_request(&method, response.status().as_u16());
    response
}
