//! Web服务器

use anyhow::Context;
use axum::{
    http::HeaderValue,
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::net::SocketAddr;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::auth::{auth_middleware, login_handler};
use crate::handlers::{
    api_root, create_patient, dismiss_notification, get_dashboard, health, list_notifications,
    list_patient_scans, list_patients, metrics_handler, refresh_dashboard, update_selection,
    upload_scan,
};
use crate::metrics::track_requests;
use crate::state::AppState;

/// 跨域设置
#[derive(Debug, Clone, Default)]
pub struct CorsSettings {
    pub enabled: bool,
    /// 为空表示允许任意源
    pub allowed_origins: Vec<String>,
}

pub struct WebServer {
    addr: SocketAddr,
    state: AppState,
    app: Router,
}

impl WebServer {
    pub fn new(addr: SocketAddr, state: AppState, cors: &CorsSettings) -> Self {
        let app = Self::create_app(state.clone(), cors);
        Self { addr, state, app }
    }

    pub fn create_app(state: AppState, cors: &CorsSettings) -> Router {
        let app = Router::new()
            // 无需token
            .route("/", get(api_root))
            .route("/health", get(health))
            .route("/metrics", get(metrics_handler))
            .route("/auth/login", post(login_handler))
            // API路由
            .nest("/api/v1", api_routes(state.clone()))
            .layer(middleware::from_fn_with_state(state.clone(), track_requests))
            .with_state(state);

        let app = if cors.enabled {
            app.layer(cors_layer(&cors.allowed_origins))
        } else {
            app
        };

        app.layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
    }

    pub async fn run(self) -> anyhow::Result<()> {
        info!("Starting web server on {}", self.addr);

        let evictor = tokio::spawn(evict_idle_workspaces(self.state.clone()));

        let listener = tokio::net::TcpListener::bind(self.addr)
            .await
            .with_context(|| format!("Failed to bind {}", self.addr))?;
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .context("Web server terminated unexpectedly");

        evictor.abort();
        served
    }
}

/// API v1 路由，全部需要认证
fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(get_dashboard))
        .route("/dashboard/refresh", post(refresh_dashboard))
        .route("/dashboard/selection", put(update_selection))
        .route("/patients", get(list_patients).post(create_patient))
        .route(
            "/patients/:id/scans",
            get(list_patient_scans).post(upload_scan),
        )
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id", delete(dismiss_notification))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allowed_origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin: {}", origin);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

async fn evict_idle_workspaces(state: AppState) {
    let period = (state.settings().idle_timeout / 4).max(Duration::from_secs(1));
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        state.evict_idle().await;
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
