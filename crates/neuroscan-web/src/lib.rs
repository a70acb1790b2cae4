//! # NeuroScan Web服务
//!
//! 看板的HTTP接口：认证、看板视图、患者建档、扫描上传和通知

pub mod auth;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod server;
pub mod state;

pub use auth::StaticSessionProvider;
pub use error::{ApiError, ApiResult};
pub use metrics::Metrics;
pub use server::{CorsSettings, WebServer};
pub use state::{AppState, Workspace, WorkspaceSettings};
