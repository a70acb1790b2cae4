//! # NeuroScan管理模块
//!
//! 配置加载与校验、日志初始化

pub mod config;
pub mod logging;

pub use crate::config::{
    AuthConfig, BackendKind, BackendSettings, ConfigManager, DashboardConfig, LogFormat,
    LoggingConfig, NeuroscanConfig, ServerConfig, StaticToken,
};
pub use crate::logging::init_logging;
