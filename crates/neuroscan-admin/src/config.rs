//! 配置管理
//!
//! 默认值 < 配置文件 < `NEUROSCAN_` 环境变量（嵌套字段用 `__` 分隔，
//! 例如 `NEUROSCAN_SERVER__PORT=8080`）。

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// 系统完整配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NeuroscanConfig {
    /// 服务器配置
    pub server: ServerConfig,
    /// 数据后端配置
    pub backend: BackendSettings,
    /// 认证配置
    pub auth: AuthConfig,
    /// 看板配置
    pub dashboard: DashboardConfig,
    /// 日志配置
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// 服务器名称
    pub name: String,
    /// 监听主机
    pub host: String,
    /// 监听端口
    pub port: u16,
    /// 启用CORS
    pub enable_cors: bool,
    /// CORS允许的源，为空表示任意
    pub cors_allowed_origins: Vec<String>,
}

/// 数据后端类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// 进程内存储，仅用于开发和演示
    Memory,
    /// 自托管PostgreSQL
    Postgres,
    /// 托管后端REST接口
    Rest,
}

/// 数据后端配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub kind: BackendKind,
    /// 托管后端地址（rest）
    pub url: Option<String>,
    /// 托管后端匿名密钥（rest）
    pub anon_key: Option<String>,
    /// 连接字符串（postgres）
    pub database_url: Option<String>,
    /// 最大连接数（postgres）
    pub max_connections: u32,
    /// 获取连接超时（秒）
    pub connect_timeout_secs: u64,
    /// 单次请求超时（秒，rest）
    pub request_timeout_secs: u64,
    /// 启动时创建表结构（postgres）
    pub bootstrap_schema: bool,
}

/// 开发用静态令牌
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StaticToken {
    pub token: String,
    pub user_id: Uuid,
    pub email: Option<String>,
    pub full_name: Option<String>,
}

/// 认证配置
///
/// rest 后端使用托管认证；memory/postgres 后端使用这里配置的静态令牌。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    pub static_tokens: Vec<StaticToken>,
}

/// 看板配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// 同时保留的通知数
    pub toast_limit: usize,
    /// 通知存活时间（秒）
    pub toast_ttl_secs: u64,
    /// 会话空闲多久后回收看板状态（秒）
    pub session_idle_secs: u64,
}

/// 日志格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Full,
    Compact,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// 过滤指令，例如 `info,neuroscan_web=debug`
    pub level: String,
    pub format: LogFormat,
    pub with_target: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            name: "neuroscan".to_string(),
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            cors_allowed_origins: Vec::new(),
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::Memory,
            url: None,
            anon_key: None,
            database_url: None,
            max_connections: 10,
            connect_timeout_secs: 30,
            request_timeout_secs: 15,
            bootstrap_schema: false,
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            toast_limit: 3,
            toast_ttl_secs: 10,
            session_idle_secs: 3600,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Full,
            with_target: true,
        }
    }
}

impl NeuroscanConfig {
    /// 以TOML格式输出生效的配置
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

/// 配置管理器
#[derive(Debug)]
pub struct ConfigManager {
    config: NeuroscanConfig,
    config_path: Option<String>,
}

impl ConfigManager {
    /// 加载并校验配置；未给出路径时只使用默认值和环境变量
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        ConfigValidator::validate(&config)?;

        Ok(Self {
            config,
            config_path: config_path.map(str::to_string),
        })
    }

    /// 从文件和环境变量加载配置
    fn load_config(config_path: Option<&str>) -> Result<NeuroscanConfig> {
        let defaults = Config::try_from(&NeuroscanConfig::default())
            .context("Failed to build default configuration")?;

        let mut builder = Config::builder().add_source(defaults);
        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path));
        }
        let settings = builder
            .add_source(
                Environment::with_prefix("NEUROSCAN")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()
            .context("Failed to load configuration sources")?;

        let config: NeuroscanConfig = settings
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        match config_path {
            Some(path) => info!("Configuration loaded successfully from: {}", path),
            None => info!("Configuration loaded from defaults and environment"),
        }
        Ok(config)
    }

    pub fn config(&self) -> &NeuroscanConfig {
        &self.config
    }

    pub fn config_path(&self) -> Option<&str> {
        self.config_path.as_deref()
    }

    pub fn into_config(self) -> NeuroscanConfig {
        self.config
    }
}

/// 配置校验
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &NeuroscanConfig) -> Result<()> {
        if config.server.port == 0 {
            anyhow::bail!("server.port must be greater than 0");
        }
        if config.dashboard.toast_limit == 0 {
            anyhow::bail!("dashboard.toast_limit must be at least 1");
        }

        let backend = &config.backend;
        match backend.kind {
            BackendKind::Rest => {
                let url = non_empty(&backend.url)
                    .ok_or_else(|| anyhow::anyhow!("backend.url is required for the rest backend"))?;
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    anyhow::bail!("backend.url must start with http:// or https://");
                }
                if non_empty(&backend.anon_key).is_none() {
                    anyhow::bail!("backend.anon_key is required for the rest backend");
                }
            }
            BackendKind::Postgres => {
                if non_empty(&backend.database_url).is_none() {
                    anyhow::bail!("backend.database_url is required for the postgres backend");
                }
                if backend.max_connections == 0 {
                    anyhow::bail!("backend.max_connections must be at least 1");
                }
            }
            BackendKind::Memory => {}
        }

        if backend.kind != BackendKind::Rest {
            let mut seen = std::collections::HashSet::new();
            for token in &config.auth.static_tokens {
                if token.token.trim().is_empty() {
                    anyhow::bail!("auth.static_tokens entries must have a non-empty token");
                }
                if !seen.insert(token.token.as_str()) {
                    anyhow::bail!("auth.static_tokens contains a duplicate token");
                }
            }
        }

        Ok(())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = NeuroscanConfig::default();
        assert!(ConfigValidator::validate(&config).is_ok());
        assert_eq!(config.backend.kind, BackendKind::Memory);
    }

    #[test]
    fn test_rest_backend_requires_url_and_key() {
        let mut config = NeuroscanConfig::default();
        config.backend.kind = BackendKind::Rest;
        assert!(ConfigValidator::validate(&config).is_err());

        config.backend.url = Some("backend.test".to_string());
        config.backend.anon_key = Some("anon".to_string());
        assert!(ConfigValidator::validate(&config).is_err());

        config.backend.url = Some("https://backend.test".to_string());
        assert!(ConfigValidator::validate(&config).is_ok());
    }

    #[test]
    fn test_duplicate_static_tokens_rejected() {
        let mut config = NeuroscanConfig::default();
        let token = StaticToken {
            token: "dev".to_string(),
            user_id: Uuid::new_v4(),
            email: None,
            full_name: None,
        };
        config.auth.static_tokens = vec![token.clone(), token];
        assert!(ConfigValidator::validate(&config).is_err());
    }

    #[test]
    fn test_toml_round_trip_through_config_sources() {
        let mut original = NeuroscanConfig::default();
        original.server.port = 9090;
        original.auth.static_tokens.push(StaticToken {
            token: "dev-token".to_string(),
            user_id: Uuid::new_v4(),
            email: Some("dev@clinic.test".to_string()),
            full_name: None,
        });

        let rendered = original.to_toml_string().unwrap();
        let loaded: NeuroscanConfig = Config::builder()
            .add_source(File::from_str(&rendered, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(loaded.server.port, 9090);
        assert_eq!(loaded.auth.static_tokens, original.auth.static_tokens);
    }
}
