//! 日志初始化

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};

/// 初始化全局日志订阅者
///
/// `RUST_LOG` 优先，其次是 `override_level`，最后是配置中的 `level`。
pub fn init_logging(config: &LoggingConfig, override_level: Option<&str>) -> Result<()> {
    let directives = override_level.unwrap_or(&config.level);
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(directives)
            .map_err(|e| anyhow::anyhow!("Invalid log level '{}': {}", directives, e))?,
    };

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.with_target);

    let installed = match config.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|e| anyhow::anyhow!("Failed to install tracing subscriber: {}", e))
}
