//! NeuroScan看板服务器主程序

use anyhow::Context;
use clap::{Parser, ValueEnum};
use neuroscan_admin::config::ConfigValidator;
use neuroscan_admin::{init_logging, AuthConfig, BackendKind, ConfigManager, NeuroscanConfig};
use neuroscan_core::{SessionProvider, SessionUser, SharedStore};
use neuroscan_database::{DatabasePool, MemoryStore, PgStore, PoolSettings};
use neuroscan_integration::{BackendClient, BackendConfig, RestSessionProvider};
use neuroscan_web::{AppState, CorsSettings, Metrics, StaticSessionProvider, WebServer, WorkspaceSettings};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// 数据后端
#[derive(Debug, Clone, Copy, ValueEnum)]
enum BackendArg {
    Memory,
    Postgres,
    Rest,
}

impl From<BackendArg> for BackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Memory => BackendKind::Memory,
            BackendArg::Postgres => BackendKind::Postgres,
            BackendArg::Rest => BackendKind::Rest,
        }
    }
}

/// 服务器命令行参数
#[derive(Parser, Debug)]
#[command(name = "neuroscan-server")]
#[command(about = "NeuroScan 脑部MRI临床看板服务器")]
struct Args {
    /// 服务器端口，覆盖配置文件
    #[arg(short, long)]
    port: Option<u16>,

    /// 监听地址，覆盖配置文件
    #[arg(long)]
    host: Option<String>,

    /// 配置文件路径
    #[arg(short, long)]
    config: Option<String>,

    /// 日志级别，覆盖配置文件
    #[arg(short, long)]
    log_level: Option<String>,

    /// 数据后端，覆盖配置文件
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,

    /// 输出生效的配置后退出
    #[arg(long)]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;

    if args.print_config {
        println!("{}", config.to_toml_string()?);
        return Ok(());
    }

    init_logging(&config.logging, args.log_level.as_deref())?;

    info!("Starting NeuroScan server...");
    info!("  Backend: {:?}", config.backend.kind);
    info!("  Listen: {}:{}", config.server.host, config.server.port);

    let sessions = build_session_provider(&config).await?;
    let metrics = Metrics::new().context("Failed to register metrics")?;
    let settings = WorkspaceSettings {
        toast_limit: config.dashboard.toast_limit,
        toast_ttl: Duration::from_secs(config.dashboard.toast_ttl_secs),
        idle_timeout: Duration::from_secs(config.dashboard.session_idle_secs),
    };
    let state = AppState::new(sessions, settings, metrics);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid listen address")?;
    let cors = CorsSettings {
        enabled: config.server.enable_cors,
        allowed_origins: config.server.cors_allowed_origins.clone(),
    };

    if let Err(e) = WebServer::new(addr, state, &cors).run().await {
        error!("Server failed: {:#}", e);
        return Err(e);
    }

    info!("NeuroScan server stopped");
    Ok(())
}

/// 加载配置并应用命令行覆盖
fn load_config(args: &Args) -> anyhow::Result<NeuroscanConfig> {
    let mut config = ConfigManager::load(args.config.as_deref())?.into_config();

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(backend) = args.backend {
        config.backend.kind = backend.into();
    }

    ConfigValidator::validate(&config)?;
    Ok(config)
}

async fn build_session_provider(config: &NeuroscanConfig) -> anyhow::Result<Arc<dyn SessionProvider>> {
    let backend = &config.backend;
    match backend.kind {
        BackendKind::Rest => {
            let client = BackendClient::new(BackendConfig {
                url: backend.url.clone().context("backend.url is required")?,
                anon_key: backend.anon_key.clone().context("backend.anon_key is required")?,
                timeout: Duration::from_secs(backend.request_timeout_secs),
            })
            .context("Failed to create backend client")?;
            info!("Using hosted backend at {}", client.config().url);
            Ok(Arc::new(RestSessionProvider::new(client)))
        }
        BackendKind::Postgres => {
            let pool = DatabasePool::new(&PoolSettings {
                database_url: backend
                    .database_url
                    .clone()
                    .context("backend.database_url is required")?,
                max_connections: backend.max_connections,
                acquire_timeout: Duration::from_secs(backend.connect_timeout_secs),
            })
            .await
            .context("Failed to connect to PostgreSQL")?;

            let store = PgStore::new(pool);
            if backend.bootstrap_schema {
                store
                    .create_tables()
                    .await
                    .context("Failed to create database schema")?;
                info!("Database schema is ready");
            }
            Ok(static_provider(Arc::new(store), &config.auth))
        }
        BackendKind::Memory => {
            warn!("Using in-memory store; data is lost on restart");
            Ok(static_provider(Arc::new(MemoryStore::new()), &config.auth))
        }
    }
}

fn static_provider(store: SharedStore, auth: &AuthConfig) -> Arc<dyn SessionProvider> {
    if auth.static_tokens.is_empty() {
        warn!("No auth.static_tokens configured; all API requests will be rejected");
    }

    let provider = auth
        .static_tokens
        .iter()
        .fold(StaticSessionProvider::new(store), |provider, entry| {
            provider.with_token(
                entry.token.clone(),
                SessionUser {
                    id: entry.user_id,
                    email: entry.email.clone(),
                    full_name: entry.full_name.clone(),
                },
            )
        });
    info!("Loaded {} static session tokens", provider.token_count());
    Arc::new(provider)
}

