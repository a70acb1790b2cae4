//! 认证：Bearer令牌中间件、登录接口和开发用静态令牌

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use neuroscan_core::{AuthenticatedSession, NeuroscanError, Result, SessionProvider, SessionUser, SharedStore};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{info, warn};

use crate::error::ApiResult;
use crate::state::AppState;

/// 静态令牌会话提供者
///
/// 用于 memory/postgres 后端：令牌在配置中与用户一一对应，所有会话共享同一个存储。
pub struct StaticSessionProvider {
    store: SharedStore,
    users: HashMap<String, SessionUser>,
}

impl StaticSessionProvider {
    pub fn new(store: SharedStore) -> Self {
        Self {
            store,
            users: HashMap::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, user: SessionUser) -> Self {
        self.users.insert(token.into(), user);
        self
    }

    pub fn token_count(&self) -> usize {
        self.users.len()
    }
}

#[async_trait]
impl SessionProvider for StaticSessionProvider {
    async fn resolve(&self, access_token: &str) -> Result<AuthenticatedSession> {
        let user = self
            .users
            .get(access_token)
            .cloned()
            .ok_or_else(|| NeuroscanError::Unauthenticated("Invalid or expired session".to_string()))?;

        Ok(AuthenticatedSession {
            user,
            store: self.store.clone(),
        })
    }
}

/// 取出 `Authorization: Bearer <token>` 中的令牌
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// 认证中间件：解析会话并把工作区放入请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> ApiResult<Response> {
    let token = bearer_token(request.headers())
        .ok_or_else(|| NeuroscanError::Unauthenticated("Missing bearer token".to_string()))?
        .to_string();

    let workspace = state.workspace(&token).await.map_err(|e| {
        warn!("Rejected session: {}", e);
        e
    })?;

    request.extensions_mut().insert(workspace);
    Ok(next.run(request).await)
}

/// 登录请求
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// 登录响应
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

/// 登录处理器
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> ApiResult<impl IntoResponse> {
    info!("Login attempt for: {}", request.email);

    match state.sessions().sign_in(&request.email, &request.password).await {
        Ok(access_token) => {
            info!("User signed in: {}", request.email);
            Ok(Json(LoginResponse {
                access_token,
                token_type: "bearer",
            }))
        }
        Err(e) => {
            warn!("Login failed for {}: {}", request.email, e);
            Err(e.into())
        }
    }
}
