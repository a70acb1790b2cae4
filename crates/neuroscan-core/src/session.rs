//! 认证会话接口

use async_trait::async_trait;

use crate::error::{NeuroscanError, Result};
use crate::models::SessionUser;
use crate::store::SharedStore;

/// 已认证的会话：当前用户以及按该会话限定的存储
#[derive(Clone)]
pub struct AuthenticatedSession {
    pub user: SessionUser,
    pub store: SharedStore,
}

impl std::fmt::Debug for AuthenticatedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedSession")
            .field("user", &self.user)
            .field("store", &self.store.backend_name())
            .finish()
    }
}

/// 会话提供者
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// 根据访问令牌解析会话
    async fn resolve(&self, access_token: &str) -> Result<AuthenticatedSession>;

    /// 邮箱密码登录，返回访问令牌
    async fn sign_in(&self, _email: &str, _password: &str) -> Result<String> {
        Err(NeuroscanError::Permission(
            "Password sign-in is not supported by this session provider".to_string(),
        ))
    }
}
