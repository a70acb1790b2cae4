//! 认证客户端
//!
//! 对接托管后端的认证接口：密码登录、令牌自省和登出。

use async_trait::async_trait;
use neuroscan_core::{
    AuthenticatedSession, NeuroscanError, Result, SessionProvider, SessionUser,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{check_response, transport_error, BackendClient, RequestKind};
use crate::rest_store::RestStore;

/// 认证接口返回的用户
#[derive(Debug, Clone, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl AuthUser {
    /// 注册时写入元数据的全名
    pub fn full_name(&self) -> Option<String> {
        self.user_metadata
            .get("full_name")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

impl From<AuthUser> for SessionUser {
    fn from(user: AuthUser) -> Self {
        SessionUser {
            full_name: user.full_name(),
            id: user.id,
            email: user.email,
        }
    }
}

/// 密码登录响应
#[derive(Debug, Clone, Deserialize)]
pub struct SignInResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub user: AuthUser,
}

#[derive(Debug, Serialize)]
struct PasswordCredentials<'a> {
    email: &'a str,
    password: &'a str,
}

/// 认证客户端
#[derive(Debug, Clone)]
pub struct AuthClient {
    client: BackendClient,
}

impl AuthClient {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }

    /// 邮箱密码登录
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<SignInResponse> {
        let url = self.client.endpoint("auth/v1/token");
        let request = self
            .client
            .http()
            .post(url)
            .query(&[("grant_type", "password")])
            .json(&PasswordCredentials { email, password });
        let request = self.client.authorize(request, None);

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, RequestKind::Write))?;
        let response = match check_response(response, RequestKind::Write).await {
            Ok(response) => response,
            // 登录失败一律按未认证处理
            Err(e) => return Err(NeuroscanError::Unauthenticated(e.user_message())),
        };

        let session = response
            .json::<SignInResponse>()
            .await
            .map_err(|e| NeuroscanError::Unauthenticated(format!("Invalid sign-in response: {}", e)))?;

        info!("User {} signed in", session.user.id);
        Ok(session)
    }

    /// 根据访问令牌获取当前用户
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser> {
        let url = self.client.endpoint("auth/v1/user");
        let request = self.client.authorize(self.client.http().get(url), Some(access_token));

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, RequestKind::Read))?;
        let response = check_response(response, RequestKind::Read)
            .await
            .map_err(|e| match e {
                NeuroscanError::Query(msg) => NeuroscanError::Unauthenticated(msg),
                other => other,
            })?;

        response
            .json::<AuthUser>()
            .await
            .map_err(|e| NeuroscanError::Unauthenticated(format!("Invalid user response: {}", e)))
    }

    /// 使令牌失效
    pub async fn sign_out(&self, access_token: &str) -> Result<()> {
        let url = self.client.endpoint("auth/v1/logout");
        let request = self.client.authorize(self.client.http().post(url), Some(access_token));

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, RequestKind::Write))?;
        check_response(response, RequestKind::Write).await?;
        debug!("Session signed out");
        Ok(())
    }
}

/// 基于托管认证的会话提供者
///
/// 每个会话拿到一个携带用户令牌的 `RestStore`，行级安全按该令牌生效。
#[derive(Debug, Clone)]
pub struct RestSessionProvider {
    client: BackendClient,
    auth: AuthClient,
}

impl RestSessionProvider {
    pub fn new(client: BackendClient) -> Self {
        let auth = AuthClient::new(client.clone());
        Self { client, auth }
    }
}

#[async_trait]
impl SessionProvider for RestSessionProvider {
    async fn resolve(&self, access_token: &str) -> Result<AuthenticatedSession> {
        let user: SessionUser = self.auth.get_user(access_token).await?.into();
        let store = Arc::new(RestStore::new(self.client.clone(), access_token));
        Ok(AuthenticatedSession { user, store })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<String> {
        Ok(self.auth.sign_in_with_password(email, password).await?.access_token)
    }
}
