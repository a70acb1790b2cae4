//! 托管后端REST客户端
//!
//! 表接口遵循 `/rest/v1/<table>?select=...&<column>=eq.<value>&order=<column>.<dir>` 约定。

use neuroscan_core::{NeuroscanError, Result};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 后端连接配置
#[derive(Debug, Clone)]
pub struct BackendConfig {
    /// 项目地址，例如 `https://xyz.example.co`
    pub url: String,
    /// 公开的匿名密钥
    pub anon_key: String,
    pub timeout: Duration,
}

/// 后端返回的错误体
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl ErrorBody {
    fn into_message(self) -> Option<String> {
        self.message
            .or(self.error_description)
            .or(self.msg)
            .or(self.error)
    }
}

/// 请求类型，决定错误如何归类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    Read,
    Write,
}

/// 把非成功响应转换为统一错误，保留后端消息原文
pub(crate) fn classify_error(status: StatusCode, body: &str, kind: RequestKind) -> NeuroscanError {
    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("Request failed with status {}", status)
            } else {
                body.trim().to_string()
            }
        });

    match status {
        StatusCode::UNAUTHORIZED => NeuroscanError::Unauthenticated(message),
        StatusCode::FORBIDDEN => NeuroscanError::Permission(message),
        s if kind == RequestKind::Write && s.is_client_error() => NeuroscanError::Validation(message),
        _ if kind == RequestKind::Read => NeuroscanError::Query(message),
        _ => NeuroscanError::Database(message),
    }
}

/// 传输层错误
pub(crate) fn transport_error(err: reqwest::Error, kind: RequestKind) -> NeuroscanError {
    match kind {
        RequestKind::Read => NeuroscanError::Query(err.to_string()),
        RequestKind::Write => NeuroscanError::Network(err.to_string()),
    }
}

/// 检查响应状态，失败时读取错误体
pub(crate) async fn check_response(response: Response, kind: RequestKind) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(classify_error(status, &body, kind))
}

/// 后端客户端
#[derive(Debug, Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    config: Arc<BackendConfig>,
}

impl BackendClient {
    pub fn new(config: BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| NeuroscanError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &BackendConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// 拼接后端地址
    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// 添加认证头：匿名密钥 + 用户令牌（无令牌时使用匿名密钥）
    pub(crate) fn authorize(&self, request: RequestBuilder, access_token: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", &self.config.anon_key)
            .bearer_auth(access_token.unwrap_or(self.config.anon_key.as_str()))
    }

    /// 开始构建表查询
    pub fn from(&self, table: &str) -> TableQuery<'_> {
        TableQuery {
            client: self,
            table: table.to_string(),
            params: Vec::new(),
            access_token: None,
        }
    }
}

/// 表查询构建器
#[derive(Debug)]
pub struct TableQuery<'a> {
    client: &'a BackendClient,
    table: String,
    params: Vec<(String, String)>,
    access_token: Option<String>,
}

impl<'a> TableQuery<'a> {
    /// 选择列，支持嵌入式关联，例如 `*,predictions(*)`
    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    /// 等值过滤
    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.params.push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// 排序；`column` 可以是嵌入资源的 `predictions.created_at` 形式
    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        match column.rsplit_once('.') {
            Some((resource, field)) => self
                .params
                .push((format!("{}.order", resource), format!("{}.{}", field, direction))),
            None => self
                .params
                .push(("order".to_string(), format!("{}.{}", column, direction))),
        }
        self
    }

    /// 以用户身份发起请求
    pub fn with_token(mut self, access_token: &str) -> Self {
        self.access_token = Some(access_token.to_string());
        self
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.params
    }

    fn url(&self) -> String {
        self.client.endpoint(&format!("rest/v1/{}", self.table))
    }

    /// 读取全部匹配的行
    pub async fn fetch<T: DeserializeOwned>(self) -> Result<Vec<T>> {
        debug!("GET {} {:?}", self.table, self.params);
        let request = self.client.http().get(self.url()).query(&self.params);
        let request = self.client.authorize(request, self.access_token.as_deref());

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, RequestKind::Read))?;
        let response = check_response(response, RequestKind::Read).await?;

        response
            .json::<Vec<T>>()
            .await
            .map_err(|e| NeuroscanError::Query(format!("Invalid response from {}: {}", self.table, e)))
    }

    /// 读取至多一行
    pub async fn maybe_single<T: DeserializeOwned>(self) -> Result<Option<T>> {
        Ok(self.fetch::<T>().await?.into_iter().next())
    }

    /// 插入一行并返回后端生成的完整记录
    pub async fn insert<B, T>(self, row: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        debug!("POST {}", self.table);
        let request = self
            .client
            .http()
            .post(self.url())
            .query(&self.params)
            .header("Prefer", "return=representation")
            .json(row);
        let request = self.client.authorize(request, self.access_token.as_deref());

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(e, RequestKind::Write))?;
        let response = check_response(response, RequestKind::Write).await?;

        let mut rows = response
            .json::<Vec<T>>()
            .await
            .map_err(|e| NeuroscanError::Database(format!("Invalid response from {}: {}", self.table, e)))?;
        if rows.is_empty() {
            return Err(NeuroscanError::Database(format!(
                "Insert into {} returned no rows",
                self.table
            )));
        }
        Ok(rows.remove(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> BackendClient {
        BackendClient::new(BackendConfig {
            url: "https://backend.test/".to_string(),
            anon_key: "anon".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[test]
    fn test_query_builder_params() {
        let client = client();
        let query = client
            .from("scans")
            .select("*,predictions(*)")
            .eq("patient_id", "p1")
            .order("created_at", false)
            .order("predictions.created_at", false);

        let pairs: Vec<(&str, &str)> = query
            .query_pairs()
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("select", "*,predictions(*)"),
                ("patient_id", "eq.p1"),
                ("order", "created_at.desc"),
                ("predictions.order", "created_at.desc"),
            ]
        );
        assert_eq!(query.url(), "https://backend.test/rest/v1/scans");
    }

    #[test]
    fn test_classify_error_keeps_backend_message() {
        let body = r#"{"code":"23505","details":null,"hint":null,"message":"duplicate key value violates unique constraint \"patients_patient_id_key\""}"#;
        let err = classify_error(StatusCode::CONFLICT, body, RequestKind::Write);
        assert!(matches!(err, NeuroscanError::Validation(_)));
        assert_eq!(
            err.user_message(),
            "duplicate key value violates unique constraint \"patients_patient_id_key\""
        );

        let err = classify_error(StatusCode::BAD_REQUEST, "", RequestKind::Read);
        assert!(matches!(err, NeuroscanError::Query(ref m) if m.contains("400")));

        let err = classify_error(StatusCode::UNAUTHORIZED, r#"{"message":"JWT expired"}"#, RequestKind::Read);
        assert!(matches!(err, NeuroscanError::Unauthenticated(ref m) if m == "JWT expired"));

        let err = classify_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
            RequestKind::Write,
        );
        assert_eq!(err.user_message(), "Invalid login credentials");
    }
}
