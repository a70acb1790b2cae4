//! HTTP错误响应

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use neuroscan_core::NeuroscanError;
use serde_json::json;
use tracing::error;

/// 接口错误：状态码和原样展示的消息
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<NeuroscanError> for ApiError {
    fn from(err: NeuroscanError) -> Self {
        let status = match &err {
            NeuroscanError::NotFound(_) => StatusCode::NOT_FOUND,
            NeuroscanError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            NeuroscanError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            NeuroscanError::Permission(_) => StatusCode::FORBIDDEN,
            NeuroscanError::Query(_) | NeuroscanError::Network(_) => StatusCode::BAD_GATEWAY,
            NeuroscanError::Database(_)
            | NeuroscanError::Config(_)
            | NeuroscanError::Serialization(_)
            | NeuroscanError::Io(_)
            | NeuroscanError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        if status.is_server_error() {
            error!("Request failed: {}", err);
        }
        Self::new(status, err.user_message())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": true,
            "message": self.message,
            "status": self.status.as_u16()
        }));

        (self.status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (NeuroscanError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (NeuroscanError::Validation("x".into()), StatusCode::UNPROCESSABLE_ENTITY),
            (NeuroscanError::Unauthenticated("x".into()), StatusCode::UNAUTHORIZED),
            (NeuroscanError::Permission("x".into()), StatusCode::FORBIDDEN),
            (NeuroscanError::Query("x".into()), StatusCode::BAD_GATEWAY),
            (NeuroscanError::Database("x".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn test_message_is_unprefixed() {
        let err = ApiError::from(NeuroscanError::Validation(
            "duplicate key value violates unique constraint".into(),
        ));
        assert_eq!(err.message, "duplicate key value violates unique constraint");
    }
}
