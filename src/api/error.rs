//! HTTP 错误响应: 统一为 `{"error": {"code", "message", "details"?}}`

use crate::error::LedgerError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use std::fmt;

/// HTTP 错误 (状态码 + 稳定错误码)
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: String,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            details: None,
        }
    }

    /// 附加结构化信息, 例如模型原始回复
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// 400, 请求体本身不合法
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.status, self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// 错误响应体外层
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

/// `details` 为空时不输出
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.code,
                message: self.message,
                details: self.details,
            },
        };

        (self.status, Json(body)).into_response()
    }
}

/// 输入问题 400, 模型调用失败 502, 回复无法解析 500 (附原始回复), 其余 500
impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let code = err.code();
        let message = err.to_string();

        match err {
            LedgerError::EmptyInput
            | LedgerError::ImageFetch { .. }
            | LedgerError::UnsupportedImageType(_) => {
                ApiError::new(StatusCode::BAD_REQUEST, code, message)
            }
            LedgerError::ModelInvocation { .. } => {
                ApiError::new(StatusCode::BAD_GATEWAY, code, message)
            }
            LedgerError::MalformedResponse { raw_reply, .. } => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
                    .with_details(json!({ "raw_reply": raw_reply }))
            }
            LedgerError::Io(_) | LedgerError::Database(_) | LedgerError::Config(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, code, message)
            }
        }
    }
}

/// 处理器返回类型
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_response_carries_raw_reply() {
        let err: ApiError = LedgerError::malformed("invalid JSON", "not json at all").into();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code, "MALFORMED_RESPONSE");
        assert_eq!(
            err.details,
            Some(json!({ "raw_reply": "not json at all" }))
        );
    }

    #[test]
    fn model_failure_is_bad_gateway() {
        let err: ApiError = LedgerError::model("connection refused").into();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.code, "MODEL_INVOCATION_ERROR");
        assert!(err.details.is_none());
    }

    #[test]
    fn empty_input_is_bad_request() {
        let err: ApiError = LedgerError::EmptyInput.into();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "EMPTY_INPUT");
    }
}
