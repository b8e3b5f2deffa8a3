//! API错误响应

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use tcm_core::TcmError;
use tracing::{error, warn};

/// 包装 `TcmError`，转换为统一的JSON错误响应
#[derive(Debug)]
pub struct ApiError(pub TcmError);

pub type ApiResult<T> = std::result::Result<T, ApiError>;

impl From<TcmError> for ApiError {
    fn from(e: TcmError) -> Self {
        ApiError(e)
    }
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match &self.0 {
            TcmError::NotFound(_) => StatusCode::NOT_FOUND,
            TcmError::Validation(_) => StatusCode::BAD_REQUEST,
            TcmError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        } else {
            warn!("Request rejected: {}", self.0);
        }

        let mut body = json!({
            "error": true,
            "message": self.0.to_string(),
            "status": status.as_u16()
        });

        // 写回失败时把模型原始响应一并返回
        if let Some(raw) = self.0.raw_response() {
            body["rawResponse"] = json!(raw);
        }

        (status, Json(body)).into_response()
    }
}
