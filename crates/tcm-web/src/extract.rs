//! 自定义提取器
//!
//! 路径中的ID解析失败时返回统一的JSON错误体，而不是框架默认的纯文本。

use crate::error::ApiError;
use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use tcm_core::TcmError;

/// 路由中唯一的数值ID参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdPath(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for IdPath
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(raw) = Path::<String>::from_request_parts(parts, state)
            .await
            .map_err(|e| TcmError::Validation(format!("无效的路径参数: {}", e.body_text())))?;

        raw.trim()
            .parse::<i64>()
            .map(IdPath)
            .map_err(|_| TcmError::Validation(format!("无效的ID: {}", raw)).into())
    }
}
