//! # TCM Web模块
//!
//! 提供诊所业务的REST API，包括实体的增删改查、舌象图片上传以及AI分析接口。

pub mod error;
pub mod extract;
pub mod handlers;
pub mod server;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use extract::IdPath;
pub use server::{create_app, WebServer};
pub use state::AppState;
