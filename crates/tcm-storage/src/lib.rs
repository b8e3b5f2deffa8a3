//! # TCM存储模块
//!
//! 负责舌象图片等上传文件的校验和落盘。

pub mod storage;

pub use storage::*;
