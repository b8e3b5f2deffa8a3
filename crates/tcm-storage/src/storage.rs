//! 图片存储管理

use chrono::Utc;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use tcm_core::{Result, TcmError, TONGUE_IMAGE_TYPE};
use tracing::{debug, info, warn};

/// 允许上传的图片扩展名
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "bmp"];

/// 默认的图片描述
pub const DEFAULT_TONGUE_IMAGE_DESCRIPTION: &str = "自诊舌象图片";

/// 图片类型的最大长度
const MAX_IMAGE_TYPE_LEN: usize = 50;

/// 已保存的图片
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoredImage {
    pub path: String,
    pub size: u64,
    /// 去掉目录后的原始文件名
    pub original_name: String,
    /// 小写扩展名
    pub format: String,
}

/// 图片存储管理器
#[derive(Debug, Clone)]
pub struct ImageStore {
    base_path: PathBuf,
    max_upload_bytes: u64,
}

impl ImageStore {
    pub fn new(base_path: impl Into<PathBuf>, max_upload_bytes: u64) -> Self {
        Self {
            base_path: base_path.into(),
            max_upload_bytes,
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn max_upload_bytes(&self) -> u64 {
        self.max_upload_bytes
    }

    /// 保存就诊记录的舌象图片
    pub async fn store_tongue_image(
        &self,
        visit_id: i64,
        original_filename: Option<&str>,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<StoredImage> {
        self.store_image(visit_id, TONGUE_IMAGE_TYPE, original_filename, content_type, data)
            .await
    }

    /// 保存诊断图片
    ///
    /// 文件名形如 `<类型>_<visit_id>_<毫秒时间戳>.<扩展名>`，原始文件名只取扩展名。
    pub async fn store_image(
        &self,
        visit_id: i64,
        image_type: &str,
        original_filename: Option<&str>,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<StoredImage> {
        validate_image_type(image_type)?;
        let (original_name, extension) = self.validate(original_filename, content_type, data)?;

        let file_name = format!(
            "{}_{}_{}.{}",
            image_type,
            visit_id,
            Utc::now().timestamp_millis(),
            extension
        );
        let full_path = self.base_path.join(&file_name);

        tokio::fs::create_dir_all(&self.base_path).await?;
        tokio::fs::write(&full_path, data).await?;

        info!(
            "Stored {} image for visit {} at {}",
            image_type,
            visit_id,
            full_path.display()
        );
        Ok(StoredImage {
            path: full_path.to_string_lossy().to_string(),
            size: data.len() as u64,
            original_name,
            format: extension,
        })
    }

    /// 删除已保存的图片，只处理存储目录下的文件
    pub async fn remove_image(&self, path: &str) -> Result<()> {
        let path = Path::new(path);
        let escapes = path.components().any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(&self.base_path) {
            warn!("Refusing to remove file outside upload directory: {}", path.display());
            return Ok(());
        }

        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                info!("Removed image {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Image {} already removed", path.display());
                Ok(())
            }
            Err(e) => Err(TcmError::Storage(format!(
                "failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// 校验上传内容，返回清理后的文件名和小写的扩展名
    fn validate(
        &self,
        original_filename: Option<&str>,
        content_type: Option<&str>,
        data: &[u8],
    ) -> Result<(String, String)> {
        if data.is_empty() {
            return Err(TcmError::Validation("上传文件不能为空".to_string()));
        }
        if data.len() as u64 > self.max_upload_bytes {
            return Err(TcmError::Validation(format!(
                "上传文件过大: {} 字节，上限 {} 字节",
                data.len(),
                self.max_upload_bytes
            )));
        }

        match content_type {
            Some(ct) if ct.to_ascii_lowercase().starts_with("image/") => {}
            other => {
                debug!("Rejected upload with content type {:?}", other);
                return Err(TcmError::Validation("只能上传图片文件".to_string()));
            }
        }

        let file_name = original_filename
            .map(sanitize_file_name)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| TcmError::Validation("缺少文件名".to_string()))?;

        let extension = Path::new(&file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        if !ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            return Err(TcmError::Validation(format!(
                "不支持的文件格式，仅支持: {}",
                ALLOWED_IMAGE_EXTENSIONS.join(", ")
            )));
        }

        Ok((file_name, extension))
    }
}

/// 图片类型会出现在文件名中，只允许小写字母、数字和下划线
pub fn validate_image_type(image_type: &str) -> Result<()> {
    let valid = !image_type.is_empty()
        && image_type.len() <= MAX_IMAGE_TYPE_LEN
        && image_type
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    if !valid {
        return Err(TcmError::Validation(format!("无效的图片类型: {}", image_type)));
    }
    Ok(())
}

/// 只保留路径的最后一段，兼容Windows风格的分隔符
pub fn sanitize_file_name(name: &str) -> String {
    name.rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
