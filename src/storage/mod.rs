// 对象存储模块
// 组织 Logo 和生成图片的上传

pub mod local;
pub mod s3;

use crate::config::StorageConfig;
use crate::errors::VoxdError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

pub use local::LocalStorage;
pub use s3::S3Storage;

/// 对象存储特征
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// 上传对象，返回公开访问地址
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<String, VoxdError>;

    /// 删除对象，对象不存在时视为成功
    async fn delete_object(&self, key: &str) -> Result<(), VoxdError>;

    /// 对象的公开访问地址
    fn public_url(&self, key: &str) -> String;

    fn backend(&self) -> &'static str;
}

/// 根据配置创建存储后端
pub fn build_storage(config: &StorageConfig) -> Result<Arc<dyn ObjectStorage>, VoxdError> {
    let storage: Arc<dyn ObjectStorage> = match config.backend.as_str() {
        "s3" => Arc::new(S3Storage::new(config)?),
        "local" => Arc::new(LocalStorage::new(&config.local_path, &config.public_base_url)),
        other => {
            return Err(VoxdError::configuration(format!("未知的存储后端: {}", other)));
        }
    };

    info!(backend = storage.backend(), "对象存储初始化完成");
    Ok(storage)
}

/// 规范化对象键
///
/// 去掉开头的 `/`，非法字符替换为 `-`，拒绝 `..` 路径段。
pub fn sanitize_key(key: &str) -> Result<String, VoxdError> {
    let trimmed = key.trim().trim_start_matches('/');

    let mut segments = Vec::new();
    for segment in trimmed.split('/') {
        if segment.is_empty() || segment == "." {
            continue;
        }
        if segment == ".." {
            return Err(VoxdError::bad_request("对象键不能包含 '..'"));
        }
        let cleaned: String = segment
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        segments.push(cleaned);
    }

    if segments.is_empty() {
        return Err(VoxdError::bad_request("对象键不能为空"));
    }

    Ok(segments.join("/"))
}

/// 图片 MIME 类型对应的扩展名
pub fn image_extension(content_type: &str) -> Option<&'static str> {
    match content_type {
        "image/png" => Some("png"),
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/svg+xml" => Some("svg"),
        _ => None,
    }
}

/// 由扩展名推断 MIME 类型
pub fn content_type_for(key: &str) -> &'static str {
    match key.rsplit('.').next().map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
