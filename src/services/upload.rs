// Logo 上传

use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::errors::VoxdError;
use crate::storage::{image_extension, ObjectStorage};

/// 已读取的上传文件
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

pub struct LogoUploader {
    storage: Arc<dyn ObjectStorage>,
    max_bytes: u64,
    allowed_types: Vec<String>,
}

impl LogoUploader {
    pub fn new(storage: Arc<dyn ObjectStorage>, config: &StorageConfig) -> Self {
        Self {
            storage,
            max_bytes: config.max_upload_bytes,
            allowed_types: config.allowed_image_types.clone(),
        }
    }

    /// 检查类型和大小，返回扩展名
    pub fn check(&self, file: &UploadedFile) -> Result<&'static str, VoxdError> {
        if file.bytes.is_empty() {
            return Err(VoxdError::validation("logo", "文件为空"));
        }
        if file.bytes.len() as u64 > self.max_bytes {
            return Err(VoxdError::validation(
                "logo",
                format!("文件不能超过 {} KB", self.max_bytes / 1024),
            ));
        }
        if !self.allowed_types.iter().any(|t| t == &file.content_type) {
            return Err(VoxdError::validation("logo", "不支持的图片格式"));
        }
        image_extension(&file.content_type)
            .ok_or_else(|| VoxdError::validation("logo", "不支持的图片格式"))
    }

    /// 上传到 `logos/{kind}/{owner_id}/{uuid}.{ext}`，返回公开地址
    pub async fn upload(
        &self,
        kind: &str,
        owner_id: Uuid,
        file: UploadedFile,
    ) -> Result<String, VoxdError> {
        let extension = self.check(&file)?;
        let key = format!("logos/{}/{}/{}.{}", kind, owner_id, Uuid::new_v4(), extension);

        let url = self
            .storage
            .put_object(&key, file.bytes, &file.content_type)
            .await?;

        info!(kind, owner_id = %owner_id, key = %key, "Logo 上传成功");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn uploader(dir: &TempDir) -> LogoUploader {
        let mut config = AppConfig::default().storage;
        config.max_upload_bytes = 16;
        let storage = Arc::new(LocalStorage::new(dir.path(), "http://localhost/files"));
        LogoUploader::new(storage, &config)
    }

    fn file(content_type: &str, size: usize) -> UploadedFile {
        UploadedFile {
            filename: Some("logo".to_string()),
            content_type: content_type.to_string(),
            bytes: vec![7; size],
        }
    }

    #[test]
    fn test_check_rejects_bad_files() {
        let dir = TempDir::new().unwrap();
        let uploader = uploader(&dir);

        assert_eq!(uploader.check(&file("image/png", 8)).unwrap(), "png");
        assert!(uploader.check(&file("image/png", 0)).is_err());
        assert!(uploader.check(&file("image/png", 17)).is_err());
        let err = uploader.check(&file("application/pdf", 8)).unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("logo"));
    }

    #[tokio::test]
    async fn test_upload_stores_under_owner() {
        let dir = TempDir::new().unwrap();
        let uploader = uploader(&dir);
        let owner = Uuid::new_v4();

        let url = uploader
            .upload("organisations", owner, file("image/jpeg", 4))
            .await
            .unwrap();

        let prefix = format!("http://localhost/files/logos/organisations/{}/", owner);
        assert!(url.starts_with(&prefix));
        assert!(url.ends_with(".jpg"));
        assert!(dir.path().join("logos/organisations").join(owner.to_string()).is_dir());
    }
}
