// 本地文件存储（开发环境）

use super::{sanitize_key, ObjectStorage};
use crate::errors::VoxdError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct LocalStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalStorage {
    pub fn new(root: impl AsRef<Path>, public_base_url: &str) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// 对象在磁盘上的路径
    pub fn path_for(&self, key: &str) -> Result<PathBuf, VoxdError> {
        Ok(self.root.join(sanitize_key(key)?))
    }

    /// 读取对象内容
    pub async fn read_object(&self, key: &str) -> Result<Vec<u8>, VoxdError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(VoxdError::not_found("文件")),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    async fn put_object(
        &self,
        key: &str,
        bytes: Vec<u8>,
        _content_type: &str,
    ) -> Result<String, VoxdError> {
        let key = sanitize_key(key)?;
        let path = self.root.join(&key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, &bytes).await?;

        debug!(key = %key, size = bytes.len(), "文件已写入本地存储");
        Ok(self.public_url(&key))
    }

    async fn delete_object(&self, key: &str) -> Result<(), VoxdError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }

    fn backend(&self) -> &'static str {
        "local"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_read_delete() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/files/");

        let url = storage
            .put_object("logos/organisations/1/logo.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:8080/files/logos/organisations/1/logo.png");
        assert!(dir.path().join("logos/organisations/1/logo.png").exists());

        let bytes = storage.read_object("logos/organisations/1/logo.png").await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);

        storage.delete_object("logos/organisations/1/logo.png").await.unwrap();
        assert!(!dir.path().join("logos/organisations/1/logo.png").exists());

        // 重复删除不报错
        storage.delete_object("logos/organisations/1/logo.png").await.unwrap();
    }

    #[tokio::test]
    async fn test_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost/files");

        assert!(storage.put_object("../escape.png", vec![0], "image/png").await.is_err());
        let err = storage.read_object("missing.png").await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
