// 数据库连接管理
// 处理数据库连接池和连接配置

use crate::config::DatabaseConfig;
use crate::errors::VoxdError;
use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Statement};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument};

/// 数据库连接管理器
pub struct DatabaseManager {
    connection: Arc<DatabaseConnection>,
}

impl DatabaseManager {
    /// 建立连接池并执行健康检查
    #[instrument(skip(config))]
    pub async fn new(config: DatabaseConfig) -> Result<Self, VoxdError> {
        let mut opt = ConnectOptions::new(config.url.clone());

        opt.max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .connect_timeout(Duration::from_secs(config.connect_timeout))
            .idle_timeout(Duration::from_secs(config.idle_timeout))
            .max_lifetime(Duration::from_secs(config.max_lifetime))
            .sqlx_logging(true)
            .sqlx_logging_level(tracing::log::LevelFilter::Debug);

        info!(
            url = %Self::mask_password(&config.url),
            max_connections = config.max_connections,
            min_connections = config.min_connections,
            "连接数据库"
        );

        let connection = Database::connect(opt)
            .await
            .map_err(|e| VoxdError::database(format!("数据库连接失败: {}", e)))?;

        let manager = Self {
            connection: Arc::new(connection),
        };
        manager.health_check().await?;

        Ok(manager)
    }

    pub fn get_connection(&self) -> Arc<DatabaseConnection> {
        self.connection.clone()
    }

    /// 数据库健康检查
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), VoxdError> {
        ping(self.connection.as_ref()).await
    }

    /// 屏蔽密码信息用于日志记录
    pub fn mask_password(url: &str) -> String {
        if let Ok(mut parsed_url) = url::Url::parse(url) {
            if parsed_url.password().is_some() {
                let _ = parsed_url.set_password(Some("***"));
            }
            parsed_url.to_string()
        } else {
            "***".to_string()
        }
    }
}

/// 对任意连接执行 `SELECT 1`
pub async fn ping(db: &DatabaseConnection) -> Result<(), VoxdError> {
    let result = db
        .execute(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            "SELECT 1".to_string(),
        ))
        .await;

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            error!(error = %e, "数据库健康检查失败");
            Err(VoxdError::database(format!("数据库健康检查失败: {}", e)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_password() {
        assert_eq!(
            DatabaseManager::mask_password("postgresql://voxd:s3cret@db:5432/voxd"),
            "postgresql://voxd:***@db:5432/voxd"
        );
        assert_eq!(
            DatabaseManager::mask_password("postgresql://localhost/voxd"),
            "postgresql://localhost/voxd"
        );
        assert_eq!(DatabaseManager::mask_password("not a url"), "***");
    }

    #[tokio::test]
    #[ignore = "需要运行中的 PostgreSQL"]
    async fn test_connect_and_ping() {
        let config = crate::config::AppConfig::default().database;
        let manager = DatabaseManager::new(config).await.unwrap();
        manager.health_check().await.unwrap();
        assert!(ping(manager.get_connection().as_ref()).await.is_ok());
    }
}
