// 数据库迁移模块
// 包含所有迁移脚本和管理功能

use crate::errors::VoxdError;
use sea_orm::{ConnectionTrait, DatabaseConnection, DatabaseTransaction, Statement, TransactionTrait};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub mod migrations;

pub use migrations::*;

/// 迁移信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Migration {
    pub version: String,
    pub name: String,
    pub description: String,
    pub up_sql: String,
    pub down_sql: String,
    pub dependencies: Vec<String>,
}

impl Migration {
    /// 迁移校验和（up 与 down 脚本的 SHA-256）
    pub fn checksum(&self) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(self.up_sql.as_bytes());
        hasher.update(self.down_sql.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// 迁移状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationStatus {
    pub version: String,
    pub name: String,
    pub applied_at: Option<chrono::DateTime<chrono::Utc>>,
    pub is_applied: bool,
    pub checksum: String,
    /// 已应用迁移的校验和与当前脚本不一致
    pub checksum_mismatch: bool,
}

/// 迁移管理器
pub struct MigrationManager {
    db: Arc<DatabaseConnection>,
}

impl MigrationManager {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// 初始化迁移系统
    #[instrument(skip(self))]
    pub async fn init(&self) -> Result<(), VoxdError> {
        info!("初始化数据库迁移系统");

        let create_migrations_table = r#"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version VARCHAR(255) PRIMARY KEY,
                name VARCHAR(255) NOT NULL,
                description TEXT,
                checksum VARCHAR(64) NOT NULL,
                applied_at TIMESTAMPTZ NOT NULL DEFAULT CURRENT_TIMESTAMP,
                execution_time_ms INTEGER NOT NULL DEFAULT 0
            );

            CREATE INDEX IF NOT EXISTS idx_schema_migrations_applied_at
            ON schema_migrations(applied_at);
        "#;

        for statement in split_statements(create_migrations_table) {
            self.db
                .execute(Statement::from_string(
                    sea_orm::DatabaseBackend::Postgres,
                    statement,
                ))
                .await?;
        }

        info!("迁移系统初始化完成");
        Ok(())
    }

    /// 获取所有可用的迁移
    pub fn get_available_migrations(&self) -> Vec<Migration> {
        migrations::get_all_migrations()
    }

    /// 获取已应用的迁移
    #[instrument(skip(self))]
    pub async fn get_applied_migrations(&self) -> Result<Vec<MigrationStatus>, VoxdError> {
        let query = r#"
            SELECT version, name, applied_at, checksum
            FROM schema_migrations
            ORDER BY version
        "#;

        let results = self
            .db
            .query_all(Statement::from_string(
                sea_orm::DatabaseBackend::Postgres,
                query.to_string(),
            ))
            .await?;

        let mut migrations = Vec::new();
        for row in results {
            let version: String = row.try_get("", "version")?;
            let name: String = row.try_get("", "name")?;
            let applied_at: chrono::DateTime<chrono::Utc> = row.try_get("", "applied_at")?;
            let checksum: String = row.try_get("", "checksum")?;

            migrations.push(MigrationStatus {
                version,
                name,
                applied_at: Some(applied_at),
                is_applied: true,
                checksum,
                checksum_mismatch: false,
            });
        }

        Ok(migrations)
    }

    /// 检查迁移状态
    #[instrument(skip(self))]
    pub async fn check_status(&self) -> Result<Vec<MigrationStatus>, VoxdError> {
        info!("检查数据库迁移状态");

        let applied: HashMap<String, MigrationStatus> = self
            .get_applied_migrations()
            .await?
            .into_iter()
            .map(|m| (m.version.clone(), m))
            .collect();

        Ok(merge_status(&self.get_available_migrations(), &applied))
    }

    /// 应用待处理的迁移
    #[instrument(skip(self))]
    pub async fn migrate(&self) -> Result<Vec<String>, VoxdError> {
        info!("开始应用数据库迁移");

        let available = self.get_available_migrations();
        let status = self.check_status().await?;
        let mut applied_migrations = Vec::new();

        for migration_status in status.iter().filter(|s| !s.is_applied) {
            let migration = available
                .iter()
                .find(|m| m.version == migration_status.version)
                .ok_or_else(|| {
                    VoxdError::internal(format!("找不到迁移: {}", migration_status.version))
                })?;

            for dependency in &migration.dependencies {
                let satisfied = status.iter().any(|s| &s.version == dependency && s.is_applied)
                    || applied_migrations.contains(dependency);
                if !satisfied {
                    return Err(VoxdError::internal(format!(
                        "迁移 {} 依赖的 {} 尚未应用",
                        migration.version, dependency
                    )));
                }
            }

            self.apply_migration(migration).await?;
            applied_migrations.push(migration.version.clone());
        }

        if applied_migrations.is_empty() {
            info!("没有待处理的迁移");
        } else {
            info!(count = applied_migrations.len(), "迁移应用完成");
        }

        Ok(applied_migrations)
    }

    /// 应用单个迁移
    #[instrument(skip(self, migration), fields(version = %migration.version))]
    async fn apply_migration(&self, migration: &Migration) -> Result<(), VoxdError> {
        info!(name = %migration.name, "应用迁移");

        let start_time = std::time::Instant::now();
        let txn = self.db.begin().await?;

        if let Err(e) = execute_in_txn(&txn, &migration.up_sql).await {
            txn.rollback().await?;
            return Err(VoxdError::database(format!(
                "迁移 {} 执行失败: {}",
                migration.version, e
            )));
        }

        let execution_time = start_time.elapsed().as_millis() as i32;
        let record = Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            r#"
            INSERT INTO schema_migrations (version, name, description, checksum, execution_time_ms)
            VALUES ($1, $2, $3, $4, $5)
            "#,
            [
                migration.version.clone().into(),
                migration.name.clone().into(),
                migration.description.clone().into(),
                migration.checksum().into(),
                execution_time.into(),
            ],
        );

        if let Err(e) = txn.execute(record).await {
            txn.rollback().await?;
            return Err(VoxdError::database(format!(
                "记录迁移 {} 失败: {}",
                migration.version, e
            )));
        }

        txn.commit().await?;

        info!(execution_time_ms = execution_time, "迁移应用成功");
        Ok(())
    }

    /// 回滚单个迁移
    #[instrument(skip(self))]
    pub async fn rollback(&self, version: &str) -> Result<(), VoxdError> {
        warn!(version = %version, "回滚数据库迁移");

        let available = self.get_available_migrations();
        let migration = available
            .iter()
            .find(|m| m.version == version)
            .ok_or_else(|| VoxdError::not_found(format!("迁移 {}", version)))?;

        // 仍被后续已应用迁移依赖时拒绝回滚
        let applied = self.get_applied_migrations().await?;
        if let Some(dependent) = available.iter().find(|m| {
            m.dependencies.iter().any(|d| d == version)
                && applied.iter().any(|a| a.version == m.version)
        }) {
            return Err(VoxdError::conflict(format!(
                "迁移 {} 仍被已应用的 {} 依赖",
                version, dependent.version
            )));
        }

        let txn = self.db.begin().await?;

        if let Err(e) = execute_in_txn(&txn, &migration.down_sql).await {
            txn.rollback().await?;
            return Err(VoxdError::database(format!("迁移 {} 回滚失败: {}", version, e)));
        }

        let delete = Statement::from_sql_and_values(
            sea_orm::DatabaseBackend::Postgres,
            "DELETE FROM schema_migrations WHERE version = $1",
            [version.into()],
        );

        if let Err(e) = txn.execute(delete).await {
            txn.rollback().await?;
            return Err(VoxdError::database(format!("删除迁移记录 {} 失败: {}", version, e)));
        }

        txn.commit().await?;

        info!(version = %version, "迁移回滚完成");
        Ok(())
    }

    /// 验证数据库架构
    #[instrument(skip(self))]
    pub async fn validate_schema(&self) -> Result<SchemaValidation, VoxdError> {
        info!("验证数据库架构");

        let mut validation = SchemaValidation {
            is_valid: true,
            missing_tables: Vec::new(),
            errors: Vec::new(),
        };

        for table_name in REQUIRED_TABLES {
            if !self.table_exists(table_name).await? {
                validation.missing_tables.push(table_name.to_string());
                validation.is_valid = false;
            }
        }

        for status in self.check_status().await? {
            if status.checksum_mismatch {
                validation
                    .errors
                    .push(format!("迁移 {} 的校验和与当前脚本不一致", status.version));
                validation.is_valid = false;
            }
        }

        if validation.is_valid {
            info!("数据库架构验证通过");
        } else {
            warn!("数据库架构验证失败: {:?}", validation);
        }

        Ok(validation)
    }

    async fn table_exists(&self, table_name: &str) -> Result<bool, VoxdError> {
        let result = self
            .db
            .query_one(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = $1) AS exists",
                [table_name.into()],
            ))
            .await?;

        match result {
            Some(row) => Ok(row.try_get("", "exists").unwrap_or(false)),
            None => Ok(false),
        }
    }
}

/// 架构必需的业务表
pub const REQUIRED_TABLES: [&str; 16] = [
    "partners",
    "organisations",
    "admin_users",
    "wabas",
    "waba_phone_numbers",
    "message_templates",
    "agents",
    "chat_users",
    "sessions",
    "messages",
    "documents",
    "chunks",
    "quotes",
    "support_tickets",
    "ticket_messages",
    "example_conversations",
];

/// 架构验证结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaValidation {
    pub is_valid: bool,
    pub missing_tables: Vec<String>,
    pub errors: Vec<String>,
}

/// 合并可用迁移与已应用记录，标记校验和漂移
pub fn merge_status(
    available: &[Migration],
    applied: &HashMap<String, MigrationStatus>,
) -> Vec<MigrationStatus> {
    available
        .iter()
        .map(|migration| {
            let checksum = migration.checksum();
            match applied.get(&migration.version) {
                Some(record) => {
                    let mismatch = record.checksum != checksum;
                    if mismatch {
                        warn!(version = %migration.version, "迁移校验和不匹配，可能已被修改");
                    }
                    MigrationStatus {
                        checksum_mismatch: mismatch,
                        ..record.clone()
                    }
                }
                None => MigrationStatus {
                    version: migration.version.clone(),
                    name: migration.name.clone(),
                    applied_at: None,
                    is_applied: false,
                    checksum,
                    checksum_mismatch: false,
                },
            }
        })
        .collect()
}

/// 按分号拆分 SQL 脚本
///
/// 脚本中不使用函数体或字符串内的分号。
pub fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .collect()
}

async fn execute_in_txn(txn: &DatabaseTransaction, sql: &str) -> Result<(), VoxdError> {
    for statement in split_statements(sql) {
        txn.execute(Statement::from_string(
            sea_orm::DatabaseBackend::Postgres,
            statement,
        ))
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered_and_unique() {
        let all = get_all_migrations();
        let versions: Vec<&String> = all.iter().map(|m| &m.version).collect();

        let mut sorted = versions.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(versions, sorted);
    }

    #[test]
    fn test_migration_dependencies_point_backwards() {
        let all = get_all_migrations();
        for (index, migration) in all.iter().enumerate() {
            for dependency in &migration.dependencies {
                let position = all.iter().position(|m| &m.version == dependency);
                assert!(
                    matches!(position, Some(p) if p < index),
                    "{} 依赖未知或靠后的迁移 {}",
                    migration.version,
                    dependency
                );
            }
        }
    }

    #[test]
    fn test_every_required_table_is_created() {
        let all_sql: String = get_all_migrations()
            .iter()
            .map(|m| m.up_sql.clone())
            .collect();
        for table in REQUIRED_TABLES {
            assert!(
                all_sql.contains(&format!("CREATE TABLE {} (", table)),
                "缺少建表语句: {}",
                table
            );
        }
    }

    #[test]
    fn test_checksum_is_stable_and_detects_drift() {
        let migration = get_all_migrations().remove(0);
        assert_eq!(migration.checksum(), migration.checksum());
        assert_eq!(migration.checksum().len(), 64);

        let mut applied = HashMap::new();
        applied.insert(
            migration.version.clone(),
            MigrationStatus {
                version: migration.version.clone(),
                name: migration.name.clone(),
                applied_at: Some(chrono::Utc::now()),
                is_applied: true,
                checksum: "0".repeat(64),
                checksum_mismatch: false,
            },
        );

        let status = merge_status(&[migration], &applied);
        assert!(status[0].is_applied);
        assert!(status[0].checksum_mismatch);
    }

    #[test]
    fn test_split_statements() {
        let statements = split_statements("CREATE TABLE a (id INT);\n\n  DROP TABLE b;  ");
        assert_eq!(statements, vec!["CREATE TABLE a (id INT)", "DROP TABLE b"]);
    }
}
