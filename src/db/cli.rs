// 数据库管理 CLI 工具
// 提供迁移和管理员初始化等命令行功能

use crate::config::AppConfig;
use crate::db::{DatabaseManager, MigrationManager};
use crate::errors::VoxdError;
use crate::services::admin_user::AdminUserService;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::info;

/// CLI 命令
#[derive(Debug, Clone, PartialEq)]
pub enum CliCommand {
    /// 应用待处理的迁移
    Migrate,
    /// 检查迁移状态
    Status,
    /// 回滚指定版本
    Rollback { version: String },
    /// 验证数据库架构
    Validate,
    /// 创建超级管理员
    CreateAdmin {
        email: String,
        name: String,
        password: String,
    },
}

/// CLI 执行器
pub struct CliExecutor {
    db: Arc<DatabaseConnection>,
    config: AppConfig,
}

impl CliExecutor {
    pub async fn new(config: AppConfig) -> Result<Self, VoxdError> {
        let manager = DatabaseManager::new(config.database.clone()).await?;
        let db = manager.get_connection();

        Ok(Self { db, config })
    }

    /// 执行 CLI 命令
    pub async fn execute(&self, command: CliCommand) -> Result<(), VoxdError> {
        let manager = MigrationManager::new(self.db.clone());
        manager.init().await?;

        match command {
            CliCommand::Status => {
                info!("检查迁移状态...");
                let status = manager.check_status().await?;

                println!("📊 迁移状态:");
                println!("{:<20} {:<40} {:<12} {:<20}", "版本", "名称", "状态", "应用时间");
                println!("{}", "-".repeat(92));

                for migration in status {
                    let status_str = match (migration.is_applied, migration.checksum_mismatch) {
                        (true, true) => "⚠️ 已修改",
                        (true, false) => "✅ 已应用",
                        (false, _) => "⏳ 待应用",
                    };
                    let applied_at = migration
                        .applied_at
                        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                        .unwrap_or_else(|| "-".to_string());

                    println!(
                        "{:<20} {:<40} {:<12} {:<20}",
                        migration.version, migration.name, status_str, applied_at
                    );
                }
            }
            CliCommand::Migrate => {
                info!("应用迁移...");
                let applied = manager.migrate().await?;

                if applied.is_empty() {
                    println!("✅ 没有待应用的迁移");
                } else {
                    println!("✅ 成功应用 {} 个迁移:", applied.len());
                    for version in applied {
                        println!("  - {}", version);
                    }
                }
            }
            CliCommand::Rollback { version } => {
                info!("回滚迁移: {}", version);
                manager.rollback(&version).await?;
                println!("✅ 迁移 {} 回滚完成", version);
            }
            CliCommand::Validate => {
                info!("验证数据库架构...");
                let validation = manager.validate_schema().await?;

                if validation.is_valid {
                    println!("✅ 数据库架构验证通过");
                } else {
                    println!("❌ 数据库架构验证失败:");

                    if !validation.missing_tables.is_empty() {
                        println!("  缺失的表:");
                        for table in validation.missing_tables {
                            println!("    - {}", table);
                        }
                    }

                    if !validation.errors.is_empty() {
                        println!("  错误:");
                        for error in validation.errors {
                            println!("    - {}", error);
                        }
                    }
                }
            }
            CliCommand::CreateAdmin { email, name, password } => {
                info!(email = %email, "创建超级管理员");
                let service = AdminUserService::new(self.db.clone(), self.config.security.bcrypt_cost);
                let admin = service.create_super_admin(&email, &name, &password).await?;
                println!("✅ 超级管理员已创建: {} ({})", admin.email, admin.id);
            }
        }

        Ok(())
    }
}

/// 解析命令行参数
pub fn parse_args(args: Vec<String>) -> Result<CliCommand, VoxdError> {
    let command = args
        .get(1)
        .ok_or_else(|| VoxdError::validation("args", "请提供命令"))?;

    match command.as_str() {
        "migrate" | "up" => Ok(CliCommand::Migrate),
        "status" => Ok(CliCommand::Status),
        "validate" => Ok(CliCommand::Validate),
        "rollback" | "down" => {
            let version = args
                .get(2)
                .ok_or_else(|| VoxdError::validation("version", "请提供要回滚的版本"))?;
            Ok(CliCommand::Rollback { version: version.clone() })
        }
        "create-admin" => {
            if args.len() < 5 {
                return Err(VoxdError::validation(
                    "args",
                    "用法: create-admin <email> <name> <password>",
                ));
            }
            Ok(CliCommand::CreateAdmin {
                email: args[2].clone(),
                name: args[3].clone(),
                password: args[4].clone(),
            })
        }
        _ => Err(VoxdError::validation("args", "未知的命令")),
    }
}

/// 打印帮助信息
pub fn print_help() {
    println!("Voxd 数据库管理工具");
    println!();
    println!("用法:");
    println!("  voxd-db <命令> [参数]");
    println!();
    println!("命令:");
    println!("  migrate                               应用待处理的迁移");
    println!("  status                                检查迁移状态");
    println!("  rollback <version>                    回滚指定版本的迁移");
    println!("  validate                              验证数据库架构");
    println!("  create-admin <email> <name> <password>  创建超级管理员");
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_simple_commands() {
        assert_eq!(parse_args(args(&["voxd-db", "migrate"])).unwrap(), CliCommand::Migrate);
        assert_eq!(parse_args(args(&["voxd-db", "up"])).unwrap(), CliCommand::Migrate);
        assert_eq!(parse_args(args(&["voxd-db", "status"])).unwrap(), CliCommand::Status);
        assert_eq!(parse_args(args(&["voxd-db", "validate"])).unwrap(), CliCommand::Validate);
    }

    #[test]
    fn test_parse_rollback_requires_version() {
        assert!(parse_args(args(&["voxd-db", "rollback"])).is_err());
        assert_eq!(
            parse_args(args(&["voxd-db", "rollback", "20250101_000010"])).unwrap(),
            CliCommand::Rollback { version: "20250101_000010".to_string() }
        );
    }

    #[test]
    fn test_parse_create_admin() {
        assert!(parse_args(args(&["voxd-db", "create-admin", "a@b.io"])).is_err());

        let command = parse_args(args(&[
            "voxd-db",
            "create-admin",
            "ops@voxd.io",
            "Ops",
            "correct horse battery",
        ]))
        .unwrap();
        assert_eq!(
            command,
            CliCommand::CreateAdmin {
                email: "ops@voxd.io".to_string(),
                name: "Ops".to_string(),
                password: "correct horse battery".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_unknown_command() {
        assert!(parse_args(args(&["voxd-db"])).is_err());
        assert!(parse_args(args(&["voxd-db", "backup"])).is_err());
    }
}
