// 数据库模块
// 包含数据库连接、实体定义和迁移

pub mod cli;
pub mod connection;
pub mod entities;
pub mod migrations;

pub use connection::*;
pub use migrations::{MigrationManager, MigrationStatus, SchemaValidation};
