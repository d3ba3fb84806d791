// 示例对话实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 对话生成状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum ExampleStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "generating")]
    Generating,
    #[sea_orm(string_value = "generated")]
    Generated,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// 配图生成状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum ImagesStatus {
    /// 未请求配图
    #[sea_orm(string_value = "none")]
    NotRequested,
    #[sea_orm(string_value = "generating")]
    Generating,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "failed")]
    Failed,
}

/// 示例对话实体
///
/// `partner_id` 为空表示平台员工创建的通用示例。
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "example_conversations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(nullable)]
    pub partner_id: Option<Uuid>,

    #[sea_orm(column_type = "String(Some(255))")]
    pub title: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub industry: String,

    #[sea_orm(column_type = "Text")]
    pub scenario: String,

    #[sea_orm(column_type = "String(Some(16))")]
    pub language: String,

    #[sea_orm(column_type = "String(Some(255))", nullable)]
    pub business_name: Option<String>,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub tone: Option<String>,

    /// 期望生成的消息条数
    pub target_message_count: i32,

    /// `[{ role, content, image_prompt?, image_url? }]`
    #[sea_orm(column_type = "JsonBinary")]
    pub messages: Json,

    pub status: ExampleStatus,

    #[sea_orm(column_type = "Text", nullable)]
    pub error_message: Option<String>,

    pub images_status: ImagesStatus,

    pub image_count: i32,

    #[sea_orm(nullable)]
    pub created_by: Option<Uuid>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::partner::Entity",
        from = "Column::PartnerId",
        to = "super::partner::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Partner,
}

impl Related<super::partner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
