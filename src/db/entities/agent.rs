// 聊天机器人 Agent 实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Agent 实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "agents")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub organisation_id: Uuid,

    #[sea_orm(column_type = "String(Some(255))")]
    pub name: String,

    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,

    /// 系统提示词
    #[sea_orm(column_type = "Text")]
    pub system_prompt: String,

    #[sea_orm(column_type = "String(Some(100))")]
    pub model: String,

    /// 采样温度（0-2）
    pub temperature: f64,

    pub max_tokens: i32,

    #[sea_orm(column_type = "String(Some(16))")]
    pub language: String,

    pub is_active: bool,

    /// 绑定的 WhatsApp 号码
    #[sea_orm(nullable)]
    pub waba_phone_number_id: Option<Uuid>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::organisation::Entity",
        from = "Column::OrganisationId",
        to = "super::organisation::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Organisation,
    #[sea_orm(
        belongs_to = "super::waba_phone_number::Entity",
        from = "Column::WabaPhoneNumberId",
        to = "super::waba_phone_number::Column::Id",
        on_update = "NoAction",
        on_delete = "SetNull"
    )]
    WabaPhoneNumber,
}

impl Related<super::organisation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organisation.def()
    }
}

impl Related<super::waba_phone_number::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WabaPhoneNumber.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
