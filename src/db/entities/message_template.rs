// WhatsApp 消息模板实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "message_templates")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub waba_id: Uuid,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub external_id: Option<String>,

    #[sea_orm(column_type = "String(Some(512))")]
    pub name: String,

    #[sea_orm(column_type = "String(Some(16))")]
    pub language: String,

    /// MARKETING / UTILITY / AUTHENTICATION
    #[sea_orm(column_type = "String(Some(32))")]
    pub category: String,

    /// Meta 返回的审核状态，原样保存
    #[sea_orm(column_type = "String(Some(32))")]
    pub status: String,

    #[sea_orm(column_type = "JsonBinary")]
    pub components: Json,

    #[sea_orm(column_type = "Text", nullable)]
    pub rejected_reason: Option<String>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::waba::Entity",
        from = "Column::WabaId",
        to = "super::waba::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Waba,
}

impl Related<super::waba::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Waba.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
