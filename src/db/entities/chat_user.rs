// 终端聊天用户实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 通过 WhatsApp 与 Agent 对话的终端用户
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chat_users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub organisation_id: Uuid,

    /// 规范化后的号码，形如 `+31612345678`，组织内唯一
    #[sea_orm(column_type = "String(Some(32))")]
    pub phone_number: String,

    #[sea_orm(column_type = "String(Some(255))", nullable)]
    pub name: Option<String>,

    #[sea_orm(column_type = "String(Some(255))", nullable)]
    pub email: Option<String>,

    #[sea_orm(column_type = "String(Some(16))", nullable)]
    pub language: Option<String>,

    pub is_blocked: bool,

    #[sea_orm(column_type = "JsonBinary")]
    pub metadata: Json,

    #[sea_orm(nullable)]
    pub last_seen_at: Option<DateTimeWithTimeZone>,

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
    #[sea_orm(has_many = "super::session::Entity")]
    Sessions,
}

impl Related<super::organisation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organisation.def()
    }
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sessions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
