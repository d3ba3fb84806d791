// 会话实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "closed")]
    Closed,
}

/// 聊天会话实体（由机器人运行时写入，后台只读）
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub organisation_id: Uuid,

    #[sea_orm(nullable)]
    pub agent_id: Option<Uuid>,

    pub chat_user_id: Uuid,

    pub status: SessionStatus,

    pub message_count: i32,

    pub started_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub ended_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::chat_user::Entity",
        from = "Column::ChatUserId",
        to = "super::chat_user::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    ChatUser,
    #[sea_orm(has_many = "super::message::Entity")]
    Messages,
}

impl Related<super::chat_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChatUser.def()
    }
}

impl Related<super::message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
