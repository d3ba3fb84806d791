// 工单消息实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ticket_messages")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub ticket_id: Uuid,

    #[sea_orm(nullable)]
    pub author_id: Option<Uuid>,

    /// 原始文本，提及以 `@[姓名](uuid)` 标记
    #[sea_orm(column_type = "Text")]
    pub body: String,

    /// 内部备注，对合作伙伴管理员隐藏
    pub is_internal: bool,

    /// 被提及管理员 ID 列表（JSON 数组）
    #[sea_orm(column_type = "JsonBinary")]
    pub mentions: Json,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::support_ticket::Entity",
        from = "Column::TicketId",
        to = "super::support_ticket::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Ticket,
}

impl Related<super::support_ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ticket.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
