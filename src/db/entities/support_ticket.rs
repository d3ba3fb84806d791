// 支持工单实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 工单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    #[sea_orm(string_value = "open")]
    Open,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "waiting")]
    Waiting,
    #[sea_orm(string_value = "resolved")]
    Resolved,
    #[sea_orm(string_value = "closed")]
    Closed,
}

impl TicketStatus {
    /// 已关闭的工单只能重新打开
    pub fn can_transition_to(&self, next: TicketStatus) -> bool {
        match self {
            Self::Closed => matches!(next, Self::Closed | Self::Open),
            _ => true,
        }
    }
}

/// 工单优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    #[sea_orm(string_value = "low")]
    Low,
    #[sea_orm(string_value = "normal")]
    Normal,
    #[sea_orm(string_value = "high")]
    High,
    #[sea_orm(string_value = "urgent")]
    Urgent,
}

/// 支持工单实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "support_tickets")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// 形如 `T-000123`，由数据库序列生成
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub ticket_number: String,

    pub organisation_id: Uuid,

    /// 创建时从组织复制，用于合作伙伴范围过滤
    #[sea_orm(nullable)]
    pub partner_id: Option<Uuid>,

    #[sea_orm(column_type = "String(Some(255))")]
    pub subject: String,

    #[sea_orm(column_type = "Text")]
    pub description: String,

    pub status: TicketStatus,

    pub priority: TicketPriority,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub category: Option<String>,

    #[sea_orm(nullable)]
    pub assigned_to: Option<Uuid>,

    #[sea_orm(nullable)]
    pub created_by: Option<Uuid>,

    #[sea_orm(nullable)]
    pub resolved_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub closed_at: Option<DateTimeWithTimeZone>,

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
    #[sea_orm(has_many = "super::ticket_message::Entity")]
    Messages,
}

impl Related<super::organisation::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Organisation.def()
    }
}

impl Related<super::ticket_message::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
