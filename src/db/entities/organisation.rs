// 组织（客户）实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 组织状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum OrganisationStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "trial")]
    Trial,
    #[sea_orm(string_value = "suspended")]
    Suspended,
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

/// 组织实体
///
/// `partner_id` 为空表示平台直接客户，只有平台员工可见。
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "organisations")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(nullable)]
    pub partner_id: Option<Uuid>,

    #[sea_orm(column_type = "String(Some(255))")]
    pub name: String,

    #[sea_orm(column_type = "String(Some(100))", unique)]
    pub slug: String,

    #[sea_orm(column_type = "String(Some(255))", nullable)]
    pub contact_email: Option<String>,

    #[sea_orm(column_type = "String(Some(50))", nullable)]
    pub contact_phone: Option<String>,

    #[sea_orm(column_type = "String(Some(100))", nullable)]
    pub industry: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub logo_url: Option<String>,

    pub status: OrganisationStatus,

    #[sea_orm(column_type = "String(Some(64))")]
    pub timezone: String,

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
        on_delete = "Restrict"
    )]
    Partner,
    #[sea_orm(has_many = "super::agent::Entity")]
    Agents,
    #[sea_orm(has_many = "super::chat_user::Entity")]
    ChatUsers,
}

impl Related<super::partner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partner.def()
    }
}

impl Related<super::agent::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Agents.def()
    }
}

impl Related<super::chat_user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ChatUsers.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
