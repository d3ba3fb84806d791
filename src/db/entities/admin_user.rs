// 后台管理员实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 管理员角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum AdminRole {
    /// 平台超级管理员
    #[sea_orm(string_value = "super_admin")]
    SuperAdmin,
    /// 平台员工
    #[sea_orm(string_value = "admin")]
    Admin,
    /// 合作伙伴管理员，只能访问所属合作伙伴的数据
    #[sea_orm(string_value = "partner")]
    Partner,
}

impl AdminRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SuperAdmin => "super_admin",
            Self::Admin => "admin",
            Self::Partner => "partner",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "super_admin" => Some(Self::SuperAdmin),
            "admin" => Some(Self::Admin),
            "partner" => Some(Self::Partner),
            _ => None,
        }
    }

    /// 是否为平台员工
    pub fn is_staff(&self) -> bool {
        !matches!(self, Self::Partner)
    }
}

/// 管理员实体
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "admin_users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// 小写存储，全局唯一
    #[sea_orm(column_type = "String(Some(255))", unique)]
    pub email: String,

    #[sea_orm(column_type = "String(Some(255))")]
    pub name: String,

    #[serde(skip_serializing)]
    #[sea_orm(column_type = "String(Some(255))")]
    pub password_hash: String,

    pub role: AdminRole,

    #[sea_orm(nullable)]
    pub partner_id: Option<Uuid>,

    pub is_active: bool,

    #[sea_orm(nullable)]
    pub last_login_at: Option<DateTimeWithTimeZone>,

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
