// 报价单实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 报价单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema)]
#[sea_orm(rs_type = "String", db_type = "String(Some(32))")]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    #[sea_orm(string_value = "draft")]
    Draft,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "viewed")]
    Viewed,
    #[sea_orm(string_value = "accepted")]
    Accepted,
    #[sea_orm(string_value = "declined")]
    Declined,
    #[sea_orm(string_value = "expired")]
    Expired,
}

impl QuoteStatus {
    /// 客户是否已经作出答复
    pub fn is_decided(&self) -> bool {
        matches!(self, Self::Accepted | Self::Declined)
    }
}

/// 报价单实体
///
/// 金额一律以分为单位的整数存储。
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "quotes")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(nullable)]
    pub partner_id: Option<Uuid>,

    #[sea_orm(nullable)]
    pub organisation_id: Option<Uuid>,

    /// 形如 `Q-202601-4F7K2Q`
    #[sea_orm(column_type = "String(Some(32))", unique)]
    pub quote_number: String,

    /// 公开页面访问令牌
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub public_token: String,

    #[sea_orm(column_type = "String(Some(255))")]
    pub title: String,

    #[sea_orm(column_type = "String(Some(255))")]
    pub client_name: String,

    #[sea_orm(column_type = "String(Some(255))", nullable)]
    pub client_email: Option<String>,

    #[sea_orm(column_type = "String(Some(255))", nullable)]
    pub client_company: Option<String>,

    #[sea_orm(column_type = "String(Some(3))")]
    pub currency: String,

    /// `[{ description, quantity, unit_price_cents }]`
    #[sea_orm(column_type = "JsonBinary")]
    pub line_items: Json,

    pub subtotal_cents: i64,
    pub discount_cents: i64,
    /// 税率，万分比（2100 表示 21%）
    pub tax_rate_bps: i32,
    pub tax_cents: i64,
    pub total_cents: i64,

    pub status: QuoteStatus,

    #[sea_orm(nullable)]
    pub valid_until: Option<DateTimeWithTimeZone>,

    /// 内部备注，不在公开页面展示
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub terms: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub pitch: Option<String>,

    #[sea_orm(column_type = "Text", nullable)]
    pub concept: Option<String>,

    #[sea_orm(nullable)]
    pub sent_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub viewed_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(nullable)]
    pub responded_at: Option<DateTimeWithTimeZone>,

    #[sea_orm(column_type = "Text", nullable)]
    pub response_note: Option<String>,

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
        on_delete = "SetNull"
    )]
    Partner,
}

impl Related<super::partner::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Partner.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
