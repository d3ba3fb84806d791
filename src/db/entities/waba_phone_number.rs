// WABA 电话号码实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "waba_phone_numbers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub waba_id: Uuid,

    /// Meta 侧的 phone number ID
    #[sea_orm(column_type = "String(Some(64))", unique)]
    pub external_id: String,

    #[sea_orm(column_type = "String(Some(32))")]
    pub display_phone_number: String,

    #[sea_orm(column_type = "String(Some(255))", nullable)]
    pub verified_name: Option<String>,

    #[sea_orm(column_type = "String(Some(32))", nullable)]
    pub quality_rating: Option<String>,

    #[sea_orm(column_type = "String(Some(64))", nullable)]
    pub verification_status: Option<String>,

    pub is_registered: bool,

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
