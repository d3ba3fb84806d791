// 文档分块实体定义

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// 文档分块实体
///
/// 向量以 `REAL[]` 存储；嵌入生成失败的分块 `embedding` 为空，
/// 之后可以通过更新分块重新生成。
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "chunks")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub document_id: Uuid,

    pub organisation_id: Uuid,

    /// 在文档中的顺序，从 0 开始
    pub chunk_index: i32,

    #[sea_orm(column_type = "Text")]
    pub content: String,

    pub token_count: i32,

    #[serde(skip_serializing)]
    #[sea_orm(nullable)]
    pub embedding: Option<Vec<f32>>,

    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::document::Entity",
        from = "Column::DocumentId",
        to = "super::document::Column::Id",
        on_update = "NoAction",
        on_delete = "Cascade"
    )]
    Document,
}

impl Related<super::document::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Document.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    pub fn has_embedding(&self) -> bool {
        self.embedding.as_ref().is_some_and(|e| !e.is_empty())
    }
}
