// 知识库：文档与分块

use std::sync::Arc;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use voxd_common::{PaginatedResponse, PaginationParams};

use crate::ai::{AiClientManager, TextChunk, TextChunker};
use crate::db::entities::{
    chunk, document, Chunk, ChunkModel, Document, DocumentModel, DocumentSourceType, DocumentStatus,
};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::query::{fetch_page, ilike, order_of};
use crate::services::validation::{clean_optional, validate_request};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateDocumentRequest {
    #[validate(length(min = 1, max = 255, message = "标题长度必须在 1-255 之间"))]
    pub title: String,
    #[schema(value_type = Option<String>, example = "text")]
    pub source_type: Option<DocumentSourceType>,
    #[validate(url(message = "网址格式无效"))]
    pub source_url: Option<String>,
    #[validate(length(min = 1, message = "内容不能为空"))]
    pub content: String,
}

/// 修改内容后文档回到待处理状态
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateDocumentRequest {
    #[validate(length(min = 1, max = 255, message = "标题长度必须在 1-255 之间"))]
    pub title: Option<String>,
    #[validate(url(message = "网址格式无效"))]
    pub source_url: Option<String>,
    #[validate(length(min = 1, message = "内容不能为空"))]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ChunkRequest {
    #[validate(length(min = 1, max = 8000, message = "分块内容长度必须在 1-8000 之间"))]
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct DocumentFilter {
    #[param(value_type = Option<String>)]
    pub status: Option<DocumentStatus>,
}

/// 分块处理结果
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChunkingReport {
    pub document_id: Uuid,
    pub chunk_count: usize,
    pub embedded: usize,
    /// 嵌入失败、未带向量保存的分块序号
    pub failed_indexes: Vec<usize>,
}

/// 为每个分块生成嵌入，单个失败不影响其他分块
pub async fn embed_chunks(
    ai: &AiClientManager,
    chunks: Vec<TextChunk>,
) -> Vec<(TextChunk, Option<Vec<f32>>)> {
    let mut results = Vec::with_capacity(chunks.len());
    for text_chunk in chunks {
        let embedding = match ai.generate_embedding(&text_chunk.content).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(chunk_index = text_chunk.index, error = %e, "分块嵌入生成失败，保存为无向量分块");
                None
            }
        };
        results.push((text_chunk, embedding));
    }
    results
}

pub struct DocumentService {
    db: Arc<DatabaseConnection>,
    ai: AiClientManager,
    chunker: TextChunker,
}

impl DocumentService {
    pub fn new(db: Arc<DatabaseConnection>, ai: AiClientManager) -> Self {
        Self {
            db,
            ai,
            chunker: TextChunker::with_default_config(),
        }
    }

    #[instrument(skip(self, current, params, filter))]
    pub async fn list(
        &self,
        current: &CurrentAdmin,
        organisation_id: Uuid,
        params: &PaginationParams,
        filter: &DocumentFilter,
    ) -> Result<PaginatedResponse<DocumentModel>, VoxdError> {
        current.scope.ensure_organisation(self.db.as_ref(), organisation_id).await?;

        let mut query = Document::find().filter(document::Column::OrganisationId.eq(organisation_id));
        if let Some(status) = filter.status {
            query = query.filter(document::Column::Status.eq(status));
        }
        if let Some(term) = params.search() {
            query = query.filter(ilike(document::Column::Title, term));
        }

        let column = match params.sort_by.as_deref() {
            Some("title") => document::Column::Title,
            Some("updated_at") => document::Column::UpdatedAt,
            _ => document::Column::CreatedAt,
        };
        fetch_page(self.db.as_ref(), query.order_by(column, order_of(params)), params).await
    }

    pub async fn get(&self, current: &CurrentAdmin, id: Uuid) -> Result<DocumentModel, VoxdError> {
        let document = Document::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("文档"))?;

        current.scope.ensure_organisation(self.db.as_ref(), document.organisation_id).await?;
        Ok(document)
    }

    #[instrument(skip(self, current, request), fields(title = %request.title))]
    pub async fn create(
        &self,
        current: &CurrentAdmin,
        organisation_id: Uuid,
        request: CreateDocumentRequest,
    ) -> Result<DocumentModel, VoxdError> {
        validate_request(&request)?;
        current.scope.ensure_organisation(self.db.as_ref(), organisation_id).await?;

        let source_type = request.source_type.unwrap_or(DocumentSourceType::Text);
        let source_url = clean_optional(request.source_url);
        if source_type == DocumentSourceType::Url && source_url.is_none() {
            return Err(VoxdError::validation("source_url", "网址类文档必须填写来源地址"));
        }

        let now = Utc::now();
        let model = document::ActiveModel {
            id: Set(Uuid::new_v4()),
            organisation_id: Set(organisation_id),
            title: Set(request.title.trim().to_string()),
            source_type: Set(source_type),
            source_url: Set(source_url),
            content: Set(request.content),
            status: Set(DocumentStatus::Pending),
            chunk_count: Set(0),
            error_message: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let created = model.insert(self.db.as_ref()).await?;
        info!(document_id = %created.id, organisation_id = %organisation_id, "文档创建成功");
        Ok(created)
    }

    #[instrument(skip(self, current, request))]
    pub async fn update(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        request: UpdateDocumentRequest,
    ) -> Result<DocumentModel, VoxdError> {
        validate_request(&request)?;
        let mut model = self.get(current, id).await?.into_active_model();

        if let Some(title) = request.title {
            model.title = Set(title.trim().to_string());
        }
        if request.source_url.is_some() {
            model.source_url = Set(clean_optional(request.source_url));
        }
        if let Some(content) = request.content {
            model.content = Set(content);
            model.status = Set(DocumentStatus::Pending);
            model.error_message = Set(None);
        }
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(self.db.as_ref()).await?)
    }

    /// 删除文档，分块由外键级联删除
    pub async fn delete(&self, current: &CurrentAdmin, id: Uuid) -> Result<(), VoxdError> {
        let existing = self.get(current, id).await?;
        Document::delete_by_id(existing.id).exec(self.db.as_ref()).await?;
        info!(document_id = %id, "文档已删除");
        Ok(())
    }

    async fn set_status(
        &self,
        document: DocumentModel,
        status: DocumentStatus,
        chunk_count: Option<i32>,
        error_message: Option<String>,
    ) -> Result<DocumentModel, VoxdError> {
        let mut model = document.into_active_model();
        model.status = Set(status);
        if let Some(count) = chunk_count {
            model.chunk_count = Set(count);
        }
        model.error_message = Set(error_message);
        model.updated_at = Set(Utc::now().into());
        Ok(model.update(self.db.as_ref()).await?)
    }

    /// 重新分块并生成嵌入，替换已有分块
    #[instrument(skip(self, current))]
    pub async fn chunk(&self, current: &CurrentAdmin, id: Uuid) -> Result<ChunkingReport, VoxdError> {
        let document = self.get(current, id).await?;
        let organisation_id = document.organisation_id;
        let pieces = self.chunker.chunk(&document.content);
        let document = self.set_status(document, DocumentStatus::Processing, None, None).await?;

        let embedded = embed_chunks(&self.ai, pieces).await;
        let failed_indexes: Vec<usize> = embedded
            .iter()
            .filter(|(_, vector)| vector.is_none())
            .map(|(piece, _)| piece.index)
            .collect();

        let now = Utc::now();
        let models: Vec<chunk::ActiveModel> = embedded
            .into_iter()
            .map(|(piece, vector)| chunk::ActiveModel {
                id: Set(Uuid::new_v4()),
                document_id: Set(id),
                organisation_id: Set(organisation_id),
                chunk_index: Set(piece.index as i32),
                content: Set(piece.content),
                token_count: Set(piece.token_count as i32),
                embedding: Set(vector),
                created_at: Set(now.into()),
                updated_at: Set(now.into()),
            })
            .collect();
        let chunk_count = models.len();

        let replaced = async {
            let txn = self.db.begin().await?;
            Chunk::delete_many()
                .filter(chunk::Column::DocumentId.eq(id))
                .exec(&txn)
                .await?;
            if !models.is_empty() {
                Chunk::insert_many(models).exec_without_returning(&txn).await?;
            }
            txn.commit().await?;
            Ok::<(), VoxdError>(())
        }
        .await;

        if let Err(e) = replaced {
            warn!(document_id = %id, error = %e, "分块写入失败");
            self.set_status(document, DocumentStatus::Failed, None, Some(e.to_string()))
                .await?;
            return Err(e);
        }

        self.set_status(document, DocumentStatus::Processed, Some(chunk_count as i32), None)
            .await?;

        info!(
            document_id = %id,
            chunk_count,
            failed = failed_indexes.len(),
            "文档分块完成"
        );

        Ok(ChunkingReport {
            document_id: id,
            chunk_count,
            embedded: chunk_count - failed_indexes.len(),
            failed_indexes,
        })
    }

    pub async fn list_chunks(&self, current: &CurrentAdmin, document_id: Uuid) -> Result<Vec<ChunkModel>, VoxdError> {
        let document = self.get(current, document_id).await?;
        Ok(Chunk::find()
            .filter(chunk::Column::DocumentId.eq(document.id))
            .order_by_asc(chunk::Column::ChunkIndex)
            .all(self.db.as_ref())
            .await?)
    }

    async fn get_chunk(&self, current: &CurrentAdmin, id: Uuid) -> Result<ChunkModel, VoxdError> {
        let found = Chunk::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("分块"))?;

        current.scope.ensure_organisation(self.db.as_ref(), found.organisation_id).await?;
        Ok(found)
    }

    async fn embed_or_warn(&self, content: &str) -> Option<Vec<f32>> {
        match self.ai.generate_embedding(content).await {
            Ok(vector) => Some(vector),
            Err(e) => {
                warn!(error = %e, "分块嵌入生成失败");
                None
            }
        }
    }

    /// 手动追加分块
    #[instrument(skip(self, current, request))]
    pub async fn create_chunk(
        &self,
        current: &CurrentAdmin,
        document_id: Uuid,
        request: ChunkRequest,
    ) -> Result<ChunkModel, VoxdError> {
        validate_request(&request)?;
        let document = self.get(current, document_id).await?;

        let next_index = Chunk::find()
            .filter(chunk::Column::DocumentId.eq(document.id))
            .order_by_desc(chunk::Column::ChunkIndex)
            .one(self.db.as_ref())
            .await?
            .map(|last| last.chunk_index + 1)
            .unwrap_or(0);

        let embedding = self.embed_or_warn(&request.content).await;
        let now = Utc::now();
        let created = chunk::ActiveModel {
            id: Set(Uuid::new_v4()),
            document_id: Set(document.id),
            organisation_id: Set(document.organisation_id),
            chunk_index: Set(next_index),
            token_count: Set(TextChunker::estimate_tokens(&request.content) as i32),
            content: Set(request.content),
            embedding: Set(embedding),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(self.db.as_ref())
        .await?;

        let chunk_count = document.chunk_count + 1;
        let mut model = document.into_active_model();
        model.chunk_count = Set(chunk_count);
        model.updated_at = Set(now.into());
        model.update(self.db.as_ref()).await?;

        Ok(created)
    }

    /// 修改分块内容并重新生成嵌入
    #[instrument(skip(self, current, request))]
    pub async fn update_chunk(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        request: ChunkRequest,
    ) -> Result<ChunkModel, VoxdError> {
        validate_request(&request)?;
        let existing = self.get_chunk(current, id).await?;

        let embedding = self.embed_or_warn(&request.content).await;
        let mut model = existing.into_active_model();
        model.token_count = Set(TextChunker::estimate_tokens(&request.content) as i32);
        model.content = Set(request.content);
        model.embedding = Set(embedding);
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(self.db.as_ref()).await?)
    }

    pub async fn delete_chunk(&self, current: &CurrentAdmin, id: Uuid) -> Result<(), VoxdError> {
        let existing = self.get_chunk(current, id).await?;
        Chunk::delete_by_id(existing.id).exec(self.db.as_ref()).await?;

        if let Some(document) = Document::find_by_id(existing.document_id).one(self.db.as_ref()).await? {
            let chunk_count = (document.chunk_count - 1).max(0);
            let mut model = document.into_active_model();
            model.chunk_count = Set(chunk_count);
            model.updated_at = Set(Utc::now().into());
            model.update(self.db.as_ref()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiClient, ChunkerConfig, MockAiClient};
    use crate::config::AppConfig;
    use crate::config::AiConfig;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Arc;

    fn manager(client: Arc<dyn AiClient>) -> AiClientManager {
        let config = AiConfig {
            retry_attempts: 1,
            timeout: 5,
            ..AppConfig::default().ai
        };
        AiClientManager::with_client(config, client)
    }

    /// 内容包含 "broken" 时嵌入失败
    struct SelectiveEmbeddings;

    #[async_trait]
    impl AiClient for SelectiveEmbeddings {
        async fn generate_text(&self, _system: &str, _prompt: &str) -> Result<String, VoxdError> {
            Ok(String::new())
        }

        async fn generate_json(&self, _system: &str, _prompt: &str) -> Result<Value, VoxdError> {
            Ok(Value::Null)
        }

        async fn generate_image(&self, _prompt: &str) -> Result<Vec<u8>, VoxdError> {
            Ok(Vec::new())
        }

        async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>, VoxdError> {
            if text.contains("broken") {
                Err(VoxdError::ai_service("embedding failed"))
            } else {
                Ok(vec![0.5; 4])
            }
        }

        fn provider(&self) -> &'static str {
            "selective"
        }
    }

    fn pieces(texts: &[&str]) -> Vec<TextChunk> {
        texts
            .iter()
            .enumerate()
            .map(|(index, text)| TextChunk {
                index,
                content: text.to_string(),
                token_count: 1,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_embedding_failure_keeps_chunk() {
        let ai = manager(Arc::new(SelectiveEmbeddings));
        let results = embed_chunks(&ai, pieces(&["opening hours", "broken piece", "menu"])).await;

        assert_eq!(results.len(), 3);
        assert!(results[0].1.is_some());
        assert!(results[1].1.is_none());
        assert_eq!(results[1].0.content, "broken piece");
        assert!(results[2].1.is_some());
    }

    #[tokio::test]
    async fn test_all_embeddings_failing() {
        let ai = manager(Arc::new(MockAiClient::new().with_failing_embeddings()));
        let results = embed_chunks(&ai, pieces(&["a", "b"])).await;
        assert!(results.iter().all(|(_, vector)| vector.is_none()));
    }

    #[tokio::test]
    async fn test_chunker_output_embeds_in_order() {
        let chunker = TextChunker::new(ChunkerConfig {
            max_chunk_size: 40,
            overlap_size: 0,
        });
        let text = "First paragraph about opening hours.\n\nSecond paragraph about the menu.";
        let chunks = chunker.chunk(text);
        let ai = manager(Arc::new(MockAiClient::new()));

        let results = embed_chunks(&ai, chunks).await;
        let indexes: Vec<usize> = results.iter().map(|(piece, _)| piece.index).collect();
        assert_eq!(indexes, vec![0, 1]);
        assert!(results.iter().all(|(_, vector)| vector.as_ref().map(Vec::len) == Some(32)));
    }
}
