// 示例对话及生成流水线

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, instrument, warn};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use voxd_common::{PaginatedResponse, PaginationParams};

use crate::ai::prompts::{example_conversation_prompt, ConversationBrief, EXAMPLE_CONVERSATION_SYSTEM};
use crate::ai::AiClientManager;
use crate::db::entities::{
    example_conversation, ExampleConversation, ExampleConversationModel, ExampleStatus, ImagesStatus,
};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::query::{fetch_page, ilike, order_of};
use crate::services::validation::{clean_optional, validate_request};
use crate::storage::ObjectStorage;

pub const MIN_MESSAGES: usize = 2;

/// 对话中的一条消息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ExampleMessage {
    pub role: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// 校验模型返回的对话
///
/// 至少两条消息，角色只能是 user 或 assistant，内容不能为空。
/// 不需要配图时丢弃 image_prompt。
pub fn parse_conversation(value: &Value, with_images: bool) -> Result<Vec<ExampleMessage>, VoxdError> {
    let raw = value
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| VoxdError::ai_service("生成结果缺少 messages 数组"))?;

    let mut messages = Vec::with_capacity(raw.len());
    for (index, item) in raw.iter().enumerate() {
        let role = item.get("role").and_then(Value::as_str).unwrap_or_default();
        if role != "user" && role != "assistant" {
            return Err(VoxdError::ai_service(format!("第 {} 条消息的角色无效: {}", index + 1, role)));
        }

        let content = item
            .get("content")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .ok_or_else(|| VoxdError::ai_service(format!("第 {} 条消息内容为空", index + 1)))?;

        let image_prompt = if with_images {
            item.get("image_prompt")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
        } else {
            None
        };

        messages.push(ExampleMessage {
            role: role.to_string(),
            content: content.to_string(),
            image_prompt,
            image_url: None,
        });
    }

    if messages.len() < MIN_MESSAGES {
        return Err(VoxdError::ai_service(format!("生成的对话至少需要 {} 条消息", MIN_MESSAGES)));
    }
    Ok(messages)
}

fn stored_messages(model: &ExampleConversationModel) -> Vec<ExampleMessage> {
    serde_json::from_value(model.messages.clone()).unwrap_or_default()
}

fn has_image_prompts(messages: &[ExampleMessage]) -> bool {
    messages.iter().any(|m| m.image_prompt.is_some())
}

/// 配图循环的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageOutcome {
    pub attempted: usize,
    pub produced: usize,
}

impl ImageOutcome {
    pub fn status(&self) -> ImagesStatus {
        if self.attempted == 0 || self.produced > 0 {
            ImagesStatus::Completed
        } else {
            ImagesStatus::Failed
        }
    }
}

/// 为带 image_prompt 的消息生成配图并上传，单张失败只记录日志
pub async fn render_images(
    ai: &AiClientManager,
    storage: &dyn ObjectStorage,
    example_id: Uuid,
    messages: &mut [ExampleMessage],
) -> ImageOutcome {
    let mut outcome = ImageOutcome { attempted: 0, produced: 0 };

    for (index, message) in messages.iter_mut().enumerate() {
        let Some(prompt) = message.image_prompt.clone() else {
            continue;
        };
        outcome.attempted += 1;

        let key = format!("examples/{}/{}-{}.png", example_id, index, Uuid::new_v4());
        let uploaded = match ai.generate_image(&prompt).await {
            Ok(bytes) => storage.put_object(&key, bytes, "image/png").await,
            Err(e) => Err(e),
        };

        match uploaded {
            Ok(url) => {
                message.image_url = Some(url);
                outcome.produced += 1;
            }
            Err(e) => warn!(example_id = %example_id, index, error = %e, "配图生成失败，跳过"),
        }
    }

    outcome
}

/// 后台配图任务：生成、上传并记录最终状态
pub async fn run_image_job(
    db: Arc<DatabaseConnection>,
    ai: AiClientManager,
    storage: Arc<dyn ObjectStorage>,
    example_id: Uuid,
) {
    if let Err(e) = image_job(db.as_ref(), &ai, storage.as_ref(), example_id).await {
        error!(example_id = %example_id, error = %e, "配图任务失败");
        if let Err(e) = mark_images_failed(db.as_ref(), example_id).await {
            error!(example_id = %example_id, error = %e, "配图状态回写失败");
        }
    }
}

async fn mark_images_failed(db: &DatabaseConnection, example_id: Uuid) -> Result<(), VoxdError> {
    ExampleConversation::update_many()
        .col_expr(example_conversation::Column::ImagesStatus, Expr::value(ImagesStatus::Failed))
        .col_expr(example_conversation::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(example_conversation::Column::Id.eq(example_id))
        .exec(db)
        .await?;
    Ok(())
}

async fn image_job(
    db: &DatabaseConnection,
    ai: &AiClientManager,
    storage: &dyn ObjectStorage,
    example_id: Uuid,
) -> Result<(), VoxdError> {
    let found = ExampleConversation::find_by_id(example_id)
        .one(db)
        .await?
        .ok_or_else(|| VoxdError::not_found("示例对话"))?;

    let mut messages = stored_messages(&found);
    let outcome = render_images(ai, storage, example_id, &mut messages).await;

    let mut model = found.into_active_model();
    model.messages = Set(serde_json::to_value(&messages).map_err(|e| VoxdError::internal(e.to_string()))?);
    model.images_status = Set(outcome.status());
    model.image_count = Set(outcome.produced as i32);
    model.updated_at = Set(Utc::now().into());
    model.update(db).await?;

    info!(
        example_id = %example_id,
        attempted = outcome.attempted,
        produced = outcome.produced,
        "配图任务完成"
    );
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateExampleRequest {
    /// 仅平台员工可指定，合作伙伴固定为自己
    pub partner_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "标题长度必须在 1-255 之间"))]
    pub title: String,
    #[validate(length(min = 1, max = 100, message = "行业不能为空"))]
    pub industry: String,
    #[validate(length(min = 1, max = 4000, message = "场景描述不能为空"))]
    pub scenario: String,
    #[validate(length(min = 2, max = 16, message = "语言代码无效"))]
    pub language: String,
    #[validate(length(max = 255))]
    pub business_name: Option<String>,
    #[validate(length(max = 64))]
    pub tone: Option<String>,
    #[validate(range(min = 2, max = 30, message = "消息条数必须在 2-30 之间"))]
    pub target_message_count: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateExampleRequest {
    #[validate(length(min = 1, max = 255, message = "标题长度必须在 1-255 之间"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 100, message = "行业不能为空"))]
    pub industry: Option<String>,
    #[validate(length(min = 1, max = 4000, message = "场景描述不能为空"))]
    pub scenario: Option<String>,
    #[validate(length(min = 2, max = 16, message = "语言代码无效"))]
    pub language: Option<String>,
    #[validate(length(max = 255))]
    pub business_name: Option<String>,
    #[validate(length(max = 64))]
    pub tone: Option<String>,
    #[validate(range(min = 2, max = 30, message = "消息条数必须在 2-30 之间"))]
    pub target_message_count: Option<i32>,
    /// 手工修改后的对话
    pub messages: Option<Vec<ExampleMessage>>,
}

#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
pub struct GenerateRequest {
    #[serde(default)]
    pub generate_images: bool,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ExampleFilter {
    #[param(value_type = Option<String>)]
    pub status: Option<ExampleStatus>,
    pub industry: Option<String>,
    pub partner_id: Option<Uuid>,
}

/// 轮询用的状态
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ExampleStatusView {
    pub id: Uuid,
    #[schema(value_type = String, example = "generated")]
    pub status: ExampleStatus,
    #[schema(value_type = String, example = "generating")]
    pub images_status: ImagesStatus,
    pub image_count: i32,
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<&ExampleConversationModel> for ExampleStatusView {
    fn from(model: &ExampleConversationModel) -> Self {
        Self {
            id: model.id,
            status: model.status,
            images_status: model.images_status,
            image_count: model.image_count,
            error_message: model.error_message.clone(),
            updated_at: model.updated_at.into(),
        }
    }
}

pub struct ExampleService {
    db: Arc<DatabaseConnection>,
    ai: AiClientManager,
    storage: Arc<dyn ObjectStorage>,
}

impl ExampleService {
    pub fn new(db: Arc<DatabaseConnection>, ai: AiClientManager, storage: Arc<dyn ObjectStorage>) -> Self {
        Self { db, ai, storage }
    }

    pub async fn list(
        &self,
        current: &CurrentAdmin,
        params: &PaginationParams,
        filter: &ExampleFilter,
    ) -> Result<PaginatedResponse<ExampleConversationModel>, VoxdError> {
        let mut query = ExampleConversation::find()
            .filter(current.scope.partner_condition(example_conversation::Column::PartnerId));

        if let Some(status) = filter.status {
            query = query.filter(example_conversation::Column::Status.eq(status));
        }
        if let Some(ref industry) = filter.industry {
            query = query.filter(example_conversation::Column::Industry.eq(industry.as_str()));
        }
        if let Some(partner_id) = filter.partner_id {
            query = query.filter(example_conversation::Column::PartnerId.eq(partner_id));
        }
        if let Some(term) = params.search() {
            query = query.filter(
                Condition::any()
                    .add(ilike(example_conversation::Column::Title, term))
                    .add(ilike(example_conversation::Column::Scenario, term)),
            );
        }

        let column = match params.sort_by.as_deref() {
            Some("title") => example_conversation::Column::Title,
            Some("industry") => example_conversation::Column::Industry,
            Some("updated_at") => example_conversation::Column::UpdatedAt,
            _ => example_conversation::Column::CreatedAt,
        };
        fetch_page(self.db.as_ref(), query.order_by(column, order_of(params)), params).await
    }

    pub async fn get(&self, current: &CurrentAdmin, id: Uuid) -> Result<ExampleConversationModel, VoxdError> {
        let found = ExampleConversation::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("示例对话"))?;

        current.scope.ensure_partner(found.partner_id, "示例对话")?;
        Ok(found)
    }

    pub async fn status(&self, current: &CurrentAdmin, id: Uuid) -> Result<ExampleStatusView, VoxdError> {
        Ok(ExampleStatusView::from(&self.get(current, id).await?))
    }

    #[instrument(skip(self, current, request), fields(title = %request.title))]
    pub async fn create(
        &self,
        current: &CurrentAdmin,
        request: CreateExampleRequest,
    ) -> Result<ExampleConversationModel, VoxdError> {
        validate_request(&request)?;

        let partner_id = match current.scope.partner_id() {
            Some(own) => Some(own),
            None => request.partner_id,
        };

        let now = Utc::now();
        let created = example_conversation::ActiveModel {
            id: Set(Uuid::new_v4()),
            partner_id: Set(partner_id),
            title: Set(request.title.trim().to_string()),
            industry: Set(request.industry.trim().to_string()),
            scenario: Set(request.scenario.trim().to_string()),
            language: Set(request.language.trim().to_string()),
            business_name: Set(clean_optional(request.business_name)),
            tone: Set(clean_optional(request.tone)),
            target_message_count: Set(request.target_message_count.unwrap_or(8)),
            messages: Set(Value::Array(Vec::new())),
            status: Set(ExampleStatus::Draft),
            error_message: Set(None),
            images_status: Set(ImagesStatus::NotRequested),
            image_count: Set(0),
            created_by: Set(Some(current.id)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(example_id = %created.id, "示例对话已创建");
        Ok(created)
    }

    #[instrument(skip(self, current, request))]
    pub async fn update(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        request: UpdateExampleRequest,
    ) -> Result<ExampleConversationModel, VoxdError> {
        validate_request(&request)?;
        let existing = self.get(current, id).await?;
        if existing.status == ExampleStatus::Generating {
            return Err(VoxdError::conflict("对话正在生成，请稍后再修改"));
        }
        if existing.images_status == ImagesStatus::Generating {
            return Err(VoxdError::conflict("配图正在生成，请稍后再修改"));
        }

        let mut model = existing.into_active_model();
        if let Some(title) = request.title {
            model.title = Set(title.trim().to_string());
        }
        if let Some(industry) = request.industry {
            model.industry = Set(industry.trim().to_string());
        }
        if let Some(scenario) = request.scenario {
            model.scenario = Set(scenario.trim().to_string());
        }
        if let Some(language) = request.language {
            model.language = Set(language.trim().to_string());
        }
        if request.business_name.is_some() {
            model.business_name = Set(clean_optional(request.business_name));
        }
        if request.tone.is_some() {
            model.tone = Set(clean_optional(request.tone));
        }
        if let Some(count) = request.target_message_count {
            model.target_message_count = Set(count);
        }
        if let Some(messages) = request.messages {
            let value = serde_json::to_value(&messages).map_err(|e| VoxdError::internal(e.to_string()))?;
            // 手工编辑也要满足生成结果的约束
            parse_conversation(&serde_json::json!({ "messages": value }), true)
                .map_err(|e| VoxdError::validation("messages", e.to_string()))?;
            model.image_count = Set(messages.iter().filter(|m| m.image_url.is_some()).count() as i32);
            model.messages = Set(value);
        }
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(self.db.as_ref()).await?)
    }

    pub async fn delete(&self, current: &CurrentAdmin, id: Uuid) -> Result<(), VoxdError> {
        let existing = self.get(current, id).await?;
        ExampleConversation::delete_by_id(existing.id).exec(self.db.as_ref()).await?;
        info!(example_id = %id, "示例对话已删除");
        Ok(())
    }

    /// 调用模型生成对话
    ///
    /// 失败时记录 `failed` 和错误消息并返回错误。需要配图且有 image_prompt 时
    /// 启动后台任务，不等待其完成。
    #[instrument(skip(self, current))]
    pub async fn generate(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        generate_images: bool,
    ) -> Result<ExampleConversationModel, VoxdError> {
        let existing = self.get(current, id).await?;
        if existing.status == ExampleStatus::Generating {
            return Err(VoxdError::conflict("对话正在生成"));
        }
        // 配图任务结束时会写回对话内容
        if existing.images_status == ImagesStatus::Generating {
            return Err(VoxdError::conflict("配图正在生成"));
        }

        let mut model = existing.clone().into_active_model();
        model.status = Set(ExampleStatus::Generating);
        model.error_message = Set(None);
        model.updated_at = Set(Utc::now().into());
        let generating = model.update(self.db.as_ref()).await?;

        let brief = ConversationBrief {
            industry: &existing.industry,
            scenario: &existing.scenario,
            language: &existing.language,
            business_name: existing.business_name.as_deref(),
            tone: existing.tone.as_deref(),
            message_count: existing.target_message_count,
            with_images: generate_images,
        };
        let generated = match self
            .ai
            .generate_json(EXAMPLE_CONVERSATION_SYSTEM, &example_conversation_prompt(&brief))
            .await
        {
            Ok(value) => parse_conversation(&value, generate_images),
            Err(e) => Err(e),
        };

        let mut model = generating.into_active_model();
        model.updated_at = Set(Utc::now().into());

        let messages = match generated {
            Ok(messages) => messages,
            Err(e) => {
                warn!(example_id = %id, error = %e, "示例对话生成失败");
                model.status = Set(ExampleStatus::Failed);
                model.error_message = Set(Some(e.to_string()));
                model.update(self.db.as_ref()).await?;
                return Err(e);
            }
        };

        let spawn_images = generate_images && has_image_prompts(&messages);
        model.messages = Set(serde_json::to_value(&messages).map_err(|e| VoxdError::internal(e.to_string()))?);
        model.status = Set(ExampleStatus::Generated);
        model.image_count = Set(0);
        model.images_status = Set(if spawn_images {
            ImagesStatus::Generating
        } else {
            ImagesStatus::NotRequested
        });
        let saved = model.update(self.db.as_ref()).await?;

        info!(example_id = %id, messages = messages.len(), images = spawn_images, "示例对话生成完成");

        if spawn_images {
            self.spawn_image_job(id);
        }
        Ok(saved)
    }

    /// 为已生成的对话重新生成配图
    #[instrument(skip(self, current))]
    pub async fn generate_images(&self, current: &CurrentAdmin, id: Uuid) -> Result<ExampleStatusView, VoxdError> {
        let existing = self.get(current, id).await?;
        if existing.status != ExampleStatus::Generated {
            return Err(VoxdError::conflict("请先生成对话"));
        }
        if existing.images_status == ImagesStatus::Generating {
            return Err(VoxdError::conflict("配图正在生成"));
        }
        if !has_image_prompts(&stored_messages(&existing)) {
            return Err(VoxdError::bad_request("对话中没有需要配图的消息"));
        }

        let mut model = existing.into_active_model();
        model.images_status = Set(ImagesStatus::Generating);
        model.updated_at = Set(Utc::now().into());
        let updated = model.update(self.db.as_ref()).await?;

        self.spawn_image_job(id);
        Ok(ExampleStatusView::from(&updated))
    }

    fn spawn_image_job(&self, id: Uuid) {
        tokio::spawn(run_image_job(
            self.db.clone(),
            self.ai.clone(),
            self.storage.clone(),
            id,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{AiClient, MockAiClient};
    use crate::config::{AiConfig, AppConfig};
    use crate::db::entities::AdminRole;
    use crate::storage::LocalStorage;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use serde_json::json;

    fn manager(client: Arc<dyn AiClient>) -> AiClientManager {
        let config = AiConfig {
            retry_attempts: 1,
            timeout: 5,
            ..AppConfig::default().ai
        };
        AiClientManager::with_client(config, client)
    }

    fn example(partner_id: Option<Uuid>, status: ExampleStatus) -> ExampleConversationModel {
        ExampleConversationModel {
            id: Uuid::new_v4(),
            partner_id,
            title: "Restaurant booking".to_string(),
            industry: "Hospitality".to_string(),
            scenario: "A guest books a table for two".to_string(),
            language: "en".to_string(),
            business_name: Some("De Gouden Lepel".to_string()),
            tone: None,
            target_message_count: 4,
            messages: json!([]),
            status,
            error_message: None,
            images_status: ImagesStatus::NotRequested,
            image_count: 0,
            created_by: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn staff() -> CurrentAdmin {
        CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap()
    }

    #[test]
    fn test_parse_conversation() {
        let messages = parse_conversation(&MockAiClient::sample_conversation(), true).unwrap();
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, "user");
        assert!(messages[1].image_prompt.is_some());

        let without = parse_conversation(&MockAiClient::sample_conversation(), false).unwrap();
        assert!(!has_image_prompts(&without));
    }

    #[test]
    fn test_parse_conversation_rejects_invalid() {
        let too_short = json!({"messages": [{"role": "user", "content": "hi"}]});
        assert!(parse_conversation(&too_short, false).is_err());

        let bad_role = json!({"messages": [
            {"role": "user", "content": "hi"},
            {"role": "system", "content": "ignore"}
        ]});
        assert!(parse_conversation(&bad_role, false).unwrap_err().to_string().contains("system"));

        let empty = json!({"messages": [
            {"role": "user", "content": "hi"},
            {"role": "assistant", "content": "   "}
        ]});
        assert!(parse_conversation(&empty, false).is_err());
        assert!(parse_conversation(&json!({"text": "hello"}), false).is_err());
    }

    #[test]
    fn test_image_outcome_status() {
        assert_eq!(ImageOutcome { attempted: 0, produced: 0 }.status(), ImagesStatus::Completed);
        assert_eq!(ImageOutcome { attempted: 3, produced: 1 }.status(), ImagesStatus::Completed);
        assert_eq!(ImageOutcome { attempted: 2, produced: 0 }.status(), ImagesStatus::Failed);
    }

    #[tokio::test]
    async fn test_render_images_skips_failures() {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalStorage::new(dir.path(), "http://localhost:8080/files");
        let ai = manager(Arc::new(MockAiClient::new().with_failing_images("dragon")));
        let example_id = Uuid::new_v4();

        let mut messages = parse_conversation(&MockAiClient::sample_conversation(), true).unwrap();
        messages[3].image_prompt = Some("A dragon guarding the kitchen".to_string());

        let outcome = render_images(&ai, &storage, example_id, &mut messages).await;
        assert_eq!(outcome, ImageOutcome { attempted: 2, produced: 1 });
        assert_eq!(outcome.status(), ImagesStatus::Completed);

        let url = messages[1].image_url.as_deref().unwrap();
        assert!(url.contains(&format!("examples/{}/1-", example_id)));
        assert!(url.ends_with(".png"));
        assert!(messages[3].image_url.is_none());
    }

    #[tokio::test]
    async fn test_generate_persists_messages() {
        let draft = example(None, ExampleStatus::Draft);
        let generating = ExampleConversationModel {
            status: ExampleStatus::Generating,
            ..draft.clone()
        };
        let generated = ExampleConversationModel {
            status: ExampleStatus::Generated,
            messages: json!([{"role": "user", "content": "Hi!"}]),
            ..draft.clone()
        };
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![draft.clone()]])
            .append_query_results([vec![generating]])
            .append_query_results([vec![generated]])
            .into_connection());
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(dir.path(), "http://localhost/files"));
        let service = ExampleService::new(db, manager(Arc::new(MockAiClient::new())), storage);

        let saved = service.generate(&staff(), draft.id, false).await.unwrap();
        assert_eq!(saved.status, ExampleStatus::Generated);
    }

    #[tokio::test]
    async fn test_generate_failure_marks_failed() {
        let draft = example(None, ExampleStatus::Draft);
        let generating = ExampleConversationModel {
            status: ExampleStatus::Generating,
            ..draft.clone()
        };
        let failed = ExampleConversationModel {
            status: ExampleStatus::Failed,
            ..draft.clone()
        };
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![draft.clone()]])
            .append_query_results([vec![generating]])
            .append_query_results([vec![failed]])
            .into_connection());
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(dir.path(), "http://localhost/files"));
        let ai = manager(Arc::new(MockAiClient::new().with_failing_generation()));

        let err = ExampleService::new(db, ai, storage)
            .generate(&staff(), draft.id, true)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 502);
    }

    #[tokio::test]
    async fn test_partner_cannot_see_other_partner_example() {
        let foreign = example(Some(Uuid::new_v4()), ExampleStatus::Draft);
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![foreign.clone()]])
            .into_connection());
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(dir.path(), "http://localhost/files"));
        let partner = CurrentAdmin::new(Uuid::new_v4(), "p@acme.io", AdminRole::Partner, Some(Uuid::new_v4())).unwrap();

        let err = ExampleService::new(db, manager(Arc::new(MockAiClient::new())), storage)
            .get(&partner, foreign.id)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_edits_rejected_while_images_generating() {
        let busy = ExampleConversationModel {
            images_status: ImagesStatus::Generating,
            ..example(None, ExampleStatus::Generated)
        };
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![busy.clone()], vec![busy.clone()]])
            .into_connection());
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(dir.path(), "http://localhost/files"));
        let service = ExampleService::new(db, manager(Arc::new(MockAiClient::new())), storage);

        let request = UpdateExampleRequest {
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let err = service.update(&staff(), busy.id, request).await.unwrap_err();
        assert_eq!(err.status_code(), 409);

        let err = service.generate(&staff(), busy.id, false).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_failed_image_job_marks_images_failed() {
        // 查询结果为空，任务在读取示例时失败
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection());
        let dir = tempfile::tempdir().unwrap();
        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalStorage::new(dir.path(), "http://localhost/files"));

        run_image_job(db.clone(), manager(Arc::new(MockAiClient::new())), storage, Uuid::new_v4()).await;

        let log = format!("{:?}", Arc::into_inner(db).unwrap().into_transaction_log());
        assert!(log.contains("UPDATE"));
        assert!(log.contains("images_status"));
        assert!(log.contains("failed"));
    }
}
