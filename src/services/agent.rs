// 聊天机器人服务

use std::sync::Arc;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::{Validate, ValidationError};
use voxd_common::{PaginatedResponse, PaginationParams};

use crate::db::entities::{agent, waba, Agent, AgentModel, Waba, WabaPhoneNumber};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::query::{fetch_page, ilike, order_of};
use crate::services::validation::{clean_optional, validate_request};

const DEFAULT_MODEL: &str = "gpt-4o-mini";

fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("不能为空".into());
        return Err(error);
    }
    Ok(())
}

/// 创建机器人请求
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateAgentRequest {
    #[validate(length(min = 1, max = 255, message = "名称长度必须在 1-255 之间"))]
    pub name: String,
    pub description: Option<String>,
    #[validate(custom = "validate_not_blank")]
    pub system_prompt: String,
    #[validate(length(min = 1, max = 100, message = "模型名称无效"))]
    pub model: Option<String>,
    #[validate(range(min = 0.0, max = 2.0, message = "温度必须在 0-2 之间"))]
    pub temperature: Option<f64>,
    #[validate(range(min = 1, max = 32000, message = "最大 token 数必须在 1-32000 之间"))]
    pub max_tokens: Option<i32>,
    #[validate(length(min = 2, max = 16, message = "语言代码无效"))]
    pub language: Option<String>,
    pub is_active: Option<bool>,
    pub waba_phone_number_id: Option<Uuid>,
}

/// 更新机器人请求
///
/// `waba_phone_number_id` 传 null 时解除绑定。
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAgentRequest {
    #[validate(length(min = 1, max = 255, message = "名称长度必须在 1-255 之间"))]
    pub name: Option<String>,
    pub description: Option<String>,
    #[validate(custom = "validate_not_blank")]
    pub system_prompt: Option<String>,
    #[validate(length(min = 1, max = 100, message = "模型名称无效"))]
    pub model: Option<String>,
    #[validate(range(min = 0.0, max = 2.0, message = "温度必须在 0-2 之间"))]
    pub temperature: Option<f64>,
    #[validate(range(min = 1, max = 32000, message = "最大 token 数必须在 1-32000 之间"))]
    pub max_tokens: Option<i32>,
    #[validate(length(min = 2, max = 16, message = "语言代码无效"))]
    pub language: Option<String>,
    #[serde(default, deserialize_with = "crate::services::double_option")]
    #[schema(value_type = Option<Uuid>)]
    pub waba_phone_number_id: Option<Option<Uuid>>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct AgentFilter {
    pub is_active: Option<bool>,
}

pub struct AgentService {
    db: Arc<DatabaseConnection>,
}

impl AgentService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, current, params, filter))]
    pub async fn list(
        &self,
        current: &CurrentAdmin,
        organisation_id: Uuid,
        params: &PaginationParams,
        filter: &AgentFilter,
    ) -> Result<PaginatedResponse<AgentModel>, VoxdError> {
        current.scope.ensure_organisation(self.db.as_ref(), organisation_id).await?;

        let mut query = Agent::find().filter(agent::Column::OrganisationId.eq(organisation_id));
        if let Some(is_active) = filter.is_active {
            query = query.filter(agent::Column::IsActive.eq(is_active));
        }
        if let Some(term) = params.search() {
            query = query.filter(ilike(agent::Column::Name, term));
        }

        let column = match params.sort_by.as_deref() {
            Some("name") => agent::Column::Name,
            Some("updated_at") => agent::Column::UpdatedAt,
            _ => agent::Column::CreatedAt,
        };
        fetch_page(self.db.as_ref(), query.order_by(column, order_of(params)), params).await
    }

    /// 加载机器人并检查所属组织的访问范围
    pub async fn get(&self, current: &CurrentAdmin, id: Uuid) -> Result<AgentModel, VoxdError> {
        let agent = Agent::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("机器人"))?;

        current.scope.ensure_organisation(self.db.as_ref(), agent.organisation_id).await?;
        Ok(agent)
    }

    /// 号码必须属于同一组织的 WABA
    async fn ensure_phone_number(&self, organisation_id: Uuid, phone_number_id: Uuid) -> Result<(), VoxdError> {
        let phone = WabaPhoneNumber::find_by_id(phone_number_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::validation("waba_phone_number_id", "号码不存在"))?;

        let same_organisation = Waba::find_by_id(phone.waba_id)
            .filter(waba::Column::OrganisationId.eq(organisation_id))
            .one(self.db.as_ref())
            .await?
            .is_some();
        if !same_organisation {
            return Err(VoxdError::validation(
                "waba_phone_number_id",
                "号码不属于该组织的 WhatsApp 账号",
            ));
        }
        Ok(())
    }

    #[instrument(skip(self, current, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        current: &CurrentAdmin,
        organisation_id: Uuid,
        request: CreateAgentRequest,
    ) -> Result<AgentModel, VoxdError> {
        validate_request(&request)?;
        current.scope.ensure_organisation(self.db.as_ref(), organisation_id).await?;

        if let Some(phone_number_id) = request.waba_phone_number_id {
            self.ensure_phone_number(organisation_id, phone_number_id).await?;
        }

        let now = Utc::now();
        let model = agent::ActiveModel {
            id: Set(Uuid::new_v4()),
            organisation_id: Set(organisation_id),
            name: Set(request.name.trim().to_string()),
            description: Set(clean_optional(request.description)),
            system_prompt: Set(request.system_prompt.trim().to_string()),
            model: Set(clean_optional(request.model).unwrap_or_else(|| DEFAULT_MODEL.to_string())),
            temperature: Set(request.temperature.unwrap_or(0.7)),
            max_tokens: Set(request.max_tokens.unwrap_or(1024)),
            language: Set(clean_optional(request.language).unwrap_or_else(|| "en".to_string())),
            is_active: Set(request.is_active.unwrap_or(true)),
            waba_phone_number_id: Set(request.waba_phone_number_id),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let created = model.insert(self.db.as_ref()).await?;
        info!(agent_id = %created.id, organisation_id = %organisation_id, "机器人创建成功");
        Ok(created)
    }

    #[instrument(skip(self, current, request))]
    pub async fn update(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        request: UpdateAgentRequest,
    ) -> Result<AgentModel, VoxdError> {
        validate_request(&request)?;
        let existing = self.get(current, id).await?;

        if let Some(Some(phone_number_id)) = request.waba_phone_number_id {
            self.ensure_phone_number(existing.organisation_id, phone_number_id).await?;
        }

        let mut model = existing.into_active_model();
        if let Some(name) = request.name {
            model.name = Set(name.trim().to_string());
        }
        if request.description.is_some() {
            model.description = Set(clean_optional(request.description));
        }
        if let Some(prompt) = request.system_prompt {
            model.system_prompt = Set(prompt.trim().to_string());
        }
        if let Some(name) = clean_optional(request.model) {
            model.model = Set(name);
        }
        if let Some(temperature) = request.temperature {
            model.temperature = Set(temperature);
        }
        if let Some(max_tokens) = request.max_tokens {
            model.max_tokens = Set(max_tokens);
        }
        if let Some(language) = clean_optional(request.language) {
            model.language = Set(language);
        }
        if let Some(binding) = request.waba_phone_number_id {
            model.waba_phone_number_id = Set(binding);
        }
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(self.db.as_ref()).await?)
    }

    /// 切换启用状态
    pub async fn toggle_active(&self, current: &CurrentAdmin, id: Uuid) -> Result<AgentModel, VoxdError> {
        let existing = self.get(current, id).await?;
        let is_active = !existing.is_active;

        let mut model = existing.into_active_model();
        model.is_active = Set(is_active);
        model.updated_at = Set(Utc::now().into());

        let updated = model.update(self.db.as_ref()).await?;
        info!(agent_id = %id, is_active, "机器人状态已更新");
        Ok(updated)
    }

    #[instrument(skip(self, current))]
    pub async fn delete(&self, current: &CurrentAdmin, id: Uuid) -> Result<(), VoxdError> {
        let existing = self.get(current, id).await?;
        Agent::delete_by_id(existing.id).exec(self.db.as_ref()).await?;
        info!(agent_id = %id, "机器人已删除");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{
        AdminRole, OrganisationModel, OrganisationStatus, WabaModel, WabaPhoneNumberModel,
    };
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn organisation(partner_id: Option<Uuid>) -> OrganisationModel {
        OrganisationModel {
            id: Uuid::new_v4(),
            partner_id,
            name: "Bakkerij Jansen".to_string(),
            slug: "bakkerij-jansen".to_string(),
            contact_email: None,
            contact_phone: None,
            industry: None,
            logo_url: None,
            status: OrganisationStatus::Active,
            timezone: "UTC".to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn agent_model(organisation_id: Uuid) -> AgentModel {
        AgentModel {
            id: Uuid::new_v4(),
            organisation_id,
            name: "Receptionist".to_string(),
            description: None,
            system_prompt: "You are helpful.".to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            language: "en".to_string(),
            is_active: true,
            waba_phone_number_id: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn request() -> CreateAgentRequest {
        CreateAgentRequest {
            name: "Receptionist".to_string(),
            description: None,
            system_prompt: "You are helpful.".to_string(),
            model: None,
            temperature: Some(0.7),
            max_tokens: None,
            language: None,
            is_active: None,
            waba_phone_number_id: None,
        }
    }

    fn staff() -> CurrentAdmin {
        CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap()
    }

    #[test]
    fn test_request_validation() {
        let mut bad = request();
        bad.temperature = Some(2.5);
        bad.system_prompt = "   ".to_string();
        let err = validate_request(&bad).unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.contains_key("temperature"));
        assert!(fields.contains_key("system_prompt"));

        assert!(validate_request(&request()).is_ok());
    }

    #[tokio::test]
    async fn test_create_agent() {
        let org = organisation(None);
        let created = agent_model(org.id);
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![org.clone()]])
            .append_query_results([vec![created.clone()]])
            .into_connection());

        let result = AgentService::new(db).create(&staff(), org.id, request()).await.unwrap();
        assert_eq!(result.id, created.id);
    }

    #[tokio::test]
    async fn test_phone_number_from_other_organisation_rejected() {
        let org = organisation(None);
        let phone = WabaPhoneNumberModel {
            id: Uuid::new_v4(),
            waba_id: Uuid::new_v4(),
            external_id: "1100".to_string(),
            display_phone_number: "+31 6 1234 5678".to_string(),
            verified_name: None,
            quality_rating: None,
            verification_status: None,
            is_registered: false,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![org.clone()]])
            .append_query_results([vec![phone.clone()]])
            .append_query_results([Vec::<WabaModel>::new()])
            .into_connection());

        let mut req = request();
        req.waba_phone_number_id = Some(phone.id);
        let err = AgentService::new(db).create(&staff(), org.id, req).await.unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("waba_phone_number_id"));
    }

    #[tokio::test]
    async fn test_foreign_agent_is_not_found() {
        let foreign_org = organisation(Some(Uuid::new_v4()));
        let agent = agent_model(foreign_org.id);
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![agent.clone()]])
            .append_query_results([vec![foreign_org]])
            .into_connection());
        let partner = CurrentAdmin::new(Uuid::new_v4(), "p@acme.io", AdminRole::Partner, Some(Uuid::new_v4())).unwrap();

        let err = AgentService::new(db).get(&partner, agent.id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }

    #[tokio::test]
    async fn test_toggle_active() {
        let org = organisation(None);
        let agent = agent_model(org.id);
        let mut toggled = agent.clone();
        toggled.is_active = false;
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![agent.clone()]])
            .append_query_results([vec![org.clone()]])
            .append_query_results([vec![toggled]])
            .into_connection());

        let result = AgentService::new(db).toggle_active(&staff(), agent.id).await.unwrap();
        assert!(!result.is_active);
    }
}
