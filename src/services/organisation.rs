// 组织（客户）服务

use std::sync::Arc;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use voxd_common::{PaginatedResponse, PaginationParams};

use crate::db::entities::{
    agent, organisation, Agent, Organisation, OrganisationModel, OrganisationStatus, Partner,
};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::export::EXPORT_LIMIT;
use crate::services::query::{fetch_page, ilike, order_of};
use crate::services::validation::{clean_optional, slugify, validate_request, SLUG_REGEX};

/// 创建组织请求
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateOrganisationRequest {
    /// 合作伙伴管理员创建时忽略，固定为其所属合作伙伴
    pub partner_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "名称长度必须在 1-255 之间"))]
    pub name: String,
    #[validate(regex(path = "SLUG_REGEX", message = "只能包含小写字母、数字和连字符"))]
    pub slug: Option<String>,
    #[validate(email(message = "邮箱格式无效"))]
    pub contact_email: Option<String>,
    #[validate(length(max = 50))]
    pub contact_phone: Option<String>,
    #[validate(length(max = 100))]
    pub industry: Option<String>,
    pub status: Option<OrganisationStatus>,
    #[validate(length(min = 1, max = 64, message = "时区无效"))]
    pub timezone: Option<String>,
}

/// 更新组织请求
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateOrganisationRequest {
    /// 仅平台员工可修改
    pub partner_id: Option<Uuid>,
    #[validate(length(min = 1, max = 255, message = "名称长度必须在 1-255 之间"))]
    pub name: Option<String>,
    #[validate(regex(path = "SLUG_REGEX", message = "只能包含小写字母、数字和连字符"))]
    pub slug: Option<String>,
    #[validate(email(message = "邮箱格式无效"))]
    pub contact_email: Option<String>,
    #[validate(length(max = 50))]
    pub contact_phone: Option<String>,
    #[validate(length(max = 100))]
    pub industry: Option<String>,
    pub status: Option<OrganisationStatus>,
    #[validate(length(min = 1, max = 64, message = "时区无效"))]
    pub timezone: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct OrganisationFilter {
    pub status: Option<OrganisationStatus>,
    pub partner_id: Option<Uuid>,
}

pub struct OrganisationService {
    db: Arc<DatabaseConnection>,
}

impl OrganisationService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn scoped_query(
        &self,
        current: &CurrentAdmin,
        filter: &OrganisationFilter,
        search: Option<&str>,
    ) -> Select<Organisation> {
        let mut query = Organisation::find()
            .filter(current.scope.partner_condition(organisation::Column::PartnerId));

        if let Some(status) = filter.status {
            query = query.filter(organisation::Column::Status.eq(status));
        }
        if let Some(partner_id) = filter.partner_id {
            query = query.filter(organisation::Column::PartnerId.eq(partner_id));
        }
        if let Some(term) = search {
            query = query.filter(
                Condition::any()
                    .add(ilike(organisation::Column::Name, term))
                    .add(ilike(organisation::Column::Slug, term))
                    .add(ilike(organisation::Column::ContactEmail, term)),
            );
        }
        query
    }

    #[instrument(skip(self, current, params, filter))]
    pub async fn list(
        &self,
        current: &CurrentAdmin,
        params: &PaginationParams,
        filter: &OrganisationFilter,
    ) -> Result<PaginatedResponse<OrganisationModel>, VoxdError> {
        let column = match params.sort_by.as_deref() {
            Some("name") => organisation::Column::Name,
            Some("status") => organisation::Column::Status,
            Some("updated_at") => organisation::Column::UpdatedAt,
            _ => organisation::Column::CreatedAt,
        };
        let query = self
            .scoped_query(current, filter, params.search())
            .order_by(column, order_of(params));

        fetch_page(self.db.as_ref(), query, params).await
    }

    pub async fn get(&self, current: &CurrentAdmin, id: Uuid) -> Result<OrganisationModel, VoxdError> {
        current.scope.ensure_organisation(self.db.as_ref(), id).await
    }

    async fn ensure_slug_available(&self, slug: &str, exclude: Option<Uuid>) -> Result<(), VoxdError> {
        let mut query = Organisation::find().filter(organisation::Column::Slug.eq(slug));
        if let Some(id) = exclude {
            query = query.filter(organisation::Column::Id.ne(id));
        }
        if query.one(self.db.as_ref()).await?.is_some() {
            return Err(VoxdError::validation("slug", "该标识已被使用"));
        }
        Ok(())
    }

    async fn ensure_partner_exists(&self, partner_id: Uuid) -> Result<(), VoxdError> {
        if Partner::find_by_id(partner_id).one(self.db.as_ref()).await?.is_none() {
            return Err(VoxdError::validation("partner_id", "合作伙伴不存在"));
        }
        Ok(())
    }

    #[instrument(skip(self, current, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        current: &CurrentAdmin,
        request: CreateOrganisationRequest,
    ) -> Result<OrganisationModel, VoxdError> {
        validate_request(&request)?;

        // 合作伙伴只能为自己创建组织
        let partner_id = match current.scope.partner_id() {
            Some(own) => Some(own),
            None => {
                if let Some(partner_id) = request.partner_id {
                    self.ensure_partner_exists(partner_id).await?;
                }
                request.partner_id
            }
        };

        let slug = clean_optional(request.slug).unwrap_or_else(|| slugify(&request.name));
        if !SLUG_REGEX.is_match(&slug) {
            return Err(VoxdError::validation("slug", "无法从名称生成标识，请手动填写"));
        }
        self.ensure_slug_available(&slug, None).await?;

        let now = Utc::now();
        let model = organisation::ActiveModel {
            id: Set(Uuid::new_v4()),
            partner_id: Set(partner_id),
            name: Set(request.name.trim().to_string()),
            slug: Set(slug),
            contact_email: Set(clean_optional(request.contact_email).map(|e| e.to_lowercase())),
            contact_phone: Set(clean_optional(request.contact_phone)),
            industry: Set(clean_optional(request.industry)),
            logo_url: Set(None),
            status: Set(request.status.unwrap_or(OrganisationStatus::Trial)),
            timezone: Set(clean_optional(request.timezone).unwrap_or_else(|| "UTC".to_string())),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let created = model.insert(self.db.as_ref()).await?;
        info!(organisation_id = %created.id, partner_id = ?created.partner_id, "组织创建成功");
        Ok(created)
    }

    #[instrument(skip(self, current, request))]
    pub async fn update(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        request: UpdateOrganisationRequest,
    ) -> Result<OrganisationModel, VoxdError> {
        validate_request(&request)?;
        let existing = self.get(current, id).await?;

        if request.partner_id.is_some() && request.partner_id != existing.partner_id {
            current.require_staff()?;
            if let Some(partner_id) = request.partner_id {
                self.ensure_partner_exists(partner_id).await?;
            }
        }

        let mut model = existing.into_active_model();

        if let Some(partner_id) = request.partner_id {
            model.partner_id = Set(Some(partner_id));
        }
        if let Some(name) = request.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(slug) = clean_optional(request.slug) {
            self.ensure_slug_available(&slug, Some(id)).await?;
            model.slug = Set(slug);
        }
        if request.contact_email.is_some() {
            model.contact_email = Set(clean_optional(request.contact_email).map(|e| e.to_lowercase()));
        }
        if request.contact_phone.is_some() {
            model.contact_phone = Set(clean_optional(request.contact_phone));
        }
        if request.industry.is_some() {
            model.industry = Set(clean_optional(request.industry));
        }
        if let Some(status) = request.status {
            model.status = Set(status);
        }
        if let Some(timezone) = clean_optional(request.timezone) {
            model.timezone = Set(timezone);
        }
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(self.db.as_ref()).await?)
    }

    /// 删除组织，仍有机器人时拒绝
    #[instrument(skip(self, current))]
    pub async fn delete(&self, current: &CurrentAdmin, id: Uuid) -> Result<(), VoxdError> {
        let existing = self.get(current, id).await?;

        let has_agents = Agent::find()
            .filter(agent::Column::OrganisationId.eq(existing.id))
            .one(self.db.as_ref())
            .await?
            .is_some();
        if has_agents {
            return Err(VoxdError::conflict("该组织下仍有机器人，无法删除"));
        }

        Organisation::delete_by_id(existing.id).exec(self.db.as_ref()).await?;
        info!(organisation_id = %id, "组织已删除");
        Ok(())
    }

    pub async fn set_logo(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        logo_url: String,
    ) -> Result<OrganisationModel, VoxdError> {
        let mut model = self.get(current, id).await?.into_active_model();
        model.logo_url = Set(Some(logo_url));
        model.updated_at = Set(Utc::now().into());
        Ok(model.update(self.db.as_ref()).await?)
    }

    pub async fn export(
        &self,
        current: &CurrentAdmin,
        filter: &OrganisationFilter,
        search: Option<&str>,
    ) -> Result<Vec<OrganisationModel>, VoxdError> {
        Ok(self
            .scoped_query(current, filter, search)
            .order_by_asc(organisation::Column::Name)
            .limit(EXPORT_LIMIT)
            .all(self.db.as_ref())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{AdminRole, AgentModel};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn organisation_model(partner_id: Option<Uuid>) -> OrganisationModel {
        OrganisationModel {
            id: Uuid::new_v4(),
            partner_id,
            name: "Bakkerij Jansen".to_string(),
            slug: "bakkerij-jansen".to_string(),
            contact_email: None,
            contact_phone: None,
            industry: Some("Food".to_string()),
            logo_url: None,
            status: OrganisationStatus::Trial,
            timezone: "UTC".to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn request(partner_id: Option<Uuid>) -> CreateOrganisationRequest {
        CreateOrganisationRequest {
            partner_id,
            name: "Bakkerij Jansen".to_string(),
            slug: None,
            contact_email: None,
            contact_phone: None,
            industry: Some("Food".to_string()),
            status: None,
            timezone: None,
        }
    }

    #[tokio::test]
    async fn test_partner_admin_creates_for_own_partner() {
        let mine = Uuid::new_v4();
        let created = organisation_model(Some(mine));
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<OrganisationModel>::new()])
            .append_query_results([vec![created]])
            .into_connection());
        let service = OrganisationService::new(db);
        let current = CurrentAdmin::new(Uuid::new_v4(), "p@acme.io", AdminRole::Partner, Some(mine)).unwrap();

        // 请求中的 partner_id 被忽略
        let result = service.create(&current, request(Some(Uuid::new_v4()))).await.unwrap();
        assert_eq!(result.partner_id, Some(mine));
    }

    #[tokio::test]
    async fn test_duplicate_slug_rejected() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![organisation_model(None)]])
            .into_connection());
        let service = OrganisationService::new(db);
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();

        let err = service.create(&staff, request(None)).await.unwrap_err();
        assert_eq!(err.field_errors().unwrap()["slug"][0], "该标识已被使用");
    }

    #[tokio::test]
    async fn test_partner_cannot_move_organisation() {
        let mine = Uuid::new_v4();
        let existing = organisation_model(Some(mine));
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .into_connection());
        let service = OrganisationService::new(db);
        let current = CurrentAdmin::new(Uuid::new_v4(), "p@acme.io", AdminRole::Partner, Some(mine)).unwrap();

        let err = service
            .update(
                &current,
                existing.id,
                UpdateOrganisationRequest {
                    partner_id: Some(Uuid::new_v4()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_delete_refused_while_agents_exist() {
        let existing = organisation_model(None);
        let agent = AgentModel {
            id: Uuid::new_v4(),
            organisation_id: existing.id,
            name: "Receptionist".to_string(),
            description: None,
            system_prompt: "You are helpful.".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 512,
            language: "en".to_string(),
            is_active: true,
            waba_phone_number_id: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .append_query_results([vec![agent]])
            .into_connection());
        let service = OrganisationService::new(db);
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();

        assert_eq!(service.delete(&staff, existing.id).await.unwrap_err().status_code(), 409);
    }
}
