// 合作伙伴服务

use std::sync::Arc;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::Deserialize;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use voxd_common::{PaginatedResponse, PaginationParams};

use crate::db::entities::{organisation, partner, Organisation, Partner, PartnerModel, PartnerStatus};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::export::EXPORT_LIMIT;
use crate::services::query::{fetch_page, ilike, order_of};
use crate::services::validation::{clean_optional, slugify, validate_request, SLUG_REGEX};

/// 创建合作伙伴请求
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreatePartnerRequest {
    #[validate(length(min = 1, max = 255, message = "名称长度必须在 1-255 之间"))]
    pub name: String,
    /// 为空时由名称生成
    #[validate(regex(path = "SLUG_REGEX", message = "只能包含小写字母、数字和连字符"))]
    pub slug: Option<String>,
    #[validate(email(message = "邮箱格式无效"))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(url(message = "网址格式无效"))]
    pub website: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "佣金比例必须在 0-100 之间"))]
    pub commission_rate: Option<f64>,
    pub status: Option<PartnerStatus>,
    pub notes: Option<String>,
}

/// 更新合作伙伴请求
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePartnerRequest {
    #[validate(length(min = 1, max = 255, message = "名称长度必须在 1-255 之间"))]
    pub name: Option<String>,
    #[validate(regex(path = "SLUG_REGEX", message = "只能包含小写字母、数字和连字符"))]
    pub slug: Option<String>,
    #[validate(email(message = "邮箱格式无效"))]
    pub email: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    #[validate(url(message = "网址格式无效"))]
    pub website: Option<String>,
    #[validate(range(min = 0.0, max = 100.0, message = "佣金比例必须在 0-100 之间"))]
    pub commission_rate: Option<f64>,
    pub status: Option<PartnerStatus>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct PartnerFilter {
    pub status: Option<PartnerStatus>,
}

pub struct PartnerService {
    db: Arc<DatabaseConnection>,
}

impl PartnerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn scoped_query(&self, current: &CurrentAdmin, filter: &PartnerFilter, search: Option<&str>) -> sea_orm::Select<Partner> {
        let mut query = Partner::find().filter(current.scope.partner_condition(partner::Column::Id));

        if let Some(status) = filter.status {
            query = query.filter(partner::Column::Status.eq(status));
        }
        if let Some(term) = search {
            query = query.filter(
                Condition::any()
                    .add(ilike(partner::Column::Name, term))
                    .add(ilike(partner::Column::Email, term)),
            );
        }
        query
    }

    #[instrument(skip(self, current, params, filter))]
    pub async fn list(
        &self,
        current: &CurrentAdmin,
        params: &PaginationParams,
        filter: &PartnerFilter,
    ) -> Result<PaginatedResponse<PartnerModel>, VoxdError> {
        let column = match params.sort_by.as_deref() {
            Some("name") => partner::Column::Name,
            Some("updated_at") => partner::Column::UpdatedAt,
            _ => partner::Column::CreatedAt,
        };
        let query = self
            .scoped_query(current, filter, params.search())
            .order_by(column, order_of(params));

        fetch_page(self.db.as_ref(), query, params).await
    }

    pub async fn get(&self, current: &CurrentAdmin, id: Uuid) -> Result<PartnerModel, VoxdError> {
        let partner = Partner::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("合作伙伴"))?;

        current.scope.ensure_partner(Some(partner.id), "合作伙伴")?;
        Ok(partner)
    }

    async fn ensure_slug_available(&self, slug: &str, exclude: Option<Uuid>) -> Result<(), VoxdError> {
        let mut query = Partner::find().filter(partner::Column::Slug.eq(slug));
        if let Some(id) = exclude {
            query = query.filter(partner::Column::Id.ne(id));
        }
        if query.one(self.db.as_ref()).await?.is_some() {
            return Err(VoxdError::validation("slug", "该标识已被使用"));
        }
        Ok(())
    }

    #[instrument(skip(self, current, request), fields(name = %request.name))]
    pub async fn create(
        &self,
        current: &CurrentAdmin,
        request: CreatePartnerRequest,
    ) -> Result<PartnerModel, VoxdError> {
        current.require_staff()?;
        validate_request(&request)?;

        let slug = clean_optional(request.slug).unwrap_or_else(|| slugify(&request.name));
        if !SLUG_REGEX.is_match(&slug) {
            return Err(VoxdError::validation("slug", "无法从名称生成标识，请手动填写"));
        }
        self.ensure_slug_available(&slug, None).await?;

        let now = Utc::now();
        let model = partner::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name.trim().to_string()),
            slug: Set(slug),
            email: Set(clean_optional(request.email).map(|e| e.to_lowercase())),
            phone: Set(clean_optional(request.phone)),
            website: Set(clean_optional(request.website)),
            logo_url: Set(None),
            commission_rate: Set(request.commission_rate.unwrap_or(0.0)),
            status: Set(request.status.unwrap_or(PartnerStatus::Active)),
            notes: Set(clean_optional(request.notes)),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let created = model.insert(self.db.as_ref()).await?;
        info!(partner_id = %created.id, "合作伙伴创建成功");
        Ok(created)
    }

    #[instrument(skip(self, current, request))]
    pub async fn update(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        request: UpdatePartnerRequest,
    ) -> Result<PartnerModel, VoxdError> {
        current.require_staff()?;
        validate_request(&request)?;

        let existing = self.get(current, id).await?;
        let mut model = existing.into_active_model();

        if let Some(name) = request.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(slug) = clean_optional(request.slug) {
            self.ensure_slug_available(&slug, Some(id)).await?;
            model.slug = Set(slug);
        }
        if request.email.is_some() {
            model.email = Set(clean_optional(request.email).map(|e| e.to_lowercase()));
        }
        if request.phone.is_some() {
            model.phone = Set(clean_optional(request.phone));
        }
        if request.website.is_some() {
            model.website = Set(clean_optional(request.website));
        }
        if let Some(rate) = request.commission_rate {
            model.commission_rate = Set(rate);
        }
        if let Some(status) = request.status {
            model.status = Set(status);
        }
        if request.notes.is_some() {
            model.notes = Set(clean_optional(request.notes));
        }
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(self.db.as_ref()).await?)
    }

    /// 删除合作伙伴，仍有组织时拒绝
    #[instrument(skip(self, current))]
    pub async fn delete(&self, current: &CurrentAdmin, id: Uuid) -> Result<(), VoxdError> {
        current.require_staff()?;
        let existing = self.get(current, id).await?;

        let has_organisations = Organisation::find()
            .filter(organisation::Column::PartnerId.eq(existing.id))
            .one(self.db.as_ref())
            .await?
            .is_some();
        if has_organisations {
            return Err(VoxdError::conflict("该合作伙伴下仍有组织，无法删除"));
        }

        Partner::delete_by_id(existing.id).exec(self.db.as_ref()).await?;
        info!(partner_id = %id, "合作伙伴已删除");
        Ok(())
    }

    /// 更新 Logo 地址
    pub async fn set_logo(&self, current: &CurrentAdmin, id: Uuid, logo_url: String) -> Result<PartnerModel, VoxdError> {
        current.require_staff()?;
        let mut model = self.get(current, id).await?.into_active_model();
        model.logo_url = Set(Some(logo_url));
        model.updated_at = Set(Utc::now().into());
        Ok(model.update(self.db.as_ref()).await?)
    }

    /// 导出（按名称排序）
    pub async fn export(
        &self,
        current: &CurrentAdmin,
        filter: &PartnerFilter,
        search: Option<&str>,
    ) -> Result<Vec<PartnerModel>, VoxdError> {
        Ok(self
            .scoped_query(current, filter, search)
            .order_by_asc(partner::Column::Name)
            .limit(EXPORT_LIMIT)
            .all(self.db.as_ref())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{AdminRole, OrganisationModel, OrganisationStatus};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn partner_model(id: Uuid) -> PartnerModel {
        PartnerModel {
            id,
            name: "Acme Digital".to_string(),
            slug: "acme-digital".to_string(),
            email: Some("hello@acme.io".to_string()),
            phone: None,
            website: None,
            logo_url: None,
            commission_rate: 15.0,
            status: PartnerStatus::Active,
            notes: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn staff() -> CurrentAdmin {
        CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap()
    }

    fn partner_admin(partner_id: Uuid) -> CurrentAdmin {
        CurrentAdmin::new(Uuid::new_v4(), "p@acme.io", AdminRole::Partner, Some(partner_id)).unwrap()
    }

    fn create_request() -> CreatePartnerRequest {
        CreatePartnerRequest {
            name: "Acme Digital".to_string(),
            slug: None,
            email: Some("Hello@Acme.io".to_string()),
            phone: None,
            website: Some("https://acme.io".to_string()),
            commission_rate: Some(15.0),
            status: None,
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_generates_slug() {
        let created = partner_model(Uuid::new_v4());
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<PartnerModel>::new()])
            .append_query_results([vec![created.clone()]])
            .into_connection());
        let service = PartnerService::new(db);

        let result = service.create(&staff(), create_request()).await.unwrap();
        assert_eq!(result.slug, "acme-digital");
    }

    #[tokio::test]
    async fn test_create_validation_errors() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = PartnerService::new(db);

        let mut request = create_request();
        request.slug = Some("Not A Slug".to_string());
        request.commission_rate = Some(150.0);
        request.email = Some("nope".to_string());

        let err = service.create(&staff(), request).await.unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.contains_key("slug"));
        assert!(fields.contains_key("commission_rate"));
        assert!(fields.contains_key("email"));
    }

    #[tokio::test]
    async fn test_partner_admin_cannot_create() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = PartnerService::new(db);

        let err = service
            .create(&partner_admin(Uuid::new_v4()), create_request())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_partner_admin_reads_only_own_record() {
        let mine = Uuid::new_v4();
        let other = Uuid::new_v4();
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![partner_model(mine)], vec![partner_model(other)]])
            .into_connection());
        let service = PartnerService::new(db);
        let current = partner_admin(mine);

        assert_eq!(service.get(&current, mine).await.unwrap().id, mine);
        assert_eq!(service.get(&current, other).await.unwrap_err().status_code(), 404);
    }

    #[tokio::test]
    async fn test_delete_refused_while_organisations_exist() {
        let id = Uuid::new_v4();
        let organisation = OrganisationModel {
            id: Uuid::new_v4(),
            partner_id: Some(id),
            name: "Bakkerij".to_string(),
            slug: "bakkerij".to_string(),
            contact_email: None,
            contact_phone: None,
            industry: None,
            logo_url: None,
            status: OrganisationStatus::Active,
            timezone: "UTC".to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };

        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![partner_model(id)]])
            .append_query_results([vec![organisation]])
            .into_connection());
        let service = PartnerService::new(db);

        let err = service.delete(&staff(), id).await.unwrap_err();
        assert_eq!(err.status_code(), 409);
    }
}
