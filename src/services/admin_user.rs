// 后台管理员服务
// 仅超级管理员可管理账号

use std::sync::Arc;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use voxd_common::{PaginatedResponse, PaginationParams};

use crate::db::entities::{admin_user, AdminRole, AdminUser, AdminUserModel, Partner};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::auth::hash_password;
use crate::services::query::{fetch_page, ilike, order_of};
use crate::services::validation::validate_request;

/// 管理员信息（不含密码哈希）
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminUserResponse {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    pub role: AdminRole,
    pub partner_id: Option<Uuid>,
    pub is_active: bool,
    pub last_login_at: Option<chrono::DateTime<Utc>>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<AdminUserModel> for AdminUserResponse {
    fn from(model: AdminUserModel) -> Self {
        Self {
            id: model.id,
            email: model.email,
            name: model.name,
            role: model.role,
            partner_id: model.partner_id,
            is_active: model.is_active,
            last_login_at: model.last_login_at.map(Into::into),
            created_at: model.created_at.into(),
        }
    }
}

/// 创建管理员请求
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateAdminUserRequest {
    #[validate(email(message = "邮箱格式无效"))]
    pub email: String,
    #[validate(length(min = 1, max = 255, message = "姓名长度必须在 1-255 之间"))]
    pub name: String,
    #[validate(length(min = 8, max = 128, message = "密码长度必须在 8-128 之间"))]
    pub password: String,
    pub role: AdminRole,
    pub partner_id: Option<Uuid>,
}

/// 更新管理员请求，`password` 非空时重置密码
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateAdminUserRequest {
    #[validate(email(message = "邮箱格式无效"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 255, message = "姓名长度必须在 1-255 之间"))]
    pub name: Option<String>,
    #[validate(length(min = 8, max = 128, message = "密码长度必须在 8-128 之间"))]
    pub password: Option<String>,
    pub role: Option<AdminRole>,
    pub partner_id: Option<Uuid>,
}

/// 管理员列表过滤条件
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct AdminUserFilter {
    pub role: Option<AdminRole>,
    pub partner_id: Option<Uuid>,
    pub is_active: Option<bool>,
}

pub struct AdminUserService {
    db: Arc<DatabaseConnection>,
    bcrypt_cost: u32,
}

impl AdminUserService {
    pub fn new(db: Arc<DatabaseConnection>, bcrypt_cost: u32) -> Self {
        Self { db, bcrypt_cost }
    }

    #[instrument(skip(self, current, params, filter))]
    pub async fn list(
        &self,
        current: &CurrentAdmin,
        params: &PaginationParams,
        filter: &AdminUserFilter,
    ) -> Result<PaginatedResponse<AdminUserResponse>, VoxdError> {
        current.require_super_admin()?;

        let mut query = AdminUser::find();
        if let Some(role) = filter.role {
            query = query.filter(admin_user::Column::Role.eq(role));
        }
        if let Some(partner_id) = filter.partner_id {
            query = query.filter(admin_user::Column::PartnerId.eq(partner_id));
        }
        if let Some(is_active) = filter.is_active {
            query = query.filter(admin_user::Column::IsActive.eq(is_active));
        }
        if let Some(term) = params.search() {
            query = query.filter(
                Condition::any()
                    .add(ilike(admin_user::Column::Name, term))
                    .add(ilike(admin_user::Column::Email, term)),
            );
        }

        let column = match params.sort_by.as_deref() {
            Some("name") => admin_user::Column::Name,
            Some("email") => admin_user::Column::Email,
            Some("last_login_at") => admin_user::Column::LastLoginAt,
            _ => admin_user::Column::CreatedAt,
        };
        query = query.order_by(column, order_of(params));

        Ok(fetch_page(self.db.as_ref(), query, params).await?.map(AdminUserResponse::from))
    }

    pub async fn get(&self, current: &CurrentAdmin, id: Uuid) -> Result<AdminUserResponse, VoxdError> {
        current.require_super_admin()?;
        Ok(self.find(id).await?.into())
    }

    async fn find(&self, id: Uuid) -> Result<AdminUserModel, VoxdError> {
        AdminUser::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("管理员"))
    }

    async fn ensure_email_available(&self, email: &str, exclude: Option<Uuid>) -> Result<(), VoxdError> {
        let mut query = AdminUser::find().filter(admin_user::Column::Email.eq(email));
        if let Some(id) = exclude {
            query = query.filter(admin_user::Column::Id.ne(id));
        }
        if query.one(self.db.as_ref()).await?.is_some() {
            return Err(VoxdError::validation("email", "该邮箱已被使用"));
        }
        Ok(())
    }

    /// 合作伙伴角色必须绑定存在的合作伙伴，其余角色不绑定
    async fn resolve_partner(
        &self,
        role: AdminRole,
        partner_id: Option<Uuid>,
    ) -> Result<Option<Uuid>, VoxdError> {
        if role.is_staff() {
            return Ok(None);
        }

        let partner_id = partner_id
            .ok_or_else(|| VoxdError::validation("partner_id", "合作伙伴账号必须选择合作伙伴"))?;

        if Partner::find_by_id(partner_id).one(self.db.as_ref()).await?.is_none() {
            return Err(VoxdError::validation("partner_id", "合作伙伴不存在"));
        }
        Ok(Some(partner_id))
    }

    #[instrument(skip(self, current, request), fields(email = %request.email))]
    pub async fn create(
        &self,
        current: &CurrentAdmin,
        request: CreateAdminUserRequest,
    ) -> Result<AdminUserResponse, VoxdError> {
        current.require_super_admin()?;
        validate_request(&request)?;

        let email = request.email.trim().to_lowercase();
        self.ensure_email_available(&email, None).await?;
        let partner_id = self.resolve_partner(request.role, request.partner_id).await?;

        let created = self
            .insert(&email, request.name.trim(), &request.password, request.role, partner_id)
            .await?;

        info!(admin_id = %created.id, role = created.role.as_str(), "管理员创建成功");
        Ok(created.into())
    }

    /// 初始化超级管理员（命令行使用，不做权限检查）
    #[instrument(skip(self, password))]
    pub async fn create_super_admin(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<AdminUserModel, VoxdError> {
        let request = CreateAdminUserRequest {
            email: email.to_string(),
            name: name.to_string(),
            password: password.to_string(),
            role: AdminRole::SuperAdmin,
            partner_id: None,
        };
        validate_request(&request)?;

        let email = email.trim().to_lowercase();
        self.ensure_email_available(&email, None).await?;
        self.insert(&email, name.trim(), password, AdminRole::SuperAdmin, None).await
    }

    async fn insert(
        &self,
        email: &str,
        name: &str,
        password: &str,
        role: AdminRole,
        partner_id: Option<Uuid>,
    ) -> Result<AdminUserModel, VoxdError> {
        let now = Utc::now();
        let model = admin_user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            name: Set(name.to_string()),
            password_hash: Set(hash_password(password, self.bcrypt_cost)?),
            role: Set(role),
            partner_id: Set(partner_id),
            is_active: Set(true),
            last_login_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };
        Ok(model.insert(self.db.as_ref()).await?)
    }

    #[instrument(skip(self, current, request))]
    pub async fn update(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        request: UpdateAdminUserRequest,
    ) -> Result<AdminUserResponse, VoxdError> {
        current.require_super_admin()?;
        validate_request(&request)?;

        let existing = self.find(id).await?;

        if id == current.id && request.role.is_some_and(|role| role != existing.role) {
            return Err(VoxdError::validation("role", "不能修改自己的角色"));
        }

        let role = request.role.unwrap_or(existing.role);
        let partner_id = self
            .resolve_partner(role, request.partner_id.or(existing.partner_id))
            .await?;

        let mut model = existing.into_active_model();

        if let Some(email) = request.email {
            let email = email.trim().to_lowercase();
            self.ensure_email_available(&email, Some(id)).await?;
            model.email = Set(email);
        }
        if let Some(name) = request.name {
            model.name = Set(name.trim().to_string());
        }
        if let Some(password) = request.password.filter(|p| !p.is_empty()) {
            model.password_hash = Set(hash_password(&password, self.bcrypt_cost)?);
            info!(admin_id = %id, "管理员密码已重置");
        }
        model.role = Set(role);
        model.partner_id = Set(partner_id);
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(self.db.as_ref()).await?.into())
    }

    /// 启用或停用账号
    #[instrument(skip(self, current))]
    pub async fn set_active(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        is_active: bool,
    ) -> Result<AdminUserResponse, VoxdError> {
        current.require_super_admin()?;
        if id == current.id && !is_active {
            return Err(VoxdError::bad_request("不能停用自己的账号"));
        }

        let mut model = self.find(id).await?.into_active_model();
        model.is_active = Set(is_active);
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(self.db.as_ref()).await?.into())
    }

    #[instrument(skip(self, current))]
    pub async fn delete(&self, current: &CurrentAdmin, id: Uuid) -> Result<(), VoxdError> {
        current.require_super_admin()?;
        if id == current.id {
            return Err(VoxdError::bad_request("不能删除自己的账号"));
        }

        let existing = self.find(id).await?;
        AdminUser::delete_by_id(existing.id).exec(self.db.as_ref()).await?;

        info!(admin_id = %id, "管理员已删除");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn admin_model(role: AdminRole, partner_id: Option<Uuid>) -> AdminUserModel {
        AdminUserModel {
            id: Uuid::new_v4(),
            email: "sam@voxd.io".to_string(),
            name: "Sam".to_string(),
            password_hash: hash_password("correct horse", 4).unwrap(),
            role,
            partner_id,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn super_admin() -> CurrentAdmin {
        CurrentAdmin::new(Uuid::new_v4(), "root@voxd.io", AdminRole::SuperAdmin, None).unwrap()
    }

    #[tokio::test]
    async fn test_only_super_admin_manages_accounts() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = AdminUserService::new(db, 4);
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();

        let err = service.get(&staff, Uuid::new_v4()).await.unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_create_partner_admin_requires_partner() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<AdminUserModel>::new()])
            .into_connection());
        let service = AdminUserService::new(db, 4);

        let err = service
            .create(
                &super_admin(),
                CreateAdminUserRequest {
                    email: "Partner@Example.com".to_string(),
                    name: "Pat".to_string(),
                    password: "long enough".to_string(),
                    role: AdminRole::Partner,
                    partner_id: None,
                },
            )
            .await
            .unwrap_err();

        assert!(err.field_errors().unwrap().contains_key("partner_id"));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_form() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = AdminUserService::new(db, 4);

        let err = service
            .create(
                &super_admin(),
                CreateAdminUserRequest {
                    email: "not-an-email".to_string(),
                    name: String::new(),
                    password: "short".to_string(),
                    role: AdminRole::Admin,
                    partner_id: None,
                },
            )
            .await
            .unwrap_err();

        let fields = err.field_errors().unwrap();
        assert!(fields.contains_key("email"));
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("password"));
    }

    #[tokio::test]
    async fn test_create_super_admin_lowercases_email() {
        let mut created = admin_model(AdminRole::SuperAdmin, None);
        created.email = "root@voxd.io".to_string();

        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<AdminUserModel>::new()])
            .append_query_results([vec![created.clone()]])
            .into_connection());
        let service = AdminUserService::new(db, 4);

        let model = service
            .create_super_admin("Root@Voxd.io", "Root", "a very long password")
            .await
            .unwrap();
        assert_eq!(model.email, "root@voxd.io");
        assert_eq!(model.role, AdminRole::SuperAdmin);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_field_error() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![admin_model(AdminRole::Admin, None)]])
            .into_connection());
        let service = AdminUserService::new(db, 4);

        let err = service
            .create_super_admin("sam@voxd.io", "Sam", "a very long password")
            .await
            .unwrap_err();
        assert_eq!(err.field_errors().unwrap()["email"][0], "该邮箱已被使用");
    }

    #[tokio::test]
    async fn test_cannot_delete_or_deactivate_self() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let service = AdminUserService::new(db, 4);
        let me = super_admin();

        assert_eq!(service.delete(&me, me.id).await.unwrap_err().status_code(), 400);
        assert_eq!(service.set_active(&me, me.id, false).await.unwrap_err().status_code(), 400);
    }

    #[test]
    fn test_response_hides_password_hash() {
        let response = AdminUserResponse::from(admin_model(AdminRole::Admin, None));
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["role"], "admin");
    }
}
