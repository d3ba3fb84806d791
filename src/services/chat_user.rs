// 聊天用户服务

use std::sync::Arc;
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel,
    QueryFilter, QueryOrder, QuerySelect, Select, Set,
};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use voxd_common::{PaginatedResponse, PaginationParams};

use crate::db::entities::{chat_user, ChatUser, ChatUserModel};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::export::EXPORT_LIMIT;
use crate::services::query::{fetch_page, ilike, order_of};
use crate::services::validation::{clean_optional, normalize_phone, validate_phone, validate_request};

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateChatUserRequest {
    #[validate(custom = "validate_phone")]
    pub phone_number: String,
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[validate(email(message = "邮箱格式无效"))]
    pub email: Option<String>,
    #[validate(length(min = 2, max = 16, message = "语言代码无效"))]
    pub language: Option<String>,
    pub is_blocked: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateChatUserRequest {
    #[validate(custom = "validate_phone")]
    pub phone_number: Option<String>,
    #[validate(length(max = 255))]
    pub name: Option<String>,
    #[validate(email(message = "邮箱格式无效"))]
    pub email: Option<String>,
    #[validate(length(min = 2, max = 16, message = "语言代码无效"))]
    pub language: Option<String>,
    pub is_blocked: Option<bool>,
    #[schema(value_type = Option<Object>)]
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct ChatUserFilter {
    pub is_blocked: Option<bool>,
}

pub struct ChatUserService {
    db: Arc<DatabaseConnection>,
}

impl ChatUserService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn query(organisation_id: Uuid, filter: &ChatUserFilter, search: Option<&str>) -> Select<ChatUser> {
        let mut query = ChatUser::find().filter(chat_user::Column::OrganisationId.eq(organisation_id));
        if let Some(is_blocked) = filter.is_blocked {
            query = query.filter(chat_user::Column::IsBlocked.eq(is_blocked));
        }
        if let Some(term) = search {
            query = query.filter(
                Condition::any()
                    .add(ilike(chat_user::Column::PhoneNumber, term))
                    .add(ilike(chat_user::Column::Name, term)),
            );
        }
        query
    }

    #[instrument(skip(self, current, params, filter))]
    pub async fn list(
        &self,
        current: &CurrentAdmin,
        organisation_id: Uuid,
        params: &PaginationParams,
        filter: &ChatUserFilter,
    ) -> Result<PaginatedResponse<ChatUserModel>, VoxdError> {
        current.scope.ensure_organisation(self.db.as_ref(), organisation_id).await?;

        let column = match params.sort_by.as_deref() {
            Some("name") => chat_user::Column::Name,
            Some("phone_number") => chat_user::Column::PhoneNumber,
            Some("last_seen_at") => chat_user::Column::LastSeenAt,
            _ => chat_user::Column::CreatedAt,
        };
        let query = Self::query(organisation_id, filter, params.search()).order_by(column, order_of(params));
        fetch_page(self.db.as_ref(), query, params).await
    }

    pub async fn get(&self, current: &CurrentAdmin, id: Uuid) -> Result<ChatUserModel, VoxdError> {
        let user = ChatUser::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("聊天用户"))?;

        current.scope.ensure_organisation(self.db.as_ref(), user.organisation_id).await?;
        Ok(user)
    }

    /// 号码在组织内唯一
    async fn ensure_phone_available(
        &self,
        organisation_id: Uuid,
        phone_number: &str,
        exclude: Option<Uuid>,
    ) -> Result<(), VoxdError> {
        let mut query = ChatUser::find()
            .filter(chat_user::Column::OrganisationId.eq(organisation_id))
            .filter(chat_user::Column::PhoneNumber.eq(phone_number));
        if let Some(id) = exclude {
            query = query.filter(chat_user::Column::Id.ne(id));
        }
        if query.one(self.db.as_ref()).await?.is_some() {
            return Err(VoxdError::validation("phone_number", "该号码已存在"));
        }
        Ok(())
    }

    #[instrument(skip(self, current, request))]
    pub async fn create(
        &self,
        current: &CurrentAdmin,
        organisation_id: Uuid,
        request: CreateChatUserRequest,
    ) -> Result<ChatUserModel, VoxdError> {
        validate_request(&request)?;
        current.scope.ensure_organisation(self.db.as_ref(), organisation_id).await?;

        let phone_number = normalize_phone(&request.phone_number)?;
        self.ensure_phone_available(organisation_id, &phone_number, None).await?;

        let now = Utc::now();
        let model = chat_user::ActiveModel {
            id: Set(Uuid::new_v4()),
            organisation_id: Set(organisation_id),
            phone_number: Set(phone_number),
            name: Set(clean_optional(request.name)),
            email: Set(clean_optional(request.email).map(|e| e.to_lowercase())),
            language: Set(clean_optional(request.language)),
            is_blocked: Set(request.is_blocked.unwrap_or(false)),
            metadata: Set(request.metadata.unwrap_or_else(|| json!({}))),
            last_seen_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let created = model.insert(self.db.as_ref()).await?;
        info!(chat_user_id = %created.id, organisation_id = %organisation_id, "聊天用户创建成功");
        Ok(created)
    }

    #[instrument(skip(self, current, request))]
    pub async fn update(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        request: UpdateChatUserRequest,
    ) -> Result<ChatUserModel, VoxdError> {
        validate_request(&request)?;
        let existing = self.get(current, id).await?;
        let organisation_id = existing.organisation_id;

        let mut model = existing.into_active_model();
        if let Some(raw) = request.phone_number {
            let phone_number = normalize_phone(&raw)?;
            self.ensure_phone_available(organisation_id, &phone_number, Some(id)).await?;
            model.phone_number = Set(phone_number);
        }
        if request.name.is_some() {
            model.name = Set(clean_optional(request.name));
        }
        if request.email.is_some() {
            model.email = Set(clean_optional(request.email).map(|e| e.to_lowercase()));
        }
        if request.language.is_some() {
            model.language = Set(clean_optional(request.language));
        }
        if let Some(is_blocked) = request.is_blocked {
            model.is_blocked = Set(is_blocked);
        }
        if let Some(metadata) = request.metadata {
            model.metadata = Set(metadata);
        }
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(self.db.as_ref()).await?)
    }

    pub async fn delete(&self, current: &CurrentAdmin, id: Uuid) -> Result<(), VoxdError> {
        let existing = self.get(current, id).await?;
        ChatUser::delete_by_id(existing.id).exec(self.db.as_ref()).await?;
        info!(chat_user_id = %id, "聊天用户已删除");
        Ok(())
    }

    pub async fn export(
        &self,
        current: &CurrentAdmin,
        organisation_id: Uuid,
        filter: &ChatUserFilter,
        search: Option<&str>,
    ) -> Result<Vec<ChatUserModel>, VoxdError> {
        current.scope.ensure_organisation(self.db.as_ref(), organisation_id).await?;

        Ok(Self::query(organisation_id, filter, search)
            .order_by_asc(chat_user::Column::PhoneNumber)
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

    fn organisation() -> OrganisationModel {
        OrganisationModel {
            id: Uuid::new_v4(),
            partner_id: None,
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

    fn chat_user(organisation_id: Uuid, phone_number: &str) -> ChatUserModel {
        ChatUserModel {
            id: Uuid::new_v4(),
            organisation_id,
            phone_number: phone_number.to_string(),
            name: Some("Eva".to_string()),
            email: None,
            language: None,
            is_blocked: false,
            metadata: json!({}),
            last_seen_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn request(phone_number: &str) -> CreateChatUserRequest {
        CreateChatUserRequest {
            phone_number: phone_number.to_string(),
            name: Some("Eva".to_string()),
            email: None,
            language: None,
            is_blocked: None,
            metadata: None,
        }
    }

    fn staff() -> CurrentAdmin {
        CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap()
    }

    #[test]
    fn test_invalid_phone_rejected_by_validation() {
        let err = validate_request(&request("12-34")).unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("phone_number"));
    }

    #[tokio::test]
    async fn test_create_normalises_phone() {
        let org = organisation();
        let created = chat_user(org.id, "+31612345678");
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![org.clone()]])
            .append_query_results([Vec::<ChatUserModel>::new()])
            .append_query_results([vec![created]])
            .into_connection());

        let result = ChatUserService::new(db)
            .create(&staff(), org.id, request("0031 6-1234 5678"))
            .await
            .unwrap();
        assert_eq!(result.phone_number, "+31612345678");
    }

    #[tokio::test]
    async fn test_duplicate_phone_in_organisation_rejected() {
        let org = organisation();
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![org.clone()]])
            .append_query_results([vec![chat_user(org.id, "+31612345678")]])
            .into_connection());

        let err = ChatUserService::new(db)
            .create(&staff(), org.id, request("+31 6 12345678"))
            .await
            .unwrap_err();
        assert_eq!(err.field_errors().unwrap()["phone_number"][0], "该号码已存在");
    }
}
