// WhatsApp Business 账号配置

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::db::entities::{
    message_template, waba, waba_phone_number, MessageTemplate, MessageTemplateModel, Waba,
    WabaModel, WabaPhoneNumber, WabaPhoneNumberModel, WabaStatus,
};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::validation::{clean_optional, validate_request, PIN_REGEX, TEMPLATE_NAME_REGEX};
use crate::whatsapp::{mask_token, CreateTemplateRequest as GraphTemplateRequest, GraphPhoneNumber, GraphTemplate, WhatsAppClient};

const TEMPLATE_CATEGORIES: [&str; 3] = ["MARKETING", "UTILITY", "AUTHENTICATION"];

fn validate_category(value: &str) -> Result<(), ValidationError> {
    if TEMPLATE_CATEGORIES.contains(&value) {
        return Ok(());
    }
    let mut error = ValidationError::new("category");
    error.message = Some("类别必须是 MARKETING、UTILITY 或 AUTHENTICATION".into());
    Err(error)
}

fn validate_components(value: &Value) -> Result<(), ValidationError> {
    match value.as_array() {
        Some(items) if !items.is_empty() => Ok(()),
        _ => {
            let mut error = ValidationError::new("components");
            error.message = Some("组件必须是非空数组".into());
            Err(error)
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateWabaRequest {
    /// Meta 侧的 WABA ID
    #[validate(length(min = 1, max = 64, message = "WABA ID 无效"))]
    pub external_id: String,
    #[validate(length(min = 1, message = "访问令牌不能为空"))]
    pub access_token: String,
    #[validate(length(max = 64))]
    pub business_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateWabaRequest {
    #[validate(length(min = 1, max = 255, message = "名称长度必须在 1-255 之间"))]
    pub name: Option<String>,
    #[validate(length(max = 64))]
    pub business_id: Option<String>,
    /// 更换令牌时会重新校验账号
    #[validate(length(min = 1, message = "访问令牌不能为空"))]
    pub access_token: Option<String>,
    #[schema(value_type = Option<String>, example = "active")]
    pub status: Option<WabaStatus>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterPhoneRequest {
    #[validate(regex(path = "PIN_REGEX", message = "PIN 必须是 6 位数字"))]
    pub pin: String,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateTemplateRequest {
    #[validate(regex(path = "TEMPLATE_NAME_REGEX", message = "模板名只能包含小写字母、数字和下划线"))]
    pub name: String,
    #[validate(length(min = 2, max = 16, message = "语言代码无效"))]
    pub language: String,
    #[validate(custom = "validate_category")]
    pub category: String,
    #[validate(custom = "validate_components")]
    #[schema(value_type = Vec<Object>)]
    pub components: Value,
}

/// 返回给后台的 WABA，令牌只给出掩码
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct WabaResponse {
    pub id: Uuid,
    pub organisation_id: Uuid,
    pub external_id: String,
    pub name: String,
    pub business_id: Option<String>,
    pub access_token_masked: String,
    #[schema(value_type = String, example = "active")]
    pub status: WabaStatus,
    pub webhook_subscribed: bool,
    pub last_synced_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<WabaModel> for WabaResponse {
    fn from(model: WabaModel) -> Self {
        Self {
            id: model.id,
            organisation_id: model.organisation_id,
            access_token_masked: mask_token(&model.access_token),
            external_id: model.external_id,
            name: model.name,
            business_id: model.business_id,
            status: model.status,
            webhook_subscribed: model.webhook_subscribed,
            last_synced_at: model.last_synced_at.map(Into::into),
            created_at: model.created_at.into(),
            updated_at: model.updated_at.into(),
        }
    }
}

/// 同步中的一个部分
#[derive(Debug, Clone, Default, Serialize, ToSchema)]
pub struct SyncSection {
    pub synced: usize,
    pub error: Option<String>,
}

impl SyncSection {
    fn from_result(result: Result<usize, VoxdError>, section: &str) -> Self {
        match result {
            Ok(synced) => Self { synced, error: None },
            Err(e) => {
                warn!(section, error = %e, "WABA 同步失败");
                Self {
                    synced: 0,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SyncReport {
    pub phone_numbers: SyncSection,
    pub templates: SyncSection,
}

pub struct WabaService {
    db: Arc<DatabaseConnection>,
    client: Arc<WhatsAppClient>,
}

impl WabaService {
    pub fn new(db: Arc<DatabaseConnection>, client: Arc<WhatsAppClient>) -> Self {
        Self { db, client }
    }

    pub async fn list(&self, current: &CurrentAdmin, organisation_id: Uuid) -> Result<Vec<WabaResponse>, VoxdError> {
        current.scope.ensure_organisation(self.db.as_ref(), organisation_id).await?;

        Ok(Waba::find()
            .filter(waba::Column::OrganisationId.eq(organisation_id))
            .order_by_asc(waba::Column::Name)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(WabaResponse::from)
            .collect())
    }

    async fn find(&self, current: &CurrentAdmin, id: Uuid) -> Result<WabaModel, VoxdError> {
        let found = Waba::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("WhatsApp 账号"))?;

        current.scope.ensure_organisation(self.db.as_ref(), found.organisation_id).await?;
        Ok(found)
    }

    pub async fn get(&self, current: &CurrentAdmin, id: Uuid) -> Result<WabaResponse, VoxdError> {
        Ok(self.find(current, id).await?.into())
    }

    /// 先向 Graph API 校验账号再保存
    #[instrument(skip(self, current, request), fields(external_id = %request.external_id))]
    pub async fn create(
        &self,
        current: &CurrentAdmin,
        organisation_id: Uuid,
        request: CreateWabaRequest,
    ) -> Result<WabaResponse, VoxdError> {
        validate_request(&request)?;
        current.scope.ensure_organisation(self.db.as_ref(), organisation_id).await?;

        let external_id = request.external_id.trim().to_string();
        let access_token = request.access_token.trim().to_string();

        let exists = Waba::find()
            .filter(waba::Column::ExternalId.eq(external_id.as_str()))
            .one(self.db.as_ref())
            .await?
            .is_some();
        if exists {
            return Err(VoxdError::validation("external_id", "该 WABA 已被添加"));
        }

        let remote = self.client.get_waba(&external_id, &access_token).await?;

        let now = Utc::now();
        let created = waba::ActiveModel {
            id: Set(Uuid::new_v4()),
            organisation_id: Set(organisation_id),
            name: Set(remote.name.unwrap_or_else(|| external_id.clone())),
            external_id: Set(external_id),
            business_id: Set(clean_optional(request.business_id)),
            access_token: Set(access_token),
            status: Set(WabaStatus::Active),
            webhook_subscribed: Set(false),
            last_synced_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(waba_id = %created.id, token = %mask_token(&created.access_token), "WhatsApp 账号已添加");
        Ok(created.into())
    }

    #[instrument(skip(self, current, request))]
    pub async fn update(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        request: UpdateWabaRequest,
    ) -> Result<WabaResponse, VoxdError> {
        validate_request(&request)?;
        let existing = self.find(current, id).await?;

        let new_token = request.access_token.map(|t| t.trim().to_string());
        if let Some(ref token) = new_token {
            self.client.get_waba(&existing.external_id, token).await?;
        }

        let mut model = existing.into_active_model();
        if let Some(name) = request.name {
            model.name = Set(name.trim().to_string());
        }
        if request.business_id.is_some() {
            model.business_id = Set(clean_optional(request.business_id));
        }
        if let Some(token) = new_token {
            model.access_token = Set(token);
            model.status = Set(WabaStatus::Active);
        }
        if let Some(status) = request.status {
            model.status = Set(status);
        }
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(self.db.as_ref()).await?.into())
    }

    /// 删除本地记录，号码和模板级联删除
    pub async fn delete(&self, current: &CurrentAdmin, id: Uuid) -> Result<(), VoxdError> {
        let existing = self.find(current, id).await?;
        Waba::delete_by_id(existing.id).exec(self.db.as_ref()).await?;
        info!(waba_id = %id, "WhatsApp 账号已删除");
        Ok(())
    }

    async fn upsert_phone_numbers(&self, waba_id: Uuid, numbers: Vec<GraphPhoneNumber>) -> Result<usize, VoxdError> {
        let now = Utc::now();
        let count = numbers.len();

        for number in numbers {
            let existing = WabaPhoneNumber::find()
                .filter(waba_phone_number::Column::ExternalId.eq(number.id.as_str()))
                .one(self.db.as_ref())
                .await?;

            match existing {
                Some(found) => {
                    let mut model = found.into_active_model();
                    model.waba_id = Set(waba_id);
                    model.display_phone_number = Set(number.display_phone_number);
                    model.verified_name = Set(number.verified_name);
                    model.quality_rating = Set(number.quality_rating);
                    model.verification_status = Set(number.code_verification_status);
                    model.updated_at = Set(now.into());
                    model.update(self.db.as_ref()).await?;
                }
                None => {
                    waba_phone_number::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        waba_id: Set(waba_id),
                        external_id: Set(number.id),
                        display_phone_number: Set(number.display_phone_number),
                        verified_name: Set(number.verified_name),
                        quality_rating: Set(number.quality_rating),
                        verification_status: Set(number.code_verification_status),
                        is_registered: Set(false),
                        created_at: Set(now.into()),
                        updated_at: Set(now.into()),
                    }
                    .insert(self.db.as_ref())
                    .await?;
                }
            }
        }
        Ok(count)
    }

    async fn upsert_templates(&self, waba_id: Uuid, templates: Vec<GraphTemplate>) -> Result<usize, VoxdError> {
        let now = Utc::now();
        let count = templates.len();

        for template in templates {
            let existing = MessageTemplate::find()
                .filter(message_template::Column::WabaId.eq(waba_id))
                .filter(message_template::Column::Name.eq(template.name.as_str()))
                .filter(message_template::Column::Language.eq(template.language.as_str()))
                .one(self.db.as_ref())
                .await?;

            match existing {
                Some(found) => {
                    let mut model = found.into_active_model();
                    model.external_id = Set(Some(template.id));
                    model.category = Set(template.category);
                    model.status = Set(template.status);
                    model.components = Set(template.components);
                    model.rejected_reason = Set(template.rejected_reason);
                    model.updated_at = Set(now.into());
                    model.update(self.db.as_ref()).await?;
                }
                None => {
                    message_template::ActiveModel {
                        id: Set(Uuid::new_v4()),
                        waba_id: Set(waba_id),
                        external_id: Set(Some(template.id)),
                        name: Set(template.name),
                        language: Set(template.language),
                        category: Set(template.category),
                        status: Set(template.status),
                        components: Set(template.components),
                        rejected_reason: Set(template.rejected_reason),
                        created_at: Set(now.into()),
                        updated_at: Set(now.into()),
                    }
                    .insert(self.db.as_ref())
                    .await?;
                }
            }
        }
        Ok(count)
    }

    /// 同步号码和模板，一部分失败不影响另一部分
    #[instrument(skip(self, current))]
    pub async fn sync(&self, current: &CurrentAdmin, id: Uuid) -> Result<SyncReport, VoxdError> {
        let existing = self.find(current, id).await?;

        let phone_result = match self
            .client
            .list_phone_numbers(&existing.external_id, &existing.access_token)
            .await
        {
            Ok(numbers) => self.upsert_phone_numbers(existing.id, numbers).await,
            Err(e) => Err(e),
        };
        let phone_numbers = SyncSection::from_result(phone_result, "phone_numbers");

        let template_result = match self
            .client
            .list_templates(&existing.external_id, &existing.access_token)
            .await
        {
            Ok(templates) => self.upsert_templates(existing.id, templates).await,
            Err(e) => Err(e),
        };
        let templates = SyncSection::from_result(template_result, "templates");

        if phone_numbers.is_ok() || templates.is_ok() {
            let mut model = existing.into_active_model();
            model.last_synced_at = Set(Some(Utc::now().into()));
            model.updated_at = Set(Utc::now().into());
            model.update(self.db.as_ref()).await?;
        }

        info!(
            waba_id = %id,
            phone_numbers = phone_numbers.synced,
            templates = templates.synced,
            "WABA 同步完成"
        );
        Ok(SyncReport {
            phone_numbers,
            templates,
        })
    }

    /// 订阅应用的 webhook
    #[instrument(skip(self, current))]
    pub async fn subscribe(&self, current: &CurrentAdmin, id: Uuid) -> Result<WabaResponse, VoxdError> {
        let existing = self.find(current, id).await?;
        let subscribed = self
            .client
            .subscribe_app(&existing.external_id, &existing.access_token)
            .await?;
        if !subscribed {
            return Err(VoxdError::external_service("whatsapp", "订阅 webhook 失败"));
        }

        let mut model = existing.into_active_model();
        model.webhook_subscribed = Set(true);
        model.updated_at = Set(Utc::now().into());
        Ok(model.update(self.db.as_ref()).await?.into())
    }

    pub async fn list_phone_numbers(
        &self,
        current: &CurrentAdmin,
        waba_id: Uuid,
    ) -> Result<Vec<WabaPhoneNumberModel>, VoxdError> {
        let existing = self.find(current, waba_id).await?;
        Ok(WabaPhoneNumber::find()
            .filter(waba_phone_number::Column::WabaId.eq(existing.id))
            .order_by_asc(waba_phone_number::Column::DisplayPhoneNumber)
            .all(self.db.as_ref())
            .await?)
    }

    /// 用 6 位 PIN 注册号码
    #[instrument(skip(self, current, request))]
    pub async fn register_phone_number(
        &self,
        current: &CurrentAdmin,
        phone_number_id: Uuid,
        request: RegisterPhoneRequest,
    ) -> Result<WabaPhoneNumberModel, VoxdError> {
        validate_request(&request)?;
        let phone = WabaPhoneNumber::find_by_id(phone_number_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("号码"))?;
        let account = self.find(current, phone.waba_id).await?;

        let registered = self
            .client
            .register_phone_number(&phone.external_id, &request.pin, &account.access_token)
            .await?;
        if !registered {
            return Err(VoxdError::external_service("whatsapp", "号码注册失败"));
        }

        let mut model = phone.into_active_model();
        model.is_registered = Set(true);
        model.updated_at = Set(Utc::now().into());

        let updated = model.update(self.db.as_ref()).await?;
        info!(phone_number_id = %phone_number_id, "号码注册成功");
        Ok(updated)
    }

    pub async fn list_templates(
        &self,
        current: &CurrentAdmin,
        waba_id: Uuid,
    ) -> Result<Vec<MessageTemplateModel>, VoxdError> {
        let existing = self.find(current, waba_id).await?;
        Ok(MessageTemplate::find()
            .filter(message_template::Column::WabaId.eq(existing.id))
            .order_by_asc(message_template::Column::Name)
            .order_by_asc(message_template::Column::Language)
            .all(self.db.as_ref())
            .await?)
    }

    /// 提交到 Graph API 后保存返回的 ID 和审核状态
    #[instrument(skip(self, current, request), fields(name = %request.name))]
    pub async fn create_template(
        &self,
        current: &CurrentAdmin,
        waba_id: Uuid,
        request: CreateTemplateRequest,
    ) -> Result<MessageTemplateModel, VoxdError> {
        validate_request(&request)?;
        let account = self.find(current, waba_id).await?;

        let submitted = GraphTemplateRequest {
            name: request.name,
            language: request.language,
            category: request.category,
            components: request.components,
        };
        let created = self
            .client
            .create_template(&account.external_id, &submitted, &account.access_token)
            .await?;

        let now = Utc::now();
        let template = message_template::ActiveModel {
            id: Set(Uuid::new_v4()),
            waba_id: Set(account.id),
            external_id: Set(Some(created.id)),
            name: Set(submitted.name),
            language: Set(submitted.language),
            category: Set(created.category.unwrap_or(submitted.category)),
            status: Set(created.status),
            components: Set(submitted.components),
            rejected_reason: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(self.db.as_ref())
        .await?;

        info!(template_id = %template.id, status = %template.status, "模板已提交审核");
        Ok(template)
    }

    /// 先在 Graph API 按名称删除，再删除本地记录
    #[instrument(skip(self, current))]
    pub async fn delete_template(&self, current: &CurrentAdmin, template_id: Uuid) -> Result<(), VoxdError> {
        let template = MessageTemplate::find_by_id(template_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("模板"))?;
        let account = self.find(current, template.waba_id).await?;

        self.client
            .delete_template(&account.external_id, &template.name, &account.access_token)
            .await?;

        // Graph API 按名称删除全部语言版本
        let removed = MessageTemplate::delete_many()
            .filter(message_template::Column::WabaId.eq(account.id))
            .filter(message_template::Column::Name.eq(template.name.as_str()))
            .exec(self.db.as_ref())
            .await?;

        info!(template = %template.name, removed = removed.rows_affected, "模板已删除");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WhatsAppConfig;
    use crate::db::entities::{AdminRole, OrganisationModel, OrganisationStatus};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use serde_json::json;

    fn waba_model() -> WabaModel {
        WabaModel {
            id: Uuid::new_v4(),
            organisation_id: Uuid::new_v4(),
            external_id: "102290129340398".to_string(),
            name: "Bakkerij Jansen".to_string(),
            business_id: None,
            access_token: "EAAGm0PX4ZCpsBAKzZCL8secret9X2Q".to_string(),
            status: WabaStatus::Active,
            webhook_subscribed: false,
            last_synced_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    /// 指向不可达地址，所有 Graph 调用都会失败
    fn unreachable_client() -> Arc<WhatsAppClient> {
        let config = WhatsAppConfig {
            graph_base_url: "http://127.0.0.1:9".to_string(),
            api_version: "v21.0".to_string(),
            timeout: 2,
        };
        Arc::new(WhatsAppClient::new(&config).unwrap())
    }

    #[test]
    fn test_response_masks_token() {
        let response = WabaResponse::from(waba_model());
        assert_eq!(response.access_token_masked, "****9X2Q");
        let value = serde_json::to_value(&response).unwrap();
        assert!(value.get("access_token").is_none());
    }

    #[test]
    fn test_template_request_validation() {
        let valid = CreateTemplateRequest {
            name: "order_update".to_string(),
            language: "en_US".to_string(),
            category: "UTILITY".to_string(),
            components: json!([{"type": "BODY", "text": "Your order {{1}} has shipped"}]),
        };
        assert!(validate_request(&valid).is_ok());

        let invalid = CreateTemplateRequest {
            name: "Order Update".to_string(),
            language: "en".to_string(),
            category: "PROMO".to_string(),
            components: json!({}),
        };
        let err = validate_request(&invalid).unwrap_err();
        let fields = err.field_errors().unwrap();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("category"));
        assert!(fields.contains_key("components"));
    }

    #[test]
    fn test_pin_validation() {
        assert!(validate_request(&RegisterPhoneRequest { pin: "123456".to_string() }).is_ok());
        assert!(validate_request(&RegisterPhoneRequest { pin: "12345".to_string() }).is_err());
        assert!(validate_request(&RegisterPhoneRequest { pin: "12a456".to_string() }).is_err());
    }

    #[tokio::test]
    async fn test_sync_reports_each_section() {
        let account = waba_model();
        let organisation = OrganisationModel {
            id: account.organisation_id,
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
        };
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![account.clone()]])
            .append_query_results([vec![organisation]])
            .into_connection());
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();

        let report = WabaService::new(db, unreachable_client())
            .sync(&staff, account.id)
            .await
            .unwrap();
        assert!(report.phone_numbers.error.is_some());
        assert!(report.templates.error.is_some());
        assert_eq!(report.phone_numbers.synced, 0);
    }
}
