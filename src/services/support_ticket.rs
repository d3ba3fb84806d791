// 支持工单服务

use std::sync::Arc;
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseBackend, DatabaseConnection,
    EntityTrait, IntoActiveModel, QueryFilter, QueryOrder, QuerySelect, Select, Set, Statement,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;
use voxd_common::{PaginatedResponse, PaginationParams};

use crate::db::entities::{
    support_ticket, ticket_message, AdminUser, SupportTicket, SupportTicketModel, TicketMessage,
    TicketMessageModel, TicketPriority, TicketStatus,
};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::export::EXPORT_LIMIT;
use crate::services::mention::{extract_mentions, render_plain, MentionService};
use crate::services::query::{fetch_page, ilike, order_of};
use crate::services::validation::{clean_optional, validate_request};

pub fn format_ticket_number(sequence: i64) -> String {
    format!("T-{:06}", sequence)
}

/// 状态变化后的 (resolved_at, closed_at)
///
/// 重新打开或退回处理中会清除对应的时间戳。
pub fn transition_stamps(
    next: TicketStatus,
    resolved_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    match next {
        TicketStatus::Resolved => (resolved_at.or(Some(now)), None),
        TicketStatus::Closed => (resolved_at.or(Some(now)), closed_at.or(Some(now))),
        TicketStatus::Open | TicketStatus::InProgress | TicketStatus::Waiting => (None, None),
    }
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateTicketRequest {
    pub organisation_id: Uuid,
    #[validate(length(min = 1, max = 255, message = "主题长度必须在 1-255 之间"))]
    pub subject: String,
    #[validate(length(min = 1, max = 20000, message = "描述不能为空"))]
    pub description: String,
    #[schema(value_type = Option<String>, example = "normal")]
    pub priority: Option<TicketPriority>,
    #[validate(length(max = 64))]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateTicketRequest {
    #[validate(length(min = 1, max = 255, message = "主题长度必须在 1-255 之间"))]
    pub subject: Option<String>,
    #[validate(length(min = 1, max = 20000, message = "描述不能为空"))]
    pub description: Option<String>,
    #[schema(value_type = Option<String>)]
    pub priority: Option<TicketPriority>,
    #[validate(length(max = 64))]
    pub category: Option<String>,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChangeStatusRequest {
    #[schema(value_type = String, example = "in_progress")]
    pub status: TicketStatus,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct AssignTicketRequest {
    /// 为空时取消指派
    pub admin_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddMessageRequest {
    /// 可包含 `@[姓名](uuid)` 提及
    #[validate(length(min = 1, max = 20000, message = "消息不能为空"))]
    pub body: String,
    #[serde(default)]
    pub is_internal: bool,
}

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct TicketFilter {
    #[param(value_type = Option<String>)]
    pub status: Option<TicketStatus>,
    #[param(value_type = Option<String>)]
    pub priority: Option<TicketPriority>,
    pub organisation_id: Option<Uuid>,
    pub assigned_to: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TicketMessageResponse {
    pub id: Uuid,
    pub ticket_id: Uuid,
    pub author_id: Option<Uuid>,
    /// 原始文本
    pub body: String,
    /// 提及替换为 `@姓名` 的文本
    pub body_plain: String,
    pub is_internal: bool,
    pub mentions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<TicketMessageModel> for TicketMessageResponse {
    fn from(model: TicketMessageModel) -> Self {
        let mentions = serde_json::from_value(model.mentions).unwrap_or_default();
        Self {
            id: model.id,
            ticket_id: model.ticket_id,
            author_id: model.author_id,
            body_plain: render_plain(&model.body),
            body: model.body,
            is_internal: model.is_internal,
            mentions,
            created_at: model.created_at.into(),
        }
    }
}

pub struct SupportTicketService {
    db: Arc<DatabaseConnection>,
}

impl SupportTicketService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn scoped_query(&self, current: &CurrentAdmin, filter: &TicketFilter, search: Option<&str>) -> Select<SupportTicket> {
        let mut query = SupportTicket::find()
            .filter(current.scope.partner_condition(support_ticket::Column::PartnerId));

        if let Some(status) = filter.status {
            query = query.filter(support_ticket::Column::Status.eq(status));
        }
        if let Some(priority) = filter.priority {
            query = query.filter(support_ticket::Column::Priority.eq(priority));
        }
        if let Some(organisation_id) = filter.organisation_id {
            query = query.filter(support_ticket::Column::OrganisationId.eq(organisation_id));
        }
        if let Some(assigned_to) = filter.assigned_to {
            query = query.filter(support_ticket::Column::AssignedTo.eq(assigned_to));
        }
        if let Some(term) = search {
            query = query.filter(
                Condition::any()
                    .add(ilike(support_ticket::Column::TicketNumber, term))
                    .add(ilike(support_ticket::Column::Subject, term)),
            );
        }
        query
    }

    #[instrument(skip(self, current, params, filter))]
    pub async fn list(
        &self,
        current: &CurrentAdmin,
        params: &PaginationParams,
        filter: &TicketFilter,
    ) -> Result<PaginatedResponse<SupportTicketModel>, VoxdError> {
        let column = match params.sort_by.as_deref() {
            Some("ticket_number") => support_ticket::Column::TicketNumber,
            Some("priority") => support_ticket::Column::Priority,
            Some("status") => support_ticket::Column::Status,
            Some("updated_at") => support_ticket::Column::UpdatedAt,
            _ => support_ticket::Column::CreatedAt,
        };
        let query = self
            .scoped_query(current, filter, params.search())
            .order_by(column, order_of(params));
        fetch_page(self.db.as_ref(), query, params).await
    }

    pub async fn get(&self, current: &CurrentAdmin, id: Uuid) -> Result<SupportTicketModel, VoxdError> {
        let ticket = SupportTicket::find_by_id(id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("工单"))?;

        current.scope.ensure_partner(ticket.partner_id, "工单")?;
        Ok(ticket)
    }

    async fn next_ticket_number(&self) -> Result<String, VoxdError> {
        let row = self
            .db
            .query_one(Statement::from_string(
                DatabaseBackend::Postgres,
                "SELECT nextval('support_ticket_number_seq') AS seq".to_string(),
            ))
            .await?
            .ok_or_else(|| VoxdError::database("无法获取工单序号"))?;

        let sequence: i64 = row.try_get("", "seq")?;
        Ok(format_ticket_number(sequence))
    }

    #[instrument(skip(self, current, request), fields(subject = %request.subject))]
    pub async fn create(
        &self,
        current: &CurrentAdmin,
        request: CreateTicketRequest,
    ) -> Result<SupportTicketModel, VoxdError> {
        validate_request(&request)?;
        let organisation = current.scope.ensure_organisation(self.db.as_ref(), request.organisation_id).await?;
        let ticket_number = self.next_ticket_number().await?;

        let now = Utc::now();
        let model = support_ticket::ActiveModel {
            id: Set(Uuid::new_v4()),
            ticket_number: Set(ticket_number),
            organisation_id: Set(organisation.id),
            partner_id: Set(organisation.partner_id),
            subject: Set(request.subject.trim().to_string()),
            description: Set(request.description),
            status: Set(TicketStatus::Open),
            priority: Set(request.priority.unwrap_or(TicketPriority::Normal)),
            category: Set(clean_optional(request.category)),
            assigned_to: Set(None),
            created_by: Set(Some(current.id)),
            resolved_at: Set(None),
            closed_at: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        let created = model.insert(self.db.as_ref()).await?;
        info!(ticket_id = %created.id, ticket_number = %created.ticket_number, "工单创建成功");
        Ok(created)
    }

    pub async fn update(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        request: UpdateTicketRequest,
    ) -> Result<SupportTicketModel, VoxdError> {
        validate_request(&request)?;
        let mut model = self.get(current, id).await?.into_active_model();

        if let Some(subject) = request.subject {
            model.subject = Set(subject.trim().to_string());
        }
        if let Some(description) = request.description {
            model.description = Set(description);
        }
        if let Some(priority) = request.priority {
            model.priority = Set(priority);
        }
        if request.category.is_some() {
            model.category = Set(clean_optional(request.category));
        }
        model.updated_at = Set(Utc::now().into());

        Ok(model.update(self.db.as_ref()).await?)
    }

    /// 修改状态，已关闭的工单只能重新打开
    #[instrument(skip(self, current))]
    pub async fn change_status(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        status: TicketStatus,
    ) -> Result<SupportTicketModel, VoxdError> {
        let existing = self.get(current, id).await?;
        if !existing.status.can_transition_to(status) {
            return Err(VoxdError::conflict("已关闭的工单只能重新打开"));
        }

        let now = Utc::now();
        let from = existing.status;
        let (resolved_at, closed_at) = transition_stamps(
            status,
            existing.resolved_at.map(Into::into),
            existing.closed_at.map(Into::into),
            now,
        );

        let mut model = existing.into_active_model();
        model.status = Set(status);
        model.resolved_at = Set(resolved_at.map(Into::into));
        model.closed_at = Set(closed_at.map(Into::into));
        model.updated_at = Set(now.into());

        let updated = model.update(self.db.as_ref()).await?;
        info!(ticket_id = %id, from = ?from, to = ?status, "工单状态已更新");
        Ok(updated)
    }

    /// 指派给平台员工
    #[instrument(skip(self, current))]
    pub async fn assign(
        &self,
        current: &CurrentAdmin,
        id: Uuid,
        admin_id: Option<Uuid>,
    ) -> Result<SupportTicketModel, VoxdError> {
        current.require_staff()?;
        let existing = self.get(current, id).await?;

        if let Some(admin_id) = admin_id {
            let assignee = AdminUser::find_by_id(admin_id)
                .one(self.db.as_ref())
                .await?
                .ok_or_else(|| VoxdError::validation("admin_id", "管理员不存在"))?;
            if !assignee.is_active || !assignee.role.is_staff() {
                return Err(VoxdError::validation("admin_id", "只能指派给启用的平台员工"));
            }
        }

        let mut model = existing.into_active_model();
        model.assigned_to = Set(admin_id);
        model.updated_at = Set(Utc::now().into());
        Ok(model.update(self.db.as_ref()).await?)
    }

    pub async fn delete(&self, current: &CurrentAdmin, id: Uuid) -> Result<(), VoxdError> {
        current.require_staff()?;
        let existing = self.get(current, id).await?;
        SupportTicket::delete_by_id(existing.id).exec(self.db.as_ref()).await?;
        info!(ticket_id = %id, "工单已删除");
        Ok(())
    }

    /// 工单消息，合作伙伴看不到内部备注
    pub async fn list_messages(
        &self,
        current: &CurrentAdmin,
        ticket_id: Uuid,
    ) -> Result<Vec<TicketMessageResponse>, VoxdError> {
        let ticket = self.get(current, ticket_id).await?;

        let mut query = TicketMessage::find().filter(ticket_message::Column::TicketId.eq(ticket.id));
        if !current.is_staff() {
            query = query.filter(ticket_message::Column::IsInternal.eq(false));
        }

        Ok(query
            .order_by_asc(ticket_message::Column::CreatedAt)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(TicketMessageResponse::from)
            .collect())
    }

    #[instrument(skip(self, current, request))]
    pub async fn add_message(
        &self,
        current: &CurrentAdmin,
        ticket_id: Uuid,
        request: AddMessageRequest,
    ) -> Result<TicketMessageResponse, VoxdError> {
        validate_request(&request)?;
        if request.is_internal && !current.is_staff() {
            return Err(VoxdError::authorization("只有平台员工可以添加内部备注"));
        }
        let ticket = self.get(current, ticket_id).await?;

        let mentions = extract_mentions(&request.body);
        MentionService::new(self.db.clone()).verify(current, &mentions).await?;

        let now = Utc::now();
        let created = ticket_message::ActiveModel {
            id: Set(Uuid::new_v4()),
            ticket_id: Set(ticket.id),
            author_id: Set(Some(current.id)),
            body: Set(request.body),
            is_internal: Set(request.is_internal),
            mentions: Set(Value::from(
                mentions.iter().map(|id| Value::String(id.to_string())).collect::<Vec<_>>(),
            )),
            created_at: Set(now.into()),
        }
        .insert(self.db.as_ref())
        .await?;

        let mut model = ticket.into_active_model();
        model.updated_at = Set(now.into());
        model.update(self.db.as_ref()).await?;

        info!(ticket_id = %ticket_id, mentions = mentions.len(), "工单消息已添加");
        Ok(created.into())
    }

    pub async fn export(
        &self,
        current: &CurrentAdmin,
        filter: &TicketFilter,
        search: Option<&str>,
    ) -> Result<Vec<SupportTicketModel>, VoxdError> {
        Ok(self
            .scoped_query(current, filter, search)
            .order_by_desc(support_ticket::Column::CreatedAt)
            .limit(EXPORT_LIMIT)
            .all(self.db.as_ref())
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{AdminRole, AdminUserModel};
    use chrono::Duration;
    use sea_orm::MockDatabase;
    use serde_json::json;

    fn ticket(partner_id: Option<Uuid>, status: TicketStatus) -> SupportTicketModel {
        SupportTicketModel {
            id: Uuid::new_v4(),
            ticket_number: "T-000042".to_string(),
            organisation_id: Uuid::new_v4(),
            partner_id,
            subject: "Bot does not answer".to_string(),
            description: "Since this morning".to_string(),
            status,
            priority: TicketPriority::High,
            category: None,
            assigned_to: None,
            created_by: None,
            resolved_at: None,
            closed_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn staff() -> CurrentAdmin {
        CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap()
    }

    #[test]
    fn test_ticket_number_format() {
        assert_eq!(format_ticket_number(123), "T-000123");
        assert_eq!(format_ticket_number(1_234_567), "T-1234567");
    }

    #[test]
    fn test_transition_stamps() {
        let now = Utc::now();
        let earlier = now - Duration::hours(3);

        assert_eq!(transition_stamps(TicketStatus::Resolved, None, None, now), (Some(now), None));
        assert_eq!(
            transition_stamps(TicketStatus::Closed, Some(earlier), None, now),
            (Some(earlier), Some(now))
        );
        assert_eq!(
            transition_stamps(TicketStatus::Open, Some(earlier), Some(earlier), now),
            (None, None)
        );
    }

    #[tokio::test]
    async fn test_closed_ticket_only_reopens() {
        let closed = ticket(None, TicketStatus::Closed);
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![closed.clone()]])
            .into_connection());

        let err = SupportTicketService::new(db)
            .change_status(&staff(), closed.id, TicketStatus::InProgress)
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 409);
    }

    #[tokio::test]
    async fn test_resolve_stamps_resolved_at() {
        let open = ticket(None, TicketStatus::InProgress);
        let mut resolved = open.clone();
        resolved.status = TicketStatus::Resolved;
        resolved.resolved_at = Some(Utc::now().into());
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![open.clone()]])
            .append_query_results([vec![resolved]])
            .into_connection());

        let updated = SupportTicketService::new(db)
            .change_status(&staff(), open.id, TicketStatus::Resolved)
            .await
            .unwrap();
        assert!(updated.resolved_at.is_some());
    }

    #[tokio::test]
    async fn test_partner_cannot_post_internal_note() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let partner = CurrentAdmin::new(Uuid::new_v4(), "p@acme.io", AdminRole::Partner, Some(Uuid::new_v4())).unwrap();

        let err = SupportTicketService::new(db)
            .add_message(
                &partner,
                Uuid::new_v4(),
                AddMessageRequest {
                    body: "secret".to_string(),
                    is_internal: true,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 403);
    }

    #[tokio::test]
    async fn test_assign_requires_staff_assignee() {
        let existing = ticket(None, TicketStatus::Open);
        let partner_admin = AdminUserModel {
            id: Uuid::new_v4(),
            email: "p@acme.io".to_string(),
            name: "Pat".to_string(),
            password_hash: String::new(),
            role: AdminRole::Partner,
            partner_id: Some(Uuid::new_v4()),
            is_active: true,
            last_login_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![existing.clone()]])
            .append_query_results([vec![partner_admin.clone()]])
            .into_connection());

        let err = SupportTicketService::new(db)
            .assign(&staff(), existing.id, Some(partner_admin.id))
            .await
            .unwrap_err();
        assert!(err.field_errors().unwrap().contains_key("admin_id"));
    }

    #[test]
    fn test_message_response_renders_mentions() {
        let sam = Uuid::new_v4();
        let model = TicketMessageModel {
            id: Uuid::new_v4(),
            ticket_id: Uuid::new_v4(),
            author_id: None,
            body: format!("@[Sam]({}) please look", sam),
            is_internal: true,
            mentions: json!([sam.to_string()]),
            created_at: Utc::now().into(),
        };

        let response = TicketMessageResponse::from(model);
        assert_eq!(response.body_plain, "@Sam please look");
        assert_eq!(response.mentions, vec![sam]);
    }
}
