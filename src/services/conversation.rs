// 会话记录（只读）

use std::sync::Arc;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use tracing::instrument;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use voxd_common::{PaginatedResponse, PaginationParams};

use crate::db::entities::{
    message, session, ChatUser, ChatUserModel, Message, MessageModel, Session, SessionModel,
    SessionStatus,
};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::query::{fetch_page, order_of};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct SessionFilter {
    pub agent_id: Option<Uuid>,
    pub chat_user_id: Option<Uuid>,
    #[param(value_type = Option<String>)]
    pub status: Option<SessionStatus>,
}

/// 会话及其全部消息
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Transcript {
    #[schema(value_type = Object)]
    pub session: SessionModel,
    #[schema(value_type = Option<Object>)]
    pub chat_user: Option<ChatUserModel>,
    #[schema(value_type = Vec<Object>)]
    pub messages: Vec<MessageModel>,
}

pub struct ConversationService {
    db: Arc<DatabaseConnection>,
}

impl ConversationService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, current, params, filter))]
    pub async fn list_sessions(
        &self,
        current: &CurrentAdmin,
        organisation_id: Uuid,
        params: &PaginationParams,
        filter: &SessionFilter,
    ) -> Result<PaginatedResponse<SessionModel>, VoxdError> {
        current.scope.ensure_organisation(self.db.as_ref(), organisation_id).await?;

        let mut query = Session::find().filter(session::Column::OrganisationId.eq(organisation_id));
        if let Some(agent_id) = filter.agent_id {
            query = query.filter(session::Column::AgentId.eq(agent_id));
        }
        if let Some(chat_user_id) = filter.chat_user_id {
            query = query.filter(session::Column::ChatUserId.eq(chat_user_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(session::Column::Status.eq(status));
        }

        let column = match params.sort_by.as_deref() {
            Some("message_count") => session::Column::MessageCount,
            Some("ended_at") => session::Column::EndedAt,
            _ => session::Column::StartedAt,
        };
        fetch_page(self.db.as_ref(), query.order_by(column, order_of(params)), params).await
    }

    /// 会话全文，消息按时间升序
    #[instrument(skip(self, current))]
    pub async fn transcript(&self, current: &CurrentAdmin, session_id: Uuid) -> Result<Transcript, VoxdError> {
        let session = Session::find_by_id(session_id)
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| VoxdError::not_found("会话"))?;
        current.scope.ensure_organisation(self.db.as_ref(), session.organisation_id).await?;

        let chat_user = ChatUser::find_by_id(session.chat_user_id).one(self.db.as_ref()).await?;
        let messages = Message::find()
            .filter(message::Column::SessionId.eq(session.id))
            .order_by_asc(message::Column::CreatedAt)
            .order_by_asc(message::Column::Id)
            .all(self.db.as_ref())
            .await?;

        Ok(Transcript {
            session,
            chat_user,
            messages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{AdminRole, MessageRole, OrganisationModel, OrganisationStatus};
    use chrono::{Duration, Utc};
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

    fn session_model(organisation_id: Uuid) -> SessionModel {
        SessionModel {
            id: Uuid::new_v4(),
            organisation_id,
            agent_id: None,
            chat_user_id: Uuid::new_v4(),
            status: SessionStatus::Closed,
            message_count: 2,
            started_at: Utc::now().into(),
            ended_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn message(session: &SessionModel, role: MessageRole, content: &str, offset: i64) -> MessageModel {
        MessageModel {
            id: Uuid::new_v4(),
            session_id: session.id,
            organisation_id: session.organisation_id,
            role,
            content: content.to_string(),
            created_at: (Utc::now() + Duration::seconds(offset)).into(),
        }
    }

    #[tokio::test]
    async fn test_transcript() {
        let org = organisation(None);
        let session = session_model(org.id);
        let messages = vec![
            message(&session, MessageRole::User, "Are you open on Sunday?", 0),
            message(&session, MessageRole::Assistant, "Yes, from 10:00.", 5),
        ];
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![session.clone()]])
            .append_query_results([vec![org]])
            .append_query_results([Vec::<ChatUserModel>::new()])
            .append_query_results([messages])
            .into_connection());
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();

        let transcript = ConversationService::new(db).transcript(&staff, session.id).await.unwrap();
        assert!(transcript.chat_user.is_none());
        assert_eq!(transcript.messages.len(), 2);
        assert_eq!(transcript.messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_foreign_session_hidden() {
        let org = organisation(Some(Uuid::new_v4()));
        let session = session_model(org.id);
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![session.clone()]])
            .append_query_results([vec![org]])
            .into_connection());
        let partner = CurrentAdmin::new(Uuid::new_v4(), "p@acme.io", AdminRole::Partner, Some(Uuid::new_v4())).unwrap();

        let err = ConversationService::new(db).transcript(&partner, session.id).await.unwrap_err();
        assert_eq!(err.status_code(), 404);
    }
}
