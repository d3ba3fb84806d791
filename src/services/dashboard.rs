// 仪表盘统计

use std::sync::Arc;
use chrono::{Duration, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, Iterable, PaginatorTrait, QueryFilter, QuerySelect,
};
use serde::Serialize;
use tracing::instrument;
use utoipa::ToSchema;

use crate::db::entities::{
    agent, chat_user, message, organisation, partner, quote, session, support_ticket, Agent, ChatUser,
    Message, Organisation, Partner, Quote, QuoteStatus, Session, SupportTicket, TicketStatus,
};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;

pub const ACTIVITY_WINDOW_DAYS: i64 = 30;
pub const SERIES_DAYS: u32 = 14;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuoteStatusCount {
    #[schema(value_type = String, example = "sent")]
    pub status: QuoteStatus,
    pub count: u64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardStats {
    pub partners: u64,
    pub organisations: u64,
    pub active_agents: u64,
    pub chat_users: u64,
    pub open_tickets: u64,
    pub quotes_by_status: Vec<QuoteStatusCount>,
    pub sessions_30d: u64,
    pub messages_30d: u64,
    pub messages_per_day: Vec<DailyCount>,
}

/// 最近 `days` 天（含今天）的每日数量，没有数据的日期补零
pub fn zero_fill(rows: &[(NaiveDate, i64)], today: NaiveDate, days: u32) -> Vec<DailyCount> {
    (0..days)
        .rev()
        .map(|offset| {
            let date = today - Duration::days(offset as i64);
            let count = rows
                .iter()
                .filter(|(day, _)| *day == date)
                .map(|(_, count)| (*count).max(0) as u64)
                .sum();
            DailyCount { date, count }
        })
        .collect()
}

/// 按状态补全报价数量
pub fn quote_counts(rows: &[(QuoteStatus, i64)]) -> Vec<QuoteStatusCount> {
    QuoteStatus::iter()
        .map(|status| QuoteStatusCount {
            status,
            count: rows
                .iter()
                .filter(|(s, _)| *s == status)
                .map(|(_, count)| (*count).max(0) as u64)
                .sum(),
        })
        .collect()
}

pub struct DashboardService {
    db: Arc<DatabaseConnection>,
}

impl DashboardService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, current), fields(admin_id = %current.id))]
    pub async fn stats(&self, current: &CurrentAdmin) -> Result<DashboardStats, VoxdError> {
        let scope = current.scope;
        let now = Utc::now();
        let window_start = now - Duration::days(ACTIVITY_WINDOW_DAYS);
        let today = now.date_naive();

        let partners = Partner::find()
            .filter(scope.partner_condition(partner::Column::Id))
            .count(self.db.as_ref())
            .await?;

        let organisations = Organisation::find()
            .filter(scope.partner_condition(organisation::Column::PartnerId))
            .count(self.db.as_ref())
            .await?;

        let active_agents = Agent::find()
            .filter(scope.organisation_condition(agent::Column::OrganisationId))
            .filter(agent::Column::IsActive.eq(true))
            .count(self.db.as_ref())
            .await?;

        let chat_users = ChatUser::find()
            .filter(scope.organisation_condition(chat_user::Column::OrganisationId))
            .count(self.db.as_ref())
            .await?;

        let open_tickets = SupportTicket::find()
            .filter(scope.partner_condition(support_ticket::Column::PartnerId))
            .filter(support_ticket::Column::Status.is_in([
                TicketStatus::Open,
                TicketStatus::InProgress,
                TicketStatus::Waiting,
            ]))
            .count(self.db.as_ref())
            .await?;

        let quote_rows: Vec<(QuoteStatus, i64)> = Quote::find()
            .select_only()
            .column(quote::Column::Status)
            .column_as(quote::Column::Id.count(), "count")
            .filter(scope.partner_condition(quote::Column::PartnerId))
            .group_by(quote::Column::Status)
            .into_tuple()
            .all(self.db.as_ref())
            .await?;

        let sessions_30d = Session::find()
            .filter(scope.organisation_condition(session::Column::OrganisationId))
            .filter(session::Column::StartedAt.gte(window_start))
            .count(self.db.as_ref())
            .await?;

        let messages_30d = Message::find()
            .filter(scope.organisation_condition(message::Column::OrganisationId))
            .filter(message::Column::CreatedAt.gte(window_start))
            .count(self.db.as_ref())
            .await?;

        let day = Expr::cust("(\"messages\".\"created_at\" AT TIME ZONE 'UTC')::date");
        let series_rows: Vec<(NaiveDate, i64)> = Message::find()
            .select_only()
            .column_as(day.clone(), "day")
            .column_as(message::Column::Id.count(), "count")
            .filter(scope.organisation_condition(message::Column::OrganisationId))
            .filter(message::Column::CreatedAt.gte(now - Duration::days(SERIES_DAYS as i64)))
            .group_by(day)
            .into_tuple()
            .all(self.db.as_ref())
            .await?;

        Ok(DashboardStats {
            partners,
            organisations,
            active_agents,
            chat_users,
            open_tickets,
            quotes_by_status: quote_counts(&quote_rows),
            sessions_30d,
            messages_30d,
            messages_per_day: zero_fill(&series_rows, today, SERIES_DAYS),
        })
    }
}
