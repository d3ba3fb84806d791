// 远程下拉选项

use std::sync::Arc;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;
use voxd_common::SelectOption;

use crate::db::entities::{
    admin_user, agent, organisation, partner, AdminRole, AdminUser, Agent, Organisation, Partner,
};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::query::ilike;

pub const OPTIONS_LIMIT: u64 = 50;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct OptionsQuery {
    pub q: Option<String>,
    pub organisation_id: Option<Uuid>,
}

impl OptionsQuery {
    fn term(&self) -> Option<&str> {
        self.q.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }
}

/// 可选的资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionsResource {
    Organisations,
    Partners,
    Agents,
    AdminUsers,
}

impl OptionsResource {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "organisations" => Some(Self::Organisations),
            "partners" => Some(Self::Partners),
            "agents" => Some(Self::Agents),
            "admin-users" => Some(Self::AdminUsers),
            _ => None,
        }
    }
}

pub struct OptionsService {
    db: Arc<DatabaseConnection>,
}

impl OptionsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn options(
        &self,
        current: &CurrentAdmin,
        resource: OptionsResource,
        query: &OptionsQuery,
    ) -> Result<Vec<SelectOption>, VoxdError> {
        match resource {
            OptionsResource::Organisations => self.organisations(current, query).await,
            OptionsResource::Partners => self.partners(current, query).await,
            OptionsResource::Agents => self.agents(current, query).await,
            OptionsResource::AdminUsers => self.admin_users(current, query).await,
        }
    }

    async fn organisations(&self, current: &CurrentAdmin, query: &OptionsQuery) -> Result<Vec<SelectOption>, VoxdError> {
        let mut select = Organisation::find()
            .filter(current.scope.partner_condition(organisation::Column::PartnerId));
        if let Some(term) = query.term() {
            select = select.filter(
                Condition::any()
                    .add(ilike(organisation::Column::Name, term))
                    .add(ilike(organisation::Column::Slug, term)),
            );
        }

        Ok(select
            .order_by_asc(organisation::Column::Name)
            .limit(OPTIONS_LIMIT)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|o| SelectOption::new(o.id, o.name))
            .collect())
    }

    async fn partners(&self, current: &CurrentAdmin, query: &OptionsQuery) -> Result<Vec<SelectOption>, VoxdError> {
        let mut select = Partner::find();
        if let Some(partner_id) = current.scope.partner_id() {
            select = select.filter(partner::Column::Id.eq(partner_id));
        }
        if let Some(term) = query.term() {
            select = select.filter(ilike(partner::Column::Name, term));
        }

        Ok(select
            .order_by_asc(partner::Column::Name)
            .limit(OPTIONS_LIMIT)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|p| SelectOption::new(p.id, p.name))
            .collect())
    }

    async fn agents(&self, current: &CurrentAdmin, query: &OptionsQuery) -> Result<Vec<SelectOption>, VoxdError> {
        let mut select = Agent::find()
            .filter(current.scope.organisation_condition(agent::Column::OrganisationId));
        if let Some(organisation_id) = query.organisation_id {
            select = select.filter(agent::Column::OrganisationId.eq(organisation_id));
        }
        if let Some(term) = query.term() {
            select = select.filter(ilike(agent::Column::Name, term));
        }

        Ok(select
            .order_by_asc(agent::Column::Name)
            .limit(OPTIONS_LIMIT)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|a| SelectOption::new(a.id, a.name))
            .collect())
    }

    /// 平台员工看到全部管理员，合作伙伴只看到员工和本合作伙伴的管理员
    async fn admin_users(&self, current: &CurrentAdmin, query: &OptionsQuery) -> Result<Vec<SelectOption>, VoxdError> {
        let mut select = AdminUser::find().filter(admin_user::Column::IsActive.eq(true));
        if let Some(partner_id) = current.scope.partner_id() {
            select = select.filter(
                Condition::any()
                    .add(admin_user::Column::Role.ne(AdminRole::Partner))
                    .add(admin_user::Column::PartnerId.eq(partner_id)),
            );
        }
        if let Some(term) = query.term() {
            select = select.filter(
                Condition::any()
                    .add(ilike(admin_user::Column::Name, term))
                    .add(ilike(admin_user::Column::Email, term)),
            );
        }

        Ok(select
            .order_by_asc(admin_user::Column::Name)
            .limit(OPTIONS_LIMIT)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|a| SelectOption::new(a.id, format!("{} <{}>", a.name, a.email)))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{PartnerModel, PartnerStatus};
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[test]
    fn test_parse_resource() {
        assert_eq!(OptionsResource::parse("admin-users"), Some(OptionsResource::AdminUsers));
        assert_eq!(OptionsResource::parse("organisations"), Some(OptionsResource::Organisations));
        assert_eq!(OptionsResource::parse("wabas"), None);
    }

    #[test]
    fn test_blank_term_ignored() {
        let query = OptionsQuery {
            q: Some("   ".to_string()),
            organisation_id: None,
        };
        assert_eq!(query.term(), None);
    }

    #[tokio::test]
    async fn test_partner_options() {
        let partner = PartnerModel {
            id: Uuid::new_v4(),
            name: "Acme".to_string(),
            slug: "acme".to_string(),
            email: None,
            phone: None,
            website: None,
            logo_url: None,
            commission_rate: 10.0,
            status: PartnerStatus::Active,
            notes: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        };
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![partner.clone()]])
            .into_connection());
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();

        let options = OptionsService::new(db)
            .options(&staff, OptionsResource::Partners, &OptionsQuery::default())
            .await
            .unwrap();
        assert_eq!(options.len(), 1);
        assert_eq!(options[0].value, partner.id);
        assert_eq!(options[0].label, "Acme");
    }
}
