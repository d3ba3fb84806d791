// 访问范围与逐条记录授权

use sea_orm::sea_query::Query;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait};
use uuid::Uuid;

use crate::db::entities::{organisation, AdminRole, Organisation, OrganisationModel};
use crate::errors::VoxdError;

/// 数据访问范围
///
/// 平台员工可以访问全部数据，合作伙伴管理员只能访问所属合作伙伴的数据。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessScope {
    All,
    Partner(Uuid),
}

impl AccessScope {
    pub fn for_role(role: AdminRole, partner_id: Option<Uuid>) -> Result<Self, VoxdError> {
        match (role, partner_id) {
            (AdminRole::Partner, Some(partner_id)) => Ok(Self::Partner(partner_id)),
            (AdminRole::Partner, None) => Err(VoxdError::authorization("合作伙伴账号未绑定合作伙伴")),
            _ => Ok(Self::All),
        }
    }

    pub fn partner_id(&self) -> Option<Uuid> {
        match self {
            Self::All => None,
            Self::Partner(id) => Some(*id),
        }
    }

    pub fn is_staff(&self) -> bool {
        matches!(self, Self::All)
    }

    pub fn require_staff(&self) -> Result<(), VoxdError> {
        if self.is_staff() {
            Ok(())
        } else {
            Err(VoxdError::authorization("仅平台员工可执行此操作"))
        }
    }

    /// 记录归属的合作伙伴是否在范围内
    ///
    /// `partner_id` 为空的记录属于平台，只有员工可见。
    pub fn can_access_partner(&self, partner_id: Option<Uuid>) -> bool {
        match self {
            Self::All => true,
            Self::Partner(id) => partner_id == Some(*id),
        }
    }

    /// 范围外的记录按不存在处理
    pub fn ensure_partner(&self, partner_id: Option<Uuid>, resource: &str) -> Result<(), VoxdError> {
        if self.can_access_partner(partner_id) {
            Ok(())
        } else {
            Err(VoxdError::not_found(resource))
        }
    }

    /// 加载组织并检查是否在范围内
    pub async fn ensure_organisation(
        &self,
        db: &DatabaseConnection,
        organisation_id: Uuid,
    ) -> Result<OrganisationModel, VoxdError> {
        let organisation = Organisation::find_by_id(organisation_id)
            .one(db)
            .await?
            .ok_or_else(|| VoxdError::not_found("组织"))?;

        self.ensure_partner(organisation.partner_id, "组织")?;
        Ok(organisation)
    }

    /// 直接带有 `partner_id` 列的表的查询条件
    pub fn partner_condition<C: ColumnTrait>(&self, column: C) -> Condition {
        match self {
            Self::All => Condition::all(),
            Self::Partner(id) => Condition::all().add(column.eq(*id)),
        }
    }

    /// 通过组织归属合作伙伴的表的查询条件
    pub fn organisation_condition<C: ColumnTrait>(&self, column: C) -> Condition {
        match self {
            Self::All => Condition::all(),
            Self::Partner(id) => Condition::all().add(
                column.in_subquery(
                    Query::select()
                        .column(organisation::Column::Id)
                        .from(organisation::Entity)
                        .and_where(organisation::Column::PartnerId.eq(*id))
                        .to_owned(),
                ),
            ),
        }
    }
}

/// 当前登录的管理员
#[derive(Debug, Clone)]
pub struct CurrentAdmin {
    pub id: Uuid,
    pub email: String,
    pub role: AdminRole,
    pub partner_id: Option<Uuid>,
    pub scope: AccessScope,
}

impl CurrentAdmin {
    pub fn new(
        id: Uuid,
        email: impl Into<String>,
        role: AdminRole,
        partner_id: Option<Uuid>,
    ) -> Result<Self, VoxdError> {
        Ok(Self {
            id,
            email: email.into(),
            role,
            partner_id,
            scope: AccessScope::for_role(role, partner_id)?,
        })
    }

    pub fn is_staff(&self) -> bool {
        self.scope.is_staff()
    }

    pub fn require_staff(&self) -> Result<(), VoxdError> {
        self.scope.require_staff()
    }

    pub fn require_super_admin(&self) -> Result<(), VoxdError> {
        if self.role == AdminRole::SuperAdmin {
            Ok(())
        } else {
            Err(VoxdError::authorization("仅超级管理员可执行此操作"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, QueryFilter, QueryTrait};

    use crate::db::entities::{agent, Agent, OrganisationStatus};

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
            timezone: "Europe/Amsterdam".to_string(),
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_scope_for_role() {
        let partner = Uuid::new_v4();
        assert_eq!(AccessScope::for_role(AdminRole::Admin, None).unwrap(), AccessScope::All);
        assert_eq!(
            AccessScope::for_role(AdminRole::Partner, Some(partner)).unwrap(),
            AccessScope::Partner(partner)
        );
        assert!(AccessScope::for_role(AdminRole::Partner, None).is_err());
    }

    #[test]
    fn test_partner_checks() {
        let mine = Uuid::new_v4();
        let scope = AccessScope::Partner(mine);

        assert!(scope.ensure_partner(Some(mine), "报价单").is_ok());
        assert_eq!(scope.ensure_partner(Some(Uuid::new_v4()), "报价单").unwrap_err().status_code(), 404);
        // 平台直属记录对合作伙伴不可见
        assert!(scope.ensure_partner(None, "报价单").is_err());
        assert_eq!(scope.require_staff().unwrap_err().status_code(), 403);

        assert!(AccessScope::All.ensure_partner(None, "报价单").is_ok());
        assert!(AccessScope::All.require_staff().is_ok());
    }

    #[test]
    fn test_current_admin_roles() {
        let admin = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();
        assert!(admin.is_staff());
        assert_eq!(admin.require_super_admin().unwrap_err().status_code(), 403);

        let root = CurrentAdmin::new(Uuid::new_v4(), "root@voxd.io", AdminRole::SuperAdmin, None).unwrap();
        assert!(root.require_super_admin().is_ok());
    }

    #[test]
    fn test_organisation_condition_sql() {
        let partner = Uuid::new_v4();
        let sql = Agent::find()
            .filter(AccessScope::Partner(partner).organisation_condition(agent::Column::OrganisationId))
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#"IN (SELECT "id" FROM "organisations""#));
        assert!(sql.contains(&partner.to_string()));

        let sql = Agent::find()
            .filter(AccessScope::All.organisation_condition(agent::Column::OrganisationId))
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(!sql.contains("IN (SELECT"));
    }

    #[tokio::test]
    async fn test_ensure_organisation() {
        let mine = Uuid::new_v4();
        let own = organisation(Some(mine));
        let foreign = organisation(Some(Uuid::new_v4()));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![own.clone()], vec![foreign.clone()], vec![]])
            .into_connection();

        let scope = AccessScope::Partner(mine);
        assert_eq!(scope.ensure_organisation(&db, own.id).await.unwrap().id, own.id);
        assert_eq!(scope.ensure_organisation(&db, foreign.id).await.unwrap_err().status_code(), 404);
        assert_eq!(scope.ensure_organisation(&db, Uuid::new_v4()).await.unwrap_err().status_code(), 404);
    }
}
