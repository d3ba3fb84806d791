// @提及：解析、渲染和候选人搜索

use std::sync::Arc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Select,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::db::entities::{admin_user, AdminRole, AdminUser};
use crate::errors::VoxdError;
use crate::services::access::CurrentAdmin;
use crate::services::query::ilike;

pub const MENTION_SEARCH_LIMIT: u64 = 8;

/// `@[姓名](uuid)`
static MENTION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"@\[([^\]\n]+)\]\(([0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12})\)")
        .expect("提及正则无效")
});

/// 提取被提及的管理员 ID，去重并保持出现顺序
pub fn extract_mentions(text: &str) -> Vec<Uuid> {
    let mut ids = Vec::new();
    for captures in MENTION_REGEX.captures_iter(text) {
        if let Ok(id) = Uuid::parse_str(&captures[2]) {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }
    ids
}

/// 将提及标记替换为 `@姓名`
pub fn render_plain(text: &str) -> String {
    MENTION_REGEX.replace_all(text, "@$1").into_owned()
}

/// 提及候选人
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MentionCandidate {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: AdminRole,
}

pub struct MentionService {
    db: Arc<DatabaseConnection>,
}

impl MentionService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// 当前管理员可以提及的范围
    ///
    /// 合作伙伴管理员只能提及平台员工和同一合作伙伴的管理员。
    fn visible(current: &CurrentAdmin) -> Condition {
        match current.scope.partner_id() {
            None => Condition::all(),
            Some(partner_id) => Condition::any()
                .add(admin_user::Column::Role.ne(AdminRole::Partner))
                .add(admin_user::Column::PartnerId.eq(partner_id)),
        }
    }

    pub async fn search(&self, current: &CurrentAdmin, q: Option<&str>) -> Result<Vec<MentionCandidate>, VoxdError> {
        let mut query = AdminUser::find()
            .filter(admin_user::Column::IsActive.eq(true))
            .filter(Self::visible(current));

        if let Some(term) = q.map(str::trim).filter(|t| !t.is_empty()) {
            query = query.filter(
                Condition::any()
                    .add(ilike(admin_user::Column::Name, term))
                    .add(ilike(admin_user::Column::Email, term)),
            );
        }

        let admins = query
            .order_by_asc(admin_user::Column::Name)
            .limit(MENTION_SEARCH_LIMIT)
            .all(self.db.as_ref())
            .await?;

        Ok(admins
            .into_iter()
            .map(|admin| MentionCandidate {
                id: admin.id,
                name: admin.name,
                email: admin.email,
                role: admin.role,
            })
            .collect())
    }

    /// 可被提及的管理员：存在、已启用且对当前管理员可见
    fn mentionable(current: &CurrentAdmin, ids: &[Uuid]) -> Select<AdminUser> {
        AdminUser::find()
            .filter(admin_user::Column::Id.is_in(ids.iter().copied()))
            .filter(admin_user::Column::IsActive.eq(true))
            .filter(Self::visible(current))
    }

    /// 检查被提及的管理员都存在且可见
    pub async fn verify(&self, current: &CurrentAdmin, ids: &[Uuid]) -> Result<(), VoxdError> {
        if ids.is_empty() {
            return Ok(());
        }

        let found: Vec<Uuid> = Self::mentionable(current, ids)
            .all(self.db.as_ref())
            .await?
            .into_iter()
            .map(|admin| admin.id)
            .collect();

        if let Some(missing) = ids.iter().find(|id| !found.contains(id)) {
            return Err(VoxdError::validation(
                "body",
                format!("被提及的管理员不存在: {}", missing),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::AdminUserModel;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase, QueryTrait};

    const SAM: &str = "6f1c1c8e-0d4b-4a55-9a57-3f0f4f6a1b01";
    const LINA: &str = "0b9d6a3e-2f71-4c0c-8d0e-5e9a7c1f2d02";

    fn admin(id: Uuid, name: &str) -> AdminUserModel {
        AdminUserModel {
            id,
            email: format!("{}@voxd.io", name.to_lowercase()),
            name: name.to_string(),
            password_hash: String::new(),
            role: AdminRole::Admin,
            partner_id: None,
            is_active: true,
            last_login_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    #[test]
    fn test_extract_mentions_dedupes_in_order() {
        let text = format!("@[Lina]({LINA}) can you check? cc @[Sam]({SAM}) and again @[Lina]({LINA})");
        let ids = extract_mentions(&text);
        assert_eq!(ids, vec![Uuid::parse_str(LINA).unwrap(), Uuid::parse_str(SAM).unwrap()]);
    }

    #[test]
    fn test_malformed_markup_ignored() {
        assert!(extract_mentions("@Sam hello @[Sam](not-a-uuid) @[](x)").is_empty());
        assert!(extract_mentions("mail me at sam@voxd.io").is_empty());
    }

    #[test]
    fn test_render_plain() {
        let text = format!("Thanks @[Sam de Vries]({SAM})!");
        assert_eq!(render_plain(&text), "Thanks @Sam de Vries!");
        assert_eq!(render_plain("no mentions"), "no mentions");
    }

    #[test]
    fn test_partner_visibility_condition() {
        let partner_id = Uuid::new_v4();
        let current = CurrentAdmin::new(Uuid::new_v4(), "p@acme.io", AdminRole::Partner, Some(partner_id)).unwrap();
        let sql = AdminUser::find()
            .filter(MentionService::visible(&current))
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains("<> 'partner'"));
        assert!(sql.contains(&partner_id.to_string()));
        assert!(sql.contains(" OR "));
    }

    #[test]
    fn test_inactive_admins_not_mentionable() {
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();
        let sam = Uuid::parse_str(SAM).unwrap();
        let sql = MentionService::mentionable(&staff, &[sam])
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""is_active" = TRUE"#));
        assert!(sql.contains(SAM));
    }

    #[tokio::test]
    async fn test_verify_reports_missing_admin() {
        let sam = Uuid::parse_str(SAM).unwrap();
        let lina = Uuid::parse_str(LINA).unwrap();
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![admin(sam, "Sam")]])
            .append_query_results([vec![admin(sam, "Sam"), admin(lina, "Lina")]])
            .into_connection());
        let service = MentionService::new(db);
        let staff = CurrentAdmin::new(Uuid::new_v4(), "ops@voxd.io", AdminRole::Admin, None).unwrap();

        let err = service.verify(&staff, &[sam, lina]).await.unwrap_err();
        assert!(err.field_errors().unwrap()["body"][0].contains(LINA));
        assert!(service.verify(&staff, &[sam, lina]).await.is_ok());
        assert!(service.verify(&staff, &[]).await.is_ok());
    }
}
