// 列表查询的通用辅助函数

use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::sea_query::{Expr, SimpleExpr};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, FromQueryResult, Order, PaginatorTrait, Select,
};
use voxd_common::{PaginatedResponse, PaginationParams, SortOrder};

use crate::errors::VoxdError;

/// 执行分页查询
pub async fn fetch_page<E>(
    db: &DatabaseConnection,
    select: Select<E>,
    params: &PaginationParams,
) -> Result<PaginatedResponse<E::Model>, VoxdError>
where
    E: EntityTrait,
    E::Model: FromQueryResult + Send + Sync,
{
    let page = params.page();
    let page_size = params.page_size();

    let paginator = select.paginate(db, page_size);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page - 1).await?;

    Ok(PaginatedResponse::new(items, total, page, page_size))
}

pub fn order_of(params: &PaginationParams) -> Order {
    match params.sort_order() {
        SortOrder::Asc => Order::Asc,
        SortOrder::Desc => Order::Desc,
    }
}

/// 转义 LIKE 通配符
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// 不区分大小写的包含匹配
pub fn ilike<C: ColumnTrait>(column: C, term: &str) -> SimpleExpr {
    Expr::col((column.entity_name(), column)).ilike(like_pattern(term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::entities::{partner, Partner};
    use sea_orm::{DatabaseBackend, QueryFilter, QueryTrait};

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("acme"), "%acme%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_ilike_sql() {
        let sql = Partner::find()
            .filter(ilike(partner::Column::Name, "Acme"))
            .build(DatabaseBackend::Postgres)
            .to_string();
        assert!(sql.contains(r#""partners"."name" ILIKE '%Acme%'"#));
    }

    #[test]
    fn test_order_of() {
        let params = PaginationParams {
            sort_order: Some(SortOrder::Asc),
            ..Default::default()
        };
        assert_eq!(order_of(&params), Order::Asc);
        assert_eq!(order_of(&PaginationParams::default()), Order::Desc);
    }
}
