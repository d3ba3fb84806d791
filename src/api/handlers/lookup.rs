// 提及搜索、下拉选项和仪表盘

use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::api::extractors::AuthenticatedAdmin;
use crate::api::responses::HttpResponseBuilder;
use crate::errors::VoxdError;
use crate::services::dashboard::DashboardService;
use crate::services::mention::MentionService;
use crate::services::options::{OptionsQuery, OptionsResource, OptionsService};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MentionQuery {
    pub q: Option<String>,
}

/// 搜索可提及的管理员
#[utoipa::path(
    get,
    path = "/mentions/search",
    tag = "Lookup",
    params(MentionQuery),
    responses((status = 200, description = "获取成功", body = Vec<MentionCandidate>)),
    security(("bearer_auth" = []))
)]
pub async fn search_mentions(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    query: web::Query<MentionQuery>,
) -> ActixResult<HttpResponse> {
    let candidates = MentionService::new(state.db.clone())
        .search(&admin, query.q.as_deref())
        .await?;
    HttpResponseBuilder::ok(candidates)
}

/// 下拉选项
///
/// `resource` 取值 organisations、partners、agents、admin-users。
#[utoipa::path(
    get,
    path = "/options/{resource}",
    tag = "Lookup",
    params(("resource" = String, Path, description = "资源类型"), OptionsQuery),
    responses(
        (status = 200, description = "获取成功", body = Vec<SelectOption>),
        (status = 404, description = "未知的资源类型")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_options(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<String>,
    query: web::Query<OptionsQuery>,
) -> ActixResult<HttpResponse> {
    let resource = OptionsResource::parse(&path).ok_or_else(|| VoxdError::not_found("选项资源"))?;
    let options = OptionsService::new(state.db.clone())
        .options(&admin, resource, &query)
        .await?;
    HttpResponseBuilder::ok(options)
}

/// 仪表盘统计
#[utoipa::path(
    get,
    path = "/dashboard/stats",
    tag = "Lookup",
    responses((status = 200, description = "获取成功", body = DashboardStats)),
    security(("bearer_auth" = []))
)]
pub async fn dashboard_stats(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
) -> ActixResult<HttpResponse> {
    let stats = DashboardService::new(state.db.clone()).stats(&admin).await?;
    HttpResponseBuilder::ok(stats)
}

pub fn configure_lookup_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/mentions/search", web::get().to(search_mentions))
        .route("/options/{resource}", web::get().to(list_options))
        .route("/dashboard/stats", web::get().to(dashboard_stats));
}
