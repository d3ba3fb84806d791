// 机器人 API 处理器

use actix_web::{web, HttpResponse, Result as ActixResult};
use uuid::Uuid;
use voxd_common::PaginationParams;

use crate::api::extractors::AuthenticatedAdmin;
use crate::api::responses::HttpResponseBuilder;
use crate::services::agent::{AgentFilter, AgentService, CreateAgentRequest, UpdateAgentRequest};
use crate::state::AppState;

fn service(state: &AppState) -> AgentService {
    AgentService::new(state.db.clone())
}

/// 组织下的机器人列表
#[utoipa::path(
    get,
    path = "/organisations/{id}/agents",
    tag = "Agent",
    params(("id" = Uuid, Path, description = "组织 ID"), PaginationParams, AgentFilter),
    responses(
        (status = 200, description = "获取成功", body = Object),
        (status = 404, description = "组织不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_agents(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    params: web::Query<PaginationParams>,
    filter: web::Query<AgentFilter>,
) -> ActixResult<HttpResponse> {
    let page = service(&state)
        .list(&admin, path.into_inner(), &params, &filter)
        .await?;
    HttpResponseBuilder::ok(page)
}

/// 创建机器人
#[utoipa::path(
    post,
    path = "/organisations/{id}/agents",
    tag = "Agent",
    params(("id" = Uuid, Path, description = "组织 ID")),
    request_body = CreateAgentRequest,
    responses(
        (status = 201, description = "创建成功", body = Object),
        (status = 400, description = "请求参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_agent(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<CreateAgentRequest>,
) -> ActixResult<HttpResponse> {
    let agent = service(&state)
        .create(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::created(agent)
}

/// 机器人详情
#[utoipa::path(
    get,
    path = "/agents/{id}",
    tag = "Agent",
    params(("id" = Uuid, Path, description = "机器人 ID")),
    responses(
        (status = 200, description = "获取成功", body = Object),
        (status = 404, description = "机器人不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_agent(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let agent = service(&state).get(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(agent)
}

/// 更新机器人
#[utoipa::path(
    put,
    path = "/agents/{id}",
    tag = "Agent",
    params(("id" = Uuid, Path, description = "机器人 ID")),
    request_body = UpdateAgentRequest,
    responses(
        (status = 200, description = "更新成功", body = Object),
        (status = 404, description = "机器人不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_agent(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<UpdateAgentRequest>,
) -> ActixResult<HttpResponse> {
    let agent = service(&state)
        .update(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(agent)
}

/// 切换启用状态
#[utoipa::path(
    post,
    path = "/agents/{id}/toggle",
    tag = "Agent",
    params(("id" = Uuid, Path, description = "机器人 ID")),
    responses((status = 200, description = "切换成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn toggle_agent(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let agent = service(&state).toggle_active(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(agent)
}

/// 删除机器人
#[utoipa::path(
    delete,
    path = "/agents/{id}",
    tag = "Agent",
    params(("id" = Uuid, Path, description = "机器人 ID")),
    responses((status = 200, description = "删除成功")),
    security(("bearer_auth" = []))
)]
pub async fn delete_agent(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

/// 挂在 `/organisations` 作用域下
pub fn configure_organisation_agent_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/{id}/agents", web::get().to(list_agents))
        .route("/{id}/agents", web::post().to(create_agent));
}

pub fn configure_agent_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/agents")
            .route("/{id}", web::get().to(get_agent))
            .route("/{id}", web::put().to(update_agent))
            .route("/{id}", web::delete().to(delete_agent))
            .route("/{id}/toggle", web::post().to(toggle_agent)),
    );
}
