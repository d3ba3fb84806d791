// 会话 API 处理器（只读）

use actix_web::{web, HttpResponse, Result as ActixResult};
use uuid::Uuid;
use voxd_common::PaginationParams;

use crate::api::extractors::AuthenticatedAdmin;
use crate::api::responses::HttpResponseBuilder;
use crate::services::conversation::{ConversationService, SessionFilter};
use crate::state::AppState;

/// 组织下的会话列表
#[utoipa::path(
    get,
    path = "/organisations/{id}/sessions",
    tag = "Conversation",
    params(("id" = Uuid, Path, description = "组织 ID"), PaginationParams, SessionFilter),
    responses((status = 200, description = "获取成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn list_sessions(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    params: web::Query<PaginationParams>,
    filter: web::Query<SessionFilter>,
) -> ActixResult<HttpResponse> {
    let page = ConversationService::new(state.db.clone())
        .list_sessions(&admin, path.into_inner(), &params, &filter)
        .await?;
    HttpResponseBuilder::ok(page)
}

/// 会话记录
#[utoipa::path(
    get,
    path = "/sessions/{id}",
    tag = "Conversation",
    params(("id" = Uuid, Path, description = "会话 ID")),
    responses(
        (status = 200, description = "获取成功", body = Transcript),
        (status = 404, description = "会话不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_transcript(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let transcript = ConversationService::new(state.db.clone())
        .transcript(&admin, path.into_inner())
        .await?;
    HttpResponseBuilder::ok(transcript)
}

pub fn configure_organisation_session_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/{id}/sessions", web::get().to(list_sessions));
}

pub fn configure_session_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/sessions/{id}", web::get().to(get_transcript));
}
