// 聊天用户 API 处理器

use actix_web::{web, HttpResponse, Result as ActixResult};
use uuid::Uuid;
use voxd_common::PaginationParams;

use crate::api::extractors::AuthenticatedAdmin;
use crate::api::responses::HttpResponseBuilder;
use crate::services::chat_user::{
    ChatUserFilter, ChatUserService, CreateChatUserRequest, UpdateChatUserRequest,
};
use crate::services::export::to_csv;
use crate::state::AppState;

fn service(state: &AppState) -> ChatUserService {
    ChatUserService::new(state.db.clone())
}

/// 组织下的聊天用户列表
#[utoipa::path(
    get,
    path = "/organisations/{id}/chat-users",
    tag = "Chat User",
    params(("id" = Uuid, Path, description = "组织 ID"), PaginationParams, ChatUserFilter),
    responses((status = 200, description = "获取成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn list_chat_users(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    params: web::Query<PaginationParams>,
    filter: web::Query<ChatUserFilter>,
) -> ActixResult<HttpResponse> {
    let page = service(&state)
        .list(&admin, path.into_inner(), &params, &filter)
        .await?;
    HttpResponseBuilder::ok(page)
}

/// 导出聊天用户
#[utoipa::path(
    get,
    path = "/organisations/{id}/chat-users/export",
    tag = "Chat User",
    params(("id" = Uuid, Path, description = "组织 ID"), PaginationParams, ChatUserFilter),
    responses((status = 200, description = "CSV 文件", body = String, content_type = "text/csv")),
    security(("bearer_auth" = []))
)]
pub async fn export_chat_users(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    params: web::Query<PaginationParams>,
    filter: web::Query<ChatUserFilter>,
) -> ActixResult<HttpResponse> {
    let rows = service(&state)
        .export(&admin, path.into_inner(), &filter, params.search())
        .await?;
    HttpResponseBuilder::csv("chat-users", to_csv(&rows))
}

/// 创建聊天用户
#[utoipa::path(
    post,
    path = "/organisations/{id}/chat-users",
    tag = "Chat User",
    params(("id" = Uuid, Path, description = "组织 ID")),
    request_body = CreateChatUserRequest,
    responses(
        (status = 201, description = "创建成功", body = Object),
        (status = 400, description = "手机号无效或已存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_chat_user(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<CreateChatUserRequest>,
) -> ActixResult<HttpResponse> {
    let chat_user = service(&state)
        .create(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::created(chat_user)
}

/// 聊天用户详情
#[utoipa::path(
    get,
    path = "/chat-users/{id}",
    tag = "Chat User",
    params(("id" = Uuid, Path, description = "聊天用户 ID")),
    responses(
        (status = 200, description = "获取成功", body = Object),
        (status = 404, description = "聊天用户不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_chat_user(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let chat_user = service(&state).get(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(chat_user)
}

/// 更新聊天用户
#[utoipa::path(
    put,
    path = "/chat-users/{id}",
    tag = "Chat User",
    params(("id" = Uuid, Path, description = "聊天用户 ID")),
    request_body = UpdateChatUserRequest,
    responses((status = 200, description = "更新成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn update_chat_user(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<UpdateChatUserRequest>,
) -> ActixResult<HttpResponse> {
    let chat_user = service(&state)
        .update(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(chat_user)
}

/// 删除聊天用户
#[utoipa::path(
    delete,
    path = "/chat-users/{id}",
    tag = "Chat User",
    params(("id" = Uuid, Path, description = "聊天用户 ID")),
    responses((status = 200, description = "删除成功")),
    security(("bearer_auth" = []))
)]
pub async fn delete_chat_user(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

pub fn configure_organisation_chat_user_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/{id}/chat-users", web::get().to(list_chat_users))
        .route("/{id}/chat-users", web::post().to(create_chat_user))
        .route("/{id}/chat-users/export", web::get().to(export_chat_users));
}

pub fn configure_chat_user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/chat-users")
            .route("/{id}", web::get().to(get_chat_user))
            .route("/{id}", web::put().to(update_chat_user))
            .route("/{id}", web::delete().to(delete_chat_user)),
    );
}
