// 管理员账号 API 处理器

use actix_web::{web, HttpResponse, Result as ActixResult};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;
use voxd_common::PaginationParams;

use crate::api::extractors::AuthenticatedAdmin;
use crate::api::responses::HttpResponseBuilder;
use crate::services::admin_user::{
    AdminUserFilter, AdminUserService, CreateAdminUserRequest, UpdateAdminUserRequest,
};
use crate::state::AppState;

/// 启用或停用
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetActiveRequest {
    pub is_active: bool,
}

fn service(state: &AppState) -> AdminUserService {
    AdminUserService::new(state.db.clone(), state.config.security.bcrypt_cost)
}

/// 管理员列表
#[utoipa::path(
    get,
    path = "/admin-users",
    tag = "Admin User",
    params(PaginationParams, AdminUserFilter),
    responses(
        (status = 200, description = "获取成功", body = Object),
        (status = 403, description = "仅超级管理员")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_admin_users(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    params: web::Query<PaginationParams>,
    filter: web::Query<AdminUserFilter>,
) -> ActixResult<HttpResponse> {
    let page = service(&state).list(&admin, &params, &filter).await?;
    HttpResponseBuilder::ok(page)
}

/// 管理员详情
#[utoipa::path(
    get,
    path = "/admin-users/{id}",
    tag = "Admin User",
    params(("id" = Uuid, Path, description = "管理员 ID")),
    responses(
        (status = 200, description = "获取成功", body = AdminUserResponse),
        (status = 404, description = "管理员不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_admin_user(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let found = service(&state).get(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(found)
}

/// 创建管理员
#[utoipa::path(
    post,
    path = "/admin-users",
    tag = "Admin User",
    request_body = CreateAdminUserRequest,
    responses(
        (status = 201, description = "创建成功", body = AdminUserResponse),
        (status = 400, description = "请求参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_admin_user(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    request: web::Json<CreateAdminUserRequest>,
) -> ActixResult<HttpResponse> {
    let created = service(&state).create(&admin, request.into_inner()).await?;
    HttpResponseBuilder::created(created)
}

/// 更新管理员
#[utoipa::path(
    put,
    path = "/admin-users/{id}",
    tag = "Admin User",
    params(("id" = Uuid, Path, description = "管理员 ID")),
    request_body = UpdateAdminUserRequest,
    responses(
        (status = 200, description = "更新成功", body = AdminUserResponse),
        (status = 404, description = "管理员不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_admin_user(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<UpdateAdminUserRequest>,
) -> ActixResult<HttpResponse> {
    let updated = service(&state)
        .update(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(updated)
}

/// 启用或停用管理员
#[utoipa::path(
    patch,
    path = "/admin-users/{id}/active",
    tag = "Admin User",
    params(("id" = Uuid, Path, description = "管理员 ID")),
    request_body = SetActiveRequest,
    responses((status = 200, description = "更新成功", body = AdminUserResponse)),
    security(("bearer_auth" = []))
)]
pub async fn set_admin_user_active(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<SetActiveRequest>,
) -> ActixResult<HttpResponse> {
    let updated = service(&state)
        .set_active(&admin, path.into_inner(), request.is_active)
        .await?;
    HttpResponseBuilder::ok(updated)
}

/// 删除管理员
#[utoipa::path(
    delete,
    path = "/admin-users/{id}",
    tag = "Admin User",
    params(("id" = Uuid, Path, description = "管理员 ID")),
    responses(
        (status = 200, description = "删除成功"),
        (status = 400, description = "不能删除自己")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_admin_user(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

pub fn configure_admin_user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin-users")
            .route("", web::get().to(list_admin_users))
            .route("", web::post().to(create_admin_user))
            .route("/{id}", web::get().to(get_admin_user))
            .route("/{id}", web::put().to(update_admin_user))
            .route("/{id}", web::delete().to(delete_admin_user))
            .route("/{id}/active", web::patch().to(set_admin_user_active)),
    );
}
