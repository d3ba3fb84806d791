// 组织 API 处理器

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Result as ActixResult};
use uuid::Uuid;
use voxd_common::PaginationParams;

use crate::api::extractors::{read_upload, AuthenticatedAdmin};
use crate::api::responses::HttpResponseBuilder;
use crate::services::export::to_csv;
use crate::services::organisation::{
    CreateOrganisationRequest, OrganisationFilter, OrganisationService, UpdateOrganisationRequest,
};
use crate::services::upload::LogoUploader;
use crate::state::AppState;

fn service(state: &AppState) -> OrganisationService {
    OrganisationService::new(state.db.clone())
}

/// 组织列表
///
/// 合作伙伴管理员只能看到自己名下的组织。
#[utoipa::path(
    get,
    path = "/organisations",
    tag = "Organisation",
    params(PaginationParams, OrganisationFilter),
    responses((status = 200, description = "获取成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn list_organisations(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    params: web::Query<PaginationParams>,
    filter: web::Query<OrganisationFilter>,
) -> ActixResult<HttpResponse> {
    let page = service(&state).list(&admin, &params, &filter).await?;
    HttpResponseBuilder::ok(page)
}

/// 导出组织
#[utoipa::path(
    get,
    path = "/organisations/export",
    tag = "Organisation",
    params(PaginationParams, OrganisationFilter),
    responses((status = 200, description = "CSV 文件", body = String, content_type = "text/csv")),
    security(("bearer_auth" = []))
)]
pub async fn export_organisations(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    params: web::Query<PaginationParams>,
    filter: web::Query<OrganisationFilter>,
) -> ActixResult<HttpResponse> {
    let rows = service(&state).export(&admin, &filter, params.search()).await?;
    HttpResponseBuilder::csv("organisations", to_csv(&rows))
}

/// 组织详情
#[utoipa::path(
    get,
    path = "/organisations/{id}",
    tag = "Organisation",
    params(("id" = Uuid, Path, description = "组织 ID")),
    responses(
        (status = 200, description = "获取成功", body = Object),
        (status = 404, description = "组织不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_organisation(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let organisation = service(&state).get(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(organisation)
}

/// 创建组织
#[utoipa::path(
    post,
    path = "/organisations",
    tag = "Organisation",
    request_body = CreateOrganisationRequest,
    responses(
        (status = 201, description = "创建成功", body = Object),
        (status = 400, description = "请求参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_organisation(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    request: web::Json<CreateOrganisationRequest>,
) -> ActixResult<HttpResponse> {
    let organisation = service(&state).create(&admin, request.into_inner()).await?;
    HttpResponseBuilder::created(organisation)
}

/// 更新组织
#[utoipa::path(
    put,
    path = "/organisations/{id}",
    tag = "Organisation",
    params(("id" = Uuid, Path, description = "组织 ID")),
    request_body = UpdateOrganisationRequest,
    responses(
        (status = 200, description = "更新成功", body = Object),
        (status = 404, description = "组织不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_organisation(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<UpdateOrganisationRequest>,
) -> ActixResult<HttpResponse> {
    let organisation = service(&state)
        .update(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(organisation)
}

/// 删除组织
#[utoipa::path(
    delete,
    path = "/organisations/{id}",
    tag = "Organisation",
    params(("id" = Uuid, Path, description = "组织 ID")),
    responses(
        (status = 200, description = "删除成功"),
        (status = 404, description = "组织不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_organisation(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

/// 上传组织 Logo
#[utoipa::path(
    post,
    path = "/organisations/{id}/logo",
    tag = "Organisation",
    params(("id" = Uuid, Path, description = "组织 ID")),
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "上传成功", body = Object),
        (status = 400, description = "文件无效")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_organisation_logo(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    let service = service(&state);
    service.get(&admin, id).await?;

    let file = read_upload(payload, "logo", state.config.storage.max_upload_bytes).await?;
    let url = LogoUploader::new(state.storage.clone(), &state.config.storage)
        .upload("organisations", id, file)
        .await?;
    let organisation = service.set_logo(&admin, id, url).await?;
    HttpResponseBuilder::ok(organisation)
}

pub fn configure_organisation_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/organisations")
            .route("", web::get().to(list_organisations))
            .route("", web::post().to(create_organisation))
            .route("/export", web::get().to(export_organisations))
            .route("/{id}", web::get().to(get_organisation))
            .route("/{id}", web::put().to(update_organisation))
            .route("/{id}", web::delete().to(delete_organisation))
            .route("/{id}/logo", web::post().to(upload_organisation_logo))
            .configure(super::agent::configure_organisation_agent_routes)
            .configure(super::chat_user::configure_organisation_chat_user_routes)
            .configure(super::conversation::configure_organisation_session_routes)
            .configure(super::document::configure_organisation_document_routes)
            .configure(super::waba::configure_organisation_waba_routes),
    );
}
