// 合作伙伴 API 处理器

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse, Result as ActixResult};
use uuid::Uuid;
use voxd_common::PaginationParams;

use crate::api::extractors::{read_upload, AuthenticatedAdmin};
use crate::api::responses::HttpResponseBuilder;
use crate::services::export::to_csv;
use crate::services::partner::{CreatePartnerRequest, PartnerFilter, PartnerService, UpdatePartnerRequest};
use crate::services::upload::LogoUploader;
use crate::state::AppState;

fn service(state: &AppState) -> PartnerService {
    PartnerService::new(state.db.clone())
}

/// 合作伙伴列表
#[utoipa::path(
    get,
    path = "/partners",
    tag = "Partner",
    params(PaginationParams, PartnerFilter),
    responses((status = 200, description = "获取成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn list_partners(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    params: web::Query<PaginationParams>,
    filter: web::Query<PartnerFilter>,
) -> ActixResult<HttpResponse> {
    let page = service(&state).list(&admin, &params, &filter).await?;
    HttpResponseBuilder::ok(page)
}

/// 导出合作伙伴
#[utoipa::path(
    get,
    path = "/partners/export",
    tag = "Partner",
    params(PaginationParams, PartnerFilter),
    responses((status = 200, description = "CSV 文件", body = String, content_type = "text/csv")),
    security(("bearer_auth" = []))
)]
pub async fn export_partners(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    params: web::Query<PaginationParams>,
    filter: web::Query<PartnerFilter>,
) -> ActixResult<HttpResponse> {
    let rows = service(&state).export(&admin, &filter, params.search()).await?;
    HttpResponseBuilder::csv("partners", to_csv(&rows))
}

/// 合作伙伴详情
#[utoipa::path(
    get,
    path = "/partners/{id}",
    tag = "Partner",
    params(("id" = Uuid, Path, description = "合作伙伴 ID")),
    responses(
        (status = 200, description = "获取成功", body = Object),
        (status = 404, description = "合作伙伴不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_partner(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let partner = service(&state).get(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(partner)
}

/// 创建合作伙伴
#[utoipa::path(
    post,
    path = "/partners",
    tag = "Partner",
    request_body = CreatePartnerRequest,
    responses(
        (status = 201, description = "创建成功", body = Object),
        (status = 400, description = "请求参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_partner(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    request: web::Json<CreatePartnerRequest>,
) -> ActixResult<HttpResponse> {
    let partner = service(&state).create(&admin, request.into_inner()).await?;
    HttpResponseBuilder::created(partner)
}

/// 更新合作伙伴
#[utoipa::path(
    put,
    path = "/partners/{id}",
    tag = "Partner",
    params(("id" = Uuid, Path, description = "合作伙伴 ID")),
    request_body = UpdatePartnerRequest,
    responses(
        (status = 200, description = "更新成功", body = Object),
        (status = 404, description = "合作伙伴不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_partner(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<UpdatePartnerRequest>,
) -> ActixResult<HttpResponse> {
    let partner = service(&state)
        .update(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(partner)
}

/// 删除合作伙伴
#[utoipa::path(
    delete,
    path = "/partners/{id}",
    tag = "Partner",
    params(("id" = Uuid, Path, description = "合作伙伴 ID")),
    responses(
        (status = 200, description = "删除成功"),
        (status = 409, description = "仍有关联组织")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_partner(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

/// 上传合作伙伴 Logo
///
/// multipart 字段名为 `logo`。
#[utoipa::path(
    post,
    path = "/partners/{id}/logo",
    tag = "Partner",
    params(("id" = Uuid, Path, description = "合作伙伴 ID")),
    request_body(content = String, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "上传成功", body = Object),
        (status = 400, description = "文件无效")
    ),
    security(("bearer_auth" = []))
)]
pub async fn upload_partner_logo(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> ActixResult<HttpResponse> {
    let id = path.into_inner();
    let service = service(&state);
    // 先确认可见，避免为不存在的记录写文件
    service.get(&admin, id).await?;

    let file = read_upload(payload, "logo", state.config.storage.max_upload_bytes).await?;
    let url = LogoUploader::new(state.storage.clone(), &state.config.storage)
        .upload("partners", id, file)
        .await?;
    let partner = service.set_logo(&admin, id, url).await?;
    HttpResponseBuilder::ok(partner)
}

pub fn configure_partner_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/partners")
            .route("", web::get().to(list_partners))
            .route("", web::post().to(create_partner))
            .route("/export", web::get().to(export_partners))
            .route("/{id}", web::get().to(get_partner))
            .route("/{id}", web::put().to(update_partner))
            .route("/{id}", web::delete().to(delete_partner))
            .route("/{id}/logo", web::post().to(upload_partner_logo)),
    );
}
