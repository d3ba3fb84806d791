// WhatsApp Business 账号 API 处理器

use actix_web::{web, HttpResponse, Result as ActixResult};
use uuid::Uuid;

use crate::api::extractors::AuthenticatedAdmin;
use crate::api::responses::HttpResponseBuilder;
use crate::services::waba::{
    CreateTemplateRequest, CreateWabaRequest, RegisterPhoneRequest, SyncReport, UpdateWabaRequest,
    WabaResponse, WabaService,
};
use crate::state::AppState;

fn service(state: &AppState) -> WabaService {
    WabaService::new(state.db.clone(), state.whatsapp.clone())
}

/// 组织下的 WABA 列表
#[utoipa::path(
    get,
    path = "/organisations/{id}/wabas",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "组织 ID")),
    responses((status = 200, description = "获取成功", body = Vec<WabaResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn list_wabas(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let wabas = service(&state).list(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(wabas)
}

/// 接入 WABA
///
/// 先用访问令牌向 Graph API 校验账号。
#[utoipa::path(
    post,
    path = "/organisations/{id}/wabas",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "组织 ID")),
    request_body = CreateWabaRequest,
    responses(
        (status = 201, description = "接入成功", body = WabaResponse),
        (status = 400, description = "账号已接入或参数错误"),
        (status = 502, description = "Graph API 校验失败")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_waba(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<CreateWabaRequest>,
) -> ActixResult<HttpResponse> {
    let waba = service(&state)
        .create(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::created(waba)
}

/// WABA 详情
#[utoipa::path(
    get,
    path = "/wabas/{id}",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "WABA ID")),
    responses(
        (status = 200, description = "获取成功", body = WabaResponse),
        (status = 404, description = "WABA 不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_waba(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let waba = service(&state).get(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(waba)
}

/// 更新 WABA
#[utoipa::path(
    put,
    path = "/wabas/{id}",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "WABA ID")),
    request_body = UpdateWabaRequest,
    responses((status = 200, description = "更新成功", body = WabaResponse)),
    security(("bearer_auth" = []))
)]
pub async fn update_waba(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<UpdateWabaRequest>,
) -> ActixResult<HttpResponse> {
    let waba = service(&state)
        .update(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(waba)
}

/// 删除 WABA
#[utoipa::path(
    delete,
    path = "/wabas/{id}",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "WABA ID")),
    responses((status = 200, description = "删除成功")),
    security(("bearer_auth" = []))
)]
pub async fn delete_waba(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

/// 从 Graph API 同步号码和模板
#[utoipa::path(
    post,
    path = "/wabas/{id}/sync",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "WABA ID")),
    responses((status = 200, description = "同步结果，各部分独立报告错误", body = SyncReport)),
    security(("bearer_auth" = []))
)]
pub async fn sync_waba(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let report = service(&state).sync(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(report)
}

/// 订阅 Webhook
#[utoipa::path(
    post,
    path = "/wabas/{id}/subscribe",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "WABA ID")),
    responses(
        (status = 200, description = "订阅成功", body = WabaResponse),
        (status = 502, description = "Graph API 调用失败")
    ),
    security(("bearer_auth" = []))
)]
pub async fn subscribe_waba(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let waba = service(&state).subscribe(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(waba)
}

/// 已同步的号码
#[utoipa::path(
    get,
    path = "/wabas/{id}/phone-numbers",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "WABA ID")),
    responses((status = 200, description = "获取成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn list_phone_numbers(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let numbers = service(&state)
        .list_phone_numbers(&admin, path.into_inner())
        .await?;
    HttpResponseBuilder::ok(numbers)
}

/// 注册号码
#[utoipa::path(
    post,
    path = "/waba-phone-numbers/{id}/register",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "号码 ID")),
    request_body = RegisterPhoneRequest,
    responses(
        (status = 200, description = "注册成功", body = Object),
        (status = 400, description = "PIN 必须为 6 位数字")
    ),
    security(("bearer_auth" = []))
)]
pub async fn register_phone_number(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<RegisterPhoneRequest>,
) -> ActixResult<HttpResponse> {
    let number = service(&state)
        .register_phone_number(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(number)
}

/// 已同步的消息模板
#[utoipa::path(
    get,
    path = "/wabas/{id}/templates",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "WABA ID")),
    responses((status = 200, description = "获取成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn list_templates(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let templates = service(&state).list_templates(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(templates)
}

/// 提交消息模板审核
#[utoipa::path(
    post,
    path = "/wabas/{id}/templates",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "WABA ID")),
    request_body = CreateTemplateRequest,
    responses(
        (status = 201, description = "已提交", body = Object),
        (status = 400, description = "模板参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_template(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<CreateTemplateRequest>,
) -> ActixResult<HttpResponse> {
    let template = service(&state)
        .create_template(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::created(template)
}

/// 删除消息模板（所有语言）
#[utoipa::path(
    delete,
    path = "/templates/{id}",
    tag = "WABA",
    params(("id" = Uuid, Path, description = "模板 ID")),
    responses((status = 200, description = "删除成功")),
    security(("bearer_auth" = []))
)]
pub async fn delete_template(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete_template(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

pub fn configure_organisation_waba_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/{id}/wabas", web::get().to(list_wabas))
        .route("/{id}/wabas", web::post().to(create_waba));
}

pub fn configure_waba_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/wabas")
            .route("/{id}", web::get().to(get_waba))
            .route("/{id}", web::put().to(update_waba))
            .route("/{id}", web::delete().to(delete_waba))
            .route("/{id}/sync", web::post().to(sync_waba))
            .route("/{id}/subscribe", web::post().to(subscribe_waba))
            .route("/{id}/phone-numbers", web::get().to(list_phone_numbers))
            .route("/{id}/templates", web::get().to(list_templates))
            .route("/{id}/templates", web::post().to(create_template)),
    )
    .route(
        "/waba-phone-numbers/{id}/register",
        web::post().to(register_phone_number),
    )
    .route("/templates/{id}", web::delete().to(delete_template));
}
