// 报价单 API 处理器
// 后台管理接口和客户公开页面接口

use actix_web::{web, HttpResponse, Result as ActixResult};
use uuid::Uuid;
use voxd_common::PaginationParams;

use crate::api::extractors::AuthenticatedAdmin;
use crate::api::responses::HttpResponseBuilder;
use crate::services::export::to_csv;
use crate::services::quote::{
    CreateQuoteRequest, PublicQuoteView, QuoteCopy, QuoteFilter, QuoteResponse, QuoteResponseRequest,
    QuoteService, UpdateQuoteRequest,
};
use crate::state::AppState;

fn service(state: &AppState) -> QuoteService {
    QuoteService::new(state.db.clone(), state.ai.clone())
}

/// 报价单列表
#[utoipa::path(
    get,
    path = "/quotes",
    tag = "Quote",
    params(PaginationParams, QuoteFilter),
    responses((status = 200, description = "获取成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn list_quotes(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    params: web::Query<PaginationParams>,
    filter: web::Query<QuoteFilter>,
) -> ActixResult<HttpResponse> {
    let page = service(&state).list(&admin, &params, &filter).await?;
    HttpResponseBuilder::ok(page)
}

/// 导出报价单
#[utoipa::path(
    get,
    path = "/quotes/export",
    tag = "Quote",
    params(PaginationParams, QuoteFilter),
    responses((status = 200, description = "CSV 文件", body = String, content_type = "text/csv")),
    security(("bearer_auth" = []))
)]
pub async fn export_quotes(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    params: web::Query<PaginationParams>,
    filter: web::Query<QuoteFilter>,
) -> ActixResult<HttpResponse> {
    let rows = service(&state).export(&admin, &filter, params.search()).await?;
    HttpResponseBuilder::csv("quotes", to_csv(&rows))
}

/// 报价单详情
#[utoipa::path(
    get,
    path = "/quotes/{id}",
    tag = "Quote",
    params(("id" = Uuid, Path, description = "报价单 ID")),
    responses(
        (status = 200, description = "获取成功", body = QuoteResponse),
        (status = 404, description = "报价单不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_quote(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let quote = service(&state).get(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(quote)
}

/// 创建报价单
#[utoipa::path(
    post,
    path = "/quotes",
    tag = "Quote",
    request_body = CreateQuoteRequest,
    responses(
        (status = 201, description = "创建成功", body = QuoteResponse),
        (status = 400, description = "请求参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_quote(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    request: web::Json<CreateQuoteRequest>,
) -> ActixResult<HttpResponse> {
    let quote = service(&state).create(&admin, request.into_inner()).await?;
    HttpResponseBuilder::created(quote)
}

/// 更新报价单
///
/// 已答复的报价单不能修改。
#[utoipa::path(
    put,
    path = "/quotes/{id}",
    tag = "Quote",
    params(("id" = Uuid, Path, description = "报价单 ID")),
    request_body = UpdateQuoteRequest,
    responses(
        (status = 200, description = "更新成功", body = QuoteResponse),
        (status = 409, description = "报价单已答复")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_quote(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<UpdateQuoteRequest>,
) -> ActixResult<HttpResponse> {
    let quote = service(&state)
        .update(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(quote)
}

/// 删除报价单
#[utoipa::path(
    delete,
    path = "/quotes/{id}",
    tag = "Quote",
    params(("id" = Uuid, Path, description = "报价单 ID")),
    responses((status = 200, description = "删除成功")),
    security(("bearer_auth" = []))
)]
pub async fn delete_quote(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

/// 发送报价单
#[utoipa::path(
    post,
    path = "/quotes/{id}/send",
    tag = "Quote",
    params(("id" = Uuid, Path, description = "报价单 ID")),
    responses(
        (status = 200, description = "已发送", body = QuoteResponse),
        (status = 409, description = "当前状态不能发送")
    ),
    security(("bearer_auth" = []))
)]
pub async fn send_quote(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let quote = service(&state).send(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(quote)
}

/// 生成推介文案
#[utoipa::path(
    post,
    path = "/quotes/{id}/generate-pitch",
    tag = "Quote",
    params(("id" = Uuid, Path, description = "报价单 ID")),
    responses(
        (status = 200, description = "生成成功", body = QuoteResponse),
        (status = 502, description = "AI 服务失败")
    ),
    security(("bearer_auth" = []))
)]
pub async fn generate_pitch(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let quote = service(&state)
        .generate_copy(&admin, path.into_inner(), QuoteCopy::Pitch)
        .await?;
    HttpResponseBuilder::ok(quote)
}

/// 生成方案说明
#[utoipa::path(
    post,
    path = "/quotes/{id}/generate-concept",
    tag = "Quote",
    params(("id" = Uuid, Path, description = "报价单 ID")),
    responses(
        (status = 200, description = "生成成功", body = QuoteResponse),
        (status = 502, description = "AI 服务失败")
    ),
    security(("bearer_auth" = []))
)]
pub async fn generate_concept(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let quote = service(&state)
        .generate_copy(&admin, path.into_inner(), QuoteCopy::Concept)
        .await?;
    HttpResponseBuilder::ok(quote)
}

/// 客户查看报价单
///
/// 首次查看时记录 `viewed_at`，已发送的报价单变为已查看。
#[utoipa::path(
    get,
    path = "/public/quotes/{token}",
    tag = "Public Quote",
    params(("token" = String, Path, description = "公开令牌")),
    responses(
        (status = 200, description = "获取成功", body = PublicQuoteView),
        (status = 404, description = "报价单不存在")
    )
)]
pub async fn public_quote(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let view = service(&state).public_view(&path).await?;
    HttpResponseBuilder::ok(view)
}

/// 客户接受报价
#[utoipa::path(
    post,
    path = "/public/quotes/{token}/accept",
    tag = "Public Quote",
    params(("token" = String, Path, description = "公开令牌")),
    request_body(content = QuoteResponseRequest, description = "可省略"),
    responses(
        (status = 200, description = "已接受", body = PublicQuoteView),
        (status = 409, description = "已过期或已答复")
    )
)]
pub async fn accept_quote(
    state: web::Data<AppState>,
    path: web::Path<String>,
    request: Option<web::Json<QuoteResponseRequest>>,
) -> ActixResult<HttpResponse> {
    let request = request.map(|r| r.into_inner()).unwrap_or_default();
    let view = service(&state).respond(&path, true, request).await?;
    HttpResponseBuilder::ok(view)
}

/// 客户拒绝报价
#[utoipa::path(
    post,
    path = "/public/quotes/{token}/decline",
    tag = "Public Quote",
    params(("token" = String, Path, description = "公开令牌")),
    request_body(content = QuoteResponseRequest, description = "可省略"),
    responses(
        (status = 200, description = "已拒绝", body = PublicQuoteView),
        (status = 409, description = "已过期或已答复")
    )
)]
pub async fn decline_quote(
    state: web::Data<AppState>,
    path: web::Path<String>,
    request: Option<web::Json<QuoteResponseRequest>>,
) -> ActixResult<HttpResponse> {
    let request = request.map(|r| r.into_inner()).unwrap_or_default();
    let view = service(&state).respond(&path, false, request).await?;
    HttpResponseBuilder::ok(view)
}

pub fn configure_quote_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/quotes")
            .route("", web::get().to(list_quotes))
            .route("", web::post().to(create_quote))
            .route("/export", web::get().to(export_quotes))
            .route("/{id}", web::get().to(get_quote))
            .route("/{id}", web::put().to(update_quote))
            .route("/{id}", web::delete().to(delete_quote))
            .route("/{id}/send", web::post().to(send_quote))
            .route("/{id}/generate-pitch", web::post().to(generate_pitch))
            .route("/{id}/generate-concept", web::post().to(generate_concept)),
    );
}

/// 无需认证
pub fn configure_public_quote_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/public/quotes")
            .route("/{token}", web::get().to(public_quote))
            .route("/{token}/accept", web::post().to(accept_quote))
            .route("/{token}/decline", web::post().to(decline_quote)),
    );
}
