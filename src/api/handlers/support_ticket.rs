// 支持工单 API 处理器

use actix_web::{web, HttpResponse, Result as ActixResult};
use uuid::Uuid;
use voxd_common::PaginationParams;

use crate::api::extractors::AuthenticatedAdmin;
use crate::api::responses::HttpResponseBuilder;
use crate::services::export::to_csv;
use crate::services::support_ticket::{
    AddMessageRequest, AssignTicketRequest, ChangeStatusRequest, CreateTicketRequest,
    SupportTicketService, TicketFilter, TicketMessageResponse, UpdateTicketRequest,
};
use crate::state::AppState;

fn service(state: &AppState) -> SupportTicketService {
    SupportTicketService::new(state.db.clone())
}

/// 工单列表
#[utoipa::path(
    get,
    path = "/tickets",
    tag = "Support Ticket",
    params(PaginationParams, TicketFilter),
    responses((status = 200, description = "获取成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn list_tickets(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    params: web::Query<PaginationParams>,
    filter: web::Query<TicketFilter>,
) -> ActixResult<HttpResponse> {
    let page = service(&state).list(&admin, &params, &filter).await?;
    HttpResponseBuilder::ok(page)
}

/// 导出工单
#[utoipa::path(
    get,
    path = "/tickets/export",
    tag = "Support Ticket",
    params(PaginationParams, TicketFilter),
    responses((status = 200, description = "CSV 文件", body = String, content_type = "text/csv")),
    security(("bearer_auth" = []))
)]
pub async fn export_tickets(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    params: web::Query<PaginationParams>,
    filter: web::Query<TicketFilter>,
) -> ActixResult<HttpResponse> {
    let rows = service(&state).export(&admin, &filter, params.search()).await?;
    HttpResponseBuilder::csv("tickets", to_csv(&rows))
}

/// 工单详情
#[utoipa::path(
    get,
    path = "/tickets/{id}",
    tag = "Support Ticket",
    params(("id" = Uuid, Path, description = "工单 ID")),
    responses(
        (status = 200, description = "获取成功", body = Object),
        (status = 404, description = "工单不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_ticket(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let ticket = service(&state).get(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(ticket)
}

/// 创建工单
#[utoipa::path(
    post,
    path = "/tickets",
    tag = "Support Ticket",
    request_body = CreateTicketRequest,
    responses(
        (status = 201, description = "创建成功", body = Object),
        (status = 400, description = "请求参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_ticket(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    request: web::Json<CreateTicketRequest>,
) -> ActixResult<HttpResponse> {
    let ticket = service(&state).create(&admin, request.into_inner()).await?;
    HttpResponseBuilder::created(ticket)
}

/// 更新工单
#[utoipa::path(
    put,
    path = "/tickets/{id}",
    tag = "Support Ticket",
    params(("id" = Uuid, Path, description = "工单 ID")),
    request_body = UpdateTicketRequest,
    responses((status = 200, description = "更新成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn update_ticket(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<UpdateTicketRequest>,
) -> ActixResult<HttpResponse> {
    let ticket = service(&state)
        .update(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(ticket)
}

/// 修改工单状态
#[utoipa::path(
    patch,
    path = "/tickets/{id}/status",
    tag = "Support Ticket",
    params(("id" = Uuid, Path, description = "工单 ID")),
    request_body = ChangeStatusRequest,
    responses(
        (status = 200, description = "更新成功", body = Object),
        (status = 409, description = "状态流转不允许")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_ticket_status(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<ChangeStatusRequest>,
) -> ActixResult<HttpResponse> {
    let ticket = service(&state)
        .change_status(&admin, path.into_inner(), request.status)
        .await?;
    HttpResponseBuilder::ok(ticket)
}

/// 指派工单
#[utoipa::path(
    patch,
    path = "/tickets/{id}/assign",
    tag = "Support Ticket",
    params(("id" = Uuid, Path, description = "工单 ID")),
    request_body = AssignTicketRequest,
    responses(
        (status = 200, description = "指派成功", body = Object),
        (status = 403, description = "仅平台员工")
    ),
    security(("bearer_auth" = []))
)]
pub async fn assign_ticket(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<AssignTicketRequest>,
) -> ActixResult<HttpResponse> {
    let ticket = service(&state)
        .assign(&admin, path.into_inner(), request.admin_id)
        .await?;
    HttpResponseBuilder::ok(ticket)
}

/// 删除工单
#[utoipa::path(
    delete,
    path = "/tickets/{id}",
    tag = "Support Ticket",
    params(("id" = Uuid, Path, description = "工单 ID")),
    responses(
        (status = 200, description = "删除成功"),
        (status = 403, description = "仅平台员工")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_ticket(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

/// 工单消息
#[utoipa::path(
    get,
    path = "/tickets/{id}/messages",
    tag = "Support Ticket",
    params(("id" = Uuid, Path, description = "工单 ID")),
    responses((status = 200, description = "获取成功", body = Vec<TicketMessageResponse>)),
    security(("bearer_auth" = []))
)]
pub async fn list_ticket_messages(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let messages = service(&state).list_messages(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(messages)
}

/// 回复工单
#[utoipa::path(
    post,
    path = "/tickets/{id}/messages",
    tag = "Support Ticket",
    params(("id" = Uuid, Path, description = "工单 ID")),
    request_body = AddMessageRequest,
    responses(
        (status = 201, description = "回复成功", body = TicketMessageResponse),
        (status = 400, description = "提及了无权访问的管理员")
    ),
    security(("bearer_auth" = []))
)]
pub async fn add_ticket_message(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<AddMessageRequest>,
) -> ActixResult<HttpResponse> {
    let message = service(&state)
        .add_message(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::created(message)
}

pub fn configure_ticket_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tickets")
            .route("", web::get().to(list_tickets))
            .route("", web::post().to(create_ticket))
            .route("/export", web::get().to(export_tickets))
            .route("/{id}", web::get().to(get_ticket))
            .route("/{id}", web::put().to(update_ticket))
            .route("/{id}", web::delete().to(delete_ticket))
            .route("/{id}/status", web::patch().to(change_ticket_status))
            .route("/{id}/assign", web::patch().to(assign_ticket))
            .route("/{id}/messages", web::get().to(list_ticket_messages))
            .route("/{id}/messages", web::post().to(add_ticket_message)),
    );
}
