// 知识库文档 API 处理器

use actix_web::{web, HttpResponse, Result as ActixResult};
use uuid::Uuid;
use voxd_common::PaginationParams;

use crate::api::extractors::AuthenticatedAdmin;
use crate::api::responses::HttpResponseBuilder;
use crate::services::document::{
    ChunkRequest, CreateDocumentRequest, DocumentFilter, DocumentService,
    UpdateDocumentRequest,
};
use crate::state::AppState;

fn service(state: &AppState) -> DocumentService {
    DocumentService::new(state.db.clone(), state.ai.clone())
}

/// 组织下的文档列表
#[utoipa::path(
    get,
    path = "/organisations/{id}/documents",
    tag = "Document",
    params(("id" = Uuid, Path, description = "组织 ID"), PaginationParams, DocumentFilter),
    responses((status = 200, description = "获取成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn list_documents(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    params: web::Query<PaginationParams>,
    filter: web::Query<DocumentFilter>,
) -> ActixResult<HttpResponse> {
    let page = service(&state)
        .list(&admin, path.into_inner(), &params, &filter)
        .await?;
    HttpResponseBuilder::ok(page)
}

/// 创建文档
#[utoipa::path(
    post,
    path = "/organisations/{id}/documents",
    tag = "Document",
    params(("id" = Uuid, Path, description = "组织 ID")),
    request_body = CreateDocumentRequest,
    responses(
        (status = 201, description = "创建成功", body = Object),
        (status = 400, description = "请求参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_document(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<CreateDocumentRequest>,
) -> ActixResult<HttpResponse> {
    let document = service(&state)
        .create(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::created(document)
}

/// 文档详情
#[utoipa::path(
    get,
    path = "/documents/{id}",
    tag = "Document",
    params(("id" = Uuid, Path, description = "文档 ID")),
    responses(
        (status = 200, description = "获取成功", body = Object),
        (status = 404, description = "文档不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_document(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let document = service(&state).get(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(document)
}

/// 更新文档
#[utoipa::path(
    put,
    path = "/documents/{id}",
    tag = "Document",
    params(("id" = Uuid, Path, description = "文档 ID")),
    request_body = UpdateDocumentRequest,
    responses((status = 200, description = "更新成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn update_document(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<UpdateDocumentRequest>,
) -> ActixResult<HttpResponse> {
    let document = service(&state)
        .update(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(document)
}

/// 删除文档及其分块
#[utoipa::path(
    delete,
    path = "/documents/{id}",
    tag = "Document",
    params(("id" = Uuid, Path, description = "文档 ID")),
    responses((status = 200, description = "删除成功")),
    security(("bearer_auth" = []))
)]
pub async fn delete_document(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

/// 重新分块并生成嵌入
#[utoipa::path(
    post,
    path = "/documents/{id}/chunk",
    tag = "Document",
    params(("id" = Uuid, Path, description = "文档 ID")),
    responses(
        (status = 200, description = "分块完成", body = ChunkingReport),
        (status = 404, description = "文档不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn chunk_document(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let report = service(&state).chunk(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(report)
}

/// 文档的分块列表
#[utoipa::path(
    get,
    path = "/documents/{id}/chunks",
    tag = "Document",
    params(("id" = Uuid, Path, description = "文档 ID")),
    responses((status = 200, description = "获取成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn list_chunks(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let chunks = service(&state).list_chunks(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(chunks)
}

/// 手工添加分块
#[utoipa::path(
    post,
    path = "/documents/{id}/chunks",
    tag = "Document",
    params(("id" = Uuid, Path, description = "文档 ID")),
    request_body = ChunkRequest,
    responses((status = 201, description = "创建成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn create_chunk(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<ChunkRequest>,
) -> ActixResult<HttpResponse> {
    let chunk = service(&state)
        .create_chunk(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::created(chunk)
}

/// 修改分块内容并重新嵌入
#[utoipa::path(
    put,
    path = "/chunks/{id}",
    tag = "Document",
    params(("id" = Uuid, Path, description = "分块 ID")),
    request_body = ChunkRequest,
    responses((status = 200, description = "更新成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn update_chunk(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<ChunkRequest>,
) -> ActixResult<HttpResponse> {
    let chunk = service(&state)
        .update_chunk(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(chunk)
}

/// 删除分块
#[utoipa::path(
    delete,
    path = "/chunks/{id}",
    tag = "Document",
    params(("id" = Uuid, Path, description = "分块 ID")),
    responses((status = 200, description = "删除成功")),
    security(("bearer_auth" = []))
)]
pub async fn delete_chunk(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete_chunk(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

pub fn configure_organisation_document_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/{id}/documents", web::get().to(list_documents))
        .route("/{id}/documents", web::post().to(create_document));
}

pub fn configure_document_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/documents")
            .route("/{id}", web::get().to(get_document))
            .route("/{id}", web::put().to(update_document))
            .route("/{id}", web::delete().to(delete_document))
            .route("/{id}/chunk", web::post().to(chunk_document))
            .route("/{id}/chunks", web::get().to(list_chunks))
            .route("/{id}/chunks", web::post().to(create_chunk)),
    )
    .service(
        web::scope("/chunks")
            .route("/{id}", web::put().to(update_chunk))
            .route("/{id}", web::delete().to(delete_chunk)),
    );
}
