// 示例对话 API 处理器

use actix_web::{web, HttpResponse, Result as ActixResult};
use uuid::Uuid;
use voxd_common::PaginationParams;

use crate::api::extractors::AuthenticatedAdmin;
use crate::api::responses::HttpResponseBuilder;
use crate::services::example::{
    CreateExampleRequest, ExampleFilter, ExampleService, GenerateRequest,
    UpdateExampleRequest,
};
use crate::state::AppState;

fn service(state: &AppState) -> ExampleService {
    ExampleService::new(state.db.clone(), state.ai.clone(), state.storage.clone())
}

/// 示例对话列表
#[utoipa::path(
    get,
    path = "/examples",
    tag = "Example",
    params(PaginationParams, ExampleFilter),
    responses((status = 200, description = "获取成功", body = Object)),
    security(("bearer_auth" = []))
)]
pub async fn list_examples(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    params: web::Query<PaginationParams>,
    filter: web::Query<ExampleFilter>,
) -> ActixResult<HttpResponse> {
    let page = service(&state).list(&admin, &params, &filter).await?;
    HttpResponseBuilder::ok(page)
}

/// 示例对话详情
#[utoipa::path(
    get,
    path = "/examples/{id}",
    tag = "Example",
    params(("id" = Uuid, Path, description = "示例对话 ID")),
    responses(
        (status = 200, description = "获取成功", body = Object),
        (status = 404, description = "示例对话不存在")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_example(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let example = service(&state).get(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(example)
}

/// 生成进度
#[utoipa::path(
    get,
    path = "/examples/{id}/status",
    tag = "Example",
    params(("id" = Uuid, Path, description = "示例对话 ID")),
    responses((status = 200, description = "获取成功", body = ExampleStatusView)),
    security(("bearer_auth" = []))
)]
pub async fn get_example_status(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let status = service(&state).status(&admin, path.into_inner()).await?;
    HttpResponseBuilder::ok(status)
}

/// 创建示例对话（草稿）
#[utoipa::path(
    post,
    path = "/examples",
    tag = "Example",
    request_body = CreateExampleRequest,
    responses(
        (status = 201, description = "创建成功", body = Object),
        (status = 400, description = "请求参数错误")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_example(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    request: web::Json<CreateExampleRequest>,
) -> ActixResult<HttpResponse> {
    let example = service(&state).create(&admin, request.into_inner()).await?;
    HttpResponseBuilder::created(example)
}

/// 更新示例对话
#[utoipa::path(
    put,
    path = "/examples/{id}",
    tag = "Example",
    params(("id" = Uuid, Path, description = "示例对话 ID")),
    request_body = UpdateExampleRequest,
    responses(
        (status = 200, description = "更新成功", body = Object),
        (status = 409, description = "正在生成")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_example(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: web::Json<UpdateExampleRequest>,
) -> ActixResult<HttpResponse> {
    let example = service(&state)
        .update(&admin, path.into_inner(), request.into_inner())
        .await?;
    HttpResponseBuilder::ok(example)
}

/// 删除示例对话
#[utoipa::path(
    delete,
    path = "/examples/{id}",
    tag = "Example",
    params(("id" = Uuid, Path, description = "示例对话 ID")),
    responses((status = 200, description = "删除成功")),
    security(("bearer_auth" = []))
)]
pub async fn delete_example(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    service(&state).delete(&admin, path.into_inner()).await?;
    HttpResponseBuilder::done()
}

/// 用 AI 生成对话
///
/// 请求体可省略；`generate_images` 为 true 时对话生成后在后台配图。
#[utoipa::path(
    post,
    path = "/examples/{id}/generate",
    tag = "Example",
    params(("id" = Uuid, Path, description = "示例对话 ID")),
    request_body(content = GenerateRequest, description = "可省略"),
    responses(
        (status = 200, description = "生成成功", body = Object),
        (status = 409, description = "正在生成"),
        (status = 502, description = "AI 服务失败")
    ),
    security(("bearer_auth" = []))
)]
pub async fn generate_example(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    request: Option<web::Json<GenerateRequest>>,
) -> ActixResult<HttpResponse> {
    let generate_images = request.map(|r| r.generate_images).unwrap_or(false);
    let example = service(&state)
        .generate(&admin, path.into_inner(), generate_images)
        .await?;
    HttpResponseBuilder::ok(example)
}

/// 后台生成配图
#[utoipa::path(
    post,
    path = "/examples/{id}/generate-images",
    tag = "Example",
    params(("id" = Uuid, Path, description = "示例对话 ID")),
    responses(
        (status = 202, description = "任务已启动", body = ExampleStatusView),
        (status = 409, description = "对话未生成或配图进行中")
    ),
    security(("bearer_auth" = []))
)]
pub async fn generate_example_images(
    admin: AuthenticatedAdmin,
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> ActixResult<HttpResponse> {
    let status = service(&state)
        .generate_images(&admin, path.into_inner())
        .await?;
    HttpResponseBuilder::accepted(status)
}

pub fn configure_example_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/examples")
            .route("", web::get().to(list_examples))
            .route("", web::post().to(create_example))
            .route("/{id}", web::get().to(get_example))
            .route("/{id}", web::put().to(update_example))
            .route("/{id}", web::delete().to(delete_example))
            .route("/{id}/status", web::get().to(get_example_status))
            .route("/{id}/generate", web::post().to(generate_example))
            .route("/{id}/generate-images", web::post().to(generate_example_images)),
    );
}
