// 认证 API 处理器

use actix_web::{web, HttpResponse, Result as ActixResult};

use crate::api::extractors::AuthenticatedAdmin;
use crate::api::responses::HttpResponseBuilder;
use crate::services::auth::{AuthService, LoginRequest};
use crate::state::AppState;

fn service(state: &AppState) -> AuthService {
    AuthService::new(state.db.clone(), state.jwt.clone())
}

/// 管理员登录
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "Auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "登录成功", body = LoginResponse),
        (status = 401, description = "邮箱或密码错误"),
        (status = 400, description = "请求参数错误")
    )
)]
pub async fn login(
    state: web::Data<AppState>,
    request: web::Json<LoginRequest>,
) -> ActixResult<HttpResponse> {
    let response = service(&state).login(request.into_inner()).await?;
    HttpResponseBuilder::ok(response)
}

/// 当前管理员
#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "Auth",
    responses(
        (status = 200, description = "获取成功", body = AdminUserResponse),
        (status = 401, description = "未认证")
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(admin: AuthenticatedAdmin, state: web::Data<AppState>) -> ActixResult<HttpResponse> {
    let current = service(&state).me(&admin).await?;
    HttpResponseBuilder::ok(current)
}

pub fn configure_auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/login", web::post().to(login))
            .route("/me", web::get().to(me)),
    );
}
