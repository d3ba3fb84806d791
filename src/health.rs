// 健康检查

use actix_web::{web, HttpResponse, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::db;
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    /// healthy 或 unhealthy
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub database: &'static str,
    pub timestamp: DateTime<Utc>,
}

/// 健康检查
///
/// 数据库不可用时返回 503。
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "服务正常", body = HealthResponse),
        (status = 503, description = "数据库不可用", body = HealthResponse)
    )
)]
pub async fn health_check(state: web::Data<AppState>) -> Result<HttpResponse> {
    let database_ok = db::ping(&state.db).await.is_ok();
    let response = HealthResponse {
        status: if database_ok { "healthy" } else { "unhealthy" },
        service: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.environment.name.clone(),
        database: if database_ok { "up" } else { "down" },
        timestamp: Utc::now(),
    };

    if database_ok {
        Ok(HttpResponse::Ok().json(response))
    } else {
        Ok(HttpResponse::ServiceUnavailable().json(response))
    }
}

pub fn configure_health_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::config::AppConfig;
    use actix_web::{test, App};
    use sea_orm::{DatabaseBackend, DbErr, MockDatabase, MockExecResult};

    async fn call(db: sea_orm::DatabaseConnection) -> (u16, serde_json::Value) {
        let state = web::Data::new(AppState::new(Arc::new(db), AppConfig::default()).unwrap());
        let app = test::init_service(App::new().app_data(state).configure(configure_health_routes)).await;

        let resp = test::call_service(&app, test::TestRequest::get().uri("/health").to_request()).await;
        let status = resp.status().as_u16();
        let body: serde_json::Value = test::read_body_json(resp).await;
        (status, body)
    }

    #[actix_web::test]
    async fn test_health_check_up() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let (status, body) = call(db).await;
        assert_eq!(status, 200);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["database"], "up");
    }

    #[actix_web::test]
    async fn test_health_check_database_down() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_errors([DbErr::Custom("connection refused".to_string())])
            .into_connection();

        let (status, body) = call(db).await;
        assert_eq!(status, 503);
        assert_eq!(body["status"], "unhealthy");
    }
}
