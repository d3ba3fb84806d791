// 本地存储文件访问
// 仅 local 后端可用，s3 后端的文件由存储服务直接提供

use actix_web::http::header::{CacheControl, CacheDirective};
use actix_web::{web, HttpResponse, Result as ActixResult};

use crate::errors::VoxdError;
use crate::storage::{content_type_for, LocalStorage};
use crate::state::AppState;

pub async fn serve_file(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let storage = &state.config.storage;
    if storage.backend != "local" {
        return Err(VoxdError::not_found("文件").into());
    }

    let key = path.into_inner();
    let bytes = LocalStorage::new(&storage.local_path, &storage.public_base_url)
        .read_object(&key)
        .await?;

    Ok(HttpResponse::Ok()
        .content_type(content_type_for(&key))
        .insert_header(CacheControl(vec![CacheDirective::Public, CacheDirective::MaxAge(86400)]))
        .body(bytes))
}

pub fn configure_file_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/files/{key:.*}", web::get().to(serve_file));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use crate::config::AppConfig;
    use crate::storage::ObjectStorage;
    use actix_web::{test, App};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use tempfile::TempDir;

    fn state(dir: &TempDir) -> web::Data<AppState> {
        let mut config = AppConfig::default();
        config.storage.local_path = dir.path().to_string_lossy().to_string();
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        web::Data::new(AppState::new(Arc::new(db), config).unwrap())
    }

    #[actix_web::test]
    async fn test_serves_stored_logo() {
        let dir = TempDir::new().unwrap();
        LocalStorage::new(dir.path(), "http://localhost/files")
            .put_object("logos/partners/a/logo.png", vec![1, 2, 3], "image/png")
            .await
            .unwrap();

        let app = test::init_service(
            App::new()
                .app_data(state(&dir))
                .configure(configure_file_routes),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/files/logos/partners/a/logo.png")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        assert_eq!(
            resp.headers().get("content-type").unwrap().to_str().unwrap(),
            "image/png"
        );
        let body = test::read_body(resp).await;
        assert_eq!(body.as_ref(), &[1, 2, 3]);
    }

    #[actix_web::test]
    async fn test_missing_and_traversal_rejected() {
        let dir = TempDir::new().unwrap();
        let app = test::init_service(
            App::new()
                .app_data(state(&dir))
                .configure(configure_file_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/files/logos/none.png").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);

        let req = test::TestRequest::get().uri("/files/logos/%2E%2E/secret").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_client_error());
    }
}
