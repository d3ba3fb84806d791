use actix_cors::Cors;
use actix_web::{http::header, web, App, HttpServer};
use std::time::Duration;
use tracing::{error, info, warn};

use voxd_admin::api::handlers::configure_file_routes;
use voxd_admin::api::routes::{configure_routes, configure_swagger_ui};
use voxd_admin::config::{AppConfig, ConfigLoader};
use voxd_admin::db::{DatabaseManager, MigrationManager};
use voxd_admin::errors::{json_error_handler, path_error_handler, query_error_handler, RequestIdMiddleware};
use voxd_admin::health::configure_health_routes;
use voxd_admin::logging::LoggingSetup;
use voxd_admin::services::quote::QuoteService;
use voxd_admin::AppState;

/// 过期报价单的清理间隔
const QUOTE_SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

fn io_error(e: impl std::fmt::Display) -> std::io::Error {
    std::io::Error::new(std::io::ErrorKind::Other, e.to_string())
}

fn build_cors(config: &AppConfig) -> Cors {
    let origins = &config.security.cors_origins;
    let cors = if origins.iter().any(|o| o == "*") {
        Cors::default().allow_any_origin()
    } else {
        origins
            .iter()
            .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin))
    };

    cors.allowed_methods(vec!["GET", "POST", "PUT", "PATCH", "DELETE", "OPTIONS"])
        .allowed_headers(vec![header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .expose_headers(vec![header::CONTENT_DISPOSITION])
        .max_age(3600)
}

fn spawn_quote_sweeper(state: AppState) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(QUOTE_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            match QuoteService::new(state.db.clone(), state.ai.clone()).expire_overdue().await {
                Ok(0) => {}
                Ok(count) => info!(count, "过期报价单已标记"),
                Err(e) => warn!(error = %e, "过期报价单清理失败"),
            }
        }
    });
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = ConfigLoader::init().map_err(io_error)?;

    // guard 必须活到进程退出
    let _log_guard = LoggingSetup::init(&config.logging).map_err(io_error)?;

    info!(
        "启动 Voxd Admin v{} ({})",
        config.environment.version, config.environment.name
    );

    let db_manager = DatabaseManager::new(config.database.clone())
        .await
        .map_err(io_error)?;
    let db = db_manager.get_connection();

    let migration_manager = MigrationManager::new(db.clone());
    migration_manager.init().await.map_err(io_error)?;
    match migration_manager.migrate().await {
        Ok(applied) if !applied.is_empty() => info!("应用了 {} 个数据库迁移", applied.len()),
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, "数据库迁移失败");
            return Err(io_error(e));
        }
    }

    ConfigLoader::print_summary(config);

    let state = AppState::new(db, config.clone()).map_err(io_error)?;
    spawn_quote_sweeper(state.clone());
    let state = web::Data::new(state);

    info!("服务器启动地址: http://{}:{}", config.server.host, config.server.port);
    info!("API 文档: http://{}:{}/api/v1/docs/", config.server.host, config.server.port);

    let mut server = HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::JsonConfig::default().error_handler(json_error_handler))
            .app_data(web::QueryConfig::default().error_handler(query_error_handler))
            .app_data(web::PathConfig::default().error_handler(path_error_handler))
            .wrap(build_cors(config))
            .wrap(RequestIdMiddleware)
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(configure_health_routes)
            .configure(configure_file_routes)
            // Swagger UI 在 /api/v1 作用域之前注册
            .configure(configure_swagger_ui)
            .configure(configure_routes)
    })
    .keep_alive(Duration::from_secs(config.server.keep_alive));

    if let Some(workers) = config.server.workers {
        server = server.workers(workers);
    }

    server
        .bind((config.server.host.clone(), config.server.port))?
        .run()
        .await
}
