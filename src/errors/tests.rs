// 错误处理系统测试

use crate::errors::{flatten_validation_errors, ErrorResponse, RequestIdMiddleware, VoxdError};
use actix_web::{http::StatusCode, test as actix_test, web, App, HttpResponse, ResponseError};
use serde::Deserialize;
use validator::Validate;

#[test]
fn test_error_codes_and_statuses() {
    let cases = [
        (VoxdError::validation("email", "邮箱格式无效"), "VALIDATION_ERROR", 400),
        (VoxdError::authentication("令牌无效"), "AUTHENTICATION_ERROR", 401),
        (VoxdError::authorization("无权操作"), "AUTHORIZATION_ERROR", 403),
        (VoxdError::not_found("组织"), "NOT_FOUND", 404),
        (VoxdError::conflict("slug 已存在"), "CONFLICT", 409),
        (VoxdError::bad_request("参数错误"), "BAD_REQUEST", 400),
        (VoxdError::timeout("AI 调用"), "TIMEOUT_ERROR", 408),
        (VoxdError::external_service("whatsapp", "bad token"), "EXTERNAL_SERVICE_ERROR", 502),
        (VoxdError::storage("上传失败"), "STORAGE_ERROR", 502),
        (VoxdError::database_with_code("连接失败", "08006"), "DATABASE_ERROR", 500),
    ];

    for (error, code, status) in cases {
        assert_eq!(error.error_code(), code);
        assert_eq!(error.status_code(), status);
    }
}

#[test]
fn test_client_errors_are_not_logged() {
    assert!(!VoxdError::validation("field", "message").should_log());
    assert!(!VoxdError::not_found("agent").should_log());
    assert!(VoxdError::internal("something went wrong").should_log());
    assert!(VoxdError::ai_service_with_model("模型不可用", "gpt-4o").is_server_error());
}

#[derive(Debug, Validate, Deserialize)]
struct LineItemForm {
    #[validate(length(min = 1, message = "描述不能为空"))]
    description: String,
}

#[derive(Debug, Validate, Deserialize)]
struct QuoteForm {
    #[validate(length(min = 1, max = 255, message = "标题长度必须在 1-255 之间"))]
    title: String,
    #[validate(email)]
    client_email: String,
    #[validate]
    line_items: Vec<LineItemForm>,
}

#[test]
fn test_flatten_validation_errors_paths() {
    let form = QuoteForm {
        title: String::new(),
        client_email: "not-an-email".to_string(),
        line_items: vec![
            LineItemForm { description: "设计".to_string() },
            LineItemForm { description: String::new() },
        ],
    };

    let errors = form.validate().unwrap_err();
    let fields = flatten_validation_errors(&errors);

    assert_eq!(fields["title"], vec!["标题长度必须在 1-255 之间".to_string()]);
    assert_eq!(fields["client_email"], vec!["字段校验失败: email".to_string()]);
    assert_eq!(fields["line_items[1].description"], vec!["描述不能为空".to_string()]);
    assert!(!fields.contains_key("line_items[0].description"));
}

#[test]
fn test_validation_error_renders_field_errors() {
    let error = VoxdError::validation("slug", "只能包含小写字母、数字和连字符");
    let response = ErrorResponse::from_error(&error);
    let body = serde_json::to_value(&response).unwrap();

    assert_eq!(response.status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "VALIDATION_ERROR");
    assert_eq!(body["fieldErrors"]["slug"][0], "只能包含小写字母、数字和连字符");
}

#[test]
fn test_plain_error_has_no_field_errors() {
    let error = VoxdError::conflict("该合作伙伴下仍有组织");
    let body = serde_json::to_value(ErrorResponse::from_error(&error)).unwrap();

    assert_eq!(body["code"], "CONFLICT");
    assert!(body["error"].as_str().unwrap().contains("该合作伙伴下仍有组织"));
    assert!(body.get("fieldErrors").is_none());
    assert!(error.field_errors().is_none());
}

#[test]
fn test_db_record_not_found_maps_to_not_found() {
    let error: VoxdError = sea_orm::DbErr::RecordNotFound("partner".to_string()).into();
    assert_eq!(error.status_code(), 404);

    let error: VoxdError = sea_orm::DbErr::Custom("boom".to_string()).into();
    assert_eq!(error.error_code(), "DATABASE_ERROR");
}

#[test]
fn test_serde_json_error_maps_to_bad_request() {
    let err = serde_json::from_str::<serde_json::Value>("{oops").unwrap_err();
    let error: VoxdError = err.into();
    assert_eq!(error.status_code(), 400);
}

#[test]
fn test_response_error_status() {
    let error = VoxdError::authorization("仅超级管理员可执行");
    assert_eq!(ResponseError::status_code(&error), StatusCode::FORBIDDEN);
    assert_eq!(error.error_response().status(), StatusCode::FORBIDDEN);
}

#[actix_web::test]
async fn test_request_id_middleware_sets_header() {
    let app = actix_test::init_service(
        App::new()
            .wrap(RequestIdMiddleware)
            .route("/ping", web::get().to(|| async { HttpResponse::Ok().finish() })),
    )
    .await;

    let req = actix_test::TestRequest::get().uri("/ping").to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert!(resp.headers().contains_key("x-request-id"));

    let req = actix_test::TestRequest::get()
        .uri("/ping")
        .insert_header(("X-Request-ID", "req-123"))
        .to_request();
    let resp = actix_test::call_service(&app, req).await;
    assert_eq!(resp.headers().get("x-request-id").unwrap(), "req-123");
}
