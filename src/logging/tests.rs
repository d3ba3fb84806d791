// 日志系统测试

use crate::errors::RequestId;
use crate::logging::{LoggingSetup, RequestContext};
use actix_web::{test::TestRequest, HttpMessage};
use tracing::Level;
use uuid::Uuid;

#[test]
fn test_parse_level() {
    assert_eq!(LoggingSetup::parse_level("trace"), Level::TRACE);
    assert_eq!(LoggingSetup::parse_level("DEBUG"), Level::DEBUG);
    assert_eq!(LoggingSetup::parse_level("warn"), Level::WARN);
    assert_eq!(LoggingSetup::parse_level("invalid"), Level::INFO);
}

#[test]
fn test_preset_configs() {
    let dev = LoggingSetup::development_config();
    assert_eq!(dev.format, "pretty");
    assert!(!dev.file_enabled);

    let prod = LoggingSetup::production_config();
    assert_eq!(prod.format, "json");
    assert!(prod.file_enabled);
    assert!(prod.file_path.is_some());

    let test = LoggingSetup::test_config();
    assert_eq!(test.level, "warn");
}

#[test]
fn test_split_file_path() {
    assert_eq!(
        LoggingSetup::split_file_path("./logs/voxd-admin.log"),
        ("./logs".to_string(), "voxd-admin.log".to_string())
    );
    assert_eq!(
        LoggingSetup::split_file_path("voxd.log"),
        (".".to_string(), "voxd.log".to_string())
    );
}

#[test]
fn test_request_context_fields() {
    let admin_id = Uuid::new_v4();
    let partner_id = Uuid::new_v4();
    let context = RequestContext::new().with_admin(admin_id, Some(partner_id));

    let fields = context.to_log_fields();
    assert!(fields.iter().any(|(k, _)| *k == "request_id"));
    assert!(fields.iter().any(|(k, v)| *k == "admin_id" && *v == admin_id.to_string()));
    assert!(fields.iter().any(|(k, v)| *k == "partner_id" && *v == partner_id.to_string()));
    assert!(!fields.iter().any(|(k, _)| *k == "path"));
}

#[test]
fn test_request_context_uses_middleware_request_id() {
    let req = TestRequest::post().uri("/api/v1/partners").to_http_request();
    req.extensions_mut().insert(RequestId("req-abc".to_string()));

    let context = RequestContext::from_http_request(&req);
    assert_eq!(context.request_id, "req-abc");
    assert_eq!(context.method.as_deref(), Some("POST"));
    assert_eq!(context.path.as_deref(), Some("/api/v1/partners"));
}
