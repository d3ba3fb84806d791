// 配置系统测试

use crate::config::*;

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.server.host, "127.0.0.1");
    assert_eq!(config.server.port, 8080);
    assert_eq!(config.database.max_connections, 10);
    assert_eq!(config.ai.provider, "mock");
    assert_eq!(config.storage.backend, "local");
    assert_eq!(config.whatsapp.api_version, "v21.0");
}

#[test]
fn test_default_config_is_valid() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_invalid_config_validation() {
    let mut config = AppConfig::default();

    config.server.port = 0;
    assert!(config.validate().is_err());

    config.server.port = 8080;
    config.database.max_connections = 0;
    assert!(config.validate().is_err());

    config.database.max_connections = 10;
    config.ai.temperature = 3.0;
    assert!(config.validate().is_err());
}

#[test]
fn test_validate_all_collects_every_error() {
    let mut config = AppConfig::default();
    config.server.port = 0;
    config.security.jwt_secret = "short".to_string();
    config.logging.level = "verbose".to_string();

    let errors = ConfigValidator::validate_all(&config).unwrap_err();
    assert_eq!(errors.len(), 3);
}

#[test]
fn test_environment_methods() {
    let mut config = AppConfig::default();

    config.environment.name = "development".to_string();
    assert!(config.is_development());
    assert!(!config.is_production());

    config.environment.name = "production".to_string();
    assert!(config.is_production());
    assert!(!config.is_test());

    config.environment.name = "test".to_string();
    assert!(config.is_test());
}

#[test]
fn test_config_validator_ai() {
    let mut ai_config = AppConfig::default().ai;
    assert!(ConfigValidator::validate_ai(&ai_config).is_ok());

    // openai 提供方必须配置密钥
    ai_config.provider = "openai".to_string();
    assert!(ConfigValidator::validate_ai(&ai_config).is_err());

    ai_config.api_key = "sk-test".to_string();
    assert!(ConfigValidator::validate_ai(&ai_config).is_ok());

    ai_config.provider = "anthropic-local".to_string();
    assert!(ConfigValidator::validate_ai(&ai_config).is_err());

    ai_config.provider = "mock".to_string();
    ai_config.base_url = "not a url".to_string();
    assert!(ConfigValidator::validate_ai(&ai_config).is_err());
}

#[test]
fn test_config_validator_storage() {
    let mut storage = AppConfig::default().storage;
    assert!(ConfigValidator::validate_storage(&storage).is_ok());

    storage.backend = "s3".to_string();
    assert!(ConfigValidator::validate_storage(&storage).is_err());

    storage.access_key = "AKIA".to_string();
    storage.secret_key = "secret".to_string();
    assert!(ConfigValidator::validate_storage(&storage).is_ok());

    storage.backend = "ftp".to_string();
    assert!(ConfigValidator::validate_storage(&storage).is_err());
}

#[test]
fn test_config_validator_security() {
    let mut security = AppConfig::default().security;
    assert!(ConfigValidator::validate_security(&security).is_ok());

    security.jwt_secret = "short".to_string();
    assert!(ConfigValidator::validate_security(&security).is_err());

    security.jwt_secret = "a".repeat(32);
    security.bcrypt_cost = 50;
    assert!(ConfigValidator::validate_security(&security).is_err());
}

#[test]
fn test_config_validator_database() {
    let mut db_config = AppConfig::default().database;
    assert!(ConfigValidator::validate_database(&db_config).is_ok());

    db_config.url = "invalid-url".to_string();
    assert!(ConfigValidator::validate_database(&db_config).is_err());

    db_config.url = "postgresql://localhost/test".to_string();
    db_config.min_connections = 20;
    assert!(ConfigValidator::validate_database(&db_config).is_err());
}

#[test]
fn test_config_validator_logging_file_path() {
    let mut logging = AppConfig::default().logging;
    logging.file_enabled = true;
    assert!(ConfigValidator::validate_logging(&logging).is_err());

    logging.file_path = Some("./logs/voxd.log".to_string());
    assert!(ConfigValidator::validate_logging(&logging).is_ok());
}
