// 应用程序设置和配置
// 定义配置结构体和加载逻辑

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use voxd_common::CommonError;

/// 应用程序配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub ai: AiConfig,
    pub storage: StorageConfig,
    pub whatsapp: WhatsAppConfig,
    pub security: SecurityConfig,
    pub public: PublicConfig,
    pub logging: LoggingConfig,
    pub environment: EnvironmentConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub workers: Option<usize>,
    pub keep_alive: u64,
}

/// 数据库配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: u64,
    pub idle_timeout: u64,
    pub max_lifetime: u64,
}

/// AI 服务配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// openai 或 mock
    pub provider: String,
    pub base_url: String,
    pub api_key: String,
    pub chat_model: String,
    pub image_model: String,
    pub embedding_model: String,
    pub image_size: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: u64,
    pub retry_attempts: u32,
}

/// 对象存储配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// local 或 s3
    pub backend: String,
    pub local_path: String,
    pub public_base_url: String,
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub max_upload_bytes: u64,
    pub allowed_image_types: Vec<String>,
}

/// WhatsApp Graph API 配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsAppConfig {
    pub graph_base_url: String,
    pub api_version: String,
    pub timeout: u64,
}

/// 安全配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiration: u64,
    pub bcrypt_cost: u32,
    pub cors_origins: Vec<String>,
}

/// 公开页面配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicConfig {
    /// 报价公开页面的站点地址
    pub base_url: String,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    pub file_enabled: bool,
    pub file_path: Option<String>,
}

/// 环境配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    pub debug: bool,
    pub version: String,
}

impl AppConfig {
    /// 从环境变量和配置文件加载配置
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Config::builder();

        // 1. 加载默认配置
        config = config.add_source(Config::try_from(&AppConfig::default())?);

        // 2. 尝试加载配置文件
        if Path::new("config.toml").exists() {
            config = config.add_source(File::with_name("config"));
        }

        // 3. 加载环境变量（优先级最高）
        config = config.add_source(
            Environment::with_prefix("VOXD")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("security.cors_origins")
                .with_list_parse_key("storage.allowed_image_types")
                .try_parsing(true),
        );

        let config = config.build()?;
        let mut app_config: AppConfig = config.try_deserialize()?;

        app_config.environment.version = env!("CARGO_PKG_VERSION").to_string();

        Ok(app_config)
    }

    /// 验证配置
    pub fn validate(&self) -> Result<(), CommonError> {
        use crate::config::ConfigValidator;

        match ConfigValidator::validate_all(self) {
            Ok(()) => Ok(()),
            Err(errors) => {
                let error_messages: Vec<String> = errors.iter()
                    .map(|e| e.message.clone())
                    .collect();
                Err(CommonError::configuration(
                    format!("配置验证失败: {}", error_messages.join("; "))
                ))
            }
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment.name == "development"
    }

    pub fn is_production(&self) -> bool {
        self.environment.name == "production"
    }

    pub fn is_test(&self) -> bool {
        self.environment.name == "test"
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
                workers: None,
                keep_alive: 75,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/voxd".to_string(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout: 30,
                idle_timeout: 600,
                max_lifetime: 1800,
            },
            ai: AiConfig {
                provider: "mock".to_string(),
                base_url: "https://api.openai.com/v1".to_string(),
                api_key: "".to_string(),
                chat_model: "gpt-4o-mini".to_string(),
                image_model: "gpt-image-1".to_string(),
                embedding_model: "text-embedding-3-small".to_string(),
                image_size: "1024x1024".to_string(),
                max_tokens: 4096,
                temperature: 0.7,
                timeout: 120,
                retry_attempts: 2,
            },
            storage: StorageConfig {
                backend: "local".to_string(),
                local_path: "./storage".to_string(),
                public_base_url: "http://127.0.0.1:8080/files".to_string(),
                endpoint: "https://s3.eu-central-1.wasabisys.com".to_string(),
                region: "eu-central-1".to_string(),
                bucket: "voxd".to_string(),
                access_key: "".to_string(),
                secret_key: "".to_string(),
                max_upload_bytes: 5 * 1024 * 1024, // 5MB
                allowed_image_types: vec![
                    "image/png".to_string(),
                    "image/jpeg".to_string(),
                    "image/webp".to_string(),
                    "image/svg+xml".to_string(),
                ],
            },
            whatsapp: WhatsAppConfig {
                graph_base_url: "https://graph.facebook.com".to_string(),
                api_version: "v21.0".to_string(),
                timeout: 30,
            },
            security: SecurityConfig {
                jwt_secret: "change-this-secret-before-going-to-production!!".to_string(),
                jwt_expiration: 8 * 3600,
                bcrypt_cost: 12,
                cors_origins: vec!["*".to_string()],
            },
            public: PublicConfig {
                base_url: "http://localhost:3000".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: "json".to_string(),
                file_enabled: false,
                file_path: None,
            },
            environment: EnvironmentConfig {
                name: "development".to_string(),
                debug: true,
                version: "0.1.0".to_string(),
            },
        }
    }
}
