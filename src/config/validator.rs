// 配置验证器
// 提供详细的配置验证逻辑

use crate::config::{
    AiConfig, AppConfig, DatabaseConfig, EnvironmentConfig, LoggingConfig, PublicConfig,
    SecurityConfig, ServerConfig, StorageConfig, WhatsAppConfig,
};
use url::Url;
use voxd_common::CommonError;

/// 配置验证器
pub struct ConfigValidator;

impl ConfigValidator {
    /// 验证完整配置，一次性返回所有问题
    pub fn validate_all(config: &AppConfig) -> Result<(), Vec<CommonError>> {
        let checks = [
            Self::validate_server(&config.server),
            Self::validate_database(&config.database),
            Self::validate_ai(&config.ai),
            Self::validate_storage(&config.storage),
            Self::validate_whatsapp(&config.whatsapp),
            Self::validate_security(&config.security),
            Self::validate_public(&config.public),
            Self::validate_logging(&config.logging),
            Self::validate_environment(&config.environment),
        ];

        let errors: Vec<CommonError> = checks.into_iter().filter_map(Result::err).collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// 验证服务器配置
    pub fn validate_server(config: &ServerConfig) -> Result<(), CommonError> {
        if config.port == 0 {
            return Err(CommonError::validation("服务器端口不能为 0"));
        }

        if config.host.is_empty() {
            return Err(CommonError::validation("服务器主机地址不能为空"));
        }

        if let Some(workers) = config.workers {
            if workers == 0 {
                return Err(CommonError::validation("工作线程数不能为 0"));
            }
            if workers > 64 {
                return Err(CommonError::validation("工作线程数不建议超过 64"));
            }
        }

        Ok(())
    }

    /// 验证数据库配置
    pub fn validate_database(config: &DatabaseConfig) -> Result<(), CommonError> {
        if config.url.is_empty() {
            return Err(CommonError::validation("数据库 URL 不能为空"));
        }

        if Url::parse(&config.url).is_err() {
            return Err(CommonError::validation("数据库 URL 格式无效"));
        }

        if config.max_connections == 0 {
            return Err(CommonError::validation("数据库最大连接数不能为 0"));
        }

        if config.min_connections > config.max_connections {
            return Err(CommonError::validation("数据库最小连接数不能大于最大连接数"));
        }

        if config.connect_timeout == 0 {
            return Err(CommonError::validation("数据库连接超时不能为 0"));
        }

        Ok(())
    }

    /// 验证 AI 配置
    pub fn validate_ai(config: &AiConfig) -> Result<(), CommonError> {
        match config.provider.as_str() {
            "mock" => {}
            "openai" => {
                if config.api_key.is_empty() {
                    return Err(CommonError::validation("使用 openai 提供方时必须配置 API 密钥"));
                }
            }
            other => {
                return Err(CommonError::validation(format!(
                    "无效的 AI 提供方: {}，有效值: [\"openai\", \"mock\"]",
                    other
                )));
            }
        }

        if Url::parse(&config.base_url).is_err() {
            return Err(CommonError::validation("AI 服务地址格式无效"));
        }

        if config.chat_model.is_empty() {
            return Err(CommonError::validation("对话模型名称不能为空"));
        }

        if config.max_tokens == 0 {
            return Err(CommonError::validation("AI 最大 token 数不能为 0"));
        }

        if !(0.0..=2.0).contains(&config.temperature) {
            return Err(CommonError::validation("AI 温度参数必须在 0.0-2.0 之间"));
        }

        if config.timeout == 0 {
            return Err(CommonError::validation("AI 请求超时不能为 0"));
        }

        if config.retry_attempts == 0 || config.retry_attempts > 10 {
            return Err(CommonError::validation("AI 重试次数必须在 1-10 之间"));
        }

        Ok(())
    }

    /// 验证存储配置
    pub fn validate_storage(config: &StorageConfig) -> Result<(), CommonError> {
        match config.backend.as_str() {
            "local" => {
                if config.local_path.is_empty() {
                    return Err(CommonError::validation("本地存储路径不能为空"));
                }
            }
            "s3" => {
                if Url::parse(&config.endpoint).is_err() {
                    return Err(CommonError::validation("S3 端点 URL 格式无效"));
                }
                if config.bucket.is_empty() || config.region.is_empty() {
                    return Err(CommonError::validation("S3 存储桶和区域不能为空"));
                }
                if config.access_key.is_empty() || config.secret_key.is_empty() {
                    return Err(CommonError::validation("S3 访问密钥不能为空"));
                }
            }
            other => {
                return Err(CommonError::validation(format!(
                    "无效的存储后端: {}，有效值: [\"local\", \"s3\"]",
                    other
                )));
            }
        }

        if Url::parse(&config.public_base_url).is_err() {
            return Err(CommonError::validation("存储公开访问地址格式无效"));
        }

        if config.max_upload_bytes == 0 {
            return Err(CommonError::validation("最大上传大小不能为 0"));
        }

        if config.allowed_image_types.is_empty() {
            return Err(CommonError::validation("允许的图片类型列表不能为空"));
        }

        Ok(())
    }

    /// 验证 WhatsApp 配置
    pub fn validate_whatsapp(config: &WhatsAppConfig) -> Result<(), CommonError> {
        if Url::parse(&config.graph_base_url).is_err() {
            return Err(CommonError::validation("Graph API 地址格式无效"));
        }

        if !config.api_version.starts_with('v') {
            return Err(CommonError::validation("Graph API 版本格式应为 vXX.X"));
        }

        if config.timeout == 0 {
            return Err(CommonError::validation("Graph API 请求超时不能为 0"));
        }

        Ok(())
    }

    /// 验证安全配置
    pub fn validate_security(config: &SecurityConfig) -> Result<(), CommonError> {
        if config.jwt_secret.len() < 32 {
            return Err(CommonError::validation("JWT 密钥长度不能少于 32 个字符"));
        }

        if config.jwt_expiration == 0 {
            return Err(CommonError::validation("JWT 过期时间不能为 0"));
        }

        if config.jwt_expiration > 86400 * 30 {
            return Err(CommonError::validation("JWT 过期时间不建议超过 30 天"));
        }

        if !(4..=31).contains(&config.bcrypt_cost) {
            return Err(CommonError::validation("bcrypt 成本参数必须在 4-31 之间"));
        }

        Ok(())
    }

    /// 验证公开页面配置
    pub fn validate_public(config: &PublicConfig) -> Result<(), CommonError> {
        if Url::parse(&config.base_url).is_err() {
            return Err(CommonError::validation("公开页面地址格式无效"));
        }

        Ok(())
    }

    /// 验证日志配置
    pub fn validate_logging(config: &LoggingConfig) -> Result<(), CommonError> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&config.level.as_str()) {
            return Err(CommonError::validation(
                format!("无效的日志级别: {}，有效值: {:?}", config.level, valid_levels)
            ));
        }

        let valid_formats = ["json", "pretty", "compact"];
        if !valid_formats.contains(&config.format.as_str()) {
            return Err(CommonError::validation(
                format!("无效的日志格式: {}，有效值: {:?}", config.format, valid_formats)
            ));
        }

        if config.file_enabled && config.file_path.is_none() {
            return Err(CommonError::validation("启用文件日志时必须指定日志文件路径"));
        }

        Ok(())
    }

    /// 验证环境配置
    pub fn validate_environment(config: &EnvironmentConfig) -> Result<(), CommonError> {
        let valid_environments = ["development", "staging", "production", "test"];
        if !valid_environments.contains(&config.name.as_str()) {
            return Err(CommonError::validation(
                format!("无效的环境名称: {}，有效值: {:?}", config.name, valid_environments)
            ));
        }

        if config.version.is_empty() {
            return Err(CommonError::validation("版本信息不能为空"));
        }

        Ok(())
    }
}
