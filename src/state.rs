// 应用共享状态

use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::info;

use crate::ai::AiClientManager;
use crate::config::AppConfig;
use crate::errors::VoxdError;
use crate::services::auth::JwtUtils;
use crate::storage::{build_storage, ObjectStorage};
use crate::whatsapp::WhatsAppClient;

/// 所有请求共享的依赖
///
/// 服务在每个请求中按需构造，只持有这里的克隆。
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: Arc<AppConfig>,
    pub ai: AiClientManager,
    pub storage: Arc<dyn ObjectStorage>,
    pub whatsapp: Arc<WhatsAppClient>,
    pub jwt: JwtUtils,
}

impl AppState {
    pub fn new(db: Arc<DatabaseConnection>, config: AppConfig) -> Result<Self, VoxdError> {
        let ai = AiClientManager::new(config.ai.clone())?;
        let storage = build_storage(&config.storage)?;
        let whatsapp = Arc::new(WhatsAppClient::new(&config.whatsapp)?);
        let jwt = JwtUtils::from_config(&config.security);

        info!("应用状态初始化完成");

        Ok(Self {
            db,
            config: Arc::new(config),
            ai,
            storage,
            whatsapp,
            jwt,
        })
    }
}
